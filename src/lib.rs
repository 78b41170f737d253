//! Ridgeline: A Fast, Modular Terrain-Derivative and Classification Raster Processor
//!
//! This library computes slope, aspect and local elevation variance from
//! digital-elevation rasters and applies per-pixel arg-max classification to
//! remote-sensing imagery. All computation is expressed as independent
//! rectangular tile jobs so that rasters far larger than memory can be
//! processed, with halo reads keeping 3x3 kernels exact at tile and raster
//! edges.

pub mod core;
pub mod io;
pub mod types;

// Re-export main types and functions for easier access
pub use types::{
    Band, BandData, ClassDef, ClassLegend, FloatGrid, GeoCoding, GeoPos, GeoTransform,
    RasterError, RasterProduct, RasterResult, SampleType, TileRect,
};

pub use crate::core::{
    arg_max, classify, great_circle_distance_km, spatial_resolution, BandSpec,
    CancellationToken, Classification, ClassifierProcessor, NeighborhoodReader, ScoringFunction,
    SlopeAspectProcessor, SlopeVarianceProcessor, TerrainParams, TileComputer,
};

pub use io::GeoTiff;
