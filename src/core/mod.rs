//! Core raster processing modules

pub mod classify;
pub mod executor;
pub mod neighborhood;
pub mod resolution;
pub mod slope;
pub mod terrain;

// Re-export main types
pub use classify::{arg_max, classify, Classification, ClassifierProcessor, ScoringFunction};
pub use executor::{process, tile_rects, BandSpec, CancellationToken, TileComputer};
pub use neighborhood::{window3x3, NeighborhoodReader};
pub use resolution::{great_circle_distance_km, spatial_resolution};
pub use slope::{SlopeAspectProcessor, SlopeVarianceProcessor, TerrainParams};
pub use terrain::{
    orientation, slope_aspect, slope_aspect_variance, SlopeAspect, SlopeAspectVariance, RAD_TO_DEG,
};
