//! Raster product I/O

pub mod geotiff;

pub use geotiff::GeoTiff;
