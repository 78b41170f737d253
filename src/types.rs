use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Working sample type for all kernel computations
pub type RasterReal = f32;

/// 2D float working grid (row-major: [row, col])
pub type FloatGrid = Array2<RasterReal>;

/// On-disk / in-memory sample types a band may declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleType {
    Int8,
    UInt8,
    Int16,
    Int32,
    Float32,
    Float64,
}

impl std::fmt::Display for SampleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleType::Int8 => write!(f, "int8"),
            SampleType::UInt8 => write!(f, "uint8"),
            SampleType::Int16 => write!(f, "int16"),
            SampleType::Int32 => write!(f, "int32"),
            SampleType::Float32 => write!(f, "float32"),
            SampleType::Float64 => write!(f, "float64"),
        }
    }
}

/// Sample storage of a single raster band
#[derive(Debug, Clone)]
pub enum BandData {
    Int8(Array2<i8>),
    UInt8(Array2<u8>),
    Int16(Array2<i16>),
    Int32(Array2<i32>),
    Float32(Array2<f32>),
    Float64(Array2<f64>),
}

impl BandData {
    /// (height, width) of the underlying grid
    pub fn dim(&self) -> (usize, usize) {
        match self {
            BandData::Int8(a) => a.dim(),
            BandData::UInt8(a) => a.dim(),
            BandData::Int16(a) => a.dim(),
            BandData::Int32(a) => a.dim(),
            BandData::Float32(a) => a.dim(),
            BandData::Float64(a) => a.dim(),
        }
    }

    pub fn sample_type(&self) -> SampleType {
        match self {
            BandData::Int8(_) => SampleType::Int8,
            BandData::UInt8(_) => SampleType::UInt8,
            BandData::Int16(_) => SampleType::Int16,
            BandData::Int32(_) => SampleType::Int32,
            BandData::Float32(_) => SampleType::Float32,
            BandData::Float64(_) => SampleType::Float64,
        }
    }
}

/// One entry of a class legend: external label plus display information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDef {
    /// Semantic class label; need not be contiguous or zero-based
    pub label: i32,
    /// Display color (RGB) for downstream rendering
    pub color: [u8; 3],
    pub description: String,
}

/// Index coding for a classification band: maps score-array indices to
/// external class labels, colors and descriptions, in array order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassLegend {
    pub classes: Vec<ClassDef>,
}

impl ClassLegend {
    pub fn new(classes: Vec<ClassDef>) -> Self {
        Self { classes }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// External label for a score-array index
    pub fn label(&self, index: usize) -> i32 {
        self.classes[index].label
    }
}

/// A named raster band with declared sample storage
#[derive(Debug, Clone)]
pub struct Band {
    pub name: String,
    pub data: BandData,
    pub unit: Option<String>,
    pub description: Option<String>,
    pub no_data: Option<f64>,
    /// Present only on indexed classification bands
    pub index_coding: Option<ClassLegend>,
}

impl Band {
    pub fn new<S: Into<String>>(name: S, data: BandData) -> Self {
        Self {
            name: name.into(),
            data,
            unit: None,
            description: None,
            no_data: None,
            index_coding: None,
        }
    }

    pub fn with_unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_no_data(mut self, no_data: f64) -> Self {
        self.no_data = Some(no_data);
        self
    }
}

/// Rectangular sub-region of a raster in pixel coordinates; the unit of work
/// of tile-wise processing. Output tiles partition a raster exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl TileRect {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Geographic position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPos {
    pub lat: f64,
    pub lon: f64,
}

/// Six-parameter affine image-to-map transformation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    /// Affine transform of a pixel coordinate into map/geographic space
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let mx = self.top_left_x + x * self.pixel_width + y * self.rotation_x;
        let my = self.top_left_y + x * self.rotation_y + y * self.pixel_height;
        (mx, my)
    }
}

/// Mapping between pixel and geographic coordinates
#[derive(Debug, Clone)]
pub enum GeoCoding {
    /// Affine image-to-map transform in a projected CRS; transform units are metres
    Projected { transform: GeoTransform, epsg: u32 },
    /// Affine image-to-geographic transform; transform units are degrees (lon, lat)
    Geographic { transform: GeoTransform },
    /// Per-pixel latitude/longitude grids
    LatLon {
        lats: Array2<f32>,
        lons: Array2<f32>,
    },
}

impl GeoCoding {
    /// X-axis scale factor of the affine map transform, when the grid is
    /// rectilinear in a projected CRS. Metres per pixel, exact.
    pub fn map_resolution(&self) -> Option<f64> {
        match self {
            GeoCoding::Projected { transform, .. } => Some(transform.pixel_width),
            _ => None,
        }
    }

    /// Whether `geo_pos` can produce a latitude/longitude for a pixel
    pub fn supports_geo_pos(&self) -> bool {
        !matches!(self, GeoCoding::Projected { .. })
    }

    /// Geographic position of a pixel coordinate. Affine geographic codings
    /// extrapolate outside the raster; grid codings clamp to the nearest cell.
    pub fn geo_pos(&self, x: f64, y: f64) -> Option<GeoPos> {
        match self {
            GeoCoding::Projected { .. } => None,
            GeoCoding::Geographic { transform } => {
                let (lon, lat) = transform.apply(x, y);
                Some(GeoPos { lat, lon })
            }
            GeoCoding::LatLon { lats, lons } => {
                let (height, width) = lats.dim();
                let col = (x.round() as isize).clamp(0, width as isize - 1) as usize;
                let row = (y.round() as isize).clamp(0, height as isize - 1) as usize;
                Some(GeoPos {
                    lat: lats[[row, col]] as f64,
                    lon: lons[[row, col]] as f64,
                })
            }
        }
    }
}

/// An in-memory raster product: named bands sharing one raster size,
/// an optional geocoding and optional acquisition times.
#[derive(Debug, Clone)]
pub struct RasterProduct {
    pub name: String,
    pub product_type: String,
    pub width: usize,
    pub height: usize,
    pub geo_coding: Option<GeoCoding>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    bands: Vec<Band>,
}

impl RasterProduct {
    pub fn new<S: Into<String>>(name: S, product_type: S, width: usize, height: usize) -> Self {
        Self {
            name: name.into(),
            product_type: product_type.into(),
            width,
            height,
            geo_coding: None,
            start_time: None,
            end_time: None,
            bands: Vec::new(),
        }
    }

    /// Add a band. All bands of a product must share the product's raster size.
    pub fn add_band(&mut self, band: Band) -> RasterResult<()> {
        let (height, width) = band.data.dim();
        if width != self.width || height != self.height {
            return Err(RasterError::SizeMismatch {
                band: band.name,
                expected: (self.width, self.height),
                actual: (width, height),
            });
        }
        if self.bands.iter().any(|b| b.name == band.name) {
            return Err(RasterError::Configuration(format!(
                "band '{}' already exists in product '{}'",
                band.name, self.name
            )));
        }
        self.bands.push(band);
        Ok(())
    }

    pub fn band(&self, name: &str) -> Option<&Band> {
        self.bands.iter().find(|b| b.name == name)
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn contains_band(&self, name: &str) -> bool {
        self.band(name).is_some()
    }
}

/// Error types for raster processing
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("missing required band '{0}'")]
    MissingBand(String),

    #[error("product '{0}' has no geo-coding")]
    NoGeoCoding(String),

    #[error("source sample type '{0}' not supported")]
    UnsupportedSampleType(SampleType),

    #[error("band '{band}' size {actual:?} does not match raster size {expected:?}")]
    SizeMismatch {
        band: String,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("processing error: {0}")]
    Processing(String),

    #[error("processing cancelled")]
    Cancelled,
}

/// Result type for raster operations
pub type RasterResult<T> = Result<T, RasterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_band_rejects_size_mismatch() {
        let mut product = RasterProduct::new("test", "test", 4, 4);
        let band = Band::new("elevation", BandData::Float32(Array2::zeros((3, 4))));
        let result = product.add_band(band);
        assert!(matches!(result, Err(RasterError::SizeMismatch { .. })));
    }

    #[test]
    fn test_add_band_rejects_duplicate_name() {
        let mut product = RasterProduct::new("test", "test", 2, 2);
        product
            .add_band(Band::new("elevation", BandData::Float32(Array2::zeros((2, 2)))))
            .unwrap();
        let result =
            product.add_band(Band::new("elevation", BandData::Float32(Array2::zeros((2, 2)))));
        assert!(matches!(result, Err(RasterError::Configuration(_))));
    }

    #[test]
    fn test_geographic_geo_pos_extrapolates() {
        let geo_coding = GeoCoding::Geographic {
            transform: GeoTransform {
                top_left_x: 10.0,
                pixel_width: 0.2,
                rotation_x: 0.0,
                top_left_y: 50.0,
                rotation_y: 0.0,
                pixel_height: -0.1,
            },
        };
        let pos = geo_coding.geo_pos(-1.0, 0.0).unwrap();
        assert_eq!(pos.lon, 9.8);
        assert_eq!(pos.lat, 50.0);
    }

    #[test]
    fn test_latlon_geo_pos_clamps() {
        let lats = Array2::from_shape_vec((2, 2), vec![50.0f32, 50.0, 49.9, 49.9]).unwrap();
        let lons = Array2::from_shape_vec((2, 2), vec![10.0f32, 10.1, 10.0, 10.1]).unwrap();
        let geo_coding = GeoCoding::LatLon { lats, lons };
        let pos = geo_coding.geo_pos(5.0, 5.0).unwrap();
        assert_eq!(pos.lat, 49.9 as f32 as f64);
        assert_eq!(pos.lon, 10.1 as f32 as f64);
    }

    #[test]
    fn test_projected_has_exact_resolution() {
        let geo_coding = GeoCoding::Projected {
            transform: GeoTransform {
                top_left_x: 699960.0,
                pixel_width: 10.0,
                rotation_x: 0.0,
                top_left_y: 4000020.0,
                rotation_y: 0.0,
                pixel_height: -10.0,
            },
            epsg: 32650,
        };
        assert_eq!(geo_coding.map_resolution(), Some(10.0));
        assert!(!geo_coding.supports_geo_pos());
    }
}
