use crate::core::executor::{self, BandSpec, CancellationToken, TileComputer};
use crate::core::neighborhood::{window3x3, NeighborhoodReader};
use crate::core::resolution::spatial_resolution;
use crate::core::terrain::{self, RAD_TO_DEG};
use crate::types::{
    BandData, FloatGrid, RasterError, RasterProduct, RasterResult, TileRect,
};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

pub const SLOPE_BAND_NAME: &str = "slope";
pub const ASPECT_BAND_NAME: &str = "aspect";
pub const VARIANCE_BAND_NAME: &str = "elevation_variance";
pub const ORIENTATION_BAND_NAME: &str = "orientation";

const SLOPE_BAND_DESCRIPTION: &str = "Slope of each pixel as angle";
const ASPECT_BAND_DESCRIPTION: &str =
    "Aspect of each pixel as angle between North direction and steepest slope, clockwise";
const VARIANCE_BAND_DESCRIPTION: &str = "Variance of elevation over a 3x3 pixel window";
const ORIENTATION_BAND_DESCRIPTION: &str =
    "Angle between the raster x-axis and the local East direction";
const SLOPE_BAND_UNIT: &str = "deg [0..90]";
const ASPECT_BAND_UNIT: &str = "deg [0..360]";
const VARIANCE_BAND_UNIT: &str = "m^2";
const ORIENTATION_BAND_UNIT: &str = "deg [-180..180]";

/// Halo width of the 3x3 kernels. Fixed by the kernel size, not
/// user-configurable.
const HALO: usize = 1;

/// Parameters shared by the terrain-derivative processors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainParams {
    /// Name of the elevation band in the source product
    pub elevation_band: String,
    /// If set, the elevation source band is copied to the target product
    pub copy_elevation_band: bool,
    /// If set, a north-relative orientation band is written. Requires a
    /// geocoding that can produce per-pixel geographic positions.
    pub write_orientation: bool,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            elevation_band: "elevation".to_string(),
            copy_elevation_band: false,
            write_orientation: false,
        }
    }
}

/// Computes slope and aspect bands from an elevation band. Flat pixels keep
/// their raw wrapped aspect. Optionally adds a north-relative orientation
/// band.
pub struct SlopeAspectProcessor {
    params: TerrainParams,
    resolution: f64,
}

impl SlopeAspectProcessor {
    /// Validates the source product and caches its spatial resolution. All
    /// configuration errors surface here, before any tile executes.
    pub fn new(params: TerrainParams, product: &RasterProduct) -> RasterResult<Self> {
        validate_terrain_inputs(&params, product)?;
        let resolution = spatial_resolution(product)?;
        log::info!(
            "Slope/aspect of '{}': {:.3} m/pixel",
            product.name,
            resolution
        );
        Ok(Self { params, resolution })
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Process the whole raster in tiles of `tile_size`
    pub fn process(
        &self,
        product: &RasterProduct,
        tile_size: usize,
        cancel: &CancellationToken,
    ) -> RasterResult<RasterProduct> {
        let mut target = executor::process(
            self,
            product,
            "Slope-Aspect-Orientation",
            "slope-aspect-orientation",
            tile_size,
            cancel,
        )?;
        copy_elevation_if_requested(&self.params, product, &mut target)?;
        Ok(target)
    }
}

impl TileComputer for SlopeAspectProcessor {
    fn output_bands(&self) -> Vec<BandSpec> {
        let mut bands = vec![
            BandSpec::float(SLOPE_BAND_NAME, SLOPE_BAND_DESCRIPTION, SLOPE_BAND_UNIT),
            BandSpec::float(ASPECT_BAND_NAME, ASPECT_BAND_DESCRIPTION, ASPECT_BAND_UNIT),
        ];
        if self.params.write_orientation {
            bands.push(BandSpec::float(
                ORIENTATION_BAND_NAME,
                ORIENTATION_BAND_DESCRIPTION,
                ORIENTATION_BAND_UNIT,
            ));
        }
        bands
    }

    fn compute_tile(
        &self,
        product: &RasterProduct,
        rect: &TileRect,
        cancel: &CancellationToken,
    ) -> RasterResult<Vec<FloatGrid>> {
        let elevation = product
            .band(&self.params.elevation_band)
            .ok_or_else(|| RasterError::MissingBand(self.params.elevation_band.clone()))?;
        let buffer = NeighborhoodReader::read_region(elevation, rect, HALO)?;
        let coordinates = if self.params.write_orientation {
            Some(read_coordinates(product, rect, HALO)?)
        } else {
            None
        };
        let source_width = rect.width + 2 * HALO;

        let mut slope = Array2::zeros((rect.height, rect.width));
        let mut aspect = Array2::zeros((rect.height, rect.width));
        let mut orientation = coordinates
            .as_ref()
            .map(|_| Array2::zeros((rect.height, rect.width)));
        for row in 0..rect.height {
            if cancel.is_cancelled() {
                return Err(RasterError::Cancelled);
            }
            for col in 0..rect.width {
                let window = window3x3(&buffer, row, col);
                let result = terrain::slope_aspect(&window, self.resolution);
                slope[[row, col]] = to_degrees(result.slope);
                aspect[[row, col]] = to_degrees(result.aspect);
                if let (Some(grid), Some((lats, lons))) = (&mut orientation, &coordinates) {
                    let index = (row + HALO) * source_width + col + HALO;
                    grid[[row, col]] = to_degrees(terrain::orientation(lats, lons, index));
                }
            }
        }

        let mut bands = vec![slope, aspect];
        if let Some(grid) = orientation {
            bands.push(grid);
        }
        Ok(bands)
    }
}

/// Computes slope, aspect and local elevation variance bands from an
/// elevation band. Flat pixels have undefined (NaN) aspect.
pub struct SlopeVarianceProcessor {
    params: TerrainParams,
    resolution: f64,
}

impl SlopeVarianceProcessor {
    /// Validates the source product and caches its spatial resolution
    pub fn new(params: TerrainParams, product: &RasterProduct) -> RasterResult<Self> {
        validate_terrain_inputs(&params, product)?;
        let resolution = spatial_resolution(product)?;
        log::info!(
            "Slope/aspect/variance of '{}': {:.3} m/pixel",
            product.name,
            resolution
        );
        Ok(Self { params, resolution })
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Process the whole raster in tiles of `tile_size`
    pub fn process(
        &self,
        product: &RasterProduct,
        tile_size: usize,
        cancel: &CancellationToken,
    ) -> RasterResult<RasterProduct> {
        let mut target = executor::process(
            self,
            product,
            "Slope-Calculation",
            "slope-calculation",
            tile_size,
            cancel,
        )?;
        copy_elevation_if_requested(&self.params, product, &mut target)?;
        Ok(target)
    }
}

impl TileComputer for SlopeVarianceProcessor {
    fn output_bands(&self) -> Vec<BandSpec> {
        vec![
            BandSpec::float(SLOPE_BAND_NAME, SLOPE_BAND_DESCRIPTION, SLOPE_BAND_UNIT),
            BandSpec::float(ASPECT_BAND_NAME, ASPECT_BAND_DESCRIPTION, ASPECT_BAND_UNIT),
            BandSpec::float(
                VARIANCE_BAND_NAME,
                VARIANCE_BAND_DESCRIPTION,
                VARIANCE_BAND_UNIT,
            ),
        ]
    }

    fn compute_tile(
        &self,
        product: &RasterProduct,
        rect: &TileRect,
        cancel: &CancellationToken,
    ) -> RasterResult<Vec<FloatGrid>> {
        let elevation = product
            .band(&self.params.elevation_band)
            .ok_or_else(|| RasterError::MissingBand(self.params.elevation_band.clone()))?;
        let buffer = NeighborhoodReader::read_region(elevation, rect, HALO)?;

        let mut slope = Array2::zeros((rect.height, rect.width));
        let mut aspect = Array2::zeros((rect.height, rect.width));
        let mut variance = Array2::zeros((rect.height, rect.width));
        for row in 0..rect.height {
            if cancel.is_cancelled() {
                return Err(RasterError::Cancelled);
            }
            for col in 0..rect.width {
                let window = window3x3(&buffer, row, col);
                let result = terrain::slope_aspect_variance(&window, self.resolution);
                slope[[row, col]] = to_degrees(result.slope);
                aspect[[row, col]] = to_degrees(result.aspect);
                variance[[row, col]] = result.variance;
            }
        }
        Ok(vec![slope, aspect, variance])
    }
}

fn validate_terrain_inputs(params: &TerrainParams, product: &RasterProduct) -> RasterResult<()> {
    let elevation = product
        .band(&params.elevation_band)
        .ok_or_else(|| RasterError::MissingBand(params.elevation_band.clone()))?;
    match elevation.data {
        BandData::Int16(_) | BandData::Int32(_) | BandData::Float32(_) | BandData::Float64(_) => {}
        ref other => return Err(RasterError::UnsupportedSampleType(other.sample_type())),
    }
    if params.write_orientation {
        let geo_coding = product
            .geo_coding
            .as_ref()
            .ok_or_else(|| RasterError::NoGeoCoding(product.name.clone()))?;
        if !geo_coding.supports_geo_pos() {
            return Err(RasterError::Configuration(format!(
                "geo-coding of product '{}' cannot produce pixel positions required for orientation",
                product.name
            )));
        }
    }
    Ok(())
}

fn copy_elevation_if_requested(
    params: &TerrainParams,
    source: &RasterProduct,
    target: &mut RasterProduct,
) -> RasterResult<()> {
    if params.copy_elevation_band {
        let band = source
            .band(&params.elevation_band)
            .ok_or_else(|| RasterError::MissingBand(params.elevation_band.clone()))?;
        target.add_band(band.clone())?;
    }
    Ok(())
}

/// Flat lat/lon arrays for the halo-expanded source rectangle, row-major
fn read_coordinates(
    product: &RasterProduct,
    rect: &TileRect,
    halo: usize,
) -> RasterResult<(Vec<f32>, Vec<f32>)> {
    let geo_coding = product
        .geo_coding
        .as_ref()
        .ok_or_else(|| RasterError::NoGeoCoding(product.name.clone()))?;
    let source_width = rect.width + 2 * halo;
    let source_height = rect.height + 2 * halo;
    let mut lats = Vec::with_capacity(source_width * source_height);
    let mut lons = Vec::with_capacity(source_width * source_height);
    for row in 0..source_height {
        let y = rect.y as f64 + row as f64 - halo as f64;
        for col in 0..source_width {
            let x = rect.x as f64 + col as f64 - halo as f64;
            let pos = geo_coding.geo_pos(x, y).ok_or_else(|| {
                RasterError::Configuration(format!(
                    "geo-coding of product '{}' cannot produce pixel positions",
                    product.name
                ))
            })?;
            lats.push(pos.lat as f32);
            lons.push(pos.lon as f32);
        }
    }
    Ok((lats, lons))
}

fn to_degrees(radians: f32) -> f32 {
    (radians as f64 * RAD_TO_DEG) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Band, GeoCoding, GeoTransform};
    use ndarray::Array2;

    fn projected_geo_coding() -> GeoCoding {
        GeoCoding::Projected {
            transform: GeoTransform {
                top_left_x: 699960.0,
                pixel_width: 10.0,
                rotation_x: 0.0,
                top_left_y: 4000020.0,
                rotation_y: 0.0,
                pixel_height: -10.0,
            },
            epsg: 32650,
        }
    }

    fn elevation_product() -> RasterProduct {
        let mut product = RasterProduct::new("test", "test", 4, 4);
        product.geo_coding = Some(projected_geo_coding());
        product
            .add_band(Band::new(
                "elevation",
                BandData::Float32(Array2::zeros((4, 4))),
            ))
            .unwrap();
        product
    }

    #[test]
    fn test_missing_elevation_band_fails_at_setup() {
        let mut product = RasterProduct::new("test", "test", 4, 4);
        product.geo_coding = Some(projected_geo_coding());
        let result = SlopeAspectProcessor::new(TerrainParams::default(), &product);
        assert!(matches!(result, Err(RasterError::MissingBand(_))));
    }

    #[test]
    fn test_missing_geocoding_fails_at_setup() {
        let mut product = RasterProduct::new("test", "test", 4, 4);
        product
            .add_band(Band::new(
                "elevation",
                BandData::Float32(Array2::zeros((4, 4))),
            ))
            .unwrap();
        let result = SlopeVarianceProcessor::new(TerrainParams::default(), &product);
        assert!(matches!(result, Err(RasterError::NoGeoCoding(_))));
    }

    #[test]
    fn test_unsupported_elevation_type_fails_at_setup() {
        let mut product = RasterProduct::new("test", "test", 4, 4);
        product.geo_coding = Some(projected_geo_coding());
        product
            .add_band(Band::new(
                "elevation",
                BandData::UInt8(Array2::zeros((4, 4))),
            ))
            .unwrap();
        let result = SlopeAspectProcessor::new(TerrainParams::default(), &product);
        assert!(matches!(
            result,
            Err(RasterError::UnsupportedSampleType(_))
        ));
    }

    #[test]
    fn test_orientation_requires_pixel_positions() {
        let product = elevation_product();
        let params = TerrainParams {
            write_orientation: true,
            ..TerrainParams::default()
        };
        // projected affine geocoding cannot produce lat/lon positions
        let result = SlopeAspectProcessor::new(params, &product);
        assert!(matches!(result, Err(RasterError::Configuration(_))));
    }

    #[test]
    fn test_resolution_is_cached_from_affine_transform() {
        let product = elevation_product();
        let processor = SlopeAspectProcessor::new(TerrainParams::default(), &product).unwrap();
        assert_eq!(processor.resolution(), 10.0);
    }
}
