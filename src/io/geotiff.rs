use crate::types::{
    Band, BandData, FloatGrid, GeoCoding, GeoTransform, RasterError, RasterProduct, RasterResult,
};
use gdal::{Dataset, DriverManager};
use ndarray::Array2;
use std::path::Path;

/// GeoTIFF product reader/writer
pub struct GeoTiff;

impl GeoTiff {
    /// Read a single-band raster (e.g. a DEM) into a product. The first
    /// dataset band becomes `band_name`; the geotransform and spatial
    /// reference become the product's geocoding.
    pub fn read_product<P: AsRef<Path>>(path: P, band_name: &str) -> RasterResult<RasterProduct> {
        log::info!("Reading raster from: {}", path.as_ref().display());

        let dataset = Dataset::open(path.as_ref())?;
        let geo_transform = dataset.geo_transform()?;
        let (width, height) = dataset.raster_size();
        log::debug!("Raster size: {}x{}", width, height);

        let rasterband = dataset.rasterband(1)?;
        let band_data = rasterband.read_as::<f32>((0, 0), (width, height), (width, height), None)?;
        let array = Array2::from_shape_vec((height, width), band_data.data)
            .map_err(|e| RasterError::Processing(format!("Failed to reshape raster data: {}", e)))?;

        let transform = GeoTransform {
            top_left_x: geo_transform[0],
            pixel_width: geo_transform[1],
            rotation_x: geo_transform[2],
            top_left_y: geo_transform[3],
            rotation_y: geo_transform[4],
            pixel_height: geo_transform[5],
        };
        let geo_coding = match dataset.spatial_ref() {
            Ok(spatial_ref) if spatial_ref.is_geographic() => {
                Some(GeoCoding::Geographic { transform })
            }
            Ok(spatial_ref) => {
                let epsg = spatial_ref.auth_code().unwrap_or(0) as u32;
                Some(GeoCoding::Projected { transform, epsg })
            }
            Err(_) => None,
        };

        let name = path
            .as_ref()
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "raster".to_string());
        let mut product = RasterProduct::new(name, "elevation".to_string(), width, height);
        product.geo_coding = geo_coding;
        let mut band = Band::new(band_name, BandData::Float32(array));
        band.no_data = rasterband.no_data_value();
        product.add_band(band)?;
        Ok(product)
    }

    /// Save all bands of a product as a multi-band float GeoTIFF. Integer
    /// bands are widened for writing; the geocoding becomes the dataset's
    /// geotransform and spatial reference.
    pub fn write_product<P: AsRef<Path>>(product: &RasterProduct, path: P) -> RasterResult<()> {
        log::info!(
            "Saving product '{}' as GeoTIFF: {}",
            product.name,
            path.as_ref().display()
        );

        let band_count = product.bands().len();
        if band_count == 0 {
            return Err(RasterError::Processing(
                "product has no bands to write".to_string(),
            ));
        }

        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let mut dataset = driver.create_with_band_type::<f32, _>(
            path.as_ref(),
            product.width as isize,
            product.height as isize,
            band_count as isize,
        )?;

        match &product.geo_coding {
            Some(GeoCoding::Projected { transform, epsg }) => {
                dataset.set_geo_transform(&as_gdal_transform(transform))?;
                if *epsg != 0 {
                    dataset.set_spatial_ref(&gdal::spatial_ref::SpatialRef::from_epsg(*epsg)?)?;
                }
            }
            Some(GeoCoding::Geographic { transform }) => {
                dataset.set_geo_transform(&as_gdal_transform(transform))?;
                dataset.set_spatial_ref(&gdal::spatial_ref::SpatialRef::from_epsg(4326)?)?;
            }
            Some(GeoCoding::LatLon { .. }) | None => {
                log::debug!("Product '{}' has no affine geocoding to write", product.name);
            }
        }

        for (index, band) in product.bands().iter().enumerate() {
            let grid = band_as_f32(band);
            let flat_data: Vec<f32> = grid.iter().cloned().collect();
            let buffer = gdal::raster::Buffer::new((product.width, product.height), flat_data);
            let mut rasterband = dataset.rasterband((index + 1) as isize)?;
            rasterband.write((0, 0), (product.width, product.height), &buffer)?;
            if let Some(no_data) = band.no_data {
                rasterband.set_no_data_value(Some(no_data))?;
            }
        }

        Ok(())
    }
}

fn as_gdal_transform(transform: &GeoTransform) -> [f64; 6] {
    [
        transform.top_left_x,
        transform.pixel_width,
        transform.rotation_x,
        transform.top_left_y,
        transform.rotation_y,
        transform.pixel_height,
    ]
}

/// Widen any band storage to the float working type for writing
fn band_as_f32(band: &Band) -> FloatGrid {
    match &band.data {
        BandData::Int8(a) => a.mapv(|v| v as f32),
        BandData::UInt8(a) => a.mapv(|v| v as f32),
        BandData::Int16(a) => a.mapv(|v| v as f32),
        BandData::Int32(a) => a.mapv(|v| v as f32),
        BandData::Float32(a) => a.clone(),
        BandData::Float64(a) => a.mapv(|v| v as f32),
    }
}
