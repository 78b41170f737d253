use crate::types::{GeoCoding, GeoPos, RasterError, RasterProduct, RasterResult};

/// Mean Earth radius in km, as used by the Haversine formula
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Ground sampling distance of a product in metres per pixel.
///
/// Exact when the geocoding carries an affine image-to-map transform in a
/// projected CRS; otherwise estimated from great-circle distances between the
/// raster's edge midpoints. Callers cannot distinguish the two cases. The
/// value is constant for a raster and is meant to be computed once and shared
/// across tile jobs.
pub fn spatial_resolution(product: &RasterProduct) -> RasterResult<f64> {
    let geo_coding = product
        .geo_coding
        .as_ref()
        .ok_or_else(|| RasterError::NoGeoCoding(product.name.clone()))?;
    if let Some(resolution) = geo_coding.map_resolution() {
        log::debug!(
            "Spatial resolution from affine map transform: {} m/pixel",
            resolution
        );
        return Ok(resolution);
    }
    let resolution = estimate_from_edges(product, geo_coding)?;
    log::debug!(
        "Spatial resolution estimated from great-circle distances: {:.3} m/pixel",
        resolution
    );
    Ok(resolution)
}

/// Fallback estimate: average of the great-circle distances between the
/// left/right and top/bottom edge midpoints, divided over the pixel count.
/// Assumes isotropic, near-uniform pixel spacing.
fn estimate_from_edges(product: &RasterProduct, geo_coding: &GeoCoding) -> RasterResult<f64> {
    let width = product.width;
    let height = product.height;

    let left = edge_pos(geo_coding, product, 0.0, (height / 2) as f64)?;
    let right = edge_pos(geo_coding, product, (width - 1) as f64, (height / 2) as f64)?;
    let distance1 = great_circle_distance_km(left.lat, left.lon, right.lat, right.lon);

    let upper = edge_pos(geo_coding, product, (width / 2) as f64, 0.0)?;
    let lower = edge_pos(geo_coding, product, (width / 2) as f64, (height - 1) as f64)?;
    let distance2 = great_circle_distance_km(upper.lat, upper.lon, lower.lat, lower.lon);

    let distance = 0.5 * (distance1 + distance2);

    Ok(1000.0 * distance / (width - 1) as f64)
}

fn edge_pos(
    geo_coding: &GeoCoding,
    product: &RasterProduct,
    x: f64,
    y: f64,
) -> RasterResult<GeoPos> {
    geo_coding.geo_pos(x, y).ok_or_else(|| {
        RasterError::Configuration(format!(
            "geo-coding of product '{}' cannot produce pixel positions",
            product.name
        ))
    })
}

/// Great-circle distance between two points in degrees, via the Haversine
/// formula. Returns km.
pub fn great_circle_distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let delta_lat = (lat1 - lat2).to_radians();
    let delta_lon = (lon1 - lon2).to_radians();

    let a = (delta_lat / 2.0).sin() * (delta_lat / 2.0).sin()
        + lat1.to_radians().cos()
            * lat2.to_radians().cos()
            * (delta_lon / 2.0).sin()
            * (delta_lon / 2.0).sin();

    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}
