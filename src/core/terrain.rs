use std::f64::consts::PI;

/// Degrees per radian. Angles stay in radians inside the kernels and are
/// converted at the band-writing boundary only.
pub const RAD_TO_DEG: f64 = 180.0 / PI;

/// Slope and aspect at one pixel, in radians
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlopeAspect {
    /// [0, pi/2]
    pub slope: f32,
    /// [0, 2*pi), signed zero preserved
    pub aspect: f32,
}

/// Slope, aspect and local elevation variance at one pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlopeAspectVariance {
    /// [0, pi/2]
    pub slope: f32,
    /// [0, 2*pi), NaN on flat pixels
    pub aspect: f32,
    /// m^2, >= 0
    pub variance: f32,
}

/// Slope and aspect from a 3x3 elevation window.
///
/// `elev` is row-major with index 4 the centre pixel; `resolution` is the
/// pixel spacing in metres. Gradients use the Sobel-style weighted
/// differences of the outer columns (`b`, along x+) and rows (`c`, top minus
/// bottom). Aspect is `atan2(-b, -c)` mapped from [-pi, pi] into [0, 2*pi);
/// a flat pixel keeps its raw wrapped aspect in this variant.
pub fn slope_aspect(elev: &[f32; 9], resolution: f64) -> SlopeAspect {
    let b = (elev[2] + 2.0 * elev[5] + elev[8] - elev[0] - 2.0 * elev[3] - elev[6]) / 8.0;
    let c = (elev[0] + 2.0 * elev[1] + elev[2] - elev[6] - 2.0 * elev[7] - elev[8]) / 8.0;
    let slope = ((b as f64 / resolution).powi(2) + (c as f64 / resolution).powi(2))
        .sqrt()
        .atan() as f32;
    let aspect = (-(b as f64)).atan2(-(c as f64)) as f32;
    SlopeAspect {
        slope,
        aspect: wrap_aspect(aspect),
    }
}

/// Slope, aspect and elevation variance from a 3x3 elevation window.
///
/// Same gradient math as [`slope_aspect`] but carried out after widening the
/// window to f64. A slope of exactly zero has no defined downhill direction,
/// so the aspect of flat pixels is NaN. The variance is the bias-corrected
/// variance of the nine window elevations.
pub fn slope_aspect_variance(elev: &[f32; 9], resolution: f64) -> SlopeAspectVariance {
    let mut e = [0.0f64; 9];
    for (wide, narrow) in e.iter_mut().zip(elev.iter()) {
        *wide = *narrow as f64;
    }

    let b = (e[2] + 2.0 * e[5] + e[8] - e[0] - 2.0 * e[3] - e[6]) / 8.0;
    let c = (e[0] + 2.0 * e[1] + e[2] - e[6] - 2.0 * e[7] - e[8]) / 8.0;
    let slope = ((b / resolution).powi(2) + (c / resolution).powi(2))
        .sqrt()
        .atan() as f32;
    let mut aspect = wrap_aspect((-b).atan2(-c) as f32);
    if slope <= 0.0 {
        aspect = f32::NAN;
    }

    SlopeAspectVariance {
        slope,
        aspect,
        variance: variance(&e) as f32,
    }
}

/// North-relative orientation of the raster x-axis at a pixel, from the
/// geographic positions of its immediate west/east neighbours in a row-major
/// coordinate array. Used when the orientation must be independent of the
/// projection's up direction. Radians.
pub fn orientation(lats: &[f32], lons: &[f32], index: usize) -> f32 {
    let lat_west = lats[index - 1];
    let lat_east = lats[index + 1];
    let lon_west = lons[index - 1];
    let lon_east = lons[index + 1];
    let delta_lat = -(lat_east - lat_west);
    (delta_lat as f64).atan2(((lon_east - lon_west) as f64) * (lat_west as f64).to_radians().cos())
        as f32
}

/// Map [-pi, pi] into [0, 2*pi). The comparison is strictly `< 0`, so an
/// IEEE -0.0 aspect stays -0.0; atan2(-0.0, -0.0) = -pi wraps to +pi.
fn wrap_aspect(aspect: f32) -> f32 {
    if aspect < 0.0 {
        (aspect as f64 + 2.0 * PI) as f32
    } else {
        aspect
    }
}

/// Bias-corrected variance of the window elevations
fn variance(values: &[f64; 9]) -> f64 {
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let sum_sq: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    sum_sq / (values.len() - 1) as f64
}
