use crate::types::{Band, BandData, FloatGrid, RasterReal, RasterResult, RasterError, TileRect};
use ndarray::Array2;
use num_traits::AsPrimitive;

/// Reads rectangular raster regions expanded by a halo border so that
/// neighborhood kernels evaluate correctly at tile and raster edges.
///
/// Where the expanded region falls outside the raster, samples are clamped to
/// the nearest valid pixel (border-extend-by-copy). Source samples are widened
/// to the float working type; only 16/32-bit integer and 32/64-bit float
/// sources are accepted.
pub struct NeighborhoodReader;

impl NeighborhoodReader {
    /// Read `rect` expanded by `halo` pixels on every side.
    ///
    /// The returned grid has shape
    /// `(rect.height + 2 * halo, rect.width + 2 * halo)`. With `halo = 0`
    /// this is a plain widened tile read.
    pub fn read_region(band: &Band, rect: &TileRect, halo: usize) -> RasterResult<FloatGrid> {
        match &band.data {
            BandData::Int16(source) => Ok(Self::extract(source, rect, halo)),
            BandData::Int32(source) => Ok(Self::extract(source, rect, halo)),
            BandData::Float32(source) => Ok(Self::extract(source, rect, halo)),
            BandData::Float64(source) => Ok(Self::extract(source, rect, halo)),
            other => Err(RasterError::UnsupportedSampleType(other.sample_type())),
        }
    }

    fn extract<T>(source: &Array2<T>, rect: &TileRect, halo: usize) -> FloatGrid
    where
        T: Copy + AsPrimitive<RasterReal>,
    {
        let (height, width) = source.dim();
        let out_height = rect.height + 2 * halo;
        let out_width = rect.width + 2 * halo;
        let mut out = Array2::zeros((out_height, out_width));
        for row in 0..out_height {
            let src_y = clamp_index(rect.y as isize + row as isize - halo as isize, height);
            for col in 0..out_width {
                let src_x = clamp_index(rect.x as isize + col as isize - halo as isize, width);
                out[[row, col]] = source[[src_y, src_x]].as_();
            }
        }
        out
    }
}

/// 3x3 row-major window of a halo buffer, centred on the target pixel
/// (`row`, `col`) of the tile (buffer coordinates are offset by the halo).
pub fn window3x3(buffer: &FloatGrid, row: usize, col: usize) -> [RasterReal; 9] {
    let mut window = [0.0; 9];
    for wy in 0..3 {
        for wx in 0..3 {
            window[wy * 3 + wx] = buffer[[row + wy, col + wx]];
        }
    }
    window
}

fn clamp_index(index: isize, len: usize) -> usize {
    index.clamp(0, len as isize - 1) as usize
}
