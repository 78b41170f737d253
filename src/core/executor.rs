use crate::types::{
    Band, BandData, ClassLegend, FloatGrid, RasterProduct, RasterResult, SampleType, TileRect,
};
use ndarray::{s, Array2};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared between a pipeline and its tile jobs.
/// Polled once per output row; a cancelled tile job abandons its remaining
/// rows and surfaces [`crate::types::RasterError::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Declaration of one output band of a tile computation. Tile buffers are
/// float; conversion into the declared storage type happens once at the
/// band-assembly boundary.
#[derive(Debug, Clone)]
pub struct BandSpec {
    pub name: String,
    pub sample_type: SampleType,
    pub unit: Option<String>,
    pub description: Option<String>,
    pub no_data: Option<f64>,
    pub index_coding: Option<ClassLegend>,
}

impl BandSpec {
    /// Float band with the default no-data marker
    pub fn float(name: &str, description: &str, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            sample_type: SampleType::Float32,
            unit: Some(unit.to_string()),
            description: Some(description.to_string()),
            no_data: Some(-9999.0),
            index_coding: None,
        }
    }

    /// Small-integer indexed band carrying a class legend
    pub fn indexed(name: &str, description: &str, legend: ClassLegend) -> Self {
        Self {
            name: name.to_string(),
            sample_type: SampleType::Int8,
            unit: None,
            description: Some(description.to_string()),
            no_data: None,
            index_coding: Some(legend),
        }
    }
}

/// A tile-wise raster computation: declares its output bands and fills one
/// tile of each per call. Tiles are independent, stateless units of work;
/// implementations hold only read-only per-raster state (cached resolution,
/// parameters) and may run on any number of tiles concurrently.
pub trait TileComputer: Send + Sync {
    fn output_bands(&self) -> Vec<BandSpec>;

    /// Compute all output-band buffers for one tile. Either every pixel of
    /// the tile is written or an error is returned; partial tiles are never
    /// emitted.
    fn compute_tile(
        &self,
        product: &RasterProduct,
        rect: &TileRect,
        cancel: &CancellationToken,
    ) -> RasterResult<Vec<FloatGrid>>;
}

/// Partition a raster into non-overlapping tiles in row-major order. Edge
/// tiles are truncated; the tiles cover the raster exactly.
pub fn tile_rects(width: usize, height: usize, tile_size: usize) -> Vec<TileRect> {
    let mut rects = Vec::new();
    let mut y = 0;
    while y < height {
        let tile_height = tile_size.min(height - y);
        let mut x = 0;
        while x < width {
            let tile_width = tile_size.min(width - x);
            rects.push(TileRect::new(x, y, tile_width, tile_height));
            x += tile_width;
        }
        y += tile_height;
    }
    rects
}

/// Run a tile computation over a whole raster and assemble the result
/// product. The target carries over the source's geocoding and start/end
/// times. Any tile error aborts the raster; there is no partial-raster
/// success and no retry.
pub fn process(
    computer: &dyn TileComputer,
    source: &RasterProduct,
    target_name: &str,
    target_type: &str,
    tile_size: usize,
    cancel: &CancellationToken,
) -> RasterResult<RasterProduct> {
    let specs = computer.output_bands();
    let rects = tile_rects(source.width, source.height, tile_size);
    log::info!(
        "Processing '{}': {} tiles, {} output bands",
        source.name,
        rects.len(),
        specs.len()
    );

    let tiles = compute_tiles(computer, source, &rects, cancel)?;

    let mut band_grids: Vec<FloatGrid> = specs
        .iter()
        .map(|_| Array2::zeros((source.height, source.width)))
        .collect();
    for (rect, tile_bands) in rects.iter().zip(tiles) {
        for (grid, tile) in band_grids.iter_mut().zip(tile_bands) {
            grid.slice_mut(s![
                rect.y..rect.y + rect.height,
                rect.x..rect.x + rect.width
            ])
            .assign(&tile);
        }
    }

    let mut target = RasterProduct::new(target_name, target_type, source.width, source.height);
    target.geo_coding = source.geo_coding.clone();
    target.start_time = source.start_time;
    target.end_time = source.end_time;
    for (spec, grid) in specs.into_iter().zip(band_grids) {
        let band = Band {
            name: spec.name,
            data: into_band_data(grid, spec.sample_type),
            unit: spec.unit,
            description: spec.description,
            no_data: spec.no_data,
            index_coding: spec.index_coding,
        };
        target.add_band(band)?;
    }
    log::info!("Finished '{}'", target.name);
    Ok(target)
}

#[cfg(feature = "parallel")]
fn compute_tiles(
    computer: &dyn TileComputer,
    source: &RasterProduct,
    rects: &[TileRect],
    cancel: &CancellationToken,
) -> RasterResult<Vec<Vec<FloatGrid>>> {
    use rayon::prelude::*;

    rects
        .par_iter()
        .map(|rect| computer.compute_tile(source, rect, cancel))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn compute_tiles(
    computer: &dyn TileComputer,
    source: &RasterProduct,
    rects: &[TileRect],
    cancel: &CancellationToken,
) -> RasterResult<Vec<Vec<FloatGrid>>> {
    rects
        .iter()
        .map(|rect| computer.compute_tile(source, rect, cancel))
        .collect()
}

/// Convert a float tile grid into the declared band storage
fn into_band_data(grid: FloatGrid, sample_type: SampleType) -> BandData {
    match sample_type {
        SampleType::Int8 => BandData::Int8(grid.mapv(|v| v as i8)),
        SampleType::UInt8 => BandData::UInt8(grid.mapv(|v| v as u8)),
        SampleType::Int16 => BandData::Int16(grid.mapv(|v| v as i16)),
        SampleType::Int32 => BandData::Int32(grid.mapv(|v| v as i32)),
        SampleType::Float32 => BandData::Float32(grid),
        SampleType::Float64 => BandData::Float64(grid.mapv(|v| v as f64)),
    }
}
