use crate::core::executor::{self, BandSpec, CancellationToken, TileComputer};
use crate::core::neighborhood::NeighborhoodReader;
use crate::types::{
    ClassLegend, FloatGrid, RasterError, RasterProduct, RasterResult, TileRect,
};
use ndarray::Array2;

pub const FINAL_CLASS_BAND_NAME: &str = "final_class";
pub const MAX_SCORE_BAND_NAME: &str = "max_score";

/// Externally supplied per-pixel scoring function, e.g. a fuzzy decision
/// tree evaluator. Opaque to this crate: fixed input arity (one value per
/// input band) and fixed output arity (one score per class plus a trailing
/// auxiliary aggregate). Implementations must be thread-safe; tiles evaluate
/// concurrently.
pub trait ScoringFunction: Send + Sync {
    /// Ordered names of the source bands feeding the input vector
    fn input_bands(&self) -> &[String];

    /// Names of the outputs: one per class, the auxiliary aggregate last
    fn output_names(&self) -> &[String];

    /// Evaluate all scores for one input vector. `outputs` has
    /// `output_names().len()` elements, the auxiliary last.
    fn apply(&self, inputs: &[f64], outputs: &mut [f64]);

    /// Number of classes (the auxiliary output is not a class)
    fn class_count(&self) -> usize {
        self.output_names().len() - 1
    }
}

/// Per-pixel classification result
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Per-class membership scores, in class order
    pub scores: Vec<f64>,
    /// Auxiliary aggregate score, excluded from the arg-max
    pub auxiliary: f64,
    /// Winning score-array index
    pub winning_index: usize,
    /// External class label of the winner
    pub winning_label: i32,
    pub winning_score: f64,
}

/// Index of the greatest score. The running maximum is seeded from index 0
/// and only replaced on a strictly greater score, so exactly one winner
/// exists and ties resolve to the lowest index.
pub fn arg_max(scores: &[f64]) -> usize {
    let mut max_index = 0;
    let mut max_score = scores[0];
    for (index, &score) in scores.iter().enumerate().skip(1) {
        if score > max_score {
            max_index = index;
            max_score = score;
        }
    }
    max_index
}

/// Apply a scoring function to one input vector and pick the winning class.
/// Pure; the auxiliary trailing score is passed through unchanged and does
/// not participate in the arg-max.
pub fn classify(
    inputs: &[f64],
    scoring: &dyn ScoringFunction,
    legend: &ClassLegend,
) -> Classification {
    let output_len = scoring.output_names().len();
    let mut outputs = vec![0.0; output_len];
    scoring.apply(inputs, &mut outputs);
    let auxiliary = outputs[output_len - 1];
    outputs.truncate(output_len - 1);
    let winning_index = arg_max(&outputs);
    let winning_score = outputs[winning_index];
    Classification {
        winning_label: legend.label(winning_index),
        scores: outputs,
        auxiliary,
        winning_index,
        winning_score,
    }
}

/// Applies a scoring function to every pixel of a raster and emits per-class
/// score bands, the auxiliary band, the winning score and an indexed class
/// band styled by the legend.
pub struct ClassifierProcessor<S: ScoringFunction> {
    scoring: S,
    legend: ClassLegend,
}

impl<S: ScoringFunction> ClassifierProcessor<S> {
    /// Validates input bands and legend against the scoring function. All
    /// configuration errors surface here, before any tile executes.
    pub fn new(scoring: S, legend: ClassLegend, product: &RasterProduct) -> RasterResult<Self> {
        if scoring.output_names().len() < 2 {
            return Err(RasterError::Configuration(
                "scoring function must produce at least one class score and an auxiliary score"
                    .to_string(),
            ));
        }
        if legend.len() != scoring.class_count() {
            return Err(RasterError::Configuration(format!(
                "legend has {} classes but the scoring function produces {}",
                legend.len(),
                scoring.class_count()
            )));
        }
        for name in scoring.input_bands() {
            product
                .band(name)
                .ok_or_else(|| RasterError::MissingBand(name.clone()))?;
        }
        log::info!(
            "Classifier over '{}': {} inputs, {} classes",
            product.name,
            scoring.input_bands().len(),
            scoring.class_count()
        );
        Ok(Self { scoring, legend })
    }

    /// Process the whole raster in tiles of `tile_size`. The target keeps
    /// the source product's name and type.
    pub fn process(
        &self,
        product: &RasterProduct,
        tile_size: usize,
        cancel: &CancellationToken,
    ) -> RasterResult<RasterProduct> {
        let name = product.name.clone();
        let product_type = product.product_type.clone();
        executor::process(self, product, &name, &product_type, tile_size, cancel)
    }
}

impl<S: ScoringFunction> TileComputer for ClassifierProcessor<S> {
    fn output_bands(&self) -> Vec<BandSpec> {
        let names = self.scoring.output_names();
        let class_count = self.scoring.class_count();
        let mut bands: Vec<BandSpec> = names
            .iter()
            .take(class_count)
            .map(|name| BandSpec::float(name, "Class membership score", ""))
            .collect();
        bands.push(BandSpec::float(
            &names[class_count],
            "Auxiliary aggregate score",
            "",
        ));
        bands.push(BandSpec::float(
            MAX_SCORE_BAND_NAME,
            "Score of the winning class",
            "",
        ));
        bands.push(BandSpec::indexed(
            FINAL_CLASS_BAND_NAME,
            "Winning class label",
            self.legend.clone(),
        ));
        bands
    }

    fn compute_tile(
        &self,
        product: &RasterProduct,
        rect: &TileRect,
        cancel: &CancellationToken,
    ) -> RasterResult<Vec<FloatGrid>> {
        let input_names = self.scoring.input_bands();
        let mut input_tiles = Vec::with_capacity(input_names.len());
        for name in input_names {
            let band = product
                .band(name)
                .ok_or_else(|| RasterError::MissingBand(name.clone()))?;
            input_tiles.push(NeighborhoodReader::read_region(band, rect, 0)?);
        }

        let class_count = self.scoring.class_count();
        let mut grids: Vec<FloatGrid> = (0..class_count + 3)
            .map(|_| Array2::zeros((rect.height, rect.width)))
            .collect();
        let mut inputs = vec![0.0f64; input_names.len()];
        let mut outputs = vec![0.0f64; class_count + 1];
        for row in 0..rect.height {
            if cancel.is_cancelled() {
                return Err(RasterError::Cancelled);
            }
            for col in 0..rect.width {
                for (value, tile) in inputs.iter_mut().zip(&input_tiles) {
                    *value = tile[[row, col]] as f64;
                }
                self.scoring.apply(&inputs, &mut outputs);
                let winning = arg_max(&outputs[..class_count]);
                for (index, grid) in grids.iter_mut().take(class_count).enumerate() {
                    grid[[row, col]] = outputs[index] as f32;
                }
                grids[class_count][[row, col]] = outputs[class_count] as f32;
                grids[class_count + 1][[row, col]] = outputs[winning] as f32;
                grids[class_count + 2][[row, col]] = self.legend.label(winning) as f32;
            }
        }
        Ok(grids)
    }
}
