use ndarray::Array2;
use ridgeline::core::classify::{FINAL_CLASS_BAND_NAME, MAX_SCORE_BAND_NAME};
use ridgeline::{
    Band, BandData, CancellationToken, ClassDef, ClassLegend, ClassifierProcessor, RasterError,
    RasterProduct, ScoringFunction,
};

/// Toy stand-in for an externally generated fuzzy decision tree: scores
/// "low", "mid" and "high" membership of the first band value, modulated by
/// the second band, plus a trailing aggregate.
struct RangeScorer {
    input_names: Vec<String>,
    output_names: Vec<String>,
}

impl RangeScorer {
    fn new() -> Self {
        Self {
            input_names: vec!["reflectance".to_string(), "weight".to_string()],
            output_names: vec![
                "score_low".to_string(),
                "score_mid".to_string(),
                "score_high".to_string(),
                "bsum".to_string(),
            ],
        }
    }
}

impl ScoringFunction for RangeScorer {
    fn input_bands(&self) -> &[String] {
        &self.input_names
    }

    fn output_names(&self) -> &[String] {
        &self.output_names
    }

    fn apply(&self, inputs: &[f64], outputs: &mut [f64]) {
        let value = inputs[0];
        let weight = inputs[1];
        outputs[0] = weight * (1.0 - value).clamp(0.0, 1.0);
        outputs[1] = weight * (1.0 - 2.0 * (value - 0.5).abs()).clamp(0.0, 1.0);
        outputs[2] = weight * value.clamp(0.0, 1.0);
        outputs[3] = outputs[0] + outputs[1] + outputs[2];
    }
}

fn legend() -> ClassLegend {
    ClassLegend::new(vec![
        ClassDef {
            label: 3,
            color: [0, 0, 128],
            description: "low reflectance".to_string(),
        },
        ClassDef {
            label: 7,
            color: [0, 128, 0],
            description: "mid reflectance".to_string(),
        },
        ClassDef {
            label: 21,
            color: [128, 0, 0],
            description: "high reflectance".to_string(),
        },
    ])
}

fn input_product() -> RasterProduct {
    let reflectance = Array2::from_shape_vec(
        (2, 4),
        vec![
            0.1f32, 0.9, 0.5, 0.2, //
            0.8, 0.5, 0.0, 1.0,
        ],
    )
    .unwrap();
    let weight = Array2::from_elem((2, 4), 1.0f32);
    let mut product = RasterProduct::new("classification_input", "intertidal", 4, 2);
    product
        .add_band(Band::new("reflectance", BandData::Float32(reflectance)))
        .unwrap();
    product
        .add_band(Band::new("weight", BandData::Float32(weight)))
        .unwrap();
    product
}

fn int8_grid<'a>(product: &'a RasterProduct, name: &str) -> &'a Array2<i8> {
    match &product.band(name).expect("band missing").data {
        BandData::Int8(grid) => grid,
        other => panic!("expected int8 band, got {:?}", other.sample_type()),
    }
}

fn float_grid<'a>(product: &'a RasterProduct, name: &str) -> &'a Array2<f32> {
    match &product.band(name).expect("band missing").data {
        BandData::Float32(grid) => grid,
        other => panic!("expected float32 band, got {:?}", other.sample_type()),
    }
}

#[test]
fn test_classifier_emits_scores_winner_and_class_band() {
    let product = input_product();
    let processor = ClassifierProcessor::new(RangeScorer::new(), legend(), &product).unwrap();
    let target = processor
        .process(&product, 2, &CancellationToken::new())
        .unwrap();

    // N score bands + auxiliary + winning score + indexed class band
    assert_eq!(target.bands().len(), 6);
    assert_eq!(target.name, "classification_input");
    assert_eq!(target.product_type, "intertidal");

    let final_class = int8_grid(&target, FINAL_CLASS_BAND_NAME);
    // winners by construction: low for small values, high for large,
    // mid around 0.5
    assert_eq!(final_class[[0, 0]], 3);
    assert_eq!(final_class[[0, 1]], 21);
    assert_eq!(final_class[[0, 2]], 7);
    assert_eq!(final_class[[0, 3]], 3);
    assert_eq!(final_class[[1, 0]], 21);
    assert_eq!(final_class[[1, 2]], 3);
    assert_eq!(final_class[[1, 3]], 21);

    let max_score = float_grid(&target, MAX_SCORE_BAND_NAME);
    let low = float_grid(&target, "score_low");
    let mid = float_grid(&target, "score_mid");
    let high = float_grid(&target, "score_high");
    for row in 0..2 {
        for col in 0..4 {
            let best = low[[row, col]]
                .max(mid[[row, col]])
                .max(high[[row, col]]);
            assert_eq!(max_score[[row, col]], best);
        }
    }

    // auxiliary aggregate is passed through unchanged
    let bsum = float_grid(&target, "bsum");
    for row in 0..2 {
        for col in 0..4 {
            let sum = low[[row, col]] + mid[[row, col]] + high[[row, col]];
            assert!((bsum[[row, col]] - sum).abs() < 1e-6);
        }
    }
}

#[test]
fn test_class_band_carries_the_legend() {
    let product = input_product();
    let processor = ClassifierProcessor::new(RangeScorer::new(), legend(), &product).unwrap();
    let target = processor
        .process(&product, 4, &CancellationToken::new())
        .unwrap();

    let band = target.band(FINAL_CLASS_BAND_NAME).unwrap();
    let coding = band.index_coding.as_ref().expect("missing index coding");
    assert_eq!(coding.len(), 3);
    assert_eq!(coding.label(0), 3);
    assert_eq!(coding.label(2), 21);
    assert_eq!(coding.classes[1].description, "mid reflectance");
}

#[test]
fn test_score_tie_selects_lower_index() {
    // reflectance 0.5 with weight 1 scores low=0.5, mid=1.0, high=0.5;
    // reflectance exactly at the low/high crossing ties low and high
    let product = input_product();
    let processor = ClassifierProcessor::new(RangeScorer::new(), legend(), &product).unwrap();
    let target = processor
        .process(&product, 4, &CancellationToken::new())
        .unwrap();
    let final_class = int8_grid(&target, FINAL_CLASS_BAND_NAME);
    // pixel (1, 1): value 0.5 -> mid wins outright
    assert_eq!(final_class[[1, 1]], 7);

    // direct tie between the first two classes resolves to the first
    struct TieScorer(Vec<String>, Vec<String>);
    impl ScoringFunction for TieScorer {
        fn input_bands(&self) -> &[String] {
            &self.0
        }
        fn output_names(&self) -> &[String] {
            &self.1
        }
        fn apply(&self, _inputs: &[f64], outputs: &mut [f64]) {
            outputs.copy_from_slice(&[0.8, 0.8, 0.1, 1.7]);
        }
    }
    let scorer = TieScorer(
        vec!["reflectance".to_string()],
        vec![
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
            "sum".to_string(),
        ],
    );
    let processor = ClassifierProcessor::new(scorer, legend(), &product).unwrap();
    let target = processor
        .process(&product, 4, &CancellationToken::new())
        .unwrap();
    let final_class = int8_grid(&target, FINAL_CLASS_BAND_NAME);
    for value in final_class.iter() {
        assert_eq!(*value, 3);
    }
}

#[test]
fn test_missing_input_band_fails_at_setup() {
    let mut product = RasterProduct::new("incomplete", "test", 4, 2);
    product
        .add_band(Band::new(
            "reflectance",
            BandData::Float32(Array2::zeros((2, 4))),
        ))
        .unwrap();
    let result = ClassifierProcessor::new(RangeScorer::new(), legend(), &product);
    assert!(matches!(result, Err(RasterError::MissingBand(name)) if name == "weight"));
}

#[test]
fn test_legend_size_must_match_class_count() {
    let product = input_product();
    let short_legend = ClassLegend::new(vec![ClassDef {
        label: 1,
        color: [0, 0, 0],
        description: "only".to_string(),
    }]);
    let result = ClassifierProcessor::new(RangeScorer::new(), short_legend, &product);
    assert!(matches!(result, Err(RasterError::Configuration(_))));
}

#[test]
fn test_cancellation_propagates() {
    let product = input_product();
    let processor = ClassifierProcessor::new(RangeScorer::new(), legend(), &product).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = processor.process(&product, 2, &cancel);
    assert!(matches!(result, Err(RasterError::Cancelled)));
}
