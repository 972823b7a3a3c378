//! Core pipeline types
//!
//! Shared data model for the inference-to-explanation pipeline:
//! - `FeatureVector`: fixed 20-entry feature schema the classifiers were trained on
//! - `ModelPrediction` / `EnsembleResult`: per-model and averaged predictions
//! - `StageOutcome` / `DegradedDefault`: typed per-stage fallback

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Feature Vector
// ============================================================================

/// Number of entries in the feature schema
pub const FEATURE_COUNT: usize = 20;

/// Feature names in training order
///
/// 8 morphological metrics as (mean, std) pairs, then 4 temporal placeholders.
/// The schema was designed for multi-frame time-lapse input; a single still
/// has no cross-frame variance, so every `_std` entry is 0.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "std_dev_mean",
    "std_dev_std",
    "mean_intensity_mean",
    "mean_intensity_std",
    "contrast_mean",
    "contrast_std",
    "entropy_mean",
    "entropy_std",
    "edge_density_mean",
    "edge_density_std",
    "gradient_magnitude_mean",
    "gradient_magnitude_std",
    "circularity_mean",
    "circularity_std",
    "num_regions_mean",
    "num_regions_std",
    "frame_number",
    "time_elapsed",
    "frames_analyzed",
    "total_duration",
];

/// The 8 single-image morphological measurements
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MorphologicalMetrics {
    pub std_dev: f64,
    pub mean_intensity: f64,
    pub contrast: f64,
    pub entropy: f64,
    pub edge_density: f64,
    pub gradient_magnitude: f64,
    pub circularity: f64,
    pub num_regions: f64,
}

/// Fixed, ordered feature vector for one image
///
/// Immutable once built. Serializes as a JSON object whose keys follow
/// `FEATURE_NAMES` order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    /// Build from single-image measurements
    ///
    /// `_std` entries are 0, temporal placeholders are frame 0 of a 1-frame,
    /// zero-duration sequence.
    pub fn from_metrics(m: MorphologicalMetrics) -> Self {
        Self {
            values: [
                m.std_dev,
                0.0,
                m.mean_intensity,
                0.0,
                m.contrast,
                0.0,
                m.entropy,
                0.0,
                m.edge_density,
                0.0,
                m.gradient_magnitude,
                0.0,
                m.circularity,
                0.0,
                m.num_regions,
                0.0,
                0.0, // frame_number
                0.0, // time_elapsed
                1.0, // frames_analyzed
                0.0, // total_duration
            ],
        }
    }

    /// Build from a name → value map; missing names default to 0.0, unknown
    /// names are ignored
    pub fn from_map(map: &HashMap<String, f64>) -> Self {
        let mut values = [0.0; FEATURE_COUNT];
        for (slot, name) in values.iter_mut().zip(FEATURE_NAMES.iter()) {
            *slot = map.get(*name).copied().unwrap_or(0.0);
        }
        Self { values }
    }

    /// Value by feature name
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|idx| self.values[idx])
    }

    /// Values in training order (classifier input row)
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// (name, value) pairs in training order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.values.iter().copied())
    }

    /// First non-finite feature, if any
    pub fn first_non_finite(&self) -> Option<&'static str> {
        self.iter().find(|(_, v)| !v.is_finite()).map(|(n, _)| n)
    }

    pub fn std_dev(&self) -> f64 {
        self.values[0]
    }

    pub fn mean_intensity(&self) -> f64 {
        self.values[2]
    }

    pub fn contrast(&self) -> f64 {
        self.values[4]
    }

    pub fn entropy(&self) -> f64 {
        self.values[6]
    }

    pub fn edge_density(&self) -> f64 {
        self.values[8]
    }

    pub fn gradient_magnitude(&self) -> f64 {
        self.values[10]
    }

    pub fn circularity(&self) -> f64 {
        self.values[12]
    }

    pub fn num_regions(&self) -> f64 {
        self.values[14]
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(FEATURE_COUNT))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for FeatureVector {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = HashMap::<String, f64>::deserialize(deserializer)?;
        Ok(Self::from_map(&map))
    }
}

// ============================================================================
// Predictions
// ============================================================================

/// Binary viability label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionLabel {
    Good,
    NotGood,
}

impl PredictionLabel {
    /// Label for an averaged probability; exactly 0.5 is `NotGood`
    pub fn from_probability(probability_good: f64) -> Self {
        if probability_good > 0.5 {
            PredictionLabel::Good
        } else {
            PredictionLabel::NotGood
        }
    }

    /// Label for a classifier class index (1 = good)
    pub fn from_class(class: u8) -> Self {
        if class == 1 {
            PredictionLabel::Good
        } else {
            PredictionLabel::NotGood
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionLabel::Good => "good",
            PredictionLabel::NotGood => "not_good",
        }
    }
}

impl fmt::Display for PredictionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidence tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::High => "high",
        })
    }
}

/// One classifier's output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPrediction {
    /// Model identifier
    pub model: String,
    /// Binary class reported by the classifier (1 = good)
    pub prediction: u8,
    pub probability_good: f64,
    /// Always `1 - probability_good`
    pub probability_not_good: f64,
}

impl ModelPrediction {
    pub fn new(model: impl Into<String>, prediction: u8, probability_good: f64) -> Self {
        Self {
            model: model.into(),
            prediction,
            probability_good,
            probability_not_good: 1.0 - probability_good,
        }
    }

    pub fn label(&self) -> PredictionLabel {
        PredictionLabel::from_class(self.prediction)
    }

    /// max(p, 1 - p)
    pub fn confidence(&self) -> f64 {
        self.probability_good.max(self.probability_not_good)
    }
}

/// Averaged ensemble output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleResult {
    pub prediction: PredictionLabel,
    pub probability_good: f64,
    pub probability_not_good: f64,
    /// max(p, 1 - p), always in [0.5, 1.0]
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
    /// probability_good × 100
    pub viability_score: f64,
    pub model_predictions: Vec<ModelPrediction>,
}

// ============================================================================
// Stage degradation
// ============================================================================

/// Pipeline stage identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    FeatureExtraction,
    Ensemble,
    Morphology,
    Grading,
    Morphokinetics,
    GeneticRisk,
    Recommendation,
    Explainability,
    QualityMetrics,
    Abnormality,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::FeatureExtraction => "feature_extraction",
            Stage::Ensemble => "ensemble",
            Stage::Morphology => "morphology",
            Stage::Grading => "grading",
            Stage::Morphokinetics => "morphokinetics",
            Stage::GeneticRisk => "genetic_risk",
            Stage::Recommendation => "recommendation",
            Stage::Explainability => "explainability",
            Stage::QualityMetrics => "quality_metrics",
            Stage::Abnormality => "abnormality",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Documented neutral value substituted for a failed stage
#[derive(Debug, Clone, PartialEq)]
pub struct DegradedDefault<T> {
    pub stage: Stage,
    pub value: T,
    pub reason: String,
}

/// Result of one pipeline stage: computed value, or its documented default
pub type StageOutcome<T> = Result<T, DegradedDefault<T>>;

/// Collapse a stage outcome to its value, remembering degraded stages
pub fn settle<T>(outcome: StageOutcome<T>, degraded: &mut Vec<Stage>) -> T {
    match outcome {
        Ok(value) => value,
        Err(fallback) => {
            degraded.push(fallback.stage);
            fallback.value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> MorphologicalMetrics {
        MorphologicalMetrics {
            std_dev: 42.0,
            mean_intensity: 120.0,
            contrast: 200.0,
            entropy: 6.1,
            edge_density: 0.12,
            gradient_magnitude: 35.0,
            circularity: 0.8,
            num_regions: 7.0,
        }
    }

    #[test]
    fn test_from_metrics_layout() {
        let fv = FeatureVector::from_metrics(metrics());
        assert_eq!(fv.get("std_dev_mean"), Some(42.0));
        assert_eq!(fv.get("circularity_mean"), Some(0.8));
        assert_eq!(fv.get("frames_analyzed"), Some(1.0));
        for (name, value) in fv.iter() {
            if name.ends_with("_std") {
                assert_eq!(value, 0.0, "{} should be zero for a single still", name);
            }
        }
        assert_eq!(fv.num_regions(), 7.0);
    }

    #[test]
    fn test_from_map_missing_keys_default_to_zero() {
        let mut map = HashMap::new();
        map.insert("entropy_mean".to_string(), 3.5);
        map.insert("not_a_feature".to_string(), 99.0);
        let fv = FeatureVector::from_map(&map);
        assert_eq!(fv.entropy(), 3.5);
        assert_eq!(fv.contrast(), 0.0);
        assert_eq!(fv.get("not_a_feature"), None);
    }

    #[test]
    fn test_serializes_in_training_order() {
        let fv = FeatureVector::from_metrics(metrics());
        let json = serde_json::to_string(&fv).unwrap();
        let first = json.find("std_dev_mean").unwrap();
        let last = json.find("total_duration").unwrap();
        assert!(first < last);
        let back: FeatureVector = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fv);
    }

    #[test]
    fn test_label_tie_breaks_negative() {
        assert_eq!(PredictionLabel::from_probability(0.5), PredictionLabel::NotGood);
        assert_eq!(PredictionLabel::from_probability(0.5001), PredictionLabel::Good);
    }

    #[test]
    fn test_model_prediction_complement() {
        let p = ModelPrediction::new("m", 1, 0.73);
        assert!((p.probability_good + p.probability_not_good - 1.0).abs() < 1e-12);
        assert!((p.confidence() - 0.73).abs() < 1e-12);
    }

    #[test]
    fn test_settle_records_degraded_stage() {
        let mut degraded = Vec::new();
        let ok: StageOutcome<i32> = Ok(3);
        let bad: StageOutcome<i32> = Err(DegradedDefault {
            stage: Stage::Grading,
            value: 0,
            reason: "boom".into(),
        });
        assert_eq!(settle(ok, &mut degraded), 3);
        assert_eq!(settle(bad, &mut degraded), 0);
        assert_eq!(degraded, vec![Stage::Grading]);
    }
}
