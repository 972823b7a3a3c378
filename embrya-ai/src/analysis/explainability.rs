//! Explainability Generator
//!
//! **Heuristic, not learned.** Importance scores are hand-tuned linear
//! transforms of raw features, labelled `HeuristicImportance` in every
//! report. They carry none of the guarantees of SHAP or permutation
//! importance and must not be presented as such.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{first_match, require_finite_features, AnalysisError, Rule};
use crate::types::{FeatureVector, ModelPrediction};

/// How `feature_importance` was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportanceMethod {
    /// Fixed rule-based scorer over raw features
    HeuristicImportance,
    /// Attribution derived from the models themselves (not implemented)
    LearnedImportance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature: String,
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureConcern {
    pub feature: String,
    pub concern_level: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorKind {
    Supportive,
    Concerning,
}

impl FactorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FactorKind::Supportive => "Supportive",
            FactorKind::Concerning => "Concerning",
        }
    }
}

/// One tagged reason behind the prediction
///
/// Serialized as a single string, `"<Kind>: <text>"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct DecisionFactor {
    pub kind: FactorKind,
    pub text: String,
}

impl DecisionFactor {
    fn supportive(text: String) -> Self {
        Self {
            kind: FactorKind::Supportive,
            text,
        }
    }

    fn concerning(text: String) -> Self {
        Self {
            kind: FactorKind::Concerning,
            text,
        }
    }
}

impl std::fmt::Display for DecisionFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.as_str(), self.text)
    }
}

impl From<DecisionFactor> for String {
    fn from(factor: DecisionFactor) -> Self {
        factor.to_string()
    }
}

impl TryFrom<String> for DecisionFactor {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let kinds = [FactorKind::Supportive, FactorKind::Concerning];
        kinds
            .into_iter()
            .find_map(|kind| {
                value
                    .strip_prefix(kind.as_str())
                    .and_then(|rest| rest.strip_prefix(": "))
                    .map(|text| Self {
                        kind,
                        text: text.to_string(),
                    })
            })
            .ok_or_else(|| format!("untagged decision factor: {}", value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainabilityData {
    pub importance_method: ImportanceMethod,
    /// Score per feature group, 0..=100
    pub feature_importance: BTreeMap<String, f64>,
    pub top_positive_features: Vec<FeatureContribution>,
    pub top_negative_features: Vec<FeatureConcern>,
    pub decision_factors: Vec<DecisionFactor>,
    pub confidence_explanation: String,
}

pub const NO_POSITIVE_FEATURES: &str = "no_strong_positive_features";
pub const NO_NEGATIVE_FEATURES: &str = "no_significant_concerns";
const TOP_N: usize = 3;

impl ExplainabilityData {
    pub fn unavailable() -> Self {
        Self {
            importance_method: ImportanceMethod::HeuristicImportance,
            feature_importance: BTreeMap::new(),
            top_positive_features: vec![positive_placeholder()],
            top_negative_features: vec![negative_placeholder()],
            decision_factors: Vec::new(),
            confidence_explanation: "Explanation unavailable for this analysis.".to_string(),
        }
    }
}

fn positive_placeholder() -> FeatureContribution {
    FeatureContribution {
        feature: NO_POSITIVE_FEATURES.to_string(),
        contribution: 0.0,
    }
}

fn negative_placeholder() -> FeatureConcern {
    FeatureConcern {
        feature: NO_NEGATIVE_FEATURES.to_string(),
        concern_level: 0.0,
    }
}

/// Heuristic score per feature group, in fixed group order
pub fn importance_scores(fv: &FeatureVector) -> [(&'static str, f64); 8] {
    let scores = [
        ("circularity", fv.circularity() * 100.0),
        ("std_dev", 100.0 - fv.std_dev()),
        ("edge_density", fv.edge_density() * 400.0),
        ("entropy", fv.entropy() / 8.0 * 100.0),
        ("contrast", fv.contrast() / 255.0 * 100.0),
        ("gradient_magnitude", fv.gradient_magnitude() / 80.0 * 100.0),
        (
            "mean_intensity",
            100.0 - (fv.mean_intensity() - 128.0).abs() / 128.0 * 100.0,
        ),
        ("num_regions", 100.0 - fv.num_regions() * 3.0),
    ];
    scores.map(|(name, score)| (name, score.clamp(0.0, 100.0)))
}

fn decision_factors(fv: &FeatureVector) -> Vec<DecisionFactor> {
    let circularity = fv.circularity();
    let std_dev = fv.std_dev();
    let edges = fv.edge_density();
    let regions = fv.num_regions();

    let checks = [
        if circularity > 0.75 {
            Some(DecisionFactor::supportive(format!(
                "Well-rounded shape (circularity {:.2})",
                circularity
            )))
        } else if circularity < 0.5 {
            Some(DecisionFactor::concerning(format!(
                "Irregular shape (circularity {:.2})",
                circularity
            )))
        } else {
            None
        },
        if std_dev < 40.0 {
            Some(DecisionFactor::supportive(format!(
                "Uniform cytoplasm (intensity std dev {:.1})",
                std_dev
            )))
        } else if std_dev > 60.0 {
            Some(DecisionFactor::concerning(format!(
                "Heterogeneous cytoplasm (intensity std dev {:.1})",
                std_dev
            )))
        } else {
            None
        },
        if edges > 0.12 {
            Some(DecisionFactor::supportive(format!(
                "Well-defined cell boundaries (edge density {:.3})",
                edges
            )))
        } else if edges < 0.05 {
            Some(DecisionFactor::concerning(format!(
                "Poorly defined cell boundaries (edge density {:.3})",
                edges
            )))
        } else {
            None
        },
        if regions <= 8.0 {
            Some(DecisionFactor::supportive(format!(
                "Few discrete regions ({:.0}), low fragmentation signal",
                regions
            )))
        } else if regions > 20.0 {
            Some(DecisionFactor::concerning(format!(
                "Many discrete regions ({:.0}), possible fragmentation",
                regions
            )))
        } else {
            None
        },
    ];

    checks.into_iter().flatten().collect()
}

fn confidence_explanation(confidence: f64, viability: f64, n_models: usize) -> String {
    let rules: [Rule<f64, &str>; 3] = [
        Rule {
            when: |c| *c >= 0.85,
            then: "High confidence: the models agree strongly on this assessment",
        },
        Rule {
            when: |c| *c >= 0.70,
            then: "Good confidence: the models mostly agree on this assessment",
        },
        Rule {
            when: |c| *c >= 0.55,
            then: "Moderate confidence: some disagreement between models; consider additional review",
        },
    ];
    let template = first_match(
        &rules,
        &confidence,
        "Low confidence: the prediction is uncertain; manual embryologist review is recommended",
    );
    format!(
        "{} (confidence {:.1}%, viability score {:.1}, {} model{}).",
        template,
        confidence * 100.0,
        viability,
        n_models,
        if n_models == 1 { "" } else { "s" }
    )
}

/// Build the heuristic explanation for one prediction
pub fn explain(
    features: &FeatureVector,
    viability_score: f64,
    model_predictions: &[ModelPrediction],
    confidence: f64,
) -> Result<ExplainabilityData, AnalysisError> {
    require_finite_features(features)?;
    if !confidence.is_finite() {
        return Err(AnalysisError::NonFinite("confidence"));
    }
    if !viability_score.is_finite() {
        return Err(AnalysisError::NonFinite("viability_score"));
    }

    let scores = importance_scores(features);

    let mut ranked = scores.to_vec();
    // Stable sort: equal scores keep group order
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut positive: Vec<FeatureContribution> = ranked
        .iter()
        .filter(|(_, score)| *score > 50.0)
        .take(TOP_N)
        .map(|(name, score)| FeatureContribution {
            feature: name.to_string(),
            contribution: *score,
        })
        .collect();
    if positive.is_empty() {
        positive.push(positive_placeholder());
    }

    let mut negative: Vec<FeatureConcern> = ranked
        .iter()
        .rev()
        .filter(|(_, score)| *score < 50.0)
        .take(TOP_N)
        .map(|(name, score)| FeatureConcern {
            feature: name.to_string(),
            concern_level: 100.0 - *score,
        })
        .collect();
    if negative.is_empty() {
        negative.push(negative_placeholder());
    }

    Ok(ExplainabilityData {
        importance_method: ImportanceMethod::HeuristicImportance,
        feature_importance: scores
            .iter()
            .map(|(name, score)| (name.to_string(), *score))
            .collect(),
        top_positive_features: positive,
        top_negative_features: negative,
        decision_factors: decision_factors(features),
        confidence_explanation: confidence_explanation(
            confidence,
            viability_score,
            model_predictions.len(),
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MorphologicalMetrics;

    fn features(m: MorphologicalMetrics) -> FeatureVector {
        FeatureVector::from_metrics(m)
    }

    fn good() -> MorphologicalMetrics {
        MorphologicalMetrics {
            std_dev: 30.0,
            mean_intensity: 128.0,
            contrast: 51.0,
            entropy: 2.0,
            edge_density: 0.2,
            gradient_magnitude: 20.0,
            circularity: 0.9,
            num_regions: 5.0,
        }
    }

    #[test]
    fn test_scores_clamped() {
        let mut m = good();
        m.edge_density = 0.5;
        m.num_regions = 50.0;
        let scores: BTreeMap<_, _> = importance_scores(&features(m)).into_iter().collect();
        assert_eq!(scores["edge_density"], 100.0);
        assert_eq!(scores["num_regions"], 0.0);
        assert_eq!(scores["mean_intensity"], 100.0);
    }

    #[test]
    fn test_top_and_bottom_features() {
        let e = explain(&features(good()), 80.0, &[], 0.9).unwrap();
        assert_eq!(e.importance_method, ImportanceMethod::HeuristicImportance);
        assert_eq!(e.feature_importance.len(), 8);

        // mean_intensity 100, circularity 90, num_regions 85, edge_density 80
        let top: Vec<_> = e
            .top_positive_features
            .iter()
            .map(|f| f.feature.as_str())
            .collect();
        assert_eq!(top, vec!["mean_intensity", "circularity", "num_regions"]);

        // contrast 20, entropy 25, gradient 25 are the concerns
        let bottom: Vec<_> = e
            .top_negative_features
            .iter()
            .map(|f| f.feature.as_str())
            .collect();
        assert_eq!(bottom.len(), 3);
        assert_eq!(bottom[0], "contrast");
        assert!((e.top_negative_features[0].concern_level - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_positive_placeholder_when_all_scores_low() {
        let poor = MorphologicalMetrics {
            std_dev: 80.0,
            mean_intensity: 0.0,
            contrast: 10.0,
            entropy: 1.0,
            edge_density: 0.02,
            gradient_magnitude: 10.0,
            circularity: 0.3,
            num_regions: 30.0,
        };
        let e = explain(&features(poor), 20.0, &[], 0.8).unwrap();
        assert_eq!(e.top_positive_features.len(), 1);
        assert_eq!(e.top_positive_features[0].feature, NO_POSITIVE_FEATURES);
        assert_eq!(e.top_negative_features.len(), 3);
        assert_eq!(e.top_negative_features[0].feature, "mean_intensity");
    }

    #[test]
    fn test_negative_placeholder_when_all_scores_high() {
        let mut m = good();
        m.entropy = 6.0;
        m.contrast = 200.0;
        m.gradient_magnitude = 60.0;
        let e = explain(&features(m), 85.0, &[], 0.9).unwrap();
        assert_eq!(e.top_negative_features.len(), 1);
        assert_eq!(e.top_negative_features[0].feature, NO_NEGATIVE_FEATURES);
        assert_eq!(e.top_positive_features.len(), 3);
    }

    #[test]
    fn test_decision_factors() {
        let e = explain(&features(good()), 80.0, &[], 0.9).unwrap();
        assert_eq!(e.decision_factors.len(), 4);
        assert!(e
            .decision_factors
            .iter()
            .all(|f| f.kind == FactorKind::Supportive));

        let mut m = good();
        m.circularity = 0.3;
        m.std_dev = 50.0;
        m.edge_density = 0.08;
        m.num_regions = 25.0;
        let e = explain(&features(m), 30.0, &[], 0.6).unwrap();
        assert_eq!(e.decision_factors.len(), 2);
        assert!(e
            .decision_factors
            .iter()
            .all(|f| f.kind == FactorKind::Concerning));
    }

    #[test]
    fn test_decision_factors_serialize_as_tagged_strings() {
        let mut m = good();
        m.circularity = 0.3;
        let e = explain(&features(m), 60.0, &[], 0.7).unwrap();
        let json = serde_json::to_value(&e).unwrap();
        let factors = json["decision_factors"].as_array().unwrap();

        assert_eq!(factors.len(), 4);
        assert!(factors.iter().all(|f| f.is_string()));
        assert_eq!(factors[0], "Concerning: Irregular shape (circularity 0.30)");
        assert_eq!(factors[1], "Supportive: Uniform cytoplasm (intensity std dev 30.0)");

        let back: ExplainabilityData = serde_json::from_value(json).unwrap();
        assert_eq!(back.decision_factors, e.decision_factors);
        assert!(serde_json::from_str::<DecisionFactor>(r#""no tag here""#).is_err());
    }

    #[test]
    fn test_confidence_narrative_bands() {
        assert!(confidence_explanation(0.85, 90.0, 3).starts_with("High"));
        assert!(confidence_explanation(0.7, 70.0, 3).starts_with("Good"));
        assert!(confidence_explanation(0.55, 55.0, 1).starts_with("Moderate"));
        assert!(confidence_explanation(0.5, 50.0, 1).starts_with("Low"));
    }
}
