//! Derived clinical assessments
//!
//! Each analyzer is a pure function returning `Result<T, AnalysisError>` and
//! owns a documented neutral default. `degrade` turns a failed analysis into
//! a `DegradedDefault` so the pipeline can record which stages fell back.
//!
//! Threshold cascades are expressed as ordered `Rule` tables evaluated
//! top-to-bottom; the first matching rule wins.

pub mod abnormality;
pub mod explainability;
pub mod genetic_risk;
pub mod grading;
pub mod morphokinetics;
pub mod morphology;
pub mod quality;
pub mod recommendation;

pub use abnormality::{detect_abnormalities, AbnormalityFlags, Severity};
pub use explainability::{
    explain, DecisionFactor, ExplainabilityData, FactorKind, FeatureConcern, FeatureContribution,
    ImportanceMethod,
};
pub use genetic_risk::{assess_genetic_risk, GeneticRiskIndicators, RiskLevel};
pub use grading::{grade_blastocyst, BlastocystGrading, GradingOutcome};
pub use morphokinetics::{estimate_morphokinetics, MorphokineticsTimings};
pub use morphology::{
    analyze_morphology, BoundaryDefinition, FragmentationLevel, Granularity,
    MorphologicalAnalysis, QualityGrade, Vacuolization, ZonaIntegrity,
};
pub use quality::{assess_quality, PredictionConsistency, QualityMetrics, UncertaintyLevel};
pub use recommendation::{recommend, ClinicalRecommendation};

use thiserror::Error;
use tracing::warn;

use crate::types::{DegradedDefault, FeatureVector, Stage, StageOutcome};

/// Analyzer input errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Non-finite input: {0}")]
    NonFinite(&'static str),

    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("No model predictions available")]
    NoPredictions,
}

/// One row of a first-match decision table
pub struct Rule<I: ?Sized, T> {
    pub when: fn(&I) -> bool,
    pub then: T,
}

/// Evaluate rules in order; first match wins, `otherwise` when none match
pub fn first_match<I: ?Sized, T: Clone>(rules: &[Rule<I, T>], input: &I, otherwise: T) -> T {
    rules
        .iter()
        .find(|rule| (rule.when)(input))
        .map(|rule| rule.then.clone())
        .unwrap_or(otherwise)
}

/// Turn a failed analysis into its documented default, logging the reason
pub fn degrade<T>(
    stage: Stage,
    result: Result<T, AnalysisError>,
    default: impl FnOnce() -> T,
) -> StageOutcome<T> {
    result.map_err(|e| {
        warn!(stage = %stage, error = %e, "Analysis stage degraded to default");
        DegradedDefault {
            stage,
            value: default(),
            reason: e.to_string(),
        }
    })
}

pub(crate) fn require_finite_features(features: &FeatureVector) -> Result<(), AnalysisError> {
    match features.first_non_finite() {
        Some(name) => Err(AnalysisError::NonFinite(name)),
        None => Ok(()),
    }
}

pub(crate) fn require_viability(viability_score: f64) -> Result<(), AnalysisError> {
    if !viability_score.is_finite() {
        return Err(AnalysisError::NonFinite("viability_score"));
    }
    if !(0.0..=100.0).contains(&viability_score) {
        return Err(AnalysisError::OutOfRange {
            field: "viability_score",
            value: viability_score,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_wins() {
        let rules: [Rule<f64, &str>; 3] = [
            Rule {
                when: |x| *x > 10.0,
                then: "big",
            },
            Rule {
                when: |x| *x > 5.0,
                then: "medium",
            },
            Rule {
                when: |x| *x > 0.0,
                then: "small",
            },
        ];
        assert_eq!(first_match(&rules, &11.0, "none"), "big");
        assert_eq!(first_match(&rules, &10.0, "none"), "medium");
        assert_eq!(first_match(&rules, &0.0, "none"), "none");
    }

    #[test]
    fn test_degrade_records_stage() {
        let outcome = degrade(
            Stage::Grading,
            Err::<u8, _>(AnalysisError::NoPredictions),
            || 7,
        );
        let fallback = outcome.unwrap_err();
        assert_eq!(fallback.stage, Stage::Grading);
        assert_eq!(fallback.value, 7);
    }

    #[test]
    fn test_viability_range() {
        assert!(require_viability(0.0).is_ok());
        assert!(require_viability(100.0).is_ok());
        assert!(require_viability(100.5).is_err());
        assert!(require_viability(f64::NAN).is_err());
    }
}
