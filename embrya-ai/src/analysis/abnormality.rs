//! Abnormality Detector
//!
//! Re-checks morphology and genetic risk against fixed abnormality rules.
//! Severity is banded by trigger count: 0 None, 1 Mild, 2 Moderate, 3+ Severe.
//! Two or more triggers require manual review.

use serde::{Deserialize, Serialize};

use super::genetic_risk::{GeneticRiskIndicators, RiskLevel};
use super::morphology::{MorphologicalAnalysis, QualityGrade, Vacuolization, ZonaIntegrity};
use super::AnalysisError;
use crate::types::FeatureVector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    None,
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    pub fn from_trigger_count(count: usize) -> Self {
        match count {
            0 => Severity::None,
            1 => Severity::Mild,
            2 => Severity::Moderate,
            _ => Severity::Severe,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbnormalityFlags {
    pub has_abnormalities: bool,
    /// Triggered rules in evaluation order
    pub abnormality_types: Vec<String>,
    pub severity: Severity,
    pub requires_manual_review: bool,
}

impl AbnormalityFlags {
    fn from_triggers(abnormality_types: Vec<String>) -> Self {
        let severity = Severity::from_trigger_count(abnormality_types.len());
        Self {
            has_abnormalities: !abnormality_types.is_empty(),
            abnormality_types,
            severity,
            requires_manual_review: severity >= Severity::Moderate,
        }
    }

    /// Default when screening itself fails: a single flag naming the failure
    pub fn screening_unavailable() -> Self {
        Self::from_triggers(vec![
            "Abnormality screening unavailable; manual review advised".to_string(),
        ])
    }
}

pub fn detect_abnormalities(
    features: &FeatureVector,
    morphology: &MorphologicalAnalysis,
    risk: &GeneticRiskIndicators,
) -> Result<AbnormalityFlags, AnalysisError> {
    let circularity = features.circularity();
    if !circularity.is_finite() {
        return Err(AnalysisError::NonFinite("circularity_mean"));
    }
    if !morphology.fragmentation_percentage.is_finite() {
        return Err(AnalysisError::NonFinite("fragmentation_percentage"));
    }

    let checks = [
        (
            morphology.fragmentation_percentage > 25.0,
            format!(
                "Severe fragmentation ({:.1}%)",
                morphology.fragmentation_percentage
            ),
        ),
        (
            morphology.cell_symmetry == QualityGrade::Poor,
            "Poor cell symmetry".to_string(),
        ),
        (
            morphology.vacuolization == Vacuolization::Severe,
            "Severe vacuolization".to_string(),
        ),
        (
            morphology.zona_pellucida_integrity == ZonaIntegrity::MajorIrregularity,
            "Major zona pellucida irregularity".to_string(),
        ),
        (
            risk.chromosomal_risk_level == RiskLevel::High,
            format!(
                "High chromosomal risk (score {})",
                risk.aneuploidy_risk_score
            ),
        ),
        (
            circularity < 0.50,
            format!("Abnormal shape (circularity {:.2})", circularity),
        ),
    ];

    Ok(AbnormalityFlags::from_triggers(
        checks
            .into_iter()
            .filter_map(|(triggered, text)| triggered.then_some(text))
            .collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::genetic_risk::assess_genetic_risk;
    use crate::types::MorphologicalMetrics;

    fn features(circularity: f64) -> FeatureVector {
        FeatureVector::from_metrics(MorphologicalMetrics {
            std_dev: 30.0,
            mean_intensity: 128.0,
            contrast: 100.0,
            entropy: 4.0,
            edge_density: 0.1,
            gradient_magnitude: 30.0,
            circularity,
            num_regions: 3.0,
        })
    }

    fn clean_morphology() -> MorphologicalAnalysis {
        MorphologicalAnalysis {
            fragmentation_percentage: 5.0,
            cell_symmetry: QualityGrade::Good,
            vacuolization: Vacuolization::None,
            zona_pellucida_integrity: ZonaIntegrity::Intact,
            ..MorphologicalAnalysis::neutral()
        }
    }

    #[test]
    fn test_no_triggers() {
        let m = clean_morphology();
        let risk = assess_genetic_risk(90.0, &m).unwrap();
        let flags = detect_abnormalities(&features(0.8), &m, &risk).unwrap();
        assert!(!flags.has_abnormalities);
        assert_eq!(flags.severity, Severity::None);
        assert!(!flags.requires_manual_review);
        assert!(flags.abnormality_types.is_empty());
    }

    #[test]
    fn test_severity_tracks_trigger_count() {
        let base = clean_morphology();
        let risk = assess_genetic_risk(90.0, &base).unwrap();

        let one = detect_abnormalities(&features(0.4), &base, &risk).unwrap();
        assert_eq!(one.severity, Severity::Mild);
        assert!(!one.requires_manual_review);

        let poor = MorphologicalAnalysis {
            cell_symmetry: QualityGrade::Poor,
            ..base.clone()
        };
        let two = detect_abnormalities(&features(0.4), &poor, &risk).unwrap();
        assert_eq!(two.severity, Severity::Moderate);
        assert!(two.requires_manual_review);

        let worse = MorphologicalAnalysis {
            zona_pellucida_integrity: ZonaIntegrity::MajorIrregularity,
            vacuolization: Vacuolization::Severe,
            ..poor
        };
        let four = detect_abnormalities(&features(0.4), &worse, &risk).unwrap();
        assert_eq!(four.severity, Severity::Severe);
        assert_eq!(four.abnormality_types.len(), 4);
        assert_eq!(four.abnormality_types[0], "Poor cell symmetry");
    }

    #[test]
    fn test_screening_default_is_consistent() {
        let d = AbnormalityFlags::screening_unavailable();
        assert_eq!(d.severity, Severity::Mild);
        assert!(d.has_abnormalities);
    }
}
