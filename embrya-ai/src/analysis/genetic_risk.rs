//! Genetic Risk Assessor
//!
//! Additive chromosomal-risk estimate from morphology flags and viability.
//! Each triggered rule contributes weight and a reason; the score is capped
//! at 100 and banded into Low (<=30), Medium (<=50) and High.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::morphology::{MorphologicalAnalysis, QualityGrade, Vacuolization};
use super::{require_viability, AnalysisError};

pub const MAX_RISK_SCORE: u32 = 100;
pub const NO_RISK_FACTORS: &str = "No significant risk factors identified";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: u32) -> Self {
        match score {
            0..=30 => RiskLevel::Low,
            31..=50 => RiskLevel::Medium,
            _ => RiskLevel::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }

    fn pgt_a_recommendation(&self) -> &'static str {
        match self {
            RiskLevel::Low => "PGT-A optional; low estimated aneuploidy risk",
            RiskLevel::Medium => "PGT-A recommended to confirm chromosomal status",
            RiskLevel::High => "PGT-A strongly recommended before transfer",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneticRiskIndicators {
    pub chromosomal_risk_level: RiskLevel,
    pub aneuploidy_risk_score: u32,
    pub pgt_a_recommendation: String,
    /// Triggered rules in evaluation order; never empty
    pub risk_factors: Vec<String>,
}

impl GeneticRiskIndicators {
    /// Default used when risk cannot be assessed
    pub fn unavailable() -> Self {
        Self {
            chromosomal_risk_level: RiskLevel::Medium,
            aneuploidy_risk_score: 40,
            pgt_a_recommendation: RiskLevel::Medium.pgt_a_recommendation().to_string(),
            risk_factors: vec!["Risk assessment unavailable; manual review advised".to_string()],
        }
    }
}

struct RiskInputs<'a> {
    viability: f64,
    morphology: &'a MorphologicalAnalysis,
}

type RiskRule = fn(&RiskInputs<'_>) -> Option<(u32, String)>;

fn fragmentation(i: &RiskInputs<'_>) -> Option<(u32, String)> {
    let pct = i.morphology.fragmentation_percentage;
    if pct > 25.0 {
        Some((25, format!("High fragmentation ({:.1}%)", pct)))
    } else if pct > 10.0 {
        Some((10, format!("Moderate fragmentation ({:.1}%)", pct)))
    } else {
        None
    }
}

fn symmetry(i: &RiskInputs<'_>) -> Option<(u32, String)> {
    match i.morphology.cell_symmetry {
        QualityGrade::Poor => Some((20, "Poor cell symmetry".to_string())),
        QualityGrade::Fair => Some((10, "Fair cell symmetry".to_string())),
        _ => None,
    }
}

fn vacuolization(i: &RiskInputs<'_>) -> Option<(u32, String)> {
    match i.morphology.vacuolization {
        Vacuolization::Moderate | Vacuolization::Severe => Some((
            15,
            format!("{:?} vacuolization", i.morphology.vacuolization),
        )),
        _ => None,
    }
}

fn viability(i: &RiskInputs<'_>) -> Option<(u32, String)> {
    if i.viability < 40.0 {
        Some((30, format!("Low viability score ({:.1})", i.viability)))
    } else if i.viability < 60.0 {
        Some((15, format!("Below-average viability score ({:.1})", i.viability)))
    } else {
        None
    }
}

fn zona(i: &RiskInputs<'_>) -> Option<(u32, String)> {
    i.morphology
        .zona_pellucida_integrity
        .is_irregular()
        .then(|| (10, "Zona pellucida irregularity".to_string()))
}

const RULES: [RiskRule; 5] = [fragmentation, symmetry, vacuolization, viability, zona];

/// Accumulate the chromosomal risk estimate
pub fn assess_genetic_risk(
    viability_score: f64,
    morphology: &MorphologicalAnalysis,
) -> Result<GeneticRiskIndicators, AnalysisError> {
    require_viability(viability_score)?;
    if !morphology.fragmentation_percentage.is_finite() {
        return Err(AnalysisError::NonFinite("fragmentation_percentage"));
    }

    let inputs = RiskInputs {
        viability: viability_score,
        morphology,
    };

    let mut score = 0u32;
    let mut risk_factors = Vec::new();
    for rule in RULES {
        if let Some((weight, reason)) = rule(&inputs) {
            score += weight;
            risk_factors.push(reason);
        }
    }
    let score = score.min(MAX_RISK_SCORE);

    if risk_factors.is_empty() {
        risk_factors.push(NO_RISK_FACTORS.to_string());
    }

    let level = RiskLevel::from_score(score);
    Ok(GeneticRiskIndicators {
        chromosomal_risk_level: level,
        aneuploidy_risk_score: score,
        pgt_a_recommendation: level.pgt_a_recommendation().to_string(),
        risk_factors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::morphology::{FragmentationLevel, ZonaIntegrity};

    fn benign() -> MorphologicalAnalysis {
        MorphologicalAnalysis {
            fragmentation_level: FragmentationLevel::NoneToMinimal,
            fragmentation_percentage: 5.0,
            cell_symmetry: QualityGrade::Excellent,
            vacuolization: Vacuolization::None,
            zona_pellucida_integrity: ZonaIntegrity::Intact,
            ..MorphologicalAnalysis::neutral()
        }
    }

    #[test]
    fn test_benign_inputs_yield_placeholder() {
        let risk = assess_genetic_risk(95.0, &benign()).unwrap();
        assert_eq!(risk.aneuploidy_risk_score, 0);
        assert_eq!(risk.chromosomal_risk_level, RiskLevel::Low);
        assert_eq!(risk.risk_factors, vec![NO_RISK_FACTORS.to_string()]);
    }

    #[test]
    fn test_factors_in_evaluation_order() {
        let m = MorphologicalAnalysis {
            fragmentation_percentage: 12.0,
            cell_symmetry: QualityGrade::Fair,
            zona_pellucida_integrity: ZonaIntegrity::MinorIrregularity,
            ..benign()
        };
        let risk = assess_genetic_risk(50.0, &m).unwrap();
        // 10 + 10 + 15 + 10
        assert_eq!(risk.aneuploidy_risk_score, 45);
        assert_eq!(risk.chromosomal_risk_level, RiskLevel::Medium);
        assert_eq!(risk.risk_factors.len(), 4);
        assert!(risk.risk_factors[0].starts_with("Moderate fragmentation"));
        assert!(risk.risk_factors[3].contains("Zona"));
    }

    #[test]
    fn test_score_is_capped() {
        let m = MorphologicalAnalysis {
            fragmentation_percentage: 60.0,
            cell_symmetry: QualityGrade::Poor,
            vacuolization: Vacuolization::Severe,
            zona_pellucida_integrity: ZonaIntegrity::MajorIrregularity,
            ..benign()
        };
        let risk = assess_genetic_risk(10.0, &m).unwrap();
        // 25 + 20 + 15 + 30 + 10 = 100
        assert_eq!(risk.aneuploidy_risk_score, 100);
        assert_eq!(risk.chromosomal_risk_level, RiskLevel::High);
    }

    #[test]
    fn test_band_edges() {
        assert_eq!(RiskLevel::from_score(30), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(31), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(50), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(51), RiskLevel::High);
    }

    #[test]
    fn test_unknown_morphology_adds_nothing() {
        let risk = assess_genetic_risk(80.0, &MorphologicalAnalysis::neutral()).unwrap();
        assert_eq!(risk.aneuploidy_risk_score, 0);
    }
}
