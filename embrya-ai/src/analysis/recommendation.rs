//! Clinical Recommendation Engine
//!
//! Priority-ordered decision table over (viability score, genetic risk
//! level). Bands are evaluated high-to-low viability; the first match wins.

use serde::{Deserialize, Serialize};

use super::genetic_risk::{GeneticRiskIndicators, RiskLevel};
use super::grading::GradingOutcome;
use super::morphology::MorphologicalAnalysis;
use super::{first_match, require_viability, AnalysisError, Rule};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalRecommendation {
    pub transfer_recommendation: String,
    /// 1 (best) .. 5 (worst)
    pub transfer_priority: u8,
    pub freeze_recommendation: bool,
    pub discard_recommendation: bool,
    pub reasoning: Vec<String>,
    pub clinical_notes: String,
}

impl ClinicalRecommendation {
    /// Default used when no recommendation can be derived
    pub fn manual_review() -> Self {
        Self {
            transfer_recommendation: "Manual embryologist review required".to_string(),
            transfer_priority: 3,
            freeze_recommendation: false,
            discard_recommendation: false,
            reasoning: vec![
                "Automated recommendation unavailable for this analysis".to_string(),
            ],
            clinical_notes: "Recommendation could not be derived; assess manually.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    ImmediateTransfer,
    StandardTransfer,
    PgtABeforeTransfer,
    FreezeForLater,
    ExtendedCulture,
    ConsiderDiscard,
}

struct Inputs {
    viability: f64,
    risk: RiskLevel,
}


struct Decision {
    text: &'static str,
    priority: u8,
    freeze: bool,
    discard: bool,
}

fn decision(action: Action) -> Decision {
    match action {
        Action::ImmediateTransfer => Decision {
            text: "Recommended for immediate transfer",
            priority: 1,
            freeze: false,
            discard: false,
        },
        Action::StandardTransfer => Decision {
            text: "Suitable for transfer",
            priority: 2,
            freeze: false,
            discard: false,
        },
        Action::PgtABeforeTransfer => Decision {
            text: "Recommend PGT-A testing before transfer",
            priority: 3,
            freeze: true,
            discard: false,
        },
        Action::FreezeForLater => Decision {
            text: "Freeze for future transfer",
            priority: 3,
            freeze: true,
            discard: false,
        },
        Action::ExtendedCulture => Decision {
            text: "Extended culture and re-evaluation recommended",
            priority: 4,
            freeze: false,
            discard: false,
        },
        Action::ConsiderDiscard => Decision {
            text: "Consider discarding",
            priority: 5,
            freeze: false,
            discard: true,
        },
    }
}

fn reasoning(action: Action, viability: f64, risk: &GeneticRiskIndicators) -> Vec<String> {
    let level = risk.chromosomal_risk_level;
    let score = risk.aneuploidy_risk_score;
    match action {
        Action::ImmediateTransfer => vec![
            format!("High viability score ({:.1}) at or above 75", viability),
            format!("{} genetic risk (score {})", level, score),
            "Morphology supports priority transfer".to_string(),
        ],
        Action::StandardTransfer => vec![
            format!("Good viability score ({:.1}) at or above 60", viability),
            format!("Acceptable genetic risk: {} (score {})", level, score),
        ],
        Action::PgtABeforeTransfer => vec![
            format!("Moderate viability score ({:.1})", viability),
            format!("{} genetic risk (score {}) warrants PGT-A", level, score),
            "Freeze pending genetic testing results".to_string(),
        ],
        Action::FreezeForLater => vec![
            format!("Moderate viability score ({:.1})", viability),
            format!("{} genetic risk (score {})", level, score),
            "Cryopreserve as a backup for a later cycle".to_string(),
        ],
        Action::ExtendedCulture => vec![
            format!("Borderline viability score ({:.1}) below 50", viability),
            "Re-evaluate after extended culture before any transfer decision".to_string(),
        ],
        Action::ConsiderDiscard => vec![
            format!("Low viability score ({:.1}) below 35", viability),
            format!("{} genetic risk (score {})", level, score),
            "Low likelihood of successful implantation".to_string(),
        ],
    }
}

fn clinical_notes(
    morphology: &MorphologicalAnalysis,
    grading: &GradingOutcome,
    risk: &GeneticRiskIndicators,
) -> String {
    let mut notes = format!(
        "Symmetry: {}. Fragmentation: {} ({:.1}%). Genetic risk: {} (score {}).",
        morphology.cell_symmetry,
        morphology.fragmentation_level,
        morphology.fragmentation_percentage,
        risk.chromosomal_risk_level,
        risk.aneuploidy_risk_score,
    );
    if let Some(g) = grading.as_graded() {
        notes.push_str(&format!(" Gardner grade: {}.", g.overall_grade));
    }
    notes
}

/// Derive the transfer/freeze/discard recommendation
pub fn recommend(
    viability_score: f64,
    morphology: &MorphologicalAnalysis,
    grading: &GradingOutcome,
    risk: &GeneticRiskIndicators,
) -> Result<ClinicalRecommendation, AnalysisError> {
    require_viability(viability_score)?;

    let cascade: [Rule<Inputs, Action>; 5] = [
        Rule {
            when: |i| i.viability >= 75.0 && i.risk == RiskLevel::Low,
            then: Action::ImmediateTransfer,
        },
        Rule {
            when: |i| i.viability >= 60.0 && matches!(i.risk, RiskLevel::Low | RiskLevel::Medium),
            then: Action::StandardTransfer,
        },
        Rule {
            when: |i| i.viability >= 50.0 && i.risk == RiskLevel::High,
            then: Action::PgtABeforeTransfer,
        },
        Rule {
            when: |i| i.viability >= 50.0,
            then: Action::FreezeForLater,
        },
        Rule {
            when: |i| i.viability >= 35.0,
            then: Action::ExtendedCulture,
        },
    ];
    let action = first_match(
        &cascade,
        &Inputs {
            viability: viability_score,
            risk: risk.chromosomal_risk_level,
        },
        Action::ConsiderDiscard,
    );
    let d = decision(action);

    Ok(ClinicalRecommendation {
        transfer_recommendation: d.text.to_string(),
        transfer_priority: d.priority,
        freeze_recommendation: d.freeze,
        discard_recommendation: d.discard,
        reasoning: reasoning(action, viability_score, risk),
        clinical_notes: clinical_notes(morphology, grading, risk),
    })
}
