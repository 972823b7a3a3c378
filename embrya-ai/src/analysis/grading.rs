//! Blastocyst Grader
//!
//! Gardner-style grade: expansion stage 1-5 (6 reserved), inner cell mass
//! grade and trophectoderm grade, composed as e.g. "4AA". Below the viability
//! floor the image is not treated as blastocyst-like and no grade is asserted.

use serde::{Deserialize, Serialize, Serializer};

use super::{first_match, require_finite_features, require_viability, AnalysisError, Rule};
use crate::types::FeatureVector;

/// Viability scores below this yield `NotApplicable`
pub const GRADING_FLOOR: f64 = 30.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlastocystGrading {
    pub expansion_stage: u8,
    pub expansion_description: String,
    pub inner_cell_mass_grade: char,
    pub trophectoderm_grade: char,
    pub overall_grade: String,
    pub quality_assessment: String,
}

/// Grading result; `NotApplicable` is a valid outcome, not an error
#[derive(Debug, Clone, PartialEq)]
pub enum GradingOutcome {
    Graded(BlastocystGrading),
    NotApplicable,
}

impl GradingOutcome {
    pub fn as_graded(&self) -> Option<&BlastocystGrading> {
        match self {
            GradingOutcome::Graded(g) => Some(g),
            GradingOutcome::NotApplicable => None,
        }
    }
}

/// Serialized as the grading object, or `null` when not applicable
impl Serialize for GradingOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_graded().serialize(serializer)
    }
}

struct Inputs {
    viability: f64,
    circularity: f64,
    edge_density: f64,
}

fn expansion_description(stage: u8) -> &'static str {
    match stage {
        1 => "Early blastocyst: blastocoel less than half the embryo volume",
        2 => "Blastocyst: blastocoel at least half the embryo volume",
        3 => "Full blastocyst: blastocoel completely fills the embryo",
        4 => "Expanded blastocyst: volume larger than the early embryo, zona thinning",
        5 => "Hatching blastocyst: trophectoderm herniating through the zona",
        _ => "Hatched blastocyst: completely escaped from the zona",
    }
}

fn expansion_stage(inputs: &Inputs) -> u8 {
    let rules: [Rule<Inputs, u8>; 4] = [
        Rule {
            when: |i| i.viability > 80.0 && i.circularity > 0.80,
            then: 5,
        },
        Rule {
            when: |i| i.viability > 70.0,
            then: 4,
        },
        Rule {
            when: |i| i.viability > 55.0,
            then: 3,
        },
        Rule {
            when: |i| i.viability > 40.0,
            then: 2,
        },
    ];
    first_match(&rules, inputs, 1)
}

fn icm_grade(inputs: &Inputs) -> char {
    let rules: [Rule<Inputs, char>; 2] = [
        Rule {
            when: |i| i.viability > 75.0 && i.circularity > 0.75,
            then: 'A',
        },
        Rule {
            when: |i| i.viability > 55.0 && i.circularity > 0.60,
            then: 'B',
        },
    ];
    first_match(&rules, inputs, 'C')
}

fn te_grade(inputs: &Inputs) -> char {
    let rules: [Rule<Inputs, char>; 2] = [
        Rule {
            when: |i| i.edge_density > 0.12 && i.viability > 70.0,
            then: 'A',
        },
        Rule {
            when: |i| i.edge_density > 0.08 && i.viability > 50.0,
            then: 'B',
        },
    ];
    first_match(&rules, inputs, 'C')
}

fn quality_assessment(icm: char, te: char) -> &'static str {
    match (icm, te) {
        ('A', 'A') => "Excellent: top-quality blastocyst with high implantation potential",
        ('A', 'B') | ('B', 'A') => "Good: high implantation potential",
        ('B', 'B') => "Good: average implantation potential",
        ('C', 'C') => "Poor: low implantation potential",
        _ => "Fair: reduced implantation potential",
    }
}

/// Grade a blastocyst, or report that grading does not apply
pub fn grade_blastocyst(
    features: &FeatureVector,
    viability_score: f64,
) -> Result<GradingOutcome, AnalysisError> {
    require_finite_features(features)?;
    require_viability(viability_score)?;

    if viability_score < GRADING_FLOOR {
        return Ok(GradingOutcome::NotApplicable);
    }

    let inputs = Inputs {
        viability: viability_score,
        circularity: features.circularity(),
        edge_density: features.edge_density(),
    };
    let stage = expansion_stage(&inputs);
    let icm = icm_grade(&inputs);
    let te = te_grade(&inputs);

    Ok(GradingOutcome::Graded(BlastocystGrading {
        expansion_stage: stage,
        expansion_description: expansion_description(stage).to_string(),
        inner_cell_mass_grade: icm,
        trophectoderm_grade: te,
        overall_grade: format!("{}{}{}", stage, icm, te),
        quality_assessment: quality_assessment(icm, te).to_string(),
    }))
}
