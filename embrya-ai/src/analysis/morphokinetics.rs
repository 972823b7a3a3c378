//! Morphokinetics Estimator
//!
//! Infers a plausible developmental stage and culture day from a single
//! still. Nothing here is measured: the output text says so.

use serde::{Deserialize, Serialize};

use super::{first_match, require_finite_features, require_viability, AnalysisError, Rule};
use crate::types::FeatureVector;

const ESTIMATE_CAVEAT: &str = "estimated from a single still image, not measured from time-lapse";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MorphokineticsTimings {
    pub estimated_developmental_stage: String,
    pub timing_assessment: String,
    /// Culture day; 0 when undetermined
    pub predicted_day: u8,
}

impl MorphokineticsTimings {
    pub fn undetermined() -> Self {
        Self {
            estimated_developmental_stage: "Undetermined".to_string(),
            timing_assessment: format!("Developmental timing could not be {}", ESTIMATE_CAVEAT),
            predicted_day: 0,
        }
    }
}

#[derive(Clone, Copy)]
struct StageEstimate {
    stage: &'static str,
    timing: &'static str,
    day: u8,
}

struct Inputs {
    viability: f64,
    circularity: f64,
}

const EXPANDED: StageEstimate = StageEstimate {
    stage: "Expanded Blastocyst",
    timing: "Development appears on schedule for day 5",
    day: 5,
};
const FULL: StageEstimate = StageEstimate {
    stage: "Full Blastocyst",
    timing: "Development appears on schedule for day 5",
    day: 5,
};
const EARLY: StageEstimate = StageEstimate {
    stage: "Early Blastocyst",
    timing: "Development appears consistent with day 4 to early day 5",
    day: 4,
};
const MORULA: StageEstimate = StageEstimate {
    stage: "Morula",
    timing: "Development appears slightly delayed for blastocyst formation",
    day: 4,
};
const CLEAVAGE: StageEstimate = StageEstimate {
    stage: "Cleavage Stage",
    timing: "Development appears delayed; extended culture may be required",
    day: 3,
};

/// Estimate developmental stage and day
pub fn estimate_morphokinetics(
    features: &FeatureVector,
    viability_score: f64,
) -> Result<MorphokineticsTimings, AnalysisError> {
    require_finite_features(features)?;
    require_viability(viability_score)?;

    let rules: [Rule<Inputs, StageEstimate>; 4] = [
        Rule {
            when: |i| i.viability > 75.0 && i.circularity > 0.75,
            then: EXPANDED,
        },
        Rule {
            when: |i| i.viability > 60.0,
            then: FULL,
        },
        Rule {
            when: |i| i.viability > 45.0,
            then: EARLY,
        },
        Rule {
            when: |i| i.viability > 30.0,
            then: MORULA,
        },
    ];
    let estimate = first_match(
        &rules,
        &Inputs {
            viability: viability_score,
            circularity: features.circularity(),
        },
        CLEAVAGE,
    );

    Ok(MorphokineticsTimings {
        estimated_developmental_stage: estimate.stage.to_string(),
        timing_assessment: format!("{} ({})", estimate.timing, ESTIMATE_CAVEAT),
        predicted_day: estimate.day,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MorphologicalMetrics;

    fn features(circularity: f64) -> FeatureVector {
        FeatureVector::from_metrics(MorphologicalMetrics {
            std_dev: 35.0,
            mean_intensity: 128.0,
            contrast: 200.0,
            entropy: 5.0,
            edge_density: 0.1,
            gradient_magnitude: 30.0,
            circularity,
            num_regions: 4.0,
        })
    }

    #[test]
    fn test_cascade() {
        let cases = [
            (80.0, 0.8, "Expanded Blastocyst", 5),
            (80.0, 0.6, "Full Blastocyst", 5),
            (50.0, 0.9, "Early Blastocyst", 4),
            (45.0, 0.9, "Morula", 4),
            (30.0, 0.9, "Cleavage Stage", 3),
        ];
        for (viability, circ, stage, day) in cases {
            let t = estimate_morphokinetics(&features(circ), viability).unwrap();
            assert_eq!(t.estimated_developmental_stage, stage, "viability {}", viability);
            assert_eq!(t.predicted_day, day);
        }
    }

    #[test]
    fn test_timing_carries_estimate_caveat() {
        let t = estimate_morphokinetics(&features(0.8), 90.0).unwrap();
        assert!(t.timing_assessment.contains("not measured"));
        assert!(MorphokineticsTimings::undetermined()
            .timing_assessment
            .contains("not measured"));
    }
}
