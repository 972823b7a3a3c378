//! Morphology Analyzer
//!
//! Maps raw features onto categorical clinical descriptors through fixed
//! threshold bands. Fragmentation percentage is a heuristic composite of
//! intensity spread and region count, not a measured area ratio.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{first_match, require_finite_features, AnalysisError, Rule};
use crate::imaging::ExtractedFeatures;

/// Zona thickness reported when the outline looks intact
pub const ZONA_THICKNESS_INTACT: f64 = 15.0;
/// Zona thickness reported for a short outer contour
pub const ZONA_THICKNESS_IRREGULAR: f64 = 12.0;
/// Contours shorter than this are treated as a minor zona irregularity
pub const ZONA_PERIMETER_FLOOR: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FragmentationLevel {
    #[serde(rename = "None to Minimal")]
    NoneToMinimal,
    Moderate,
    Severe,
    Unknown,
}

impl fmt::Display for FragmentationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FragmentationLevel::NoneToMinimal => "None to Minimal",
            FragmentationLevel::Moderate => "Moderate",
            FragmentationLevel::Severe => "Severe",
            FragmentationLevel::Unknown => "Unknown",
        })
    }
}

/// Four-tier quality scale shared by circularity and symmetry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityGrade {
    Excellent,
    Good,
    Fair,
    Poor,
    Unknown,
}

impl fmt::Display for QualityGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QualityGrade::Excellent => "Excellent",
            QualityGrade::Good => "Good",
            QualityGrade::Fair => "Fair",
            QualityGrade::Poor => "Poor",
            QualityGrade::Unknown => "Unknown",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryDefinition {
    Sharp,
    Moderate,
    Diffuse,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZonaIntegrity {
    Intact,
    #[serde(rename = "Minor irregularity")]
    MinorIrregularity,
    #[serde(rename = "Major irregularity")]
    MajorIrregularity,
    Unknown,
}

impl ZonaIntegrity {
    pub fn is_irregular(&self) -> bool {
        matches!(
            self,
            ZonaIntegrity::MinorIrregularity | ZonaIntegrity::MajorIrregularity
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Granularity {
    Fine,
    Moderate,
    Coarse,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Vacuolization {
    None,
    Mild,
    Moderate,
    Severe,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MorphologicalAnalysis {
    pub fragmentation_level: FragmentationLevel,
    pub fragmentation_percentage: f64,
    pub circularity_score: f64,
    pub circularity_grade: QualityGrade,
    pub boundary_definition: BoundaryDefinition,
    pub cell_symmetry: QualityGrade,
    pub zona_pellucida_thickness: f64,
    pub zona_pellucida_integrity: ZonaIntegrity,
    pub cytoplasmic_granularity: Granularity,
    pub vacuolization: Vacuolization,
}

impl MorphologicalAnalysis {
    /// Neutral record used when analysis fails
    pub fn neutral() -> Self {
        Self {
            fragmentation_level: FragmentationLevel::Unknown,
            fragmentation_percentage: 0.0,
            circularity_score: 0.0,
            circularity_grade: QualityGrade::Unknown,
            boundary_definition: BoundaryDefinition::Unknown,
            cell_symmetry: QualityGrade::Unknown,
            zona_pellucida_thickness: ZONA_THICKNESS_INTACT,
            zona_pellucida_integrity: ZonaIntegrity::Unknown,
            cytoplasmic_granularity: Granularity::Unknown,
            vacuolization: Vacuolization::Unknown,
        }
    }
}

/// Inputs shared by the multi-variable tables below
struct Shape {
    circularity: f64,
    std_dev: f64,
    edge_density: f64,
    gradient: f64,
    entropy: f64,
}

pub fn fragmentation_percentage(std_dev: f64, num_regions: f64) -> f64 {
    (std_dev / 2.0 + num_regions * 2.0).min(100.0)
}

fn fragmentation_level(pct: f64) -> FragmentationLevel {
    let rules: [Rule<f64, FragmentationLevel>; 2] = [
        Rule {
            when: |p| *p < 10.0,
            then: FragmentationLevel::NoneToMinimal,
        },
        Rule {
            when: |p| *p < 25.0,
            then: FragmentationLevel::Moderate,
        },
    ];
    first_match(&rules, &pct, FragmentationLevel::Severe)
}

fn circularity_grade(circularity: f64) -> QualityGrade {
    let rules: [Rule<f64, QualityGrade>; 3] = [
        Rule {
            when: |c| *c > 0.85,
            then: QualityGrade::Excellent,
        },
        Rule {
            when: |c| *c > 0.70,
            then: QualityGrade::Good,
        },
        Rule {
            when: |c| *c > 0.55,
            then: QualityGrade::Fair,
        },
    ];
    first_match(&rules, &circularity, QualityGrade::Poor)
}

fn boundary_definition(shape: &Shape) -> BoundaryDefinition {
    let rules: [Rule<Shape, BoundaryDefinition>; 2] = [
        Rule {
            when: |s| s.edge_density > 0.15 && s.gradient > 40.0,
            then: BoundaryDefinition::Sharp,
        },
        Rule {
            when: |s| s.edge_density > 0.10,
            then: BoundaryDefinition::Moderate,
        },
    ];
    first_match(&rules, shape, BoundaryDefinition::Diffuse)
}

fn cell_symmetry(shape: &Shape) -> QualityGrade {
    let rules: [Rule<Shape, QualityGrade>; 3] = [
        Rule {
            when: |s| s.circularity > 0.85 && s.std_dev < 40.0,
            then: QualityGrade::Excellent,
        },
        Rule {
            when: |s| s.circularity > 0.70 && s.std_dev < 55.0,
            then: QualityGrade::Good,
        },
        Rule {
            when: |s| s.circularity > 0.55,
            then: QualityGrade::Fair,
        },
    ];
    first_match(&rules, shape, QualityGrade::Poor)
}

fn zona_pellucida(largest_perimeter: Option<f64>) -> (f64, ZonaIntegrity) {
    match largest_perimeter {
        Some(p) if p < ZONA_PERIMETER_FLOOR => {
            (ZONA_THICKNESS_IRREGULAR, ZonaIntegrity::MinorIrregularity)
        }
        _ => (ZONA_THICKNESS_INTACT, ZonaIntegrity::Intact),
    }
}

fn granularity(shape: &Shape) -> Granularity {
    let rules: [Rule<Shape, Granularity>; 2] = [
        Rule {
            when: |s| s.entropy > 7.0 || s.std_dev > 70.0,
            then: Granularity::Coarse,
        },
        Rule {
            when: |s| s.entropy > 5.0 || s.std_dev > 40.0,
            then: Granularity::Moderate,
        },
    ];
    first_match(&rules, shape, Granularity::Fine)
}

fn vacuolization(num_regions: f64) -> Vacuolization {
    let rules: [Rule<f64, Vacuolization>; 3] = [
        Rule {
            when: |n| *n > 40.0,
            then: Vacuolization::Severe,
        },
        Rule {
            when: |n| *n > 15.0,
            then: Vacuolization::Moderate,
        },
        Rule {
            when: |n| *n > 8.0,
            then: Vacuolization::Mild,
        },
    ];
    first_match(&rules, &num_regions, Vacuolization::None)
}

/// Derive the morphological descriptors for one image
pub fn analyze_morphology(
    features: &ExtractedFeatures,
) -> Result<MorphologicalAnalysis, AnalysisError> {
    let fv = &features.vector;
    require_finite_features(fv)?;
    if let Some(p) = features.largest_contour_perimeter {
        if !p.is_finite() || p < 0.0 {
            return Err(AnalysisError::OutOfRange {
                field: "largest_contour_perimeter",
                value: p,
            });
        }
    }

    let shape = Shape {
        circularity: fv.circularity(),
        std_dev: fv.std_dev(),
        edge_density: fv.edge_density(),
        gradient: fv.gradient_magnitude(),
        entropy: fv.entropy(),
    };
    let pct = fragmentation_percentage(fv.std_dev(), fv.num_regions());
    let (thickness, integrity) = zona_pellucida(features.largest_contour_perimeter);

    Ok(MorphologicalAnalysis {
        fragmentation_level: fragmentation_level(pct),
        fragmentation_percentage: pct,
        circularity_score: shape.circularity,
        circularity_grade: circularity_grade(shape.circularity),
        boundary_definition: boundary_definition(&shape),
        cell_symmetry: cell_symmetry(&shape),
        zona_pellucida_thickness: thickness,
        zona_pellucida_integrity: integrity,
        cytoplasmic_granularity: granularity(&shape),
        vacuolization: vacuolization(fv.num_regions()),
    })
}
