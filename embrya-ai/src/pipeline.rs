//! Inference-to-explanation pipeline
//!
//! **[PIPELINE]** image bytes → preprocess → features → ensemble, then the
//! derived assessments in dependency order:
//! morphology → grading → morphokinetics → genetic risk → recommendation →
//! explainability → quality metrics → abnormality flags.
//!
//! Only an undecodable image is a hard failure. Every later stage degrades
//! to its documented default and is listed in `degraded_stages`. Audit
//! writes are fire-and-forget: a failing sink is logged and never affects
//! the report.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use embrya_common::{AuditAction, AuditEvent, AuditSink};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis::{
    analyze_morphology, assess_genetic_risk, assess_quality, degrade, detect_abnormalities,
    estimate_morphokinetics, explain, grade_blastocyst, recommend, AbnormalityFlags,
    ClinicalRecommendation, ExplainabilityData, GeneticRiskIndicators, GradingOutcome,
    MorphokineticsTimings, MorphologicalAnalysis, QualityMetrics,
};
use crate::ensemble;
use crate::imaging::{extract_or_default, preprocess, ImagingError};
use crate::models::ModelRegistry;
use crate::types::{
    settle, ConfidenceLevel, FeatureVector, ModelPrediction, PredictionLabel, Stage,
};

/// Hard pipeline failures (everything else degrades)
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid image: {0}")]
    InvalidImage(#[from] ImagingError),
}

/// Optional subject references and actor attached to audit events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionContext {
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub patient_audit_code: Option<String>,
    #[serde(default)]
    pub cycle_id: Option<String>,
    #[serde(default)]
    pub embryo_id: Option<String>,
}

/// Embryologist override of an AI prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRequest {
    #[serde(flatten)]
    pub context: PredictionContext,
    #[serde(default)]
    pub prediction_id: Option<Uuid>,
    pub original_prediction: String,
    pub overridden_prediction: String,
    pub reason: String,
    #[serde(default)]
    pub original_viability_score: Option<f64>,
    #[serde(default)]
    pub override_viability_score: Option<f64>,
}

impl OverrideRequest {
    pub fn validate(&self) -> embrya_common::Result<()> {
        if self.reason.trim().is_empty() {
            return Err(embrya_common::Error::InvalidInput(
                "override reason must not be empty".to_string(),
            ));
        }
        if self.original_prediction.trim() == self.overridden_prediction.trim() {
            return Err(embrya_common::Error::InvalidInput(
                "overridden prediction must differ from the original".to_string(),
            ));
        }
        for (field, score) in [
            ("original_viability_score", self.original_viability_score),
            ("override_viability_score", self.override_viability_score),
        ] {
            if let Some(s) = score {
                if !(0.0..=100.0).contains(&s) {
                    return Err(embrya_common::Error::InvalidInput(format!(
                        "{} must be within 0..=100, got {}",
                        field, s
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Record of a clinician viewing a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionViewed {
    #[serde(flatten)]
    pub context: PredictionContext,
    pub prediction_id: Uuid,
}

/// Outcome of an audit write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReceipt {
    pub recorded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
}

/// Full clinical report for one image
#[derive(Debug, Clone, Serialize)]
pub struct PredictionReport {
    pub prediction_id: Uuid,
    pub prediction: PredictionLabel,
    pub probability_good: f64,
    pub probability_not_good: f64,
    pub viability_score: f64,
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
    pub model_predictions: Vec<ModelPrediction>,
    pub model_version: String,
    pub features: FeatureVector,
    pub morphological_analysis: MorphologicalAnalysis,
    pub blastocyst_grading: GradingOutcome,
    pub morphokinetics: MorphokineticsTimings,
    pub genetic_risk: GeneticRiskIndicators,
    pub clinical_recommendation: ClinicalRecommendation,
    pub explainability: ExplainabilityData,
    pub quality_metrics: QualityMetrics,
    pub abnormality_flags: AbnormalityFlags,
    /// Stages that fell back to their documented default
    pub degraded_stages: Vec<Stage>,
    /// True when no classifier produced a result
    pub fallback_prediction: bool,
    pub analysis_timestamp: DateTime<Utc>,
    pub processing_time_ms: f64,
}

fn round_ms(ms: f64) -> f64 {
    (ms * 100.0).round() / 100.0
}

/// Runs the pipeline against a fixed model registry and audit sink
pub struct EmbryoAnalyzer {
    registry: Arc<ModelRegistry>,
    audit: Arc<dyn AuditSink>,
}

impl EmbryoAnalyzer {
    pub fn new(registry: Arc<ModelRegistry>, audit: Arc<dyn AuditSink>) -> Self {
        Self { registry, audit }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Analyze an image with no audit subject attached
    pub fn predict(&self, image_bytes: &[u8]) -> Result<PredictionReport, PipelineError> {
        self.analyze(image_bytes, &PredictionContext::default())
    }

    /// Analyze an image and emit one `AI_PREDICTION` audit event
    pub fn analyze(
        &self,
        image_bytes: &[u8],
        context: &PredictionContext,
    ) -> Result<PredictionReport, PipelineError> {
        let started = Instant::now();

        let image = preprocess(image_bytes)?;

        let mut degraded = Vec::new();
        let extracted = settle(extract_or_default(&image), &mut degraded);
        let features = extracted.vector;

        let ensemble = ensemble::predict(&self.registry, &features);
        if ensemble.fallback {
            degraded.push(Stage::Ensemble);
        }
        let result = ensemble.result;
        let viability = result.viability_score;
        debug!(viability, confidence = result.confidence, "Ensemble complete");

        let morphology = settle(
            degrade(
                Stage::Morphology,
                analyze_morphology(&extracted),
                MorphologicalAnalysis::neutral,
            ),
            &mut degraded,
        );
        let grading = settle(
            degrade(
                Stage::Grading,
                grade_blastocyst(&features, viability),
                || GradingOutcome::NotApplicable,
            ),
            &mut degraded,
        );
        let morphokinetics = settle(
            degrade(
                Stage::Morphokinetics,
                estimate_morphokinetics(&features, viability),
                MorphokineticsTimings::undetermined,
            ),
            &mut degraded,
        );
        let genetic_risk = settle(
            degrade(
                Stage::GeneticRisk,
                assess_genetic_risk(viability, &morphology),
                GeneticRiskIndicators::unavailable,
            ),
            &mut degraded,
        );
        let recommendation = settle(
            degrade(
                Stage::Recommendation,
                recommend(viability, &morphology, &grading, &genetic_risk),
                ClinicalRecommendation::manual_review,
            ),
            &mut degraded,
        );
        let explainability = settle(
            degrade(
                Stage::Explainability,
                explain(
                    &features,
                    viability,
                    &result.model_predictions,
                    result.confidence,
                ),
                ExplainabilityData::unavailable,
            ),
            &mut degraded,
        );
        let quality = settle(
            degrade(
                Stage::QualityMetrics,
                assess_quality(&result.model_predictions),
                QualityMetrics::unavailable,
            ),
            &mut degraded,
        );
        let abnormality = settle(
            degrade(
                Stage::Abnormality,
                detect_abnormalities(&features, &morphology, &genetic_risk),
                AbnormalityFlags::screening_unavailable,
            ),
            &mut degraded,
        );

        let processing_time_ms = round_ms(started.elapsed().as_secs_f64() * 1000.0);

        let report = PredictionReport {
            prediction_id: Uuid::new_v4(),
            prediction: result.prediction,
            probability_good: result.probability_good,
            probability_not_good: result.probability_not_good,
            viability_score: viability,
            confidence: result.confidence,
            confidence_level: result.confidence_level,
            model_predictions: result.model_predictions,
            model_version: self.registry.version().to_string(),
            features,
            morphological_analysis: morphology,
            blastocyst_grading: grading,
            morphokinetics,
            genetic_risk,
            clinical_recommendation: recommendation,
            explainability,
            quality_metrics: quality,
            abnormality_flags: abnormality,
            degraded_stages: degraded,
            fallback_prediction: ensemble.fallback,
            analysis_timestamp: Utc::now(),
            processing_time_ms,
        };

        info!(
            prediction_id = %report.prediction_id,
            prediction = %report.prediction,
            viability = report.viability_score,
            processing_time_ms,
            degraded = report.degraded_stages.len(),
            "Prediction complete"
        );

        self.audit_prediction(&report, context);
        Ok(report)
    }

    fn audit_prediction(&self, report: &PredictionReport, context: &PredictionContext) {
        let details = json!({
            "event_type": "prediction",
            "prediction_id": report.prediction_id,
            "model_version": report.model_version,
            "prediction": report.prediction,
            "confidence_score": report.confidence,
            "viability_score": report.viability_score,
            "risk_indicators": {
                "chromosomal_risk_level": report.genetic_risk.chromosomal_risk_level,
                "aneuploidy_risk_score": report.genetic_risk.aneuploidy_risk_score,
            },
            "abnormal_flags": {
                "has_abnormalities": report.abnormality_flags.has_abnormalities,
                "severity": report.abnormality_flags.severity,
                "requires_manual_review": report.abnormality_flags.requires_manual_review,
            },
            "fallback_prediction": report.fallback_prediction,
        });
        self.emit(AuditAction::AiPrediction, context, details);
    }

    /// Record an embryologist override as `AI_OVERRIDE`
    ///
    /// Invalid requests are rejected; a failing sink yields `recorded: false`.
    pub fn record_override(
        &self,
        request: &OverrideRequest,
    ) -> embrya_common::Result<AuditReceipt> {
        request.validate()?;
        let details = json!({
            "event_type": "override",
            "prediction_id": request.prediction_id,
            "original_prediction": request.original_prediction,
            "overridden_prediction": request.overridden_prediction,
            "reason": request.reason,
            "original_viability_score": request.original_viability_score,
            "override_viability_score": request.override_viability_score,
        });
        Ok(self.emit(AuditAction::AiOverride, &request.context, details))
    }

    /// Record that a prediction was viewed as `PREDICTION_VIEWED`
    pub fn record_prediction_viewed(&self, viewed: &PredictionViewed) -> AuditReceipt {
        let details = json!({
            "event_type": "data_access",
            "prediction_id": viewed.prediction_id,
        });
        self.emit(AuditAction::PredictionViewed, &viewed.context, details)
    }

    fn emit(
        &self,
        action: AuditAction,
        context: &PredictionContext,
        details: serde_json::Value,
    ) -> AuditReceipt {
        let event = AuditEvent::new(action, context.actor.clone(), details).with_subject(
            context.patient_audit_code.clone(),
            context.cycle_id.clone(),
            context.embryo_id.clone(),
        );
        let event_id = event.event_id;
        match self.audit.record(event) {
            Ok(()) => AuditReceipt {
                recorded: true,
                event_id: Some(event_id),
            },
            Err(e) => {
                warn!(action = %action, error = %e, "Audit event not recorded");
                AuditReceipt {
                    recorded: false,
                    event_id: None,
                }
            }
        }
    }
}
