//! Frozen-model fixtures and audit sinks for tests

use std::path::Path;
use std::sync::Arc;

use embrya_ai::models::{LogisticRegression, ModelRegistry, ModelSpec, ModelStore};
use embrya_ai::types::FEATURE_COUNT;
use embrya_ai::EmbryoAnalyzer;
use embrya_common::{AuditEvent, AuditSink, Error, Result};

/// Logistic model that ignores its inputs and always returns `p_good`
pub fn constant_logistic(p_good: f64) -> ModelSpec {
    let intercept = (p_good / (1.0 - p_good)).ln();
    ModelSpec::LogisticRegression(LogisticRegression::new(vec![0.0; FEATURE_COUNT], intercept))
}

/// Write a model spec as `<dir>/<id>.json`
pub fn write_model(dir: &Path, id: &str, spec: &ModelSpec) {
    let json = serde_json::to_string_pretty(spec).expect("serialize model spec");
    std::fs::write(dir.join(format!("{}.json", id)), json).expect("write model file");
}

pub fn registry_from_dir(dir: &Path) -> Arc<ModelRegistry> {
    Arc::new(ModelStore::new(dir).load("test-v1"))
}

pub fn analyzer_with(registry: Arc<ModelRegistry>, audit: Arc<dyn AuditSink>) -> EmbryoAnalyzer {
    EmbryoAnalyzer::new(registry, audit)
}

/// Sink whose every write fails
#[derive(Debug, Default)]
pub struct FailingAuditSink;

impl AuditSink for FailingAuditSink {
    fn record(&self, _event: AuditEvent) -> Result<()> {
        Err(Error::Audit("audit store unavailable".to_string()))
    }
}
