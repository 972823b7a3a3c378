//! Model store: loads frozen classifiers from disk into an immutable registry
//!
//! **[MODEL-STORE]** Each `*.json` file in the model directory holds one
//! classifier. Files are loaded in file-name order and the file stem becomes
//! the model id. Unreadable or malformed files are logged and skipped so a
//! single bad artifact never takes the service down.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use super::{DecisionTree, LogisticRegression, Predictor, PredictorError, RandomForest};
use crate::types::FEATURE_COUNT;

#[derive(Debug, Error)]
pub enum ModelStoreError {
    #[error("Model directory not readable: {path}: {source}")]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read model file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse model file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid model {path}: {source}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: PredictorError,
    },
}

/// On-disk model description, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    LogisticRegression(LogisticRegression),
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
}

impl ModelSpec {
    /// Validate and turn into a shareable predictor
    pub fn into_predictor(self) -> Result<Arc<dyn Predictor>, PredictorError> {
        match self {
            ModelSpec::LogisticRegression(m) => {
                m.validate(FEATURE_COUNT)?;
                Ok(Arc::new(m))
            }
            ModelSpec::DecisionTree(m) => {
                m.validate(FEATURE_COUNT)?;
                Ok(Arc::new(m))
            }
            ModelSpec::RandomForest(m) => {
                m.validate(FEATURE_COUNT)?;
                Ok(Arc::new(m))
            }
        }
    }
}

/// One loaded classifier and its id
#[derive(Clone)]
pub struct RegisteredModel {
    pub id: String,
    pub predictor: Arc<dyn Predictor>,
}

impl std::fmt::Debug for RegisteredModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredModel").field("id", &self.id).finish()
    }
}

/// Immutable, ordered collection of loaded classifiers
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: Vec<RegisteredModel>,
    version: String,
}

impl ModelRegistry {
    pub fn empty(version: impl Into<String>) -> Self {
        Self {
            models: Vec::new(),
            version: version.into(),
        }
    }

    /// Build a registry from already-constructed predictors (keeps given order)
    pub fn from_predictors(
        version: impl Into<String>,
        models: Vec<(String, Arc<dyn Predictor>)>,
    ) -> Self {
        Self {
            models: models
                .into_iter()
                .map(|(id, predictor)| RegisteredModel { id, predictor })
                .collect(),
            version: version.into(),
        }
    }

    pub fn models(&self) -> &[RegisteredModel] {
        &self.models
    }

    pub fn ids(&self) -> Vec<String> {
        self.models.iter().map(|m| m.id.clone()).collect()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Loader for a model directory
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load a single model file
    pub fn load_file(path: &Path) -> Result<Arc<dyn Predictor>, ModelStoreError> {
        let text = fs::read_to_string(path).map_err(|source| ModelStoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let spec: ModelSpec =
            serde_json::from_str(&text).map_err(|source| ModelStoreError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        spec.into_predictor().map_err(|source| ModelStoreError::Invalid {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Sorted list of `*.json` files in the model directory
    fn model_files(&self) -> Result<Vec<PathBuf>, ModelStoreError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| {
            ModelStoreError::DirectoryUnreadable {
                path: self.dir.clone(),
                source,
            }
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();
        Ok(files)
    }

    /// Load every model in the directory
    ///
    /// Never fails: a missing directory yields an empty registry (predictions
    /// then use the fallback), bad files are skipped.
    pub fn load(&self, version: impl Into<String>) -> ModelRegistry {
        let version = version.into();

        let files = match self.model_files() {
            Ok(files) => files,
            Err(e) => {
                error!(error = %e, "No models loaded; predictions will use the fallback");
                return ModelRegistry::empty(version);
            }
        };

        let mut models = Vec::new();
        for path in files {
            let Some(id) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                warn!(path = %path.display(), "Skipping model file with non-UTF-8 name");
                continue;
            };
            match Self::load_file(&path) {
                Ok(predictor) => {
                    info!(model = %id, "Loaded model");
                    models.push(RegisteredModel { id, predictor });
                }
                Err(e) => warn!(model = %id, error = %e, "Skipping model"),
            }
        }

        if models.is_empty() {
            error!(dir = %self.dir.display(), "Model directory contains no usable models");
        } else {
            info!(count = models.len(), version = %version, "Model registry ready");
        }

        ModelRegistry { models, version }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_tagged_by_kind() {
        let json = format!(
            r#"{{"kind":"logistic_regression","weights":{:?},"intercept":0.0}}"#,
            vec![0.0; FEATURE_COUNT]
        );
        let spec: ModelSpec = serde_json::from_str(&json).unwrap();
        assert!(matches!(spec, ModelSpec::LogisticRegression(_)));
        assert!(spec.into_predictor().is_ok());
    }

    #[test]
    fn test_wrong_width_rejected() {
        let spec = ModelSpec::LogisticRegression(LogisticRegression::new(vec![1.0; 3], 0.0));
        assert!(spec.into_predictor().is_err());
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let registry = ModelStore::new("/nonexistent/embrya/models").load("v1");
        assert!(registry.is_empty());
        assert_eq!(registry.version(), "v1");
    }
}
