//! Step definitions and extraction results from outside the engine.
//!
//! Both contracts are async; a fetch that fails is returned to the caller
//! unchanged and nothing is seeded from it.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SourceError;
use crate::prefill::PrefillRecord;
use crate::rules::ConditionalRule;
use crate::schema::{Question, Schema};
use crate::wizard::AdvancePolicy;

/// One wizard step as loaded from a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepDefinition {
    #[serde(default)]
    pub title: String,
    pub questions: Vec<Question>,
    #[serde(default)]
    pub rules: Vec<ConditionalRule>,
    #[serde(default)]
    pub policy: AdvancePolicy,
}

impl StepDefinition {
    pub fn new(title: impl Into<String>, questions: Vec<Question>) -> Self {
        Self {
            title: title.into(),
            questions,
            rules: Vec::new(),
            policy: AdvancePolicy::default(),
        }
    }

    pub fn with_rules(mut self, rules: Vec<ConditionalRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_policy(mut self, policy: AdvancePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn schema(&self) -> Schema {
        Schema::new(self.questions.clone())
    }
}

pub trait SchemaSource: Send + Sync {
    fn steps(&self) -> impl Future<Output = Result<Vec<StepDefinition>, SourceError>> + Send;
}

pub trait BulkSource: Send + Sync {
    /// Extraction records for `step`.
    fn extract(
        &self,
        step: usize,
    ) -> impl Future<Output = Result<Vec<PrefillRecord>, SourceError>> + Send;
}

#[derive(Debug, Deserialize)]
struct StepsFile {
    steps: Vec<StepDefinition>,
}

/// Steps file plus an optional prefill file, both JSON.
///
/// The prefill file maps step indices to record lists:
/// `{ "0": [ { "radio": { "name": "prior", "value": "yes" } } ] }`.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    steps: PathBuf,
    prefill: Option<PathBuf>,
}

impl JsonFileSource {
    pub fn new(steps: impl Into<PathBuf>) -> Self {
        Self {
            steps: steps.into(),
            prefill: None,
        }
    }

    pub fn with_prefill(mut self, prefill: impl Into<PathBuf>) -> Self {
        self.prefill = Some(prefill.into());
        self
    }
}

async fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, SourceError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SourceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&raw).map_err(|source| SourceError::Json {
        path: path.to_path_buf(),
        source,
    })
}

impl SchemaSource for JsonFileSource {
    async fn steps(&self) -> Result<Vec<StepDefinition>, SourceError> {
        let file: StepsFile = read_json(&self.steps).await?;
        debug!(path = %self.steps.display(), steps = file.steps.len(), "steps loaded");
        Ok(file.steps)
    }
}

impl BulkSource for JsonFileSource {
    async fn extract(&self, step: usize) -> Result<Vec<PrefillRecord>, SourceError> {
        let Some(path) = &self.prefill else {
            return Err(SourceError::Extraction("no prefill file configured".into()));
        };
        let mut by_step: BTreeMap<usize, Vec<PrefillRecord>> = read_json(path).await?;
        Ok(by_step.remove(&step).unwrap_or_default())
    }
}

/// In-memory source; a configured failure is returned from every extraction.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    pub steps: Vec<StepDefinition>,
    pub prefill: BTreeMap<usize, Vec<PrefillRecord>>,
    pub failure: Option<String>,
}

impl SchemaSource for StaticSource {
    async fn steps(&self) -> Result<Vec<StepDefinition>, SourceError> {
        Ok(self.steps.clone())
    }
}

impl BulkSource for StaticSource {
    async fn extract(&self, step: usize) -> Result<Vec<PrefillRecord>, SourceError> {
        if let Some(reason) = &self.failure {
            return Err(SourceError::Extraction(reason.clone()));
        }
        Ok(self.prefill.get(&step).cloned().unwrap_or_default())
    }
}
