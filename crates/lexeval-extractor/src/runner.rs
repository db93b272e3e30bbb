//! Extraction experiments
//!
//! Renders a strategy prompt, calls the model and keeps the parsed payload
//! for evaluation. A failed call is logged and produces an empty payload so
//! the remaining experiments and the evaluation still run.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use lexeval_core::{ContextProvider, EntityRecord, LexError, LlmClient, Result, RetrievalConfig};
use lexeval_eval::load_entities;

use crate::parse::parse_llm_json;
use crate::prompts::PromptStrategy;

/// Result of one experiment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentOutput {
    pub strategy: PromptStrategy,
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub model: String,
    /// Parsed model response, as handed to the loader
    pub payload: Value,
}

impl ExperimentOutput {
    /// Entity records in the payload
    pub fn entities(&self) -> Vec<EntityRecord> {
        load_entities(&self.payload, self.strategy.name())
    }

    /// `resultado_<strategy>.json`
    pub fn file_name(&self) -> String {
        format!("resultado_{}.json", self.strategy.name())
    }

    /// Write the payload to `dir`, returning the file path
    pub async fn save(&self, dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| LexError::io(dir.display().to_string(), e))?;

        let path = dir.join(self.file_name());
        let body = serde_json::to_string_pretty(&self.payload)?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| LexError::io(path.display().to_string(), e))?;

        info!(
            strategy = %self.strategy,
            run_id = %self.run_id,
            path = %path.display(),
            "experiment result saved"
        );
        Ok(path)
    }
}

/// Runs prompt-strategy experiments against one model
pub struct ExtractionRunner {
    client: Arc<dyn LlmClient>,
    context: Option<Arc<dyn ContextProvider>>,
    fallback_context: String,
}

impl ExtractionRunner {
    /// Runner with the configured default fallback context
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            context: None,
            fallback_context: RetrievalConfig::default().fallback_context,
        }
    }

    /// Source of background context for the one- and few-shot prompts
    pub fn with_context_provider(mut self, provider: Arc<dyn ContextProvider>) -> Self {
        self.context = Some(provider);
        self
    }

    pub fn with_fallback_context(mut self, context: impl Into<String>) -> Self {
        self.fallback_context = context.into();
        self
    }

    /// Retrieved context for `text`, or the fallback
    pub fn context_for(&self, text: &str) -> String {
        let retrieved = match &self.context {
            Some(provider) => provider.context_for(text).unwrap_or_else(|e| {
                warn!(error = %e, "context retrieval failed, using fallback");
                String::new()
            }),
            None => String::new(),
        };

        if retrieved.trim().is_empty() {
            self.fallback_context.clone()
        } else {
            retrieved
        }
    }

    /// Run one experiment with a given context
    pub async fn run(&self, strategy: PromptStrategy, text: &str, context: &str) -> ExperimentOutput {
        info!(%strategy, model = self.client.model(), "running experiment");

        let prompt = strategy.render(text, context);
        let payload = match self.client.generate(&prompt).await {
            Ok(response) => parse_llm_json(&response),
            Err(e) => {
                warn!(%strategy, error = %e, "model call failed, recording empty result");
                Value::Array(Vec::new())
            }
        };

        ExperimentOutput {
            strategy,
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            model: self.client.model().to_string(),
            payload,
        }
    }

    /// Run experiments in order, retrieving context once
    pub async fn run_all(&self, strategies: &[PromptStrategy], text: &str) -> Vec<ExperimentOutput> {
        let context = if strategies.iter().any(PromptStrategy::uses_context) {
            self.context_for(text)
        } else {
            String::new()
        };

        let mut outputs = Vec::with_capacity(strategies.len());
        for strategy in strategies {
            outputs.push(self.run(*strategy, text, &context).await);
        }

        info!(experiments = outputs.len(), "all experiments finished");
        outputs
    }
}
