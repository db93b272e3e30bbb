//! LexEval Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout LexEval:
//! - Entity records extracted from court decisions (acórdãos)
//! - Common error types
//! - Shared traits for the language-model and context collaborators
//! - Configuration management

pub mod config;

pub use config::{
    AppConfig, ConfigError, EvaluationConfig, LlmConfig, LlmProvider, LoggingConfig,
    RetrievalConfig, TypeMapEntry,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for LexEval operations
#[derive(Error, Debug)]
pub enum LexError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Retrieval error: {0}")]
    RetrievalError(String),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LexError {
    /// Wrap an I/O error with the path that caused it
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, LexError>;

// ============================================================================
// Entity Records
// ============================================================================

/// Type label assigned to entities that arrive as bare strings
pub const UNKNOWN_TYPE: &str = "DESCONHECIDO";

/// A (surface text, category label) pair taken from a gold file or a model
///
/// Serialized with the corpus field names `entidade` / `tipo`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Surface form as it appears in the document or annotation
    #[serde(rename = "entidade", alias = "entity")]
    pub text: String,

    /// Label from the configured taxonomy (e.g. "Recorrente", "Data")
    #[serde(rename = "tipo", alias = "type")]
    pub entity_type: String,
}

impl EntityRecord {
    pub fn new(text: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            entity_type: entity_type.into(),
        }
    }

    /// Borrow the record as a `(text, type)` key
    pub fn key(&self) -> (&str, &str) {
        (&self.text, &self.entity_type)
    }
}

impl std::fmt::Display for EntityRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:?}, {:?})", self.text, self.entity_type)
    }
}

// ============================================================================
// Collaborator Traits
// ============================================================================

/// Trait for language-model clients
///
/// The response is returned verbatim; it is frequently not valid JSON.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a response for a single user prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Model identifier for logging
    fn model(&self) -> &str;
}

/// Trait for anything able to supply background text for a prompt
pub trait ContextProvider: Send + Sync {
    /// Return a blob of context relevant to `query` (may be empty)
    fn context_for(&self, query: &str) -> Result<String>;
}

// ============================================================================
// Tests
// ============================================================================
