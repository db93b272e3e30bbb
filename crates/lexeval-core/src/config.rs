//! LexEval Configuration Management
//!
//! Handles configuration from environment variables and TOML files
//! with defaults matching the acórdão experiments.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Scoring parameters
    pub evaluation: EvaluationConfig,

    /// Raw label -> canonical label rules, evaluated in order
    pub type_map: Vec<TypeMapEntry>,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Context retrieval configuration
    pub retrieval: RetrievalConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        Ok(self)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Evaluation
        if let Ok(value) = std::env::var("LEXEVAL_FUZZY_THRESHOLD") {
            self.evaluation.fuzzy_threshold =
                value.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "LEXEVAL_FUZZY_THRESHOLD".to_string(),
                    value,
                })?;
        }

        // LLM
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            self.llm.provider = provider.parse()?;
        }
        // Always use env for sensitive values
        if let Ok(key) = std::env::var("LLM_API_KEY").or_else(|_| std::env::var("MISTRAL_API_KEY"))
        {
            self.llm.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            self.llm.base_url = Some(url);
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            self.llm.model = model;
        }

        // Retrieval
        if let Ok(path) = std::env::var("LEXEVAL_CORPUS") {
            self.retrieval.corpus_path = Some(PathBuf::from(path));
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Reject values the evaluation engine cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_threshold("evaluation.fuzzy_threshold", self.evaluation.fuzzy_threshold)?;

        if self.retrieval.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "retrieval.chunk_size".to_string(),
                value: "0".to_string(),
            });
        }
        if self.retrieval.chunk_overlap >= self.retrieval.chunk_size {
            return Err(ConfigError::InvalidValue {
                key: "retrieval.chunk_overlap".to_string(),
                value: self.retrieval.chunk_overlap.to_string(),
            });
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                key: "retrieval.top_k".to_string(),
                value: "0".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.retrieval.mmr_lambda) {
            return Err(ConfigError::InvalidValue {
                key: "retrieval.mmr_lambda".to_string(),
                value: self.retrieval.mmr_lambda.to_string(),
            });
        }

        for entry in &self.type_map {
            if entry.from.trim().is_empty() || entry.to.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "type_map".to_string(),
                    value: format!("{} -> {}", entry.from, entry.to),
                });
            }
        }

        Ok(())
    }
}

/// Check that a fuzzy threshold lies in (0, 1]
pub fn validate_threshold(key: &str, threshold: f64) -> Result<f64, ConfigError> {
    if threshold > 0.0 && threshold <= 1.0 {
        Ok(threshold)
    } else {
        Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: threshold.to_string(),
        })
    }
}

/// Scoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Minimum similarity for a fuzzy match (0-1]
    pub fuzzy_threshold: f64,

    /// Maximum number of error samples per side
    pub error_samples: usize,

    /// Compare canonical keys instead of raw strings
    pub normalize: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.92,
            error_samples: 10,
            normalize: true,
        }
    }
}

/// One raw-label -> canonical-label rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeMapEntry {
    pub from: String,
    pub to: String,
}

impl TypeMapEntry {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// LLM provider to use
    pub provider: LlmProvider,

    /// API key (Mistral / OpenAI)
    pub api_key: Option<String>,

    /// API base URL override
    pub base_url: Option<String>,

    /// Model name to use
    pub model: String,

    /// Maximum tokens for completion
    pub max_tokens: Option<u32>,

    /// Temperature for generation
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Retries after the first failed attempt
    pub max_retries: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Mistral,
            api_key: None,
            base_url: None,
            model: "mistral-large-latest".to_string(),
            max_tokens: None,
            temperature: 0.0,
            timeout_secs: 120,
            max_retries: 3,
        }
    }
}

impl LlmConfig {
    /// Base URL for the configured provider
    pub fn resolved_base_url(&self) -> String {
        if let Some(url) = &self.base_url {
            return url.trim_end_matches('/').to_string();
        }
        match self.provider {
            LlmProvider::Mistral => "https://api.mistral.ai/v1".to_string(),
            LlmProvider::OpenAI => "https://api.openai.com/v1".to_string(),
            LlmProvider::Ollama => "http://localhost:11434".to_string(),
        }
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Mistral,
    OpenAI,
    Ollama,
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Mistral => "mistral",
            Self::OpenAI => "openai",
            Self::Ollama => "ollama",
        })
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mistral" => Ok(Self::Mistral),
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(ConfigError::InvalidValue {
                key: "LLM_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Context retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Jurisprudence corpus used as retrieval source
    pub corpus_path: Option<PathBuf>,

    /// Target chunk size in characters
    pub chunk_size: usize,

    /// Overlap between chunks in characters
    pub chunk_overlap: usize,

    /// Number of chunks joined into the context
    pub top_k: usize,

    /// Relevance/diversity trade-off for chunk selection (1.0 = relevance only)
    pub mmr_lambda: f64,

    /// Context used when retrieval returns nothing
    pub fallback_context: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            corpus_path: None,
            chunk_size: 1200,
            chunk_overlap: 250,
            top_k: 5,
            mmr_lambda: 0.5,
            fallback_context: "O texto refere-se a um acórdão do Tribunal de Justiça do Estado \
                               de São Paulo envolvendo questões de direito do consumidor."
                .to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!((config.evaluation.fuzzy_threshold - 0.92).abs() < f64::EPSILON);
        assert_eq!(config.evaluation.error_samples, 10);
        assert_eq!(config.retrieval.chunk_size, 1200);
        assert!(config.type_map.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_llm_provider_parse() {
        assert_eq!(
            "mistral".parse::<LlmProvider>().unwrap(),
            LlmProvider::Mistral
        );
        assert_eq!("OpenAI".parse::<LlmProvider>().unwrap(), LlmProvider::OpenAI);
        assert!("invalid".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn test_threshold_bounds() {
        assert!(validate_threshold("t", 1.0).is_ok());
        assert!(validate_threshold("t", 0.5).is_ok());
        assert!(validate_threshold("t", 0.0).is_err());
        assert!(validate_threshold("t", 1.01).is_err());
        assert!(validate_threshold("t", f64::NAN).is_err());
    }

    #[test]
    fn test_validate_rejects_overlap_larger_than_chunk() {
        let mut config = AppConfig::default();
        config.retrieval.chunk_overlap = config.retrieval.chunk_size;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_from_file_keeps_type_map_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[evaluation]
fuzzy_threshold = 0.85

[[type_map]]
from = "recorrente"
to = "Pessoa"

[[type_map]]
from = "orgao_julgador"
to = "Instituição"

[llm]
provider = "ollama"
model = "llama3"
"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();

        assert!((config.evaluation.fuzzy_threshold - 0.85).abs() < f64::EPSILON);
        assert_eq!(config.evaluation.error_samples, 10);
        assert_eq!(config.type_map[0], TypeMapEntry::new("recorrente", "Pessoa"));
        assert_eq!(config.type_map[1].from, "orgao_julgador");
        assert_eq!(config.llm.provider, LlmProvider::Ollama);
        assert_eq!(config.llm.resolved_base_url(), "http://localhost:11434");
    }

    #[test]
    fn test_validate_rejects_mmr_lambda_out_of_range() {
        let mut config = AppConfig::default();
        config.retrieval.mmr_lambda = 1.5;
        assert!(config.validate().is_err());

        config.retrieval.mmr_lambda = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sample_config_is_valid() {
        let config: AppConfig =
            toml::from_str(include_str!("../../../config/lexeval.toml")).unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.type_map.len(), 14);
        assert_eq!(config.type_map[0], TypeMapEntry::new("recorrente", "Pessoa"));
        assert_eq!(config.retrieval.top_k, 5);
    }

    #[test]
    fn test_from_file_missing() {
        let err = AppConfig::from_file("/nonexistent/lexeval.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileReadError { .. }));
    }
}
