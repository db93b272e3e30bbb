//! LexEval Extractor - LLM extraction experiments
//!
//! Produces the prediction sets the evaluation engine scores:
//! - Zero-, one- and few-shot prompts over the acórdão taxonomy
//! - Lenient parsing of model responses
//! - Appeal (`Nome_Recurso`) label canonicalization with a regex fallback

pub mod appeals;
pub mod parse;
pub mod prompts;
pub mod runner;

pub use appeals::{
    appeal_labels_from_payload, canonical_appeal_label, dedupe_appeals,
    extract_appeals_by_pattern, score_appeals, AppealExtractor, DEFAULT_APPEAL_THRESHOLD,
};
pub use parse::parse_llm_json;
pub use prompts::PromptStrategy;
pub use runner::{ExperimentOutput, ExtractionRunner};
