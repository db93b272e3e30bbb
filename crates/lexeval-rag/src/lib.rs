//! LexEval RAG - Model access and context retrieval
//!
//! This crate supplies the two collaborators the extraction experiments
//! depend on:
//! - HTTP clients for chat-completions style APIs and Ollama, with retry
//! - A lexical context index (BM25 + maximal marginal relevance) over a
//!   jurisprudence corpus
//!
//! Author: hephaex@gmail.com

pub mod llm;
pub mod retrieval;

pub use llm::{create_llm_client, ChatCompletionsClient, OllamaClient};
pub use retrieval::{chunk_text, inject_context, ChunkConfig, ContextIndex, ScoredChunk, TextChunk};
