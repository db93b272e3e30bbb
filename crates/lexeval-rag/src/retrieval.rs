//! Lexical context retrieval
//!
//! A `ContextIndex` is built once from a jurisprudence corpus and queried
//! for background context. The corpus is split into overlapping chunks that
//! end on paragraph or sentence breaks where possible. Chunks are ranked by
//! BM25 over accent- and case-folded tokens, then picked with maximal
//! marginal relevance so the context does not repeat itself.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use tracing::{debug, info};

use lexeval_core::{ContextProvider, LexError, Result, RetrievalConfig};
use lexeval_eval::normalize::fold;

// ============================================================================
// Chunking
// ============================================================================

/// Configuration for chunking
#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Target chunk size in bytes
    pub chunk_size: usize,

    /// Overlap between chunks in bytes
    pub overlap: usize,

    /// Chunks shorter than this (after trimming) are dropped
    pub min_chunk_size: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1200,
            overlap: 250,
            min_chunk_size: 1,
        }
    }
}

impl From<&RetrievalConfig> for ChunkConfig {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            overlap: config.chunk_overlap,
            ..Self::default()
        }
    }
}

/// A chunk of the corpus
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// Chunk content, trimmed
    pub content: String,

    /// Position in the corpus
    pub index: usize,

    /// Starting byte offset in the corpus
    pub start_offset: usize,

    /// Ending byte offset
    pub end_offset: usize,
}

/// How far back from the target end a break point is searched for
const BREAK_WINDOW: usize = 200;

/// Largest char boundary not after `idx`
fn floor_boundary(text: &str, idx: usize) -> usize {
    let mut idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// End the chunk at a paragraph, sentence or line break before `target`
fn find_break_point(text: &str, start: usize, target: usize) -> usize {
    if target >= text.len() {
        return text.len();
    }

    // Never end a chunk in its first half
    let earliest = start + (target - start) / 2;
    let search_start = floor_boundary(text, target.saturating_sub(BREAK_WINDOW).max(earliest));
    if search_start >= target {
        return target;
    }
    let search_text = &text[search_start..target];

    for pattern in ["\n\n", ". ", "! ", "? ", "; ", "\n"] {
        if let Some(pos) = search_text.rfind(pattern) {
            return search_start + pos + pattern.len();
        }
    }

    target
}

/// Split text into overlapping chunks
pub fn chunk_text(text: &str, config: &ChunkConfig) -> Vec<TextChunk> {
    let mut chunks = Vec::new();
    let chunk_size = config.chunk_size.max(1);
    let mut start = 0;

    while start < text.len() {
        let target = floor_boundary(text, start + chunk_size);
        // A char wider than chunk_size still has to make progress
        let target = if target <= start {
            text[start..]
                .char_indices()
                .nth(1)
                .map_or(text.len(), |(i, _)| start + i)
        } else {
            target
        };
        let end = find_break_point(text, start, target);

        let content = text[start..end].trim();
        if !content.is_empty() && content.len() >= config.min_chunk_size {
            chunks.push(TextChunk {
                content: content.to_string(),
                index: chunks.len(),
                start_offset: start,
                end_offset: end,
            });
        }

        if end >= text.len() {
            break;
        }

        // Move start back by the overlap, but always forward overall
        let next = floor_boundary(text, end.saturating_sub(config.overlap));
        start = if next > start { next } else { end };
    }

    chunks
}

// ============================================================================
// Tokenization
// ============================================================================

const STOPWORDS: [&str; 24] = [
    "a", "o", "e", "as", "os", "de", "da", "do", "das", "dos", "em", "na", "no", "nas", "nos",
    "que", "para", "por", "com", "um", "uma", "ao", "se", "ou",
];

/// Folded, alphanumeric tokens without Portuguese stopwords
pub fn tokenize(text: &str) -> Vec<String> {
    fold(text)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty() && !STOPWORDS.contains(t))
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Index
// ============================================================================

const BM25_K1: f64 = 1.2;
const BM25_B: f64 = 0.75;

#[derive(Debug, Clone)]
struct IndexedChunk {
    chunk: TextChunk,
    term_freq: HashMap<String, usize>,
    terms: HashSet<String>,
    len: usize,
}

/// A chunk with its relevance to a query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk<'a> {
    pub chunk: &'a TextChunk,
    pub score: f64,
}

/// In-memory lexical index over a corpus
///
/// Owned by whoever built it; there is no shared global instance.
#[derive(Debug, Clone)]
pub struct ContextIndex {
    chunks: Vec<IndexedChunk>,
    doc_freq: HashMap<String, usize>,
    avg_len: f64,
    top_k: usize,
    mmr_lambda: f64,
}

impl ContextIndex {
    /// Index `corpus`; queries return up to `top_k` chunks
    pub fn build(corpus: &str, config: &ChunkConfig, top_k: usize) -> Self {
        let chunks: Vec<IndexedChunk> = chunk_text(corpus.trim(), config)
            .into_iter()
            .map(|chunk| {
                let tokens = tokenize(&chunk.content);
                let mut term_freq = HashMap::new();
                for token in &tokens {
                    *term_freq.entry(token.clone()).or_insert(0) += 1;
                }
                IndexedChunk {
                    terms: term_freq.keys().cloned().collect(),
                    term_freq,
                    len: tokens.len(),
                    chunk,
                }
            })
            .collect();

        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for indexed in &chunks {
            for term in &indexed.terms {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
        }

        let total_len: usize = chunks.iter().map(|c| c.len).sum();
        let avg_len = if chunks.is_empty() {
            0.0
        } else {
            total_len as f64 / chunks.len() as f64
        };

        debug!(chunks = chunks.len(), terms = doc_freq.len(), "context index built");

        Self {
            chunks,
            doc_freq,
            avg_len,
            top_k,
            mmr_lambda: 0.5,
        }
    }

    /// Index `corpus` with chunking and selection settings from config
    pub fn from_config(corpus: &str, config: &RetrievalConfig) -> Self {
        Self::build(corpus, &ChunkConfig::from(config), config.top_k).with_mmr_lambda(config.mmr_lambda)
    }

    /// Read and index the corpus file
    pub fn load(path: &Path, config: &RetrievalConfig) -> Result<Self> {
        let corpus =
            std::fs::read_to_string(path).map_err(|e| LexError::io(path.display().to_string(), e))?;
        if corpus.trim().is_empty() {
            return Err(LexError::RetrievalError(format!(
                "context corpus is empty: {}",
                path.display()
            )));
        }

        let index = Self::from_config(&corpus, config);
        info!(path = %path.display(), chunks = index.len(), "context corpus indexed");
        Ok(index)
    }

    /// Relevance/diversity weight in [0, 1]; 1.0 ranks by relevance only
    pub fn with_mmr_lambda(mut self, lambda: f64) -> Self {
        self.mmr_lambda = lambda.clamp(0.0, 1.0);
        self
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    fn idf(&self, term: &str) -> f64 {
        let n = self.chunks.len() as f64;
        let df = self.doc_freq.get(term).copied().unwrap_or(0) as f64;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    fn bm25(&self, indexed: &IndexedChunk, query_terms: &HashSet<String>) -> f64 {
        let norm = 1.0 - BM25_B + BM25_B * indexed.len as f64 / self.avg_len.max(1.0);
        query_terms
            .iter()
            .filter_map(|term| {
                let tf = *indexed.term_freq.get(term)? as f64;
                Some(self.idf(term) * tf * (BM25_K1 + 1.0) / (tf + BM25_K1 * norm))
            })
            .sum()
    }

    /// Chunks sharing at least one term with `query`, best first
    pub fn search(&self, query: &str, k: usize) -> Vec<ScoredChunk<'_>> {
        let query_terms: HashSet<String> = tokenize(query).into_iter().collect();

        let mut scored: Vec<(usize, f64)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(i, indexed)| (i, self.bm25(indexed, &query_terms)))
            .filter(|(_, score)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        self.select_diverse(&scored, k)
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: &self.chunks[i].chunk,
                score,
            })
            .collect()
    }

    /// Maximal marginal relevance over ranked candidates
    fn select_diverse(&self, ranked: &[(usize, f64)], k: usize) -> Vec<(usize, f64)> {
        let Some(&(_, best)) = ranked.first() else {
            return Vec::new();
        };

        let mut remaining: Vec<(usize, f64)> = ranked.to_vec();
        let mut selected: Vec<(usize, f64)> = Vec::with_capacity(k);

        while selected.len() < k && !remaining.is_empty() {
            let mut pick = 0;
            let mut pick_value = f64::NEG_INFINITY;

            for (pos, &(i, score)) in remaining.iter().enumerate() {
                let redundancy = selected
                    .iter()
                    .map(|&(j, _)| jaccard(&self.chunks[i].terms, &self.chunks[j].terms))
                    .fold(0.0, f64::max);
                let value = self.mmr_lambda * score / best - (1.0 - self.mmr_lambda) * redundancy;
                if value > pick_value {
                    pick = pos;
                    pick_value = value;
                }
            }

            selected.push(remaining.remove(pick));
        }

        selected
    }
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        a.intersection(b).count() as f64 / union as f64
    }
}

impl ContextProvider for ContextIndex {
    /// Top chunks for `query`, joined by newlines (empty when nothing matches)
    fn context_for(&self, query: &str) -> Result<String> {
        let hits = self.search(query, self.top_k);
        debug!(hits = hits.len(), "context retrieved");

        Ok(hits
            .iter()
            .map(|hit| hit.chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

/// Prepend retrieved context to a text
pub fn inject_context(base: &str, context: &str) -> String {
    if context.trim().is_empty() {
        base.to_string()
    } else {
        format!("{}\n\n{}", context.trim(), base)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const CORPUS: &str = "PRESCREVE A EXECUÇÃO NO MESMO PRAZO DE PRESCRIÇÃO DA AÇÃO. \
        Súmula nº 150 do Supremo Tribunal Federal.\n\n\
        O Ministério Público possui legitimidade para o protesto interruptivo da prescrição \
        em defesa dos poupadores.\n\n\
        Responsabilidade civil do Estado: danos morais fixados em 50 salários mínimos.\n\n\
        Juros remuneratórios não subsistem após extinta a obrigação principal.";

    fn small_chunks() -> ChunkConfig {
        ChunkConfig {
            chunk_size: 120,
            overlap: 20,
            min_chunk_size: 1,
        }
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = chunk_text("Ementa curta.", &ChunkConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Ementa curta.");
        assert_eq!((chunks[0].start_offset, chunks[0].end_offset), (0, 13));
    }

    #[test]
    fn test_chunks_respect_size_and_overlap() {
        let config = small_chunks();
        let chunks = chunk_text(CORPUS, &config);

        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            assert!(pair[0].end_offset - pair[0].start_offset <= config.chunk_size);
            // Consecutive chunks overlap or touch
            assert!(pair[1].start_offset <= pair[0].end_offset);
            assert!(pair[1].start_offset > pair[0].start_offset);
        }
        assert_eq!(chunks.last().unwrap().end_offset, CORPUS.len());
    }

    #[test]
    fn test_chunks_prefer_paragraph_breaks() {
        let chunks = chunk_text(CORPUS, &small_chunks());
        assert!(chunks[0].content.ends_with("Supremo Tribunal Federal."));
    }

    #[test]
    fn test_multibyte_text_never_splits_chars() {
        let text = "ção".repeat(200);
        let config = ChunkConfig {
            chunk_size: 7,
            overlap: 3,
            min_chunk_size: 1,
        };
        let chunks = chunk_text(&text, &config);
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| !c.content.is_empty()));
    }

    #[test]
    fn test_tokenize_folds_and_drops_stopwords() {
        assert_eq!(
            tokenize("Prescrição da Ação, art. 150"),
            vec!["prescricao", "acao", "art", "150"]
        );
    }

    #[test]
    fn test_search_ranks_matching_chunk_first() {
        let index = ContextIndex::build(CORPUS, &small_chunks(), 3);
        let hits = index.search("danos morais responsabilidade civil", 1);

        assert_eq!(hits.len(), 1);
        assert!(hits[0].chunk.content.contains("danos morais"));
        assert!(index.search("xyzzy", 3).is_empty());
    }

    #[test]
    fn test_context_for_joins_top_k() {
        let index = ContextIndex::build(CORPUS, &small_chunks(), 2).with_mmr_lambda(1.0);
        let context = index.context_for("prescrição execução poupadores").unwrap();

        assert!(context.contains("EXECUÇÃO"));
        assert!(context.contains("poupadores"));
        assert_eq!(index.context_for("xyzzy").unwrap(), "");
    }

    #[test]
    fn test_mmr_skips_duplicate_chunks() {
        let corpus = "juros remuneratórios abusivos.\n\n\
                      juros remuneratórios abusivos.\n\n\
                      juros limitados à taxa média de mercado.";
        let config = ChunkConfig {
            chunk_size: 40,
            overlap: 0,
            min_chunk_size: 1,
        };

        let relevance_only = ContextIndex::build(corpus, &config, 2).with_mmr_lambda(1.0);
        let hits = relevance_only.search("juros remuneratórios", 2);
        assert_eq!(hits[0].chunk.content, hits[1].chunk.content);

        let diverse = ContextIndex::build(corpus, &config, 2).with_mmr_lambda(0.5);
        let hits = diverse.search("juros remuneratórios", 2);
        assert_ne!(hits[0].chunk.content, hits[1].chunk.content);
    }

    #[test]
    fn test_load_rejects_missing_and_empty_corpus() {
        let config = RetrievalConfig::default();
        assert!(ContextIndex::load(Path::new("/nonexistent/corpus.txt"), &config).is_err());

        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(ContextIndex::load(file.path(), &config).is_err());
    }

    #[test]
    fn test_inject_context() {
        assert_eq!(inject_context("texto", "contexto "), "contexto\n\ntexto");
        assert_eq!(inject_context("texto", "  "), "texto");
    }
}
