//! Appeal (`Nome_Recurso`) labels
//!
//! Appeals are cited in many shapes ("Apelação Cível n. 1009452-83...",
//! "APELAÇÃO COM REVISÃO Nº 994.06.023739-8"). Every label is reduced to
//! `apelação nº <number>`, and a regex pass recovers the ones a model
//! misses.

use std::collections::HashSet;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use lexeval_core::{EntityRecord, LlmClient};
use lexeval_eval::normalize::fold;
use lexeval_eval::{fuzzy_match, MatchResult};

use crate::parse::parse_llm_json;

/// Canonical prefix of every appeal label
pub const APPEAL_PREFIX: &str = "apelação nº";

/// Type label appeals are scored under
pub const APPEAL_TYPE: &str = "Nome_Recurso";

/// Similarity needed for two appeal labels to match
pub const DEFAULT_APPEAL_THRESHOLD: f64 = 0.7;

const APPEALS_HEADER: &str = include_str!("prompts/appeals_header.txt");

// CNJ unified numbering: NNNNNNN-DD.AAAA.J.TR.OOOO
const CNJ: &str = r"\d{7}-\d{2}\.\d{4}\.\d\.\d{2}\.\d{4}";
// Pre-CNJ court numbering, e.g. 994.06.023739-8 or 994.06023739-8
const LEGACY: &str = r"\d{3}\.(?:\d{2}\.)?\d{6,}-\d";
// Anything else that looks like a long process number
const MISC: &str = r"\d{7,}(?:\.\d+)*(?:-\d+)?";

static CNJ_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(CNJ).expect("valid regex"));
static LEGACY_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(LEGACY).expect("valid regex"));
static MISC_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(MISC).expect("valid regex"));

static NUMBER_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bn[°º]\.?|\bnro\b\.?|\bno\b\.?|\bn\b\.?").expect("valid regex")
});

static APPEAL_VARIANT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bapelação(?:\s+c[ií]vel|\s+com\s+revis[aã]o)?\b").expect("valid regex")
});

static CANONICAL_TAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"apelação\s*nº\s*(\S.*)").expect("valid regex"));

static APPEAL_MENTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\bapela[çc][aã]o(?:\s+c[ií]vel|\s+com\s+revis[aã]o)?\s*(?:n[.°ºo]?|nro|no)?\s*[:º.\-]?\s*({CNJ}|{LEGACY}|{MISC})"
    ))
    .expect("valid regex")
});

// ============================================================================
// Labels
// ============================================================================

/// Process number cited in `text`: CNJ first, then legacy, then anything long
fn find_appeal_number(text: &str) -> Option<&str> {
    [&*CNJ_NUMBER, &*LEGACY_NUMBER, &*MISC_NUMBER]
        .iter()
        .find_map(|re| re.find(text))
        .map(|m| m.as_str())
}

/// Reduce an appeal label to `apelação nº <number>`
///
/// Labels without a recognizable number keep their lower-cased text, with
/// number markers and appeal variants tidied.
pub fn canonical_appeal_label(label: &str) -> String {
    let lowered = label.trim().to_lowercase();
    if lowered.is_empty() {
        return lowered;
    }

    if let Some(number) = find_appeal_number(&lowered) {
        return format!("{APPEAL_PREFIX} {number}");
    }

    let marked = NUMBER_MARKER.replace_all(&lowered, "nº");
    let tidied = APPEAL_VARIANT.replace_all(&marked, "apelação");
    match CANONICAL_TAIL.captures(&tidied) {
        Some(caps) => format!("{APPEAL_PREFIX} {}", caps[1].trim()),
        None => tidied.into_owned(),
    }
}

/// Comparison key: folded, then stripped to ASCII letters, digits and spaces
pub fn appeal_key(label: &str) -> String {
    fold(label)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Canonicalize labels and drop repeats, keeping first occurrences
pub fn dedupe_appeals<I, S>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    labels
        .into_iter()
        .map(|label| canonical_appeal_label(label.as_ref()))
        .filter(|label| !label.is_empty())
        .filter(|label| seen.insert(appeal_key(label)))
        .collect()
}

/// Appeals cited in free text, canonicalized and deduplicated
pub fn extract_appeals_by_pattern(text: &str) -> Vec<String> {
    let found = APPEAL_MENTION
        .captures_iter(text)
        .map(|caps| format!("{APPEAL_PREFIX} {}", &caps[1]));
    dedupe_appeals(found)
}

/// Appeal labels in a JSON payload
///
/// Accepts bare strings and objects in either field layout
/// (`{"entidade": "Apelação nº ..."}` or `{"Entidade": "Nome_Recurso",
/// "tipo": "apelação nº ..."}`): the first string field that mentions an
/// appeal is taken.
pub fn appeal_labels_from_payload(payload: &Value) -> Vec<String> {
    let Some(elements) = payload.as_array() else {
        return Vec::new();
    };

    let mentions_appeal = |s: &&str| fold(s).contains("apelacao");

    let labels = elements.iter().filter_map(|element| match element {
        Value::String(s) => Some(s.as_str()).filter(mentions_appeal),
        Value::Object(object) => object
            .values()
            .filter_map(Value::as_str)
            .find(mentions_appeal),
        _ => None,
    });

    dedupe_appeals(labels)
}

/// Records scored by the fuzzy matcher: one type, text reduced to its key
pub fn appeal_records(labels: &[String]) -> Vec<EntityRecord> {
    labels
        .iter()
        .map(|label| EntityRecord::new(appeal_key(label), APPEAL_TYPE))
        .collect()
}

/// Score predicted appeal labels against gold labels
pub fn score_appeals(prediction: &[String], gold: &[String], threshold: f64) -> MatchResult {
    fuzzy_match(&appeal_records(prediction), &appeal_records(gold), threshold)
}

// ============================================================================
// Extractor
// ============================================================================

/// Output shapes shown to the model
pub fn default_appeal_examples() -> Vec<String> {
    [
        "apelação nº 000014989.2015.8.26.0480",
        "apelação nº 1009452-83.2015.8.26.0004",
        "apelação nº 1001015-30.2016.8.26.0356",
        "apelação nº 0003570-25.2012.8.26.0664",
        "apelação nº 1008833-26.2018.8.26.0562",
        "apelação nº 1051724-61.2016.8.26.0100",
        "apelação nº 1000562-68.2019.8.26.0311",
        "apelação nº 0014410-79.2013.8.26.0011",
        "apelação nº 994.06023739-8",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Model-driven appeal extraction backed by the regex pass
pub struct AppealExtractor {
    client: Arc<dyn LlmClient>,
    examples: Vec<String>,
}

impl AppealExtractor {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            examples: default_appeal_examples(),
        }
    }

    /// Replace the example outputs in the prompt
    pub fn with_examples(mut self, examples: Vec<String>) -> Self {
        self.examples = examples;
        self
    }

    /// Few-shot prompt asking for silent step-by-step reasoning and JSON only
    pub fn build_prompt(&self, text: &str) -> String {
        let examples: Vec<String> = self
            .examples
            .iter()
            .map(|label| json!([{ "Entidade": APPEAL_TYPE, "tipo": label }]).to_string())
            .collect();

        format!(
            "{APPEALS_HEADER}{}\n\n\
             Agora, analise o texto a seguir e extraia todas as apelações conforme as regras.\n\
             Lembre-se: raciocine internamente e RETORNE APENAS O JSON FINAL.\n\n\
             TEXTO:\n{text}\n",
            examples.join("\n")
        )
    }

    /// Union of model labels and regex matches, canonicalized
    ///
    /// A failed model call leaves the regex matches only.
    pub async fn extract(&self, text: &str) -> Vec<String> {
        let prompt = self.build_prompt(text);

        let from_model = match self.client.generate(&prompt).await {
            Ok(response) => appeal_labels_from_payload(&parse_llm_json(&response)),
            Err(e) => {
                warn!(model = self.client.model(), error = %e, "appeal extraction call failed");
                Vec::new()
            }
        };
        let from_pattern = extract_appeals_by_pattern(text);

        debug!(
            model_labels = from_model.len(),
            pattern_labels = from_pattern.len(),
            "appeal labels collected"
        );

        let appeals = dedupe_appeals(from_model.into_iter().chain(from_pattern));
        info!(count = appeals.len(), "appeals extracted");
        appeals
    }
}
