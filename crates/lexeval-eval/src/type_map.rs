//! Taxonomy label mapping
//!
//! Maps raw entity-type labels onto a canonical taxonomy. The map is an
//! ordered list of rules: every exact-key rule comes before every
//! case/accent-insensitive rule, and an unmatched label passes through as is.

use lexeval_core::TypeMapEntry;

use crate::normalize::fold;

/// How a rule recognizes a raw label
#[derive(Debug, Clone, PartialEq, Eq)]
enum LabelMatcher {
    /// Byte-for-byte equality with the configured key
    Exact(String),
    /// Equality after trimming, accent stripping and lower-casing (key pre-folded)
    Folded(String),
}

impl LabelMatcher {
    fn matches(&self, raw: &str, folded_raw: &str) -> bool {
        match self {
            Self::Exact(key) => key == raw,
            Self::Folded(key) => key == folded_raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TypeRule {
    matcher: LabelMatcher,
    canonical: String,
}

/// Read-only raw-label -> canonical-label mapping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeMap {
    rules: Vec<TypeRule>,
}

impl TypeMap {
    /// Identity mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configuration entries, keeping their order
    pub fn from_entries(entries: &[TypeMapEntry]) -> Self {
        Self::from_pairs(entries.iter().map(|e| (e.from.as_str(), e.to.as_str())))
    }

    /// Build from `(raw, canonical)` pairs, keeping their order
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let pairs: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();

        let exact = pairs.iter().map(|(k, v)| TypeRule {
            matcher: LabelMatcher::Exact(k.clone()),
            canonical: v.clone(),
        });
        let folded = pairs.iter().map(|(k, v)| TypeRule {
            matcher: LabelMatcher::Folded(fold(k)),
            canonical: v.clone(),
        });

        Self {
            rules: exact.chain(folded).collect(),
        }
    }

    /// Gold-label -> prompt-label table used in the acórdão experiments
    pub fn acordao_default() -> Self {
        Self::from_pairs([
            ("nome_recurso", "Processo Judicial"),
            ("origem", "Local"),
            ("recorrente", "Pessoa"),
            ("recorrido", "Pessoa"),
            ("orgao_julgador", "Instituição"),
            ("nome_desembargador_ministro", "Pessoa"),
            ("nome_relator", "Pessoa"),
            ("Resultado_Acordão", "Resultado"),
            ("data", "Data"),
            ("titulo", "Documento Judicial"),
            ("tema_recurso", "Jurisprudência"),
            ("tema_keyword", "Jurisprudência"),
            ("tema_complemento", "Informação_Complementar"),
            ("voto", "voto"),
        ])
    }

    /// Number of configured raw keys
    pub fn len(&self) -> usize {
        self.rules.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Canonical label for `raw`, if any rule matches
    pub fn lookup(&self, raw: &str) -> Option<&str> {
        let folded_raw = fold(raw);
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(raw, &folded_raw))
            .map(|rule| rule.canonical.as_str())
    }
}

/// Canonical type label: exact key, then folded key, then `raw` unchanged
pub fn normalize_type(raw: &str, type_map: &TypeMap) -> String {
    type_map.lookup(raw).unwrap_or(raw).to_string()
}
