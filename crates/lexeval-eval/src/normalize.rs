//! Text normalization
//!
//! Canonicalizes entity surface strings so that superficial differences
//! (accents, case, spacing, numbering abbreviations) do not produce
//! spurious mismatches.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use lexeval_core::EntityRecord;

use crate::type_map::{normalize_type, TypeMap};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

static PUNCT_SPACING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*([/.,;:()\-])\s*").expect("valid regex"));

// n°, nº, no., n., n.º (plus any dots glued to them)
static NUMBER_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"n(?:[°º]|o\.|\.+[°º]?)\.*").expect("valid regex"));

// art., art, artigo
static ARTICLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"art(?:igo)?\b\.*").expect("valid regex"));

/// Upper bound on abbreviation rounds; real inputs settle in one or two
const MAX_ABBREVIATION_ROUNDS: usize = 4;

/// Remove diacritical marks (NFD + drop combining marks)
pub fn strip_accents(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Accent- and case-insensitive form used for label comparisons
pub fn fold(s: &str) -> String {
    strip_accents(&s.trim().to_lowercase())
}

/// Collapse whitespace and drop spaces around `/ . , ; : ( ) -`
fn clean_spaces(s: &str) -> String {
    let collapsed = WHITESPACE.replace_all(s, " ");
    let tightened = PUNCT_SPACING.replace_all(&collapsed, "$1");
    tightened.trim().to_string()
}

/// Whether the char before byte `at` ends a token
///
/// Only ASCII letters, digits and `_` glue; `º`, `°` and other symbols
/// separate, so a marker right after another marker is still a marker.
fn separated_before(s: &str, at: usize) -> bool {
    s[..at]
        .chars()
        .next_back()
        .map_or(true, |c| !(c.is_ascii_alphanumeric() || c == '_'))
}

/// Replace the matches of `re` that start a token
fn replace_at_token_start(re: &Regex, s: &str, replacement: &str) -> String {
    re.replace_all(s, |caps: &Captures<'_>| match caps.get(0) {
        Some(m) if separated_before(s, m.start()) => replacement.to_string(),
        Some(m) => m.as_str().to_string(),
        None => String::new(),
    })
    .into_owned()
}

fn canonicalize_abbreviations(s: &str) -> String {
    let s = replace_at_token_start(&NUMBER_MARKER, s, "nº ");
    let s = replace_at_token_start(&ARTICLE, &s, "artigo ");
    s.replace('§', " paragrafo ")
}

/// Canonical form of an entity surface string
///
/// Trims, lower-cases, strips accents, canonicalizes legal numbering
/// abbreviations and tidies whitespace. `normalize(normalize(s)) == normalize(s)`.
pub fn normalize(text: &str) -> String {
    // Lower-casing first: some capitals (İ) lower-case to a base letter plus
    // a combining mark, which must be stripped in the same pass.
    let s = strip_accents(&text.trim().to_lowercase());
    // Spacing is settled before the abbreviation pass so that "n . 5"
    // and "n.5" reach it in the same shape.
    let mut s = clean_spaces(&s);

    // A rewrite can expose a marker next to it; repeat until nothing changes.
    for _ in 0..MAX_ABBREVIATION_ROUNDS {
        let next = clean_spaces(&canonicalize_abbreviations(&s));
        if next == s {
            break;
        }
        s = next;
    }
    s
}

/// Canonical key of a record: normalized text, mapped type
pub fn canonical_record(record: &EntityRecord, type_map: &TypeMap) -> EntityRecord {
    EntityRecord::new(
        normalize(&record.text),
        normalize_type(&record.entity_type, type_map),
    )
}

/// Canonicalize every record of a set
pub fn canonical_records(records: &[EntityRecord], type_map: &TypeMap) -> Vec<EntityRecord> {
    records
        .iter()
        .map(|r| canonical_record(r, type_map))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
