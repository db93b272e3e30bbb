//! Prompt strategies for acórdão entity extraction
//!
//! Each strategy is a fixed Portuguese template over the acórdão taxonomy.
//! Templates carry `{text}` and (except zero-shot) `{context}` slots.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

const ZERO_SHOT: &str = include_str!("prompts/zero_shot.txt");
const ONE_SHOT: &str = include_str!("prompts/one_shot.txt");
const FEW_SHOT: &str = include_str!("prompts/few_shot.txt");

/// Categories every template asks for
pub const ACORDAO_CATEGORIES: [&str; 14] = [
    "Título",
    "Nome_Recurso",
    "Origem",
    "Recorrido",
    "Recorrente",
    "Nome_Desembargador/Ministro",
    "Resultado_Acórdão",
    "Data",
    "Nome_Relator",
    "Voto",
    "Orgao_Julgador",
    "Tema_Keyword",
    "Tema_Complemento",
    "Tema_Recurso",
];

/// Prompting strategy of one experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PromptStrategy {
    #[serde(rename = "zeroshot")]
    ZeroShot,
    #[serde(rename = "oneshot")]
    OneShot,
    #[serde(rename = "fewshot")]
    FewShot,
}

impl PromptStrategy {
    /// Experiments in the order they are run
    pub const ALL: [PromptStrategy; 3] = [Self::ZeroShot, Self::OneShot, Self::FewShot];

    /// Experiment name, also used in result file names
    pub fn name(&self) -> &'static str {
        match self {
            Self::ZeroShot => "zeroshot",
            Self::OneShot => "oneshot",
            Self::FewShot => "fewshot",
        }
    }

    pub fn template(&self) -> &'static str {
        match self {
            Self::ZeroShot => ZERO_SHOT,
            Self::OneShot => ONE_SHOT,
            Self::FewShot => FEW_SHOT,
        }
    }

    /// Whether the template has a `{context}` slot
    pub fn uses_context(&self) -> bool {
        !matches!(self, Self::ZeroShot)
    }

    /// Fill the template
    pub fn render(&self, text: &str, context: &str) -> String {
        fill(self.template(), &[("text", text), ("context", context)])
    }
}

impl std::fmt::Display for PromptStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PromptStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "zero" | "zeroshot" => Ok(Self::ZeroShot),
            "one" | "oneshot" => Ok(Self::OneShot),
            "few" | "fewshot" => Ok(Self::FewShot),
            _ => Err(format!("Unknown prompt strategy: {s}")),
        }
    }
}

/// Single-pass `{name}` substitution
///
/// Inserted values are never rescanned, and braces that do not form a known
/// slot (the JSON samples in the templates) are kept verbatim.
fn fill(template: &str, slots: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];

        let slot = slots.iter().find(|(name, _)| {
            tail[1..].starts_with(name) && tail[1 + name.len()..].starts_with('}')
        });

        match slot {
            Some((name, value)) => {
                out.push_str(value);
                rest = &tail[name.len() + 2..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_shot_has_no_context() {
        let prompt = PromptStrategy::ZeroShot.render("ACÓRDÃO. Apelação nº 1", "CONTEXTO");
        assert!(prompt.contains("ACÓRDÃO. Apelação nº 1"));
        assert!(!prompt.contains("CONTEXTO"));
        assert!(!prompt.contains("{text}"));
    }

    #[test]
    fn test_shot_templates_fill_both_slots() {
        for strategy in [PromptStrategy::OneShot, PromptStrategy::FewShot] {
            let prompt = strategy.render("TEXTO ALVO", "CONTEXTO RECUPERADO");
            assert!(prompt.contains("Contexto:\nCONTEXTO RECUPERADO"));
            assert!(prompt.trim_end().ends_with("TEXTO ALVO"));
            assert!(!prompt.contains("{context}"));
            // Example outputs keep their JSON braces
            assert!(prompt.contains(r#"{"entidade": "ACÓRDÃO", "tipo": "Título"}"#));
        }
    }

    #[test]
    fn test_every_template_lists_the_taxonomy() {
        for strategy in PromptStrategy::ALL {
            let template = strategy.template();
            assert!(ACORDAO_CATEGORIES.iter().all(|c| template.contains(c)));
        }
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let out = fill("{context} / {text}", &[("text", "T"), ("context", "{text}")]);
        assert_eq!(out, "{text} / T");
        assert_eq!(fill("{unknown} {", &[("text", "T")]), "{unknown} {");
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("few".parse::<PromptStrategy>().unwrap(), PromptStrategy::FewShot);
        assert_eq!("Zero-Shot".parse::<PromptStrategy>().unwrap(), PromptStrategy::ZeroShot);
        assert_eq!("oneshot".parse::<PromptStrategy>().unwrap(), PromptStrategy::OneShot);
        assert!("two".parse::<PromptStrategy>().is_err());
        assert_eq!(PromptStrategy::FewShot.to_string(), "fewshot");
    }
}
