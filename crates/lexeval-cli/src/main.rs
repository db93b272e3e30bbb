//! LexEval CLI - Command-line interface
//!
//! Usage:
//!   lexeval evaluate --gold <file> --prediction <name>=<file>...
//!   lexeval extract <text-file> [--strategy fewshot] [--gold <file>]
//!   lexeval appeals <text-file> [--gold <file>] [--no-llm]
//!   lexeval similarity <a> <b>

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use lexeval_core::config::validate_threshold;
use lexeval_core::{AppConfig, ContextProvider, EntityRecord, LlmClient, LoggingConfig};
use lexeval_eval::{load_entities_from_str, normalize, ratio, EvaluationSummary, Evaluator, TypeMap};
use lexeval_extractor::{
    appeal_labels_from_payload, extract_appeals_by_pattern, score_appeals, AppealExtractor,
    ExtractionRunner, PromptStrategy, DEFAULT_APPEAL_THRESHOLD,
};
use lexeval_rag::{create_llm_client, ContextIndex};

#[derive(Parser)]
#[command(name = "lexeval")]
#[command(about = "Entity extraction evaluation for court decisions")]
#[command(version)]
struct Cli {
    /// TOML configuration file (environment variables still take precedence)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score prediction files against a gold annotation file
    Evaluate {
        /// Gold annotations (JSON)
        #[arg(long)]
        gold: PathBuf,

        /// Prediction set as `name=path` (or just a path)
        #[arg(long = "prediction", short = 'p', required = true, value_parser = parse_prediction)]
        predictions: Vec<(String, PathBuf)>,

        #[command(flatten)]
        scoring: ScoringArgs,
    },
    /// Run the prompt-strategy experiments on a decision text
    Extract {
        /// Decision text file
        text: PathBuf,

        /// Strategies to run (default: all)
        #[arg(long = "strategy", short = 's')]
        strategies: Vec<PromptStrategy>,

        /// Directory for resultado_<strategy>.json files
        #[arg(long, default_value = "resultados")]
        out_dir: PathBuf,

        /// Corpus to retrieve context from (overrides configuration)
        #[arg(long)]
        corpus: Option<PathBuf>,

        /// Gold annotations to score the results against
        #[arg(long)]
        gold: Option<PathBuf>,

        #[command(flatten)]
        scoring: ScoringArgs,
    },
    /// Extract appeal labels (Nome_Recurso) from a decision text
    Appeals {
        /// Decision text file
        text: PathBuf,

        /// Gold annotations to score the labels against
        #[arg(long)]
        gold: Option<PathBuf>,

        /// Similarity needed for a label to count as found
        #[arg(long, default_value_t = DEFAULT_APPEAL_THRESHOLD, value_parser = parse_threshold)]
        threshold: f64,

        /// Use the pattern extractor only
        #[arg(long)]
        no_llm: bool,
    },
    /// Similarity ratio between two strings
    Similarity {
        a: String,
        b: String,

        /// Canonicalize both strings first
        #[arg(long)]
        normalize: bool,
    },
}

#[derive(clap::Args)]
struct ScoringArgs {
    /// Fuzzy match threshold in (0, 1]
    #[arg(long, value_parser = parse_threshold)]
    threshold: Option<f64>,

    /// Error samples shown per side
    #[arg(long)]
    samples: Option<usize>,

    /// Compare raw strings instead of canonical keys
    #[arg(long)]
    raw: bool,

    /// Also write the reports as JSON
    #[arg(long)]
    json_out: Option<PathBuf>,
}

fn parse_threshold(s: &str) -> std::result::Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("not a number: {s}"))?;
    validate_threshold("threshold", value).map_err(|e| e.to_string())
}

/// `name=path`, or a bare path named after its file stem
fn parse_prediction(s: &str) -> std::result::Result<(String, PathBuf), String> {
    match s.split_once('=') {
        Some((name, path)) if !name.trim().is_empty() && !path.trim().is_empty() => {
            Ok((name.trim().to_string(), PathBuf::from(path.trim())))
        }
        Some(_) => Err(format!("expected name=path, got {s:?}")),
        None => {
            let path = PathBuf::from(s);
            let name = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .ok_or_else(|| format!("cannot name prediction file {s:?}"))?
                .to_string();
            Ok((name, path))
        }
    }
}

fn init_tracing(config: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    if config.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    config.validate()?;
    Ok(config)
}

/// Configured type map, or the acórdão table when none is configured
fn type_map(config: &AppConfig) -> TypeMap {
    if config.type_map.is_empty() {
        TypeMap::acordao_default()
    } else {
        TypeMap::from_entries(&config.type_map)
    }
}

fn evaluator(config: &AppConfig, scoring: &ScoringArgs) -> Evaluator {
    let mut evaluator = Evaluator::from_config(&config.evaluation, type_map(config));
    if let Some(threshold) = scoring.threshold {
        evaluator = Evaluator::new(type_map(config), threshold)
            .with_samples(config.evaluation.error_samples)
            .with_normalization(config.evaluation.normalize);
    }
    if let Some(samples) = scoring.samples {
        evaluator = evaluator.with_samples(samples);
    }
    if scoring.raw {
        evaluator = evaluator.with_normalization(false);
    }
    evaluator
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn read_entities(path: &Path) -> Result<Vec<EntityRecord>> {
    let raw = read_text(path)?;
    Ok(load_entities_from_str(&raw, &path.display().to_string()))
}

fn finish_summary(summary: &EvaluationSummary, json_out: Option<&Path>) -> Result<()> {
    print!("{}", summary.render());

    if let Some(path) = json_out {
        let body = serde_json::to_string_pretty(summary)?;
        std::fs::write(path, body)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "JSON report written");
    }
    Ok(())
}

fn llm_client(config: &AppConfig) -> Result<Arc<dyn LlmClient>> {
    let client = create_llm_client(&config.llm).context("failed to create LLM client")?;
    Ok(Arc::from(client))
}

fn evaluate(
    config: &AppConfig,
    gold: &Path,
    predictions: &[(String, PathBuf)],
    scoring: &ScoringArgs,
) -> Result<()> {
    let evaluator = evaluator(config, scoring);
    let gold = read_entities(gold)?;

    let mut summary = EvaluationSummary::new(evaluator.prepare(&gold).len());
    for (name, path) in predictions {
        let prediction = read_entities(path)?;
        summary.push(evaluator.evaluate(name, &prediction, &gold));
    }

    finish_summary(&summary, scoring.json_out.as_deref())
}

async fn extract(
    config: &AppConfig,
    text: &Path,
    strategies: &[PromptStrategy],
    out_dir: &Path,
    corpus: Option<&Path>,
    gold: Option<&Path>,
    scoring: &ScoringArgs,
) -> Result<()> {
    let text = read_text(text)?;
    let strategies = if strategies.is_empty() {
        PromptStrategy::ALL.to_vec()
    } else {
        strategies.to_vec()
    };

    let mut runner = ExtractionRunner::new(llm_client(config)?)
        .with_fallback_context(config.retrieval.fallback_context.clone());

    let corpus = corpus.or(config.retrieval.corpus_path.as_deref());
    if let Some(corpus) = corpus {
        if strategies.iter().any(PromptStrategy::uses_context) {
            let index = ContextIndex::load(corpus, &config.retrieval)?;
            runner = runner.with_context_provider(Arc::new(index) as Arc<dyn ContextProvider>);
        }
    }

    let outputs = runner.run_all(&strategies, &text).await;
    for output in &outputs {
        let path = output.save(out_dir).await?;
        println!(
            "{}: {} entities -> {}",
            output.strategy,
            output.entities().len(),
            path.display()
        );
    }

    let Some(gold) = gold else {
        return Ok(());
    };

    let evaluator = evaluator(config, scoring);
    let gold = read_entities(gold)?;
    let mut summary = EvaluationSummary::new(evaluator.prepare(&gold).len());
    for output in &outputs {
        summary.push(evaluator.evaluate(output.strategy.name(), &output.entities(), &gold));
    }

    println!();
    finish_summary(&summary, scoring.json_out.as_deref())
}

async fn appeals(
    config: &AppConfig,
    text: &Path,
    gold: Option<&Path>,
    threshold: f64,
    no_llm: bool,
) -> Result<()> {
    let text = read_text(text)?;

    let labels = if no_llm {
        extract_appeals_by_pattern(&text)
    } else {
        AppealExtractor::new(llm_client(config)?).extract(&text).await
    };

    println!("Appeals found: {}", labels.len());
    for label in &labels {
        println!("  {label}");
    }

    if let Some(gold) = gold {
        let raw = read_text(gold)?;
        let payload: serde_json::Value = serde_json::from_str(&raw)
            .with_context(|| format!("gold file is not JSON: {}", gold.display()))?;
        let expected = appeal_labels_from_payload(&payload);

        let result = score_appeals(&labels, &expected, threshold);
        println!("\nGold appeals: {}", expected.len());
        println!("Appeals (threshold={threshold}): {}", result.summary(4));
    }

    Ok(())
}

fn similarity(a: &str, b: &str, canonical: bool) {
    let score = if canonical {
        ratio(&normalize(a), &normalize(b))
    } else {
        ratio(a, b)
    };
    println!("{score:.4}");
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_tracing(&config.logging, cli.verbose);

    match cli.command {
        Commands::Evaluate {
            gold,
            predictions,
            scoring,
        } => evaluate(&config, &gold, &predictions, &scoring)?,
        Commands::Extract {
            text,
            strategies,
            out_dir,
            corpus,
            gold,
            scoring,
        } => {
            extract(
                &config,
                &text,
                &strategies,
                &out_dir,
                corpus.as_deref(),
                gold.as_deref(),
                &scoring,
            )
            .await?
        }
        Commands::Appeals {
            text,
            gold,
            threshold,
            no_llm,
        } => appeals(&config, &text, gold.as_deref(), threshold, no_llm).await?,
        Commands::Similarity { a, b, normalize } => similarity(&a, &b, normalize),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_prediction() {
        assert_eq!(
            parse_prediction("fewshot=out/resultado_fewshot.json").unwrap(),
            ("fewshot".to_string(), PathBuf::from("out/resultado_fewshot.json"))
        );
        assert_eq!(
            parse_prediction("out/resultado_oneshot.json").unwrap().0,
            "resultado_oneshot"
        );
        assert!(parse_prediction("=file.json").is_err());
        assert!(parse_prediction("name=").is_err());
    }

    #[test]
    fn test_parse_threshold_rejects_out_of_range() {
        assert_eq!(parse_threshold("0.92").unwrap(), 0.92);
        assert!(parse_threshold("0").is_err());
        assert!(parse_threshold("1.5").is_err());
        assert!(parse_threshold("high").is_err());
    }

    #[test]
    fn test_cli_parses_evaluate() {
        let cli = Cli::try_parse_from([
            "lexeval",
            "evaluate",
            "--gold",
            "gold.json",
            "-p",
            "zeroshot=a.json",
            "-p",
            "fewshot=b.json",
            "--threshold",
            "0.8",
        ])
        .unwrap();

        match cli.command {
            Commands::Evaluate {
                predictions,
                scoring,
                ..
            } => {
                assert_eq!(predictions.len(), 2);
                assert_eq!(scoring.threshold, Some(0.8));
                assert!(!scoring.raw);
            }
            _ => panic!("expected evaluate"),
        }

        assert!(Cli::try_parse_from(["lexeval", "evaluate", "--gold", "g.json"]).is_err());
        assert!(Cli::try_parse_from([
            "lexeval", "evaluate", "--gold", "g.json", "-p", "a.json", "--threshold", "2"
        ])
        .is_err());
    }

    #[test]
    fn test_cli_parses_strategies() {
        let cli = Cli::try_parse_from(["lexeval", "extract", "t.txt", "-s", "few-shot", "-s", "zeroshot"])
            .unwrap();
        match cli.command {
            Commands::Extract { strategies, .. } => {
                assert_eq!(strategies, vec![PromptStrategy::FewShot, PromptStrategy::ZeroShot]);
            }
            _ => panic!("expected extract"),
        }
    }

    #[test]
    fn test_scoring_overrides() {
        let config = AppConfig::default();
        let scoring = ScoringArgs {
            threshold: Some(0.5),
            samples: Some(3),
            raw: false,
            json_out: None,
        };
        assert_eq!(evaluator(&config, &scoring).threshold(), 0.5);

        let scoring = ScoringArgs {
            threshold: None,
            samples: None,
            raw: false,
            json_out: None,
        };
        assert_eq!(evaluator(&config, &scoring).threshold(), 0.92);
    }

    #[test]
    fn test_type_map_falls_back_to_acordao_table() {
        let mut config = AppConfig::default();
        assert_eq!(type_map(&config).lookup("recorrente"), Some("Pessoa"));

        config.type_map = vec![lexeval_core::TypeMapEntry::new("recorrente", "Parte")];
        assert_eq!(type_map(&config).lookup("Recorrente"), Some("Parte"));
    }

    #[test]
    fn test_evaluate_writes_json_report() {
        let dir = tempfile::tempdir().unwrap();
        let gold = dir.path().join("gold.json");
        let pred = dir.path().join("pred.json");
        let json_out = dir.path().join("report.json");

        std::fs::File::create(&gold)
            .unwrap()
            .write_all(r#"[{"entidade": "ACÓRDÃO", "tipo": "titulo"}]"#.as_bytes())
            .unwrap();
        std::fs::File::create(&pred)
            .unwrap()
            .write_all(r#"[{"entidade": "Acórdão", "tipo": "Documento Judicial"}]"#.as_bytes())
            .unwrap();

        let scoring = ScoringArgs {
            threshold: None,
            samples: None,
            raw: false,
            json_out: Some(json_out.clone()),
        };
        evaluate(
            &AppConfig::default(),
            &gold,
            &[("pred".to_string(), pred)],
            &scoring,
        )
        .unwrap();

        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(json_out).unwrap()).unwrap();
        assert_eq!(report["gold_entities"], 1);
        assert_eq!(report["reports"][0]["name"], "pred");
        assert_eq!(report["reports"][0]["exact"]["true_positives"], 1);
    }
}
