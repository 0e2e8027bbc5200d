mod batch;
mod display;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use fieldrep_ai::{
    HttpExtractionService, MemorySink, ModelConfig, Normalizer, NormalizerConfig, Pipeline,
    TriggerClassifier, normalize_rules,
};
use fieldrep_core::{RawMessage, ReportType, outcome_json, validate_candidate};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "fieldrep", version)]
#[command(about = "Normalize field messages and suggest follow-up reports")]
struct Cli {
    /// JSON config file (`{"model": {...}}`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Extraction model server. Enables model-assisted extraction.
    #[arg(long, global = true, env = "FIELDREP_MODEL_URL")]
    model_url: Option<String>,

    /// Model name on the extraction server.
    #[arg(long, global = true, env = "FIELDREP_MODEL")]
    model: Option<String>,

    /// Per-call timeout for the extraction model, in seconds.
    #[arg(long, global = true, env = "FIELDREP_MODEL_TIMEOUT")]
    model_timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Normalize one message and print the report JSON.
    Normalize {
        text: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        report_type: Option<String>,
    },
    /// Run the trigger rules over a report JSON.
    Classify {
        #[arg(long)]
        report_type: String,
        #[arg(long, default_value = "cli")]
        id: String,
        /// Raw message text to search for keywords.
        #[arg(long, default_value = "")]
        raw: String,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Normalize, record and classify one message.
    Ingest {
        text: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        report_type: Option<String>,
    },
    /// Ingest every line of a JSONL file.
    Batch {
        #[arg(long)]
        input: PathBuf,
        /// Write recorded reports as an Arrow IPC file.
        #[arg(long)]
        arrow: Option<PathBuf>,
        /// Write admitted suggestions as an Arrow IPC file.
        #[arg(long)]
        suggestions_arrow: Option<PathBuf>,
    },
    /// Render a report (or a raw message) as a formatted text report.
    Render {
        #[arg(long, value_enum)]
        format: RenderFormat,
        text: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum RenderFormat {
    Eoincrep,
    Casevac,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!("fieldrep v{}", env!("CARGO_PKG_VERSION"));
    let normalizer = build_normalizer(&cli)?;

    match cli.command {
        Command::Normalize {
            text,
            file,
            report_type,
        } => {
            let raw = message(read_input(text, file.as_deref())?, report_type);
            let outcome = normalizer.normalize(&raw).await;
            print_json(&outcome_json(&outcome))?;
        }
        Command::Classify {
            report_type,
            id,
            raw,
            file,
        } => {
            let input = read_input(None, file.as_deref())?;
            let candidate: serde_json::Map<String, Value> =
                serde_json::from_str(&input).context("report must be a JSON object")?;
            let report = validate_candidate(&candidate, chrono::Utc::now())
                .context("report does not fit the schema")?;
            let suggestions = TriggerClassifier::new().classify(
                &id,
                &report,
                &ReportType::parse(&report_type),
                &raw,
            );
            print_json(&serde_json::to_value(&suggestions)?)?;
        }
        Command::Ingest {
            text,
            file,
            report_type,
        } => {
            let raw = message(read_input(text, file.as_deref())?, report_type);
            let mut pipeline = Pipeline::new(normalizer);
            let mut sink = MemorySink::default();
            let out = pipeline.ingest(&raw, &mut sink).await?;
            print_json(&json!({
                "report_id": out.record.report_id,
                "report_type": out.record.report_type,
                "report": out.record.report.to_json(),
                "suggestions": out.suggestions,
            }))?;
        }
        Command::Batch {
            input,
            arrow,
            suggestions_arrow,
        } => {
            let mut pipeline = Pipeline::new(normalizer);
            let mut sink = MemorySink::default();
            let stats = batch::run_batch(&mut pipeline, &mut sink, &input).await?;
            eprintln!(
                "  {} messages: {} recorded, {} rejected, {} suggestions ({:.2}s)",
                stats.lines, stats.recorded, stats.rejected, stats.suggestions, stats.elapsed_secs
            );
            if let Some(path) = arrow {
                let rows = batch::write_reports(&sink, &path)?;
                eprintln!("  Wrote {rows} reports to {}", path.display());
            }
            if let Some(path) = suggestions_arrow {
                let rows = batch::write_suggestions(&sink, &path)?;
                eprintln!("  Wrote {rows} suggestions to {}", path.display());
            }
        }
        Command::Render { format, text, file } => {
            let input = read_input(text, file.as_deref())?;
            let report = normalize_rules(&RawMessage::new(input))?;
            let rendered = match format {
                RenderFormat::Eoincrep => display::render_eoincrep(&report),
                RenderFormat::Casevac => display::render_casevac(&report),
            };
            println!("{rendered}");
        }
    }
    Ok(())
}

/// Config file first, then flags and environment on top.
fn model_config(cli: &Cli) -> anyhow::Result<Option<ModelConfig>> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str::<NormalizerConfig>(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => NormalizerConfig::default(),
    };

    if cli.model_url.is_some() || cli.model.is_some() {
        let model = config.model.get_or_insert_with(ModelConfig::default);
        if let Some(url) = &cli.model_url {
            model.base_url = url.clone();
        }
        if let Some(name) = &cli.model {
            model.model = name.clone();
        }
    }
    if let (Some(model), Some(secs)) = (config.model.as_mut(), cli.model_timeout) {
        model.timeout_secs = secs;
    }
    Ok(config.model)
}

fn build_normalizer(cli: &Cli) -> anyhow::Result<Normalizer> {
    let Some(config) = model_config(cli)? else {
        return Ok(Normalizer::new());
    };
    tracing::info!(url = %config.base_url, model = %config.model, "model-assisted extraction enabled");
    let service = HttpExtractionService::new(&config).context("building model client")?;
    Ok(Normalizer::with_model(Arc::new(service), &config))
}

fn message(text: String, report_type: Option<String>) -> RawMessage {
    match report_type {
        Some(hint) => RawMessage::with_hint(text, hint),
        None => RawMessage::new(text),
    }
}

/// Positional text, else `--file`, else stdin.
fn read_input(text: Option<String>, file: Option<&Path>) -> anyhow::Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(path) = file {
        return std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()));
    }
    let mut buf = String::new();
    std::io::stdin()
        .read_to_string(&mut buf)
        .context("reading stdin")?;
    Ok(buf)
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
