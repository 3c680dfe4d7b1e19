//! mail-triage CLI — scan an mbox archive for case-relevant emails.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use clap::Parser;
use secrecy::SecretString;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mail_triage::config::JudgeOptions;
use mail_triage::extract::extract_mbox;
use mail_triage::judge::{AnthropicJudge, DisabledJudge, Judge};
use mail_triage::pipeline::Pipeline;
use mail_triage::scoring::keywords::KeywordTaxonomy;
use mail_triage::{config, export};

#[derive(Parser, Debug)]
#[command(name = "mail-triage", version, about = "Relevance triage for mbox email archives")]
struct Cli {
    /// Mbox file, or a directory of mbox files (readpst output layout).
    mailbox: PathBuf,

    /// Entity list file: one company name, @domain, or address per line.
    #[arg(short, long)]
    entities: PathBuf,

    /// Keyword taxonomy JSON file. Omit to use the built-in taxonomy.
    #[arg(short, long)]
    taxonomy: Option<PathBuf>,

    /// Output directory for CSV files and the report.
    #[arg(short, long, default_value = "results")]
    output: PathBuf,

    /// Score retained emails with the Anthropic API (needs
    /// ANTHROPIC_API_KEY).
    #[arg(long)]
    ai_score: bool,

    /// Model to use when AI scoring is enabled.
    #[arg(long)]
    model: Option<String>,

    /// Keep only the top N results after ranking.
    #[arg(long)]
    max_results: Option<usize>,

    /// Maximum concurrent AI scoring calls.
    #[arg(long)]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let raw_entities = config::load_entity_lines(&cli.entities)
        .with_context(|| format!("loading entity list {}", cli.entities.display()))?;
    let taxonomy = match &cli.taxonomy {
        Some(path) => KeywordTaxonomy::from_json_path(path)
            .with_context(|| format!("loading taxonomy {}", path.display()))?,
        None => KeywordTaxonomy::default_taxonomy(),
    };

    let judge: Arc<dyn Judge> = if cli.ai_score {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .context("ANTHROPIC_API_KEY must be set when --ai-score is used")?;
        let judge = AnthropicJudge::new(SecretString::from(api_key));
        Arc::new(match cli.model {
            Some(model) => judge.with_model(model),
            None => judge,
        })
    } else {
        Arc::new(DisabledJudge)
    };

    let mut judge_options = JudgeOptions::default();
    if let Some(concurrency) = cli.concurrency {
        judge_options.concurrency = concurrency;
    }

    let pipeline = Pipeline::new(raw_entities, taxonomy)
        .context("building pipeline")?
        .with_judge(judge)
        .with_judge_options(judge_options)
        .with_max_results(cli.max_results);

    // Ctrl-C stops new judge calls; the run still finishes and exports
    // whatever was scored.
    let abort = Arc::new(AtomicBool::new(false));
    {
        let abort = Arc::clone(&abort);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing with results so far");
                abort.store(true, Ordering::Relaxed);
            }
        });
    }

    let extraction = extract_mbox(&cli.mailbox)
        .with_context(|| format!("extracting {}", cli.mailbox.display()))?;
    let results = pipeline.run(extraction, abort).await;

    let stats = &results.statistics;
    info!(
        scanned = stats.scanned,
        retained = stats.retained,
        excluded = stats.excluded,
        skipped = stats.skipped,
        deduplicated = stats.deduplicated,
        "Triage complete"
    );

    let paths = export::export_all(&results, &cli.output).context("writing results")?;
    for path in &paths {
        info!(file = %path.display(), "Wrote");
    }

    Ok(())
}
