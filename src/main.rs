mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use qrepair::config;
use qrepair::db;
use qrepair::pipeline::cleanup::{
    AgentClient, BatchController, CancellationToken, CleanupConfig, ContinuousRunner,
    CorruptionDetector, QuestionStore, RecordProcessor, RunReport, SqliteQuestionStore,
};
use qrepair::pipeline::ollama::OllamaClient;

use crate::cli::{Cli, Commands, GlobalArgs, PacingArgs};

/// Headroom over the stage deadline before the HTTP client gives up itself.
const TRANSPORT_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    qrepair::init_tracing();

    if let Err(err) = run().await {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    info!("{} v{}", config::APP_NAME, config::APP_VERSION);

    let mut settings = load_settings(&cli.global)?;
    match &cli.command {
        Commands::Run(args) => {
            apply_pacing(&mut settings, &args.pacing);
            if let Some(ms) = args.inter_batch_delay_ms {
                settings.inter_batch_delay_ms = ms;
            }
            if let Some(n) = args.max_batches {
                settings.max_batches = n;
            }
        }
        Commands::Batch(args) => apply_pacing(&mut settings, &args.pacing),
        Commands::Count | Commands::Record(_) => {}
    }
    settings.validate().context("invalid pipeline settings")?;

    let controller = build_controller(&cli.global, &settings)?;
    spawn_interrupt_handler(controller.cancellation());

    match cli.command {
        Commands::Count => {
            println!("{}", controller.count_backlog().await);
        }
        Commands::Record(args) => {
            let outcome = controller.process_record(args.id).await;
            println!(
                "record {}: {} {}",
                outcome.record_id,
                outcome.action,
                outcome.details.as_deref().unwrap_or("")
            );
        }
        Commands::Batch(args) => {
            let report = controller.process_batch(settings.batch_size, args.offset).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Run(_) => {
            let runner = ContinuousRunner::new(controller);
            let progress = |report: &RunReport, batch: u32| {
                eprintln!(
                    "batch {batch}/{}: processed {} | cleaned {} (active {}, pending {}) | failed {} | invalid {} | skipped {}",
                    settings.max_batches,
                    report.total,
                    report.cleaned,
                    report.reactivated,
                    report.pending_review,
                    report.failed,
                    report.validation_failed,
                    report.skipped,
                );
            };
            let report = runner
                .run(
                    settings.batch_size,
                    settings.inter_batch_delay(),
                    settings.max_batches,
                    Some(&progress),
                )
                .await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Settings file (if any), then global flag overrides.
fn load_settings(global: &GlobalArgs) -> Result<CleanupConfig> {
    let mut settings = match &global.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading settings {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing settings {}", path.display()))?
        }
        None => CleanupConfig::default(),
    };
    if let Some(model) = &global.model {
        settings.model_name = model.clone();
    }
    Ok(settings)
}

fn apply_pacing(settings: &mut CleanupConfig, pacing: &PacingArgs) {
    if let Some(size) = pacing.batch_size {
        settings.batch_size = size;
    }
    if let Some(ms) = pacing.inter_record_delay_ms {
        settings.inter_record_delay_ms = ms;
    }
}

fn build_controller(global: &GlobalArgs, settings: &CleanupConfig) -> Result<BatchController> {
    let db_path = global
        .db_path
        .clone()
        .unwrap_or_else(config::default_database_path);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let conn = db::open_database(&db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    let store: Arc<dyn QuestionStore> = Arc::new(SqliteQuestionStore::new(conn));

    let transport_timeout =
        settings.extraction_timeout().max(settings.review_timeout()) + TRANSPORT_GRACE;
    let agent: Arc<dyn AgentClient> = Arc::new(
        OllamaClient::new(&global.agent_url, transport_timeout)
            .context("building agent client")?,
    );
    info!(
        db = %db_path.display(),
        agent = %global.agent_url,
        model = %settings.model_name,
        "Pipeline configured"
    );

    let processor = RecordProcessor::new(store.clone(), agent.clone(), agent, settings);
    Ok(BatchController::new(
        CorruptionDetector::new(store),
        processor,
        settings.inter_record_delay(),
    ))
}

/// First Ctrl-C cancels the run at its next suspension point.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, stopping after the current step");
                cancel.cancel();
            }
            Err(e) => warn!(error = %e, "Could not listen for Ctrl-C"),
        }
    });
}
