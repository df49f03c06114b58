use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "qrepair",
    version,
    about = "Repair exam questions polluted by leaked template markup"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// SQLite database holding the `questions` table.
    #[arg(long, env = "QREPAIR_DB", global = true)]
    pub db_path: Option<PathBuf>,

    /// JSON file with pipeline settings; flags below override it.
    #[arg(long, env = "QREPAIR_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, env = "QREPAIR_AGENT_URL", default_value = qrepair::config::DEFAULT_AGENT_URL, global = true)]
    pub agent_url: String,

    #[arg(long, env = "QREPAIR_MODEL", global = true)]
    pub model: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the number of corrupted, inactive records.
    Count,
    /// Process batches until the backlog is exhausted or the cap is hit.
    Run(RunArgs),
    /// Process a single batch.
    Batch(BatchArgs),
    /// Process one record by id.
    Record(RecordArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct PacingArgs {
    #[arg(long, env = "QREPAIR_BATCH_SIZE")]
    pub batch_size: Option<u32>,

    /// Minimum spacing between records, in milliseconds.
    #[arg(long, env = "QREPAIR_RECORD_DELAY_MS")]
    pub inter_record_delay_ms: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub pacing: PacingArgs,

    /// Pause between batches, in milliseconds.
    #[arg(long, env = "QREPAIR_BATCH_DELAY_MS")]
    pub inter_batch_delay_ms: Option<u64>,

    #[arg(long, env = "QREPAIR_MAX_BATCHES")]
    pub max_batches: Option<u32>,
}

#[derive(Args, Debug, Clone)]
pub struct BatchArgs {
    #[command(flatten)]
    pub pacing: PacingArgs,

    /// Skip this many backlog records before fetching.
    #[arg(long, default_value_t = 0)]
    pub offset: u32,
}

#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    #[arg(long)]
    pub id: i64,
}
