use std::path::PathBuf;

use aspecteval::IdealSentinels;
use aspecteval::model::DEFAULT_MAX_DOCS_PER_QUERY;
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "aspecteval",
    version,
    about = "Multi-aspect retrieval evaluation (CAM, NLRE, NWCS)"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Evaluate(EvaluateArgs),
    Inspect(InspectArgs),
    Measures(MeasuresArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum SentinelMode {
    Raw,
    Zeroed,
}

impl From<SentinelMode> for IdealSentinels {
    fn from(mode: SentinelMode) -> Self {
        match mode {
            SentinelMode::Raw => Self::Raw,
            SentinelMode::Zeroed => Self::Zeroed,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[arg(long)]
    pub input: PathBuf,

    /// Measure to compute, optionally with parameters (e.g. cam.1=0,2=5).
    #[arg(short = 'm', long = "measure")]
    pub measures: Vec<String>,

    #[arg(long, default_value_t = DEFAULT_MAX_DOCS_PER_QUERY)]
    pub max_docs_per_query: usize,

    #[arg(long, default_value_t = 1)]
    pub relevance_level: i64,

    #[arg(long, value_enum, default_value_t = SentinelMode::Raw)]
    pub ideal_sentinels: SentinelMode,

    #[arg(short = 'q', long, default_value_t = false)]
    pub per_query: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[arg(long)]
    pub report_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    #[arg(long)]
    pub input: PathBuf,

    #[arg(long)]
    pub query_id: String,

    #[arg(long, default_value_t = DEFAULT_MAX_DOCS_PER_QUERY)]
    pub max_docs_per_query: usize,

    #[arg(long, value_enum, default_value_t = SentinelMode::Raw)]
    pub ideal_sentinels: SentinelMode,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct MeasuresArgs {
    #[arg(long)]
    pub aspects: Option<usize>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}
