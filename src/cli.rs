use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "taskeval",
    version,
    about = "Offline evaluation of ranked retrieval runs against analytic task judgments"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Evaluate(EvaluateArgs),
    Inspect(InspectArgs),
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[arg(long)]
    pub task_file: PathBuf,

    #[arg(long)]
    pub qrel_file: PathBuf,

    #[arg(long = "run")]
    pub runs: Vec<String>,

    #[arg(long = "depth")]
    pub depths: Vec<usize>,

    #[arg(long, default_value = "eval-out")]
    pub output_dir: PathBuf,

    #[arg(long)]
    pub comparison_report_path: Option<PathBuf>,

    #[arg(long)]
    pub ndcg_summary_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    #[arg(long)]
    pub task_file: PathBuf,

    #[arg(long)]
    pub qrel_file: Option<PathBuf>,

    #[arg(long)]
    pub request: Option<String>,
}
