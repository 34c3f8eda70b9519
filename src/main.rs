use anyhow::Result;
use clap::{Parser, Subcommand};
use jvm_recompile::cli::{ConfigOverrides, resolve_config, run_inspect, run_plan};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "jrecomp",
    about = "Decide which JVM compilation units an edit forces to recompile"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the recompilation plan for a workspace
    Plan {
        /// Workspace descriptor JSON (`{"units": [...]}`) produced by the front end
        #[arg(short, long)]
        workspace: PathBuf,

        /// Baseline written by the previous successful build
        #[arg(short, long, default_value = ".jrecomp/baseline.json")]
        baseline: PathBuf,

        /// Engine config JSON
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Run the dry-run compiler and replace the baseline on success
        #[arg(long)]
        commit: bool,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,

        /// Override the propagation round cap
        #[arg(long)]
        max_rounds: Option<usize>,

        /// Override the batch size above which analysis runs in parallel
        #[arg(long)]
        parallel_threshold: Option<usize>,

        /// Number of analysis worker threads
        #[arg(long)]
        threads: Option<usize>,
    },

    /// Summarize a stored baseline
    Inspect {
        #[arg(short, long, default_value = ".jrecomp/baseline.json")]
        baseline: PathBuf,

        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Plan {
            workspace,
            baseline,
            config,
            commit,
            json,
            max_rounds,
            parallel_threshold,
            threads,
        } => {
            let overrides = ConfigOverrides {
                max_rounds,
                parallel_threshold,
                worker_threads: threads,
            };
            let config = resolve_config(config.as_deref(), &overrides)?;
            run_plan(&workspace, &baseline, config, commit, json)
        }
        Commands::Inspect { baseline, json } => run_inspect(&baseline, json),
    }
}
