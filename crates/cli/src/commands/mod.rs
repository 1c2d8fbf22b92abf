//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod init;
mod list;
mod plan;
mod run;
mod show;

use clap::Subcommand;
use color_eyre::Result;
use std::path::Path;
use std::process::ExitCode;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run a pipeline for a push event
    Run {
        /// Pipeline to run (defaults to `default_pipeline`, or the only one)
        #[arg(short, long)]
        pipeline: Option<String>,

        /// Branch that was pushed
        #[arg(long, env = "GITHUB_REF_NAME", default_value = "main")]
        branch: String,

        /// Commit that was pushed; used to tag the image
        #[arg(long, env = "GITHUB_SHA")]
        commit: Option<String>,
    },
    /// Show the order stages of a pipeline would run in
    Plan {
        #[arg(short, long)]
        pipeline: Option<String>,
    },
    /// List defined pipelines
    List,
    /// Create `.shipline/` with template pipelines
    Init {
        /// Overwrite an existing `.shipline/` directory
        #[arg(long)]
        force: bool,

        /// Only write the delivery pipeline
        #[arg(long)]
        minimal: bool,
    },
    /// Show a recorded run (the latest when no id is given)
    Show {
        run_id: Option<String>,

        /// Print the captured stage output
        #[arg(long)]
        logs: bool,

        /// Print the raw run record
        #[arg(long, conflicts_with = "logs")]
        json: bool,
    },
}

/// Route `command` to its handler.
pub async fn handle_command(command: Commands, root: &Path) -> Result<ExitCode> {
    match command {
        Commands::Run {
            pipeline,
            branch,
            commit,
        } => run::handle_run(root, pipeline.as_deref(), branch, commit).await,
        Commands::Plan { pipeline } => plan::handle_plan(root, pipeline.as_deref()).await,
        Commands::List => list::handle_list(root).await,
        Commands::Init { force, minimal } => init::handle_init(root, force, minimal).await,
        Commands::Show { run_id, logs, json } => {
            show::handle_show(root, run_id.as_deref(), logs, json).await
        }
    }
}
