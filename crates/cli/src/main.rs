//! shipline CLI
//!
//! Runs the delivery pipelines defined in a repository's `.shipline/`
//! directory on the local machine.

mod commands;
mod output;

use clap::Parser;
use commands::{handle_command, Commands};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "shipline")]
#[command(
    about = "Build, scan, test, gate, ship and deploy from one pipeline definition",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Repository root containing `.shipline/`
    #[arg(long, global = true, env = "SHIPLINE_ROOT", default_value = ".")]
    root: PathBuf,

    /// Log engine activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "sl_cli=info,sl_core=info" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> color_eyre::Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    handle_command(cli.command, &cli.root).await
}
