//! `shipline show`

use crate::output;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use colored::*;
use sl_core::config::load_config;
use sl_core::state::RunStore;
use std::path::Path;
use std::process::ExitCode;
use uuid::Uuid;

pub async fn handle_show(
    root: &Path,
    run_id: Option<&str>,
    logs: bool,
    json: bool,
) -> Result<ExitCode> {
    let config = load_config(root).await?;
    let store = RunStore::new(root.join(&config.global.runs_dir));

    let run = match run_id {
        Some(id) => {
            let id = Uuid::parse_str(id).wrap_err_with(|| format!("'{id}' is not a run id"))?;
            store.load(id).map_err(|e| eyre!("{e:#}"))?
        }
        None => match store.latest().map_err(|e| eyre!("{e:#}"))? {
            Some(run) => run,
            None => {
                println!("{}", "No recorded runs.".yellow());
                return Ok(ExitCode::SUCCESS);
            }
        },
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
        return Ok(ExitCode::SUCCESS);
    }

    output::print_run_summary(&run);
    if logs {
        println!();
        println!("{}", "Logs:".bold());
        for line in &run.logs {
            println!("  {line}");
        }
    }
    Ok(ExitCode::SUCCESS)
}
