//! `shipline run`

use crate::output;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use colored::*;
use sl_core::config::load_config;
use sl_core::engine::PipelineEngine;
use sl_core::secrets::EnvSecretStore;
use sl_core::stages::{StageRegistry, Toolchain};
use sl_core::state::RunStore;
use sl_protocol::{RunStatus, Trigger};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;

pub async fn handle_run(
    root: &Path,
    pipeline: Option<&str>,
    branch: String,
    commit: Option<String>,
) -> Result<ExitCode> {
    let config = load_config(root).await?;
    let pipeline = config.select_pipeline(pipeline)?;

    let mut trigger = Trigger::push(branch);
    if let Some(commit) = commit.filter(|c| !c.is_empty()) {
        trigger = trigger.with_commit(commit);
    }
    if !pipeline.accepts(&trigger) {
        println!(
            "{}",
            format!(
                "Pipeline '{}' does not run for pushes to '{}', skipping.",
                pipeline.name, trigger.branch
            )
            .yellow()
        );
        return Ok(ExitCode::SUCCESS);
    }

    tracing::info!(
        pipeline = %pipeline.name,
        branch = %trigger.branch,
        root = %root.display(),
        "starting run"
    );
    let registry = StageRegistry::for_pipeline(pipeline, &Toolchain::system())
        .map_err(|e| eyre!("{e:#}"))?;
    let engine = PipelineEngine::new(registry, Arc::new(EnvSecretStore)).with_workspace(root);

    let (events_tx, mut events_rx) = mpsc::channel(256);
    let printer = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            output::print_event(&event);
        }
    });

    let run = engine.run(pipeline, trigger, events_tx).await?;
    printer.await?;

    println!();
    output::print_run_summary(&run);

    if config.global.keep_run_records {
        let store = RunStore::new(root.join(&config.global.runs_dir));
        let path = store.save(&run).map_err(|e| eyre!("{e:#}"))?;
        println!("  Record: {}", path.display().to_string().dimmed());
    }

    Ok(if run.status == RunStatus::Succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
