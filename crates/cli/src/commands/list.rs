//! `shipline list`

use color_eyre::Result;
use colored::*;
use sl_core::config::load_config;
use std::path::Path;
use std::process::ExitCode;

pub async fn handle_list(root: &Path) -> Result<ExitCode> {
    let config = load_config(root).await?;

    if config.pipelines.is_empty() {
        println!(
            "{}",
            "No pipelines found. Run `shipline init` to create one.".yellow()
        );
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "{}",
        format!("Found {} pipeline(s):", config.pipelines.len()).bold()
    );
    for pipeline in &config.pipelines {
        let marker = if config.global.default_pipeline.as_deref() == Some(pipeline.name.as_str()) {
            " (default)".green().to_string()
        } else {
            String::new()
        };
        let branches = if pipeline.on.push.branches.is_empty() {
            "all branches".to_string()
        } else {
            pipeline.on.push.branches.join(", ")
        };
        println!(
            "  {}{marker}  {} stage(s), on push to {}",
            pipeline.name.cyan(),
            pipeline.stages.len(),
            branches.dimmed()
        );
    }
    Ok(ExitCode::SUCCESS)
}
