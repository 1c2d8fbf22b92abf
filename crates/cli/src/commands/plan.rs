//! `shipline plan`

use color_eyre::Result;
use colored::*;
use sl_core::config::load_config;
use sl_core::engine::execution_order;
use std::path::Path;
use std::process::ExitCode;

pub async fn handle_plan(root: &Path, pipeline: Option<&str>) -> Result<ExitCode> {
    let config = load_config(root).await?;
    let pipeline = config.select_pipeline(pipeline)?;
    let order = execution_order(pipeline)?;

    println!("{}", format!("Pipeline {}", pipeline.name).bold());
    for (i, stage) in order.iter().enumerate() {
        println!(
            "  {}. {} {}",
            i + 1,
            stage.name.cyan(),
            format!("[{}]", stage.action.kind()).dimmed()
        );
        if !stage.needs.is_empty() {
            println!("       needs:   {}", stage.needs.join(", "));
        }
        if !stage.secrets.is_empty() {
            println!("       secrets: {}", stage.secrets.join(", ").dimmed());
        }
    }
    Ok(ExitCode::SUCCESS)
}
