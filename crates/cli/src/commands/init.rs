//! `shipline init`

use color_eyre::Result;
use colored::*;
use sl_core::init::{generate_shipline_structure, InitOptions};
use std::path::Path;
use std::process::ExitCode;

pub async fn handle_init(root: &Path, force: bool, minimal: bool) -> Result<ExitCode> {
    let written = generate_shipline_structure(InitOptions {
        target_dir: root.to_path_buf(),
        force,
        minimal,
    })
    .await?;

    println!("{}", "✓ Created .shipline/".green().bold());
    for path in written {
        println!("  {}", format!(".shipline/{path}").dimmed());
    }
    println!();
    println!("Edit the pipelines, then export the secrets they declare and run `shipline run`.");
    Ok(ExitCode::SUCCESS)
}
