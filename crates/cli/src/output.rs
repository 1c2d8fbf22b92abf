//! Terminal rendering of run events and run records.

use colored::*;
use sl_protocol::{Event, PipelineRun, RunStatus, StageStatus};

pub fn print_event(event: &Event) {
    match event {
        Event::RunStarted {
            run_id,
            pipeline_name,
        } => {
            println!(
                "{} {} {}",
                "▶".blue().bold(),
                format!("Running {pipeline_name}").bold(),
                run_id.to_string().dimmed()
            );
        }
        Event::RunStatusUpdate { .. } => {}
        Event::StageStarted { stage, .. } => {
            println!("{} {}", "●".cyan(), stage.cyan().bold());
        }
        Event::StageLogChunk { content, .. } => {
            println!("  {}", content.dimmed());
        }
        Event::StageFinished { result, .. } => match result.status {
            StageStatus::Success => {
                println!("{} {}", "✓".green(), result.stage.green());
                for artifact in &result.artifacts {
                    println!("    {}", artifact.to_string().dimmed());
                }
            }
            StageStatus::Failure => {
                println!(
                    "{} {}: {}",
                    "✗".red(),
                    result.stage.red(),
                    result.error.as_deref().unwrap_or("failed")
                );
            }
        },
        Event::RunSucceeded { .. } => {
            println!("{}", "✓ Pipeline succeeded".green().bold());
        }
        Event::RunFailed { stage, error, .. } => {
            println!(
                "{}",
                format!("✗ Pipeline failed at {stage}: {error}").red().bold()
            );
        }
    }
}

fn status_label(status: RunStatus) -> ColoredString {
    match status {
        RunStatus::Succeeded => "Succeeded".green().bold(),
        RunStatus::Failed => "Failed".red().bold(),
        RunStatus::Running => "Running".cyan(),
        RunStatus::Pending => "Pending".normal(),
    }
}

pub fn print_run_summary(run: &PipelineRun) {
    println!("{}", format!("Run {}", run.id).bold());
    println!("  Pipeline: {}", run.pipeline_name.cyan());
    let commit = run
        .trigger
        .short_commit(12)
        .map(|c| format!(" @ {c}"))
        .unwrap_or_default();
    println!("  Trigger:  push to {}{commit}", run.trigger.branch);
    println!("  Status:   {}", status_label(run.status));
    println!("  Started:  {}", run.started_at.to_rfc3339().dimmed());
    if let Some(finished) = run.finished_at {
        let secs = (finished - run.started_at).num_milliseconds() as f64 / 1000.0;
        println!("  Duration: {}", format!("{secs:.1}s").dimmed());
    }

    if run.results.is_empty() {
        return;
    }
    println!("  Stages:");
    for result in &run.results {
        match result.status {
            StageStatus::Success => println!("    {} {}", "✓".green(), result.stage),
            StageStatus::Failure => println!(
                "    {} {}: {}",
                "✗".red(),
                result.stage,
                result.error.as_deref().unwrap_or("failed").red()
            ),
        }
        for artifact in &result.artifacts {
            println!("        {}", artifact.to_string().dimmed());
        }
    }
}
