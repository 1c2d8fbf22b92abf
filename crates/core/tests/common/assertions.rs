//! Event and run assertions.

use sl_protocol::{Event, PipelineRun, RunStatus};
use tokio::sync::mpsc;

/// Receive events until the channel closes.
pub async fn collect_events(mut rx: mpsc::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

/// Names of stages in `StageStarted` events, in order.
pub fn started_stages(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::StageStarted { stage, .. } => Some(stage.clone()),
            _ => None,
        })
        .collect()
}

/// `RunStarted` first, exactly one terminal event, and it comes last.
pub fn assert_event_sequence(events: &[Event]) {
    assert!(
        matches!(events.first(), Some(Event::RunStarted { .. })),
        "First event should be RunStarted, got: {:?}",
        events.first()
    );
    let terminal: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
    assert_eq!(terminal.len(), 1, "Expected one terminal event, got {terminal:?}");
    assert!(
        events.last().is_some_and(Event::is_terminal),
        "Last event should be terminal, got: {:?}",
        events.last()
    );
}

/// Stage names with results, in recording order.
pub fn recorded_stages(run: &PipelineRun) -> Vec<&str> {
    run.results.iter().map(|r| r.stage.as_str()).collect()
}

/// The run failed at `stage`, and every earlier result succeeded.
pub fn assert_failed_at(run: &PipelineRun, stage: &str) {
    assert_eq!(run.status, RunStatus::Failed);
    let last = run.results.last().expect("a failed run has results");
    assert_eq!(last.stage, stage);
    assert!(!last.is_success());
    assert!(run.results[..run.results.len() - 1]
        .iter()
        .all(|r| r.is_success()));
}

/// No log line and no serialized record contains `secret`.
pub fn assert_never_leaks(run: &PipelineRun, secret: &str) {
    for line in &run.logs {
        assert!(!line.contains(secret), "secret leaked into log: {line}");
    }
    let record = serde_json::to_string(run).expect("run serializes");
    assert!(!record.contains(secret), "secret leaked into run record");
}
