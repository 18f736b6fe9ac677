use docflow_core::{Artifact, GenerationUnit, Pipeline, UnitStatus};
use tokio::sync::watch;

/// Prints a line whenever a unit changes status, until the scheduler is dropped.
pub async fn report(mut updates: watch::Receiver<Pipeline>) {
    let mut seen: Vec<UnitStatus> = Vec::new();
    while updates.changed().await.is_ok() {
        let pipeline = updates.borrow_and_update().clone();
        for unit in pipeline.units() {
            if seen.get(unit.index) == Some(&unit.status) {
                continue;
            }
            if unit.index < seen.len() {
                seen[unit.index] = unit.status;
            } else {
                seen.push(unit.status);
            }
            println!("{}", status_line(unit, pipeline.len()));
        }
    }
}

pub fn status_line(unit: &GenerationUnit, total: usize) -> String {
    let mut line = format!(
        "[{}/{}] {:<8} {:<10}",
        unit.index + 1,
        total,
        unit.kind.as_str(),
        unit.status.as_str()
    );
    if let Some(summary) = unit.artifact.as_ref().map(summarize) {
        line.push(' ');
        line.push_str(&summary);
    }
    if let Some(error) = &unit.error_message {
        line.push_str(&format!(" (error: {error})"));
    }
    line
}

fn summarize(artifact: &Artifact) -> String {
    match artifact {
        Artifact::Structured { value, .. } => match value.get("title").and_then(|t| t.as_str()) {
            Some(title) => format!("\"{title}\""),
            None => "(untitled)".to_string(),
        },
        Artifact::Raw { markup } => format!("{} bytes of markup", markup.len()),
    }
}

pub fn print_pipeline(pipeline: &Pipeline) {
    println!("pipeline {}", pipeline.id);
    if let Some(session) = pipeline.session.id() {
        println!("session  {session}");
    }
    for unit in pipeline.units() {
        println!("{}", status_line(unit, pipeline.len()));
    }
}
