use std::fmt::Write as _;
use std::fs::{File, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// One step of a verification run, as shown by `--explain`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub task_id: String,
    pub message: String,
    pub timestamp_ms: u128,
}

impl TraceEvent {
    pub fn new(task_id: impl Into<String>, message: impl Into<String>) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self {
            task_id: task_id.into(),
            message: message.into(),
            timestamp_ms,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceCollector {
    events: Vec<TraceEvent>,
}

impl TraceCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: Vec<TraceEvent>) -> Self {
        Self { events }
    }

    pub fn record(&mut self, task_id: impl Into<String>, message: impl Into<String>) {
        self.events.push(TraceEvent::new(task_id, message));
    }

    pub fn extend<I>(&mut self, events: I)
    where
        I: IntoIterator<Item = TraceEvent>,
    {
        self.events.extend(events);
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<TraceEvent> {
        self.events
    }

    pub fn summary(&self) -> TraceSummary {
        TraceSummary::from_events(&self.events)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceStep {
    pub index: usize,
    pub task_id: String,
    pub message: String,
    /// Milliseconds since the first recorded event.
    pub offset_ms: u128,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceSummary {
    pub steps: Vec<TraceStep>,
}

impl TraceSummary {
    pub fn from_events(events: &[TraceEvent]) -> Self {
        let origin = events
            .iter()
            .map(|event| event.timestamp_ms)
            .min()
            .unwrap_or_default();
        let steps = events
            .iter()
            .enumerate()
            .map(|(idx, event)| TraceStep {
                index: idx + 1,
                task_id: event.task_id.clone(),
                message: event.message.clone(),
                offset_ms: event.timestamp_ms.saturating_sub(origin),
            })
            .collect();
        Self { steps }
    }

    pub fn render_markdown(&self) -> String {
        if self.steps.is_empty() {
            return "No trace events recorded.".to_string();
        }
        let mut output = String::from("### Verification Trace\n");
        for step in &self.steps {
            let _ = writeln!(
                output,
                "{}. `{}` (+{} ms) {}",
                step.index, step.task_id, step.offset_ms, step.message
            );
        }
        output
    }

    /// Sequential flowchart; steps sharing a task id are grouped in a subgraph.
    pub fn render_mermaid(&self) -> String {
        if self.steps.is_empty() {
            return "flowchart TD\n  %% no trace events captured\n".to_string();
        }

        let mut output = String::from("flowchart TD\n");
        let mut groups: Vec<(&str, Vec<&TraceStep>)> = Vec::new();
        for step in &self.steps {
            let continues = groups
                .last()
                .is_some_and(|(task_id, _)| *task_id == step.task_id);
            if !continues {
                groups.push((step.task_id.as_str(), Vec::new()));
            }
            if let Some((_, steps)) = groups.last_mut() {
                steps.push(step);
            }
        }

        for (group_idx, (task_id, steps)) in groups.iter().enumerate() {
            let _ = writeln!(
                output,
                "  subgraph g{group_idx}[\"{}\"]",
                sanitize_mermaid(task_id)
            );
            for step in steps {
                let _ = writeln!(
                    output,
                    "    step{}[\"{}\"]",
                    step.index,
                    sanitize_mermaid(&step.message)
                );
            }
            output.push_str("  end\n");
        }

        for idx in 1..self.steps.len() {
            let _ = writeln!(output, "  step{idx} --> step{}", idx + 1);
        }

        output
    }
}

fn sanitize_mermaid(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "'")
        .replace('[', "(")
        .replace(']', ")")
        .replace('\n', "<br/>")
}

/// Write the raw events as `<dir>/<session_id>.json`.
pub fn persist_trace<P: AsRef<Path>>(
    dir: P,
    session_id: &str,
    events: &[TraceEvent],
) -> Result<PathBuf> {
    let dir = dir.as_ref();
    create_dir_all(dir)
        .with_context(|| format!("failed to create trace directory {}", dir.display()))?;
    let path = dir.join(format!("{session_id}.json"));
    let payload = serde_json::to_vec_pretty(events)?;
    let mut file = File::create(&path)
        .with_context(|| format!("failed to create trace file {}", path.display()))?;
    file.write_all(&payload)
        .with_context(|| format!("failed to write trace file {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(task_id: &str, message: &str, timestamp_ms: u128) -> TraceEvent {
        TraceEvent {
            task_id: task_id.into(),
            message: message.into(),
            timestamp_ms,
        }
    }

    #[test]
    fn markdown_lists_steps_with_offsets() {
        let summary = TraceSummary::from_events(&[
            event("triage", "selected fact", 1_000),
            event("lane.fact", "verdict false (0.75)", 1_250),
        ]);
        let markdown = summary.render_markdown();

        assert!(markdown.contains("1. `triage` (+0 ms) selected fact"));
        assert!(markdown.contains("2. `lane.fact` (+250 ms)"));
    }

    #[test]
    fn mermaid_groups_consecutive_task_steps() {
        let summary = TraceSummary::from_events(&[
            event("lane.scam", "scam_link: success", 1),
            event("lane.scam", "merged [scam]", 2),
            event("final_report", "SCAM DETECTED", 3),
        ]);
        let mermaid = summary.render_mermaid();

        assert!(mermaid.starts_with("flowchart TD"));
        assert_eq!(mermaid.matches("subgraph").count(), 2);
        assert!(mermaid.contains("merged (scam)"));
        assert!(mermaid.contains("step2 --> step3"));
    }

    #[test]
    fn empty_trace_renders_placeholders() {
        let summary = TraceCollector::new().summary();
        assert_eq!(summary.render_markdown(), "No trace events recorded.");
        assert!(summary.render_mermaid().contains("no trace events"));
    }

    #[test]
    fn persist_writes_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let events = vec![event("triage", "selected news", 5)];
        let path = persist_trace(dir.path(), "session-1", &events).unwrap();

        assert_eq!(path, dir.path().join("session-1.json"));
        let stored: Vec<TraceEvent> =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(stored, events);
    }
}
