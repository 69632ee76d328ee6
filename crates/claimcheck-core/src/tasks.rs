//! graph_flow tasks making up one verification session.

use async_trait::async_trait;
use futures::future::join_all;
use graph_flow::{Context, NextAction, Task, TaskResult};
use tracing::{debug, info, instrument};

use crate::lanes::{LaneSummary, run_lane};
use crate::metrics;
use crate::report::{FinalReport, synthesize};
use crate::router::{Router, Triage};
use crate::sources::SourceSet;
use crate::trace::TraceEvent;

pub const TRIAGE_TASK: &str = "triage";
pub const LANES_TASK: &str = "lanes";
pub const FINAL_REPORT_TASK: &str = "final_report";

pub(crate) const CLAIM_KEY: &str = "claim";
pub(crate) const TRIAGE_KEY: &str = "triage";
pub(crate) const ANY_LANE_KEY: &str = "triage.any_lane";
pub(crate) const SUMMARIES_KEY: &str = "lanes.summaries";
pub(crate) const REPORT_KEY: &str = "report";
pub(crate) const MARKDOWN_KEY: &str = "report.markdown";
pub(crate) const TRACE_KEY: &str = "trace.events";

async fn append_trace<I>(context: &Context, events: I)
where
    I: IntoIterator<Item = TraceEvent>,
{
    let mut trace: Vec<TraceEvent> = context.get(TRACE_KEY).await.unwrap_or_default();
    trace.extend(events);
    context.set(TRACE_KEY, &trace).await;
}

/// Routes the claim to the lanes that should verify it.
pub struct TriageTask {
    router: Router,
}

impl TriageTask {
    pub fn new(router: Router) -> Self {
        Self { router }
    }
}

#[async_trait]
impl Task for TriageTask {
    fn id(&self) -> &str {
        TRIAGE_TASK
    }

    #[instrument(name = "task.triage", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let claim: String = context.get(CLAIM_KEY).await.unwrap_or_default();
        let triage = self.router.classify(&claim);
        let lanes: Vec<&str> = triage.lanes.iter().map(|lane| lane.as_str()).collect();

        context.set(TRIAGE_KEY, &triage).await;
        context.set_sync(ANY_LANE_KEY, !triage.is_empty());

        info!(policy = self.router.policy().as_str(), lanes = ?lanes, "claim triaged");
        debug!(rationale = ?triage.rationale, "triage rationale");

        let message = if lanes.is_empty() {
            "no lane applicable".to_string()
        } else {
            format!("selected {} ({} policy)", lanes.join(", "), self.router.policy().as_str())
        };
        append_trace(&context, [TraceEvent::new(TRIAGE_TASK, message.clone())]).await;

        Ok(TaskResult::new(Some(message), NextAction::ContinueAndExecute))
    }
}

/// Runs every selected lane concurrently and stores their summaries.
pub struct LaneDispatchTask {
    sources: SourceSet,
}

impl LaneDispatchTask {
    pub fn new(sources: SourceSet) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl Task for LaneDispatchTask {
    fn id(&self) -> &str {
        LANES_TASK
    }

    #[instrument(name = "task.lanes", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let claim: String = context.get(CLAIM_KEY).await.unwrap_or_default();
        let triage: Triage = context.get(TRIAGE_KEY).await.unwrap_or_default();

        let runs = join_all(
            triage
                .lanes
                .iter()
                .map(|lane| run_lane(*lane, &claim, &self.sources)),
        )
        .await;

        let mut summaries: Vec<LaneSummary> = Vec::with_capacity(runs.len());
        let mut events = Vec::new();
        for run in runs {
            events.extend(run.events);
            summaries.push(run.summary);
        }

        let degraded = summaries.iter().filter(|summary| summary.degraded).count();
        info!(lanes = summaries.len(), degraded, "all lanes merged");

        context.set(SUMMARIES_KEY, &summaries).await;
        append_trace(&context, events).await;

        Ok(TaskResult::new(
            Some(format!("{} lane summaries ready", summaries.len())),
            NextAction::ContinueAndExecute,
        ))
    }
}

/// Synthesizes the final report from whatever lane summaries exist.
#[derive(Default)]
pub struct FinalReportTask;

#[async_trait]
impl Task for FinalReportTask {
    fn id(&self) -> &str {
        FINAL_REPORT_TASK
    }

    #[instrument(name = "task.final_report", skip(self, context))]
    async fn run(&self, context: Context) -> graph_flow::Result<TaskResult> {
        let claim: String = context.get(CLAIM_KEY).await.unwrap_or_default();
        let triage: Triage = context.get(TRIAGE_KEY).await.unwrap_or_default();
        let summaries: Vec<LaneSummary> = context.get(SUMMARIES_KEY).await.unwrap_or_default();

        let report: FinalReport = synthesize(&claim, &triage, summaries);
        let markdown = report.to_markdown();

        metrics::record_verification(report.overall_assessment.as_str(), report.lanes.len());
        info!(
            assessment = report.overall_assessment.as_str(),
            confidence = report.confidence_level.as_str(),
            risk = report.risk_level.as_str(),
            "final report synthesized"
        );

        append_trace(
            &context,
            [TraceEvent::new(
                FINAL_REPORT_TASK,
                format!(
                    "{} ({} confidence, {} risk)",
                    report.overall_assessment.as_str(),
                    report.confidence_level.as_str(),
                    report.risk_level.as_str()
                ),
            )],
        )
        .await;
        context.set(REPORT_KEY, &report).await;
        context.set(MARKDOWN_KEY, &markdown).await;

        Ok(TaskResult::new(Some(markdown), NextAction::End))
    }
}
