use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, anyhow, bail};
use graph_flow::{
    ExecutionStatus, FlowRunner, GraphBuilder, InMemorySessionStorage, Session, SessionStorage,
    Task,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::logging::{AuditLog, VerificationLogInput};
use crate::report::FinalReport;
use crate::router::{Router, TriagePolicy};
use crate::sources::SourceSet;
use crate::tasks::{
    ANY_LANE_KEY, CLAIM_KEY, FinalReportTask, LaneDispatchTask, MARKDOWN_KEY, REPORT_KEY,
    TRACE_KEY, TRIAGE_TASK, TriageTask,
};
use crate::trace::{TraceEvent, TraceSummary, persist_trace};

fn build_graph(router: Router, sources: SourceSet) -> Arc<graph_flow::Graph> {
    let triage = Arc::new(TriageTask::new(router));
    let lanes = Arc::new(LaneDispatchTask::new(sources));
    let final_report = Arc::new(FinalReportTask);

    let builder = GraphBuilder::new("claimcheck_verification")
        .add_task(triage.clone())
        .add_task(lanes.clone())
        .add_task(final_report.clone())
        .add_conditional_edge(
            triage.id(),
            |ctx| ctx.get_sync::<bool>(ANY_LANE_KEY).unwrap_or(false),
            lanes.id(),
            final_report.id(),
        )
        .add_edge(lanes.id(), final_report.id())
        .set_start_task(triage.id());

    Arc::new(builder.build())
}

fn new_session_id() -> String {
    format!("session-{}", Uuid::new_v4())
}

/// Options for one verification run.
pub struct VerifyOptions<'a> {
    pub claim: &'a str,
    pub session_id: Option<String>,
    pub policy: TriagePolicy,
    /// Share session storage with a caller that later looks sessions up.
    pub storage: Option<Arc<InMemorySessionStorage>>,
    pub trace_output_dir: Option<PathBuf>,
    pub audit_log: Option<AuditLog>,
}

impl<'a> VerifyOptions<'a> {
    pub fn new(claim: &'a str) -> Self {
        Self {
            claim,
            session_id: None,
            policy: TriagePolicy::default(),
            storage: None,
            trace_output_dir: None,
            audit_log: None,
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_policy(mut self, policy: TriagePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_shared_storage(mut self, storage: Arc<InMemorySessionStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_trace_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.trace_output_dir = Some(dir.into());
        self
    }

    pub fn with_audit_log(mut self, audit_log: AuditLog) -> Self {
        self.audit_log = Some(audit_log);
        self
    }
}

/// Report plus trace of a finished (or reloaded) session.
#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub session_id: String,
    pub report: FinalReport,
    pub markdown: String,
    pub trace_events: Vec<TraceEvent>,
    pub trace_path: Option<PathBuf>,
}

impl VerificationOutcome {
    pub fn trace_summary(&self) -> TraceSummary {
        TraceSummary::from_events(&self.trace_events)
    }

    pub fn explain_markdown(&self) -> String {
        self.trace_summary().render_markdown()
    }

    pub fn explain_mermaid(&self) -> String {
        self.trace_summary().render_mermaid()
    }
}

/// Verify one claim end to end: triage, lanes, final report.
pub async fn run_verification_session(
    sources: SourceSet,
    options: VerifyOptions<'_>,
) -> Result<VerificationOutcome> {
    let claim = options.claim.trim();
    if claim.is_empty() {
        bail!("claim must not be empty");
    }

    let graph = build_graph(Router::new(options.policy), sources);
    let storage = options
        .storage
        .clone()
        .unwrap_or_else(|| Arc::new(InMemorySessionStorage::new()));
    let runner = FlowRunner::new(graph, storage.clone());

    let session_id = options.session_id.clone().unwrap_or_else(new_session_id);
    let session = Session::new_from_task(session_id.clone(), TRIAGE_TASK);
    session.context.set(CLAIM_KEY, claim.to_string()).await;

    storage
        .save(session)
        .await
        .map_err(|err| anyhow!("failed to persist session: {err}"))?;

    loop {
        let result = runner
            .run(&session_id)
            .await
            .map_err(|err| anyhow!("graph execution failure: {err}"))?;

        match result.status {
            ExecutionStatus::Completed => break,
            ExecutionStatus::WaitingForInput => continue,
            ExecutionStatus::Error(message) => return Err(anyhow!(message)),
        }
    }

    let mut outcome = load_session_report(&*storage, &session_id)
        .await?
        .ok_or_else(|| anyhow!("session missing after execution"))?;

    if let Some(dir) = &options.trace_output_dir {
        let path = persist_trace(dir, &session_id, &outcome.trace_events)?;
        info!(session_id = %session_id, path = %path.display(), "trace persisted");
        outcome.trace_path = Some(path);
    }

    if let Some(audit_log) = &options.audit_log {
        let report = &outcome.report;
        let input = VerificationLogInput {
            session_id: session_id.clone(),
            claim: claim.to_string(),
            overall_assessment: report.overall_assessment.as_str().to_string(),
            confidence_level: report.confidence_level.as_str().to_string(),
            risk_level: report.risk_level.as_str().to_string(),
            lanes: report.lanes.iter().map(|s| s.lane.to_string()).collect(),
            degraded_lanes: report
                .lanes
                .iter()
                .filter(|s| s.degraded)
                .map(|s| s.lane.to_string())
                .collect(),
            sources: report
                .lanes
                .iter()
                .flat_map(|s| s.sources.iter().map(|source| source.url.clone()))
                .collect(),
            trace_path: outcome
                .trace_path
                .as_ref()
                .map(|path| path.display().to_string()),
        };
        if let Err(err) = audit_log.record(input) {
            warn!(session_id = %session_id, error = %err, "failed to append audit log entry");
        }
    }

    Ok(outcome)
}

/// Read a finished session's report back from storage.
///
/// `Ok(None)` when the session is unknown or has not produced a report yet.
pub async fn load_session_report<S>(
    storage: &S,
    session_id: &str,
) -> Result<Option<VerificationOutcome>>
where
    S: SessionStorage + ?Sized,
{
    let Some(session) = storage
        .get(session_id)
        .await
        .map_err(|err| anyhow!("failed to load session {session_id}: {err}"))?
    else {
        return Ok(None);
    };

    let Some(report) = session.context.get::<FinalReport>(REPORT_KEY).await else {
        return Ok(None);
    };
    let markdown = match session.context.get::<String>(MARKDOWN_KEY).await {
        Some(markdown) => markdown,
        None => report.to_markdown(),
    };
    let trace_events: Vec<TraceEvent> = session.context.get(TRACE_KEY).await.unwrap_or_default();

    Ok(Some(VerificationOutcome {
        session_id: session_id.to_string(),
        report,
        markdown,
        trace_events,
        trace_path: None,
    }))
}
