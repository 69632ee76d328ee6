use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use claimcheck_core::{
    AuditLog, ConfigLoader, FinalReport, SourceSet, TelemetryOptions, TraceEvent, TriagePolicy,
    VerificationOutcome, VerifyOptions, init_metrics_from_env, init_telemetry,
    load_session_report, run_verification_session,
};
use graph_flow::InMemorySessionStorage;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::{
    net::TcpListener,
    signal,
    sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError},
};
use tracing::info;

#[derive(Clone)]
struct AppState {
    storage: Arc<InMemorySessionStorage>,
    sources: SourceSet,
    policy: TriagePolicy,
    audit_log: Option<AuditLog>,
    trace_dir: PathBuf,
    session_permits: Arc<Semaphore>,
    max_sessions: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ConfigLoader::load(None)?;
    init_telemetry(
        TelemetryOptions::default()
            .with_level(config.logging.level.clone())
            .with_ansi(false),
    )?;
    init_metrics_from_env("claimcheck-api");

    let addr: SocketAddr = std::env::var("CLAIMCHECK_API_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()
        .context("invalid CLAIMCHECK_API_ADDR")?;

    let credentials = config.credentials();
    let sources = SourceSet::from_config(&config, &credentials)
        .context("failed to build data-source clients")?;

    let trace_dir = std::env::var("CLAIMCHECK_TRACE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("data/traces"));

    let session_limit = std::env::var("CLAIMCHECK_MAX_CONCURRENT_SESSIONS")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|limit| *limit > 0)
        .unwrap_or(5);

    let state = AppState {
        storage: Arc::new(InMemorySessionStorage::new()),
        sources,
        policy: config.triage.policy,
        audit_log: AuditLog::from_config(&config.logging),
        trace_dir,
        session_permits: Arc::new(Semaphore::new(session_limit)),
        max_sessions: session_limit,
    };

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/verify", post(handle_verify))
        .route("/session/:id", get(handle_session))
        .with_state(state);

    info!("ClaimCheck API listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, stopping server");
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
enum ExplainFormat {
    #[default]
    Markdown,
    Mermaid,
}

impl ExplainFormat {
    fn render(self, outcome: &VerificationOutcome) -> String {
        match self {
            ExplainFormat::Markdown => outcome.explain_markdown(),
            ExplainFormat::Mermaid => outcome.explain_mermaid(),
        }
    }

    fn label(self) -> &'static str {
        match self {
            ExplainFormat::Markdown => "markdown",
            ExplainFormat::Mermaid => "mermaid",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(error: E) -> Self {
        AppError::new(StatusCode::INTERNAL_SERVER_ERROR, error.into().to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, AppError>;

fn acquire_session_permit(state: &AppState) -> ApiResult<OwnedSemaphorePermit> {
    match state.session_permits.clone().try_acquire_owned() {
        Ok(permit) => Ok(permit),
        Err(TryAcquireError::NoPermits) => Err(AppError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "verification capacity reached; retry once a slot frees up",
        )),
        Err(TryAcquireError::Closed) => Err(AppError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "verification executor unavailable",
        )),
    }
}

#[derive(Debug, Deserialize)]
struct VerifyRequest {
    claim: String,
    session_id: Option<String>,
    policy: Option<TriagePolicy>,
    explain: Option<bool>,
    explain_format: Option<ExplainFormat>,
    persist_trace: Option<bool>,
}

#[derive(Debug, Serialize)]
struct SessionPayload {
    session_id: String,
    overall_assessment: &'static str,
    report: FinalReport,
    markdown: Option<String>,
    trace_path: Option<String>,
    explanation: Option<String>,
    explanation_format: Option<String>,
    trace_events: Vec<TraceEvent>,
}

impl SessionPayload {
    fn build(
        outcome: VerificationOutcome,
        include_markdown: bool,
        explain: Option<ExplainFormat>,
    ) -> Self {
        let (explanation, explanation_format) = match explain {
            Some(format) => (
                Some(format.render(&outcome)),
                Some(format.label().to_string()),
            ),
            None => (None, None),
        };

        Self {
            session_id: outcome.session_id,
            overall_assessment: outcome.report.overall_assessment.as_str(),
            report: outcome.report,
            markdown: include_markdown.then_some(outcome.markdown),
            trace_path: outcome
                .trace_path
                .as_ref()
                .map(|path| path.display().to_string()),
            explanation,
            explanation_format,
            trace_events: outcome.trace_events,
        }
    }
}

#[derive(Debug, Serialize)]
struct CapacityReport {
    max_sessions: usize,
    available_sessions: usize,
    active_sessions: usize,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    capacity: CapacityReport,
    triage_policy: &'static str,
}

fn capacity_report(state: &AppState) -> CapacityReport {
    let available = state.session_permits.available_permits();
    let active = state.max_sessions.saturating_sub(available);
    CapacityReport {
        max_sessions: state.max_sessions,
        available_sessions: available,
        active_sessions: active,
    }
}

async fn handle_health(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    Ok(Json(HealthResponse {
        status: "ok",
        capacity: capacity_report(&state),
        triage_policy: state.policy.as_str(),
    }))
}

#[derive(Debug, Deserialize)]
struct SessionQuery {
    explain: Option<bool>,
    explain_format: Option<ExplainFormat>,
    include_markdown: Option<bool>,
}

async fn handle_verify(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> ApiResult<Json<SessionPayload>> {
    if request.claim.trim().is_empty() {
        return Err(AppError::new(
            StatusCode::BAD_REQUEST,
            "claim must not be empty",
        ));
    }

    let _permit = acquire_session_permit(&state)?;
    let mut options = VerifyOptions::new(&request.claim)
        .with_policy(request.policy.unwrap_or(state.policy))
        .with_shared_storage(state.storage.clone());

    if let Some(session_id) = request.session_id {
        options = options.with_session_id(session_id);
    }
    if request.persist_trace.unwrap_or(false) {
        options = options.with_trace_output_dir(state.trace_dir.clone());
    }
    if let Some(audit_log) = state.audit_log.clone() {
        options = options.with_audit_log(audit_log);
    }

    let outcome = run_verification_session(state.sources.clone(), options)
        .await
        .map_err(AppError::from)?;

    let explain = request
        .explain
        .unwrap_or(false)
        .then(|| request.explain_format.unwrap_or_default());

    Ok(Json(SessionPayload::build(outcome, true, explain)))
}

async fn handle_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<SessionQuery>,
) -> ApiResult<Json<SessionPayload>> {
    let outcome = load_session_report(&*state.storage, &session_id)
        .await
        .map_err(AppError::from)?
        .ok_or_else(|| {
            AppError::new(
                StatusCode::NOT_FOUND,
                format!("session {session_id} not found"),
            )
        })?;

    let explain = query
        .explain
        .unwrap_or(false)
        .then(|| query.explain_format.unwrap_or_default());

    Ok(Json(SessionPayload::build(
        outcome,
        query.include_markdown.unwrap_or(false),
        explain,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use claimcheck_core::{Config, Credentials};

    fn test_state(limit: usize) -> AppState {
        let config = Config::default();
        AppState {
            storage: Arc::new(InMemorySessionStorage::new()),
            sources: SourceSet::from_config(&config, &Credentials::default())
                .expect("clients build"),
            policy: TriagePolicy::Multi,
            audit_log: None,
            trace_dir: PathBuf::from("data/traces"),
            session_permits: Arc::new(Semaphore::new(limit)),
            max_sessions: limit,
        }
    }

    #[test]
    fn capacity_limit_returns_429() {
        let state = test_state(1);

        let permit = acquire_session_permit(&state).expect("first permit should succeed");
        let err = acquire_session_permit(&state).expect_err("second permit should fail");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        drop(permit);

        assert!(acquire_session_permit(&state).is_ok());
    }

    #[test]
    fn capacity_report_counts_active_sessions() {
        let state = test_state(3);
        let _permit = acquire_session_permit(&state).expect("permit");

        let report = capacity_report(&state);
        assert_eq!(report.max_sessions, 3);
        assert_eq!(report.available_sessions, 2);
        assert_eq!(report.active_sessions, 1);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let state = test_state(1);
        let err = handle_session(
            State(state),
            Path("missing".to_string()),
            Query(SessionQuery {
                explain: None,
                explain_format: None,
                include_markdown: None,
            }),
        )
        .await
        .expect_err("lookup should fail");
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
