//! ClaimCheck core: multi-lane claim verification built on `graph_flow`.
//!
//! A claim is triaged into news, fact and scam lanes. Each lane fans out to
//! its data-source workers, merges their envelopes with a deterministic
//! rubric, and the final task synthesizes one report across the lanes.

pub mod analysis;
mod config;
mod envelope;
mod error;
pub mod lanes;
mod logging;
mod metrics;
mod query;
mod render;
mod report;
mod router;
mod security;
pub mod sources;
mod tasks;
mod telemetry;
mod trace;
mod workflow;

pub use config::{
    Config, ConfigLoader, CredentialCheck, Credentials, FactcheckConfig, GnewsConfig,
    LoggingConfig, PerplexityConfig, SourcesConfig, TriageConfig, VirusTotalConfig,
};
pub use envelope::Envelope;
pub use error::{ClaimCheckError, SourceError};
pub use lanes::{Lane, LaneSummary, LaneVerdict, RiskLevel};
pub use logging::{AuditLog, VerificationLogInput};
pub use metrics::init_metrics_from_env;
pub use query::derive_news_query;
pub use report::{
    ConfidenceLevel, FinalReport, OverallAssessment, Recommendations, SourcesSummary, synthesize,
};
pub use router::{Router, Triage, TriagePolicy};
pub use security::{SecretValue, optional_env, require_env};
pub use sources::SourceSet;
pub use tasks::{FINAL_REPORT_TASK, FinalReportTask, LANES_TASK, LaneDispatchTask, TRIAGE_TASK, TriageTask};
pub use telemetry::{TelemetryOptions, init_telemetry};
pub use trace::{TraceCollector, TraceEvent, TraceStep, TraceSummary, persist_trace};
pub use workflow::{
    VerificationOutcome, VerifyOptions, load_session_report, run_verification_session,
};
