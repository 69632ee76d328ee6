//! Append-only JSONL audit log of completed verifications.

use std::collections::BTreeSet;
use std::fs::{self, OpenOptions, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use tracing::warn;

use crate::config::LoggingConfig;

static REDACTION_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            "api_key",
            Regex::new(r"(?i)(api[_-]?key\s*[:=]\s*)([A-Za-z0-9\-_.+/]+)")
                .expect("invalid api_key regex"),
        ),
        (
            "query_token",
            Regex::new(r"(?i)([?&](?:token|key|apikey)=)([^&\s]+)").expect("invalid token regex"),
        ),
        (
            "bearer",
            Regex::new(r"(?i)(bearer\s+)([A-Za-z0-9\-_.+=/]+)").expect("invalid bearer regex"),
        ),
        (
            "sk_token",
            Regex::new(r"(pplx-[A-Za-z0-9]{16,}|sk-[A-Za-z0-9]{16,})")
                .expect("invalid sk_token regex"),
        ),
    ]
});

/// What a completed verification contributes to the audit log.
#[derive(Debug, Clone)]
pub struct VerificationLogInput {
    pub session_id: String,
    pub claim: String,
    pub overall_assessment: String,
    pub confidence_level: String,
    pub risk_level: String,
    pub lanes: Vec<String>,
    pub degraded_lanes: Vec<String>,
    pub sources: Vec<String>,
    pub trace_path: Option<String>,
}

#[derive(Serialize)]
struct VerificationLogRecord {
    timestamp: String,
    session_id: String,
    claim: String,
    overall_assessment: String,
    confidence_level: String,
    risk_level: String,
    lanes: Vec<String>,
    degraded_lanes: Vec<String>,
    sources: Vec<String>,
    trace_path: Option<String>,
    redactions: Vec<String>,
}

#[derive(Serialize)]
struct AuditLogRecord {
    timestamp: String,
    session_id: String,
    redactions: Vec<String>,
}

/// Month-partitioned session log rooted at a configured directory.
#[derive(Debug, Clone)]
pub struct AuditLog {
    dir: PathBuf,
    retention_days: u64,
}

impl AuditLog {
    pub fn new(dir: impl Into<PathBuf>, retention_days: u64) -> Self {
        Self {
            dir: dir.into(),
            retention_days,
        }
    }

    /// `None` when persistence is switched off.
    pub fn from_config(config: &LoggingConfig) -> Option<Self> {
        config
            .persist
            .then(|| Self::new(config.dir.clone(), config.retention_days))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append one record and return the session log path it went to.
    pub fn record(&self, input: VerificationLogInput) -> Result<PathBuf> {
        self.record_at(input, Utc::now())
    }

    fn record_at(&self, input: VerificationLogInput, timestamp: DateTime<Utc>) -> Result<PathBuf> {
        let mut redactions = BTreeSet::new();
        let claim = sanitize_text(&input.claim, &mut redactions);
        let sources: Vec<String> = input
            .sources
            .iter()
            .map(|source| sanitize_text(source, &mut redactions))
            .collect();

        let record = VerificationLogRecord {
            timestamp: timestamp.to_rfc3339(),
            session_id: input.session_id.clone(),
            claim,
            overall_assessment: input.overall_assessment,
            confidence_level: input.confidence_level,
            risk_level: input.risk_level,
            lanes: input.lanes,
            degraded_lanes: input.degraded_lanes,
            sources,
            trace_path: input.trace_path,
            redactions: redactions.into_iter().collect(),
        };

        let month_dir = self
            .dir
            .join(format!("{:04}", timestamp.year()))
            .join(format!("{:02}", timestamp.month()));
        let session_log_path = month_dir.join("session.jsonl");
        append_json_line(&session_log_path, &record)?;

        if !record.redactions.is_empty() {
            let audit = AuditLogRecord {
                timestamp: record.timestamp.clone(),
                session_id: record.session_id.clone(),
                redactions: record.redactions.clone(),
            };
            append_json_line(&month_dir.join("audit.jsonl"), &audit)?;
            warn!(
                session_id = %record.session_id,
                fields = ?record.redactions,
                "redacted potential secrets from session log"
            );
        }

        self.enforce_retention()?;
        Ok(session_log_path)
    }

    fn enforce_retention(&self) -> Result<()> {
        if self.retention_days == 0 || !self.dir.exists() {
            return Ok(());
        }
        let cutoff = SystemTime::now()
            .checked_sub(Duration::from_secs(self.retention_days.saturating_mul(86_400)))
            .unwrap_or(SystemTime::UNIX_EPOCH);
        prune_directory(&self.dir, cutoff)
    }
}

fn append_json_line<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let line = serde_json::to_string(value)?;
    writeln!(writer, "{line}")
        .with_context(|| format!("failed to append log entry to {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

fn sanitize_text(input: &str, redactions: &mut BTreeSet<String>) -> String {
    let mut output = input.to_string();
    for (name, regex) in REDACTION_PATTERNS.iter() {
        let mut matched = false;
        output = regex
            .replace_all(&output, |caps: &Captures| {
                matched = true;
                if caps.len() > 2 {
                    format!("{}[REDACTED]", &caps[1])
                } else {
                    "[REDACTED]".to_string()
                }
            })
            .to_string();
        if matched {
            redactions.insert(name.to_string());
        }
    }
    output
}

fn prune_directory(dir: &Path, cutoff: SystemTime) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let metadata = entry.metadata()?;
        if metadata.is_dir() {
            prune_directory(&path, cutoff)?;
            if path.read_dir()?.next().is_none() {
                fs::remove_dir(&path).ok();
            }
        } else if metadata.is_file()
            && metadata
                .modified()
                .map(|time| time < cutoff)
                .unwrap_or(false)
        {
            fs::remove_file(&path).ok();
        }
    }
    Ok(())
}
