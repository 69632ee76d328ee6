//! Verification lanes: worker fan-out plus a deterministic merge rubric each.

pub mod fact;
pub mod news;
pub mod scam;
mod worker;

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analysis::{ClaimCategory, Stance, classify_category};
use crate::envelope::Envelope;
use crate::metrics;
use crate::sources::SourceSet;
use crate::trace::{TraceCollector, TraceEvent};

pub use fact::{FactSlots, FactVerdict};
pub use news::{NewsSlots, NewsVerdict};
pub use scam::{ScamSlots, ScamVerdict, UrlBand};

/// Prefix shared by every note acknowledging a failed worker.
pub const GAP_NOTE_PREFIX: &str = "Gap in coverage:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    News,
    Fact,
    Scam,
}

impl Lane {
    pub const ALL: [Lane; 3] = [Lane::News, Lane::Fact, Lane::Scam];

    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::News => "news",
            Lane::Fact => "fact",
            Lane::Scam => "scam",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Lane::News => "News Verification",
            Lane::Fact => "Fact Check",
            Lane::Scam => "Scam Detection",
        }
    }

    pub fn slots(&self) -> &'static [Slot] {
        match self {
            Lane::News => &[Slot::NewsApi, Slot::NewsFact, Slot::NewsResearch],
            Lane::Fact => &[Slot::FactPrimary, Slot::FactResearch],
            Lane::Scam => &[Slot::ScamLink, Slot::ScamResearch, Slot::ScamSentiment],
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named result slot of one worker within a lane run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    NewsApi,
    NewsFact,
    NewsResearch,
    FactPrimary,
    FactResearch,
    ScamLink,
    ScamResearch,
    ScamSentiment,
}

impl Slot {
    pub fn name(&self) -> &'static str {
        match self {
            Slot::NewsApi => "news_api",
            Slot::NewsFact => "news_fact",
            Slot::NewsResearch => "news_research",
            Slot::FactPrimary => "fact_primary",
            Slot::FactResearch => "fact_research",
            Slot::ScamLink => "scam_link",
            Slot::ScamResearch => "scam_research",
            Slot::ScamSentiment => "scam_sentiment",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Slot::NewsApi => "news search",
            Slot::NewsFact | Slot::FactPrimary => "fact-check registry",
            Slot::NewsResearch | Slot::FactResearch => "research",
            Slot::ScamLink => "URL reputation scan",
            Slot::ScamResearch => "scam pattern research",
            Slot::ScamSentiment => "manipulation analysis",
        }
    }

    pub fn lane(&self) -> Lane {
        match self {
            Slot::NewsApi | Slot::NewsFact | Slot::NewsResearch => Lane::News,
            Slot::FactPrimary | Slot::FactResearch => Lane::Fact,
            Slot::ScamLink | Slot::ScamResearch | Slot::ScamSentiment => Lane::Scam,
        }
    }
}

/// Truth reading of a news or fact verdict, used for cross-lane comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Truth {
    True,
    False,
    Mixed,
    Unverified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaneVerdict {
    News(NewsVerdict),
    Fact(FactVerdict),
    Scam(ScamVerdict),
}

impl LaneVerdict {
    pub fn unverified(lane: Lane) -> Self {
        match lane {
            Lane::News => LaneVerdict::News(NewsVerdict::Unverified),
            Lane::Fact => LaneVerdict::Fact(FactVerdict::Unverified),
            Lane::Scam => LaneVerdict::Scam(ScamVerdict::Unverified),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LaneVerdict::News(verdict) => verdict.as_str(),
            LaneVerdict::Fact(verdict) => verdict.as_str(),
            LaneVerdict::Scam(verdict) => verdict.as_str(),
        }
    }

    /// `None` for scam verdicts, which rate intent rather than truth.
    pub fn truth(&self) -> Option<Truth> {
        match self {
            LaneVerdict::News(verdict) => Some(verdict.truth()),
            LaneVerdict::Fact(verdict) => Some(verdict.truth()),
            LaneVerdict::Scam(_) => None,
        }
    }
}

/// How many distinct outlets covered a news claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coverage {
    Widespread,
    Limited,
    None,
}

impl Coverage {
    pub fn from_outlets(distinct: usize) -> Self {
        match distinct {
            0 => Coverage::None,
            1..=2 => Coverage::Limited,
            _ => Coverage::Widespread,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Coverage::Widespread => "widespread",
            Coverage::Limited => "limited",
            Coverage::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Minimal,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Minimal => "minimal",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// Lane-specific classification: coverage (news), category (fact), risk (scam).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Coverage(Coverage),
    Category(ClaimCategory),
    Risk(RiskLevel),
}

impl Classification {
    pub fn heading(&self) -> &'static str {
        match self {
            Classification::Coverage(_) => "Coverage",
            Classification::Category(_) => "Category",
            Classification::Risk(_) => "Risk Level",
        }
    }

    pub fn value(&self) -> &'static str {
        match self {
            Classification::Coverage(coverage) => coverage.as_str(),
            Classification::Category(category) => category.as_str(),
            Classification::Risk(risk) => risk.as_str(),
        }
    }

    pub fn risk(&self) -> Option<RiskLevel> {
        match self {
            Classification::Risk(risk) => Some(*risk),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    NewsArticle,
    FactCheck,
    UrlScan,
    Research,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLink {
    pub label: String,
    pub url: String,
    pub kind: SourceKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailSection {
    pub title: String,
    pub lines: Vec<String>,
}

impl DetailSection {
    pub fn new(title: impl Into<String>, lines: Vec<String>) -> Self {
        Self {
            title: title.into(),
            lines,
        }
    }
}

/// Merged, immutable result of one lane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneSummary {
    pub lane: Lane,
    pub verdict: LaneVerdict,
    pub confidence: f32,
    pub classification: Classification,
    pub findings: Vec<String>,
    pub sources: Vec<SourceLink>,
    pub notes: Vec<String>,
    pub degraded: bool,
    pub error_summary: Vec<String>,
    pub details: Vec<DetailSection>,
}

impl LaneSummary {
    /// Fixed summary for a lane whose every worker failed.
    pub fn degraded(lane: Lane, claim: &str, errors: &[(Slot, String)]) -> Self {
        let classification = match lane {
            Lane::News => Classification::Coverage(Coverage::None),
            Lane::Fact => Classification::Category(classify_category(claim)),
            Lane::Scam => Classification::Risk(RiskLevel::Medium),
        };
        Self {
            lane,
            verdict: LaneVerdict::unverified(lane),
            confidence: 0.0,
            classification,
            findings: vec![format!(
                "All {} data sources failed; no verdict could be formed",
                errors.len()
            )],
            sources: Vec::new(),
            notes: errors
                .iter()
                .map(|(slot, error)| gap_note(*slot, error))
                .collect(),
            degraded: true,
            error_summary: errors
                .iter()
                .map(|(slot, error)| format!("{}: {error}", slot.name()))
                .collect(),
            details: Vec::new(),
        }
    }

    /// Notes that acknowledge a failed worker.
    pub fn gap_notes(&self) -> impl Iterator<Item = &String> {
        self.notes
            .iter()
            .filter(|note| note.starts_with(GAP_NOTE_PREFIX))
    }
}

pub(crate) fn gap_note(slot: Slot, error: &str) -> String {
    format!(
        "{GAP_NOTE_PREFIX} {} ({}) failed: {error}",
        slot.label(),
        slot.name()
    )
}

/// Ordered source list that keeps the first occurrence of each exact URL.
#[derive(Debug, Default)]
pub(crate) struct SourceList {
    links: Vec<SourceLink>,
}

impl SourceList {
    pub(crate) fn push(&mut self, label: impl Into<String>, url: &str, kind: SourceKind) {
        let url = url.trim();
        if url.is_empty() || self.links.iter().any(|link| link.url == url) {
            return;
        }
        self.links.push(SourceLink {
            label: label.into(),
            url: url.to_string(),
            kind,
        });
    }

    pub(crate) fn into_vec(self) -> Vec<SourceLink> {
        self.links
    }
}

pub(crate) fn outcome<T>(envelope: &Envelope<T>) -> Result<(), String> {
    match envelope.error_message() {
        Some(error) => Err(error.to_string()),
        None => Ok(()),
    }
}

pub(crate) fn stance_phrase(stance: Stance) -> &'static str {
    match stance {
        Stance::Supports => "supports",
        Stance::Refutes => "refutes",
        Stance::Partial => "partly supports",
        Stance::Misleading => "calls misleading",
        Stance::Inconclusive => "is inconclusive on",
    }
}

pub(crate) fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

/// Summary plus the trace events recorded while producing it.
#[derive(Debug, Clone)]
pub struct LaneRun {
    pub summary: LaneSummary,
    pub events: Vec<TraceEvent>,
}

/// Fan a lane out to its workers, wait for all of them, then merge.
pub async fn run_lane(lane: Lane, claim: &str, sources: &SourceSet) -> LaneRun {
    let task_id = format!("lane.{lane}");
    let mut trace = TraceCollector::new();
    trace.record(&task_id, format!("fan-out to {} workers", lane.slots().len()));

    let (summary, outcomes) = match lane {
        Lane::News => {
            let slots = news::fan_out(claim, sources).await;
            (news::merge(claim, &slots), slots.outcomes())
        }
        Lane::Fact => {
            let slots = fact::fan_out(claim, sources).await;
            (fact::merge(claim, &slots), slots.outcomes())
        }
        Lane::Scam => {
            let slots = scam::fan_out(claim, sources).await;
            (scam::merge(claim, &slots), slots.outcomes())
        }
    };

    for (slot, outcome) in outcomes {
        match outcome {
            Ok(()) => trace.record(&task_id, format!("{}: success", slot.name())),
            Err(error) => trace.record(&task_id, format!("{}: error ({error})", slot.name())),
        }
    }
    trace.record(
        &task_id,
        format!(
            "merged [{}] confidence {:.2}",
            summary.verdict.label(),
            summary.confidence
        ),
    );

    if summary.degraded {
        metrics::record_degraded_lane(lane);
        warn!(lane = %lane, errors = summary.error_summary.len(), "lane degraded: every worker failed");
    } else {
        info!(
            lane = %lane,
            verdict = summary.verdict.label(),
            confidence = summary.confidence,
            gaps = summary.gap_notes().count(),
            "lane merged"
        );
    }

    LaneRun {
        summary,
        events: trace.into_events(),
    }
}
