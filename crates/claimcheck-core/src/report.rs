//! Final synthesis across whichever lanes ran.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lanes::{
    Lane, LaneSummary, LaneVerdict, RiskLevel, ScamVerdict, SourceKind, Truth,
};
use crate::router::Triage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallAssessment {
    Verified,
    Refuted,
    Mixed,
    Suspicious,
    ScamDetected,
    Unverified,
    InsufficientData,
}

impl OverallAssessment {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallAssessment::Verified => "VERIFIED",
            OverallAssessment::Refuted => "REFUTED",
            OverallAssessment::Mixed => "MIXED",
            OverallAssessment::Suspicious => "SUSPICIOUS",
            OverallAssessment::ScamDetected => "SCAM DETECTED",
            OverallAssessment::Unverified => "UNVERIFIED",
            OverallAssessment::InsufficientData => "INSUFFICIENT DATA",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    /// Band the mean lane confidence.
    pub fn from_mean(mean: f32) -> Self {
        if mean >= 0.75 {
            ConfidenceLevel::High
        } else if mean >= 0.5 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "HIGH",
            ConfidenceLevel::Medium => "MEDIUM",
            ConfidenceLevel::Low => "LOW",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneSourceCount {
    pub lane: Lane,
    pub sources: usize,
}

/// Source counts taken from the lane summaries that exist, never estimated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcesSummary {
    pub news_articles: usize,
    pub fact_checks: usize,
    pub url_scans: usize,
    pub research_citations: usize,
    pub total: usize,
    pub per_lane: Vec<LaneSourceCount>,
}

impl SourcesSummary {
    fn from_lanes(lanes: &[LaneSummary]) -> Self {
        let mut summary = SourcesSummary::default();
        for lane in lanes {
            for source in &lane.sources {
                match source.kind {
                    SourceKind::NewsArticle => summary.news_articles += 1,
                    SourceKind::FactCheck => summary.fact_checks += 1,
                    SourceKind::UrlScan => summary.url_scans += 1,
                    SourceKind::Research => summary.research_citations += 1,
                }
            }
            summary.total += lane.sources.len();
            summary.per_lane.push(LaneSourceCount {
                lane: lane.lane,
                sources: lane.sources.len(),
            });
        }
        summary
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendations {
    pub general: Vec<String>,
    pub further_investigation: Vec<String>,
}

/// Top-level report combining every lane that ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    pub claim: String,
    pub generated_at: DateTime<Utc>,
    pub executive_summary: String,
    pub overall_assessment: OverallAssessment,
    pub confidence_level: ConfidenceLevel,
    pub risk_level: RiskLevel,
    pub triage_rationale: Vec<String>,
    pub lanes: Vec<LaneSummary>,
    pub cross_lane_notes: Vec<String>,
    pub recommendations: Recommendations,
    pub sources_summary: SourcesSummary,
}

impl FinalReport {
    pub fn lane(&self, lane: Lane) -> Option<&LaneSummary> {
        self.lanes.iter().find(|summary| summary.lane == lane)
    }
}

/// Combine the lane summaries produced for `claim` into the final report.
pub fn synthesize(claim: &str, triage: &Triage, mut lanes: Vec<LaneSummary>) -> FinalReport {
    lanes.sort_by_key(|summary| summary.lane);

    let overall_assessment = assess(&lanes);
    let confidence_level = if lanes.is_empty() {
        ConfidenceLevel::Low
    } else {
        let mean = lanes.iter().map(|summary| summary.confidence).sum::<f32>() / lanes.len() as f32;
        ConfidenceLevel::from_mean(mean)
    };
    let risk_level = lanes
        .iter()
        .map(lane_risk)
        .max()
        .unwrap_or(RiskLevel::Low);

    let cross_lane_notes = cross_reference(&lanes);
    let recommendations = recommend(overall_assessment, risk_level, &lanes);
    let sources_summary = SourcesSummary::from_lanes(&lanes);
    let executive_summary =
        executive_summary(&lanes, overall_assessment, confidence_level, risk_level);

    FinalReport {
        claim: claim.to_string(),
        generated_at: Utc::now(),
        executive_summary,
        overall_assessment,
        confidence_level,
        risk_level,
        triage_rationale: triage.rationale.clone(),
        lanes,
        cross_lane_notes,
        recommendations,
        sources_summary,
    }
}

fn scam_verdict(lanes: &[LaneSummary]) -> Option<ScamVerdict> {
    lanes
        .iter()
        .filter(|summary| !summary.degraded)
        .find_map(|summary| match summary.verdict {
            LaneVerdict::Scam(verdict) => Some(verdict),
            _ => None,
        })
}

fn assess(lanes: &[LaneSummary]) -> OverallAssessment {
    if lanes.is_empty() {
        return OverallAssessment::InsufficientData;
    }
    let scam = scam_verdict(lanes);
    if scam == Some(ScamVerdict::Scam) {
        return OverallAssessment::ScamDetected;
    }
    if lanes.iter().all(|summary| summary.degraded) {
        return OverallAssessment::InsufficientData;
    }

    let truths: Vec<Truth> = lanes
        .iter()
        .filter(|summary| !summary.degraded)
        .filter_map(|summary| summary.verdict.truth())
        .filter(|truth| *truth != Truth::Unverified)
        .collect();
    let has_true = truths.contains(&Truth::True);
    let has_false = truths.contains(&Truth::False);

    if (has_true && has_false) || truths.contains(&Truth::Mixed) {
        return OverallAssessment::Mixed;
    }
    if scam.is_some_and(|verdict| verdict.is_suspicious()) {
        return if has_true {
            OverallAssessment::Mixed
        } else {
            OverallAssessment::Suspicious
        };
    }
    if has_false {
        OverallAssessment::Refuted
    } else if has_true {
        OverallAssessment::Verified
    } else if scam.is_some_and(|verdict| verdict.is_legitimate()) {
        OverallAssessment::Verified
    } else {
        OverallAssessment::Unverified
    }
}

fn lane_risk(summary: &LaneSummary) -> RiskLevel {
    if let Some(risk) = summary.classification.risk() {
        return risk;
    }
    if summary.degraded {
        return RiskLevel::Medium;
    }
    match summary.verdict.truth() {
        Some(Truth::False) | Some(Truth::Mixed) => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}

fn cross_reference(lanes: &[LaneSummary]) -> Vec<String> {
    let mut notes = Vec::new();
    let truth_of = |lane: Lane| {
        lanes
            .iter()
            .find(|summary| summary.lane == lane && !summary.degraded)
            .and_then(|summary| summary.verdict.truth().map(|truth| (summary, truth)))
    };

    if let (Some((news, news_truth)), Some((fact, fact_truth))) =
        (truth_of(Lane::News), truth_of(Lane::Fact))
    {
        if news_truth == fact_truth {
            notes.push(format!(
                "News and fact lanes agree: both read the claim as {}",
                news.verdict.label()
            ));
        } else if news_truth != Truth::Unverified && fact_truth != Truth::Unverified {
            notes.push(format!(
                "Conflict: the news lane reads the claim as {} while the fact lane reads it as {}",
                news.verdict.label(),
                fact.verdict.label()
            ));
        } else {
            notes.push(format!(
                "News lane ({}) and fact lane ({}) could not corroborate each other",
                news.verdict.label(),
                fact.verdict.label()
            ));
        }
    }

    if let Some(scam) = scam_verdict(lanes).filter(|verdict| {
        matches!(
            verdict,
            ScamVerdict::Scam | ScamVerdict::HighlySuspicious | ScamVerdict::Suspicious
        )
    }) {
        for lane in [Lane::News, Lane::Fact] {
            if let Some((_, Truth::True)) = truth_of(lane) {
                notes.push(format!(
                    "Conflict: the {lane} lane finds the claim true, but the scam lane flags the \
                     content as {}; treat the links and requests in it with caution",
                    scam.as_str()
                ));
            }
        }
    }

    for summary in lanes {
        if summary.degraded {
            notes.push(format!(
                "Gaps in coverage: the {} lane produced no verdict because all of its sources failed",
                summary.lane
            ));
        } else {
            let gaps = summary.gap_notes().count();
            if gaps > 0 {
                notes.push(format!(
                    "Gaps in coverage: the {} lane ran without {gaps} of its {} sources",
                    summary.lane,
                    summary.lane.slots().len()
                ));
            }
        }
    }

    notes
}

fn recommend(
    assessment: OverallAssessment,
    risk: RiskLevel,
    lanes: &[LaneSummary],
) -> Recommendations {
    let mut recs = Recommendations::default();

    match risk {
        RiskLevel::Critical | RiskLevel::High => {
            recs.general.extend([
                "Do not click links or reply to the message".to_string(),
                "Never share passwords, codes or payment details in response".to_string(),
                "Report the message to the impersonated organisation or a consumer protection agency"
                    .to_string(),
            ]);
            recs.further_investigation
                .push("Contact the organisation through a channel you already trust".to_string());
        }
        RiskLevel::Medium => {
            recs.general
                .push("Treat the claim with caution until it is corroborated".to_string());
            recs.general
                .push("Check official sources before acting on or sharing it".to_string());
            recs.further_investigation
                .push("Look for coverage from additional established outlets".to_string());
        }
        RiskLevel::Low | RiskLevel::Minimal => {
            recs.general
                .push("No significant risk indicators found; normal caution applies".to_string());
        }
    }

    match assessment {
        OverallAssessment::Refuted => recs
            .general
            .push("Do not share this claim; authoritative sources contradict it".to_string()),
        OverallAssessment::Mixed => recs
            .general
            .push("Read the full context; the available sources disagree".to_string()),
        OverallAssessment::InsufficientData if lanes.is_empty() => recs.further_investigation.push(
            "Rephrase the input as a specific claim, news item or message to check".to_string(),
        ),
        _ => {}
    }

    if lanes.iter().any(|summary| !summary.sources.is_empty()) {
        recs.further_investigation
            .push("Review the cited sources for full context".to_string());
    }
    if lanes
        .iter()
        .any(|summary| summary.degraded || summary.gap_notes().next().is_some())
    {
        recs.further_investigation
            .push("Re-run the check once the failed data sources are available".to_string());
    }

    recs
}

fn executive_summary(
    lanes: &[LaneSummary],
    assessment: OverallAssessment,
    confidence: ConfidenceLevel,
    risk: RiskLevel,
) -> String {
    if lanes.is_empty() {
        return "No verification lane was applicable to this input, so no data sources were \
                queried and no verdict was formed."
            .to_string();
    }

    let per_lane = lanes
        .iter()
        .map(|summary| {
            format!(
                "{} lane: {} ({:.2})",
                summary.lane,
                summary.verdict.label(),
                summary.confidence
            )
        })
        .collect::<Vec<_>>()
        .join("; ");
    format!(
        "Overall assessment {} with {} confidence and {} risk. {per_lane}.",
        assessment.as_str(),
        confidence.as_str().to_lowercase(),
        risk.as_str()
    )
}
