//! Scam lane: URL reputation, scam-pattern research and local manipulation analysis.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::worker::run_worker;
use super::{
    Classification, DetailSection, Lane, LaneSummary, LaneVerdict, RiskLevel, Slot, SourceKind,
    SourceList, excerpt, gap_note, outcome,
};
use crate::analysis::{
    ManipulationAnalysis, ManipulationLevel, PatternMatch, analyze_manipulation,
    assess_scam_pattern, extract_urls, outlet_domain,
};
use crate::envelope::Envelope;
use crate::error::SourceError;
use crate::sources::{ResearchAnswer, SourceSet, UrlReputation, UrlScan};

const EXCERPT_CHARS: usize = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScamVerdict {
    Scam,
    HighlySuspicious,
    Suspicious,
    LikelyLegitimate,
    Legitimate,
    Unverified,
}

impl ScamVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScamVerdict::Scam => "scam",
            ScamVerdict::HighlySuspicious => "highly_suspicious",
            ScamVerdict::Suspicious => "suspicious",
            ScamVerdict::LikelyLegitimate => "likely_legitimate",
            ScamVerdict::Legitimate => "legitimate",
            ScamVerdict::Unverified => "unverified",
        }
    }

    pub fn is_suspicious(&self) -> bool {
        matches!(
            self,
            ScamVerdict::HighlySuspicious | ScamVerdict::Suspicious
        )
    }

    pub fn is_legitimate(&self) -> bool {
        matches!(
            self,
            ScamVerdict::LikelyLegitimate | ScamVerdict::Legitimate
        )
    }
}

/// Reputation band of a URL by the number of vendors flagging it malicious.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlBand {
    Clean,
    PossibleFalsePositive,
    Suspicious,
    Malicious,
}

impl UrlBand {
    pub fn from_malicious_count(count: u32) -> Self {
        match count {
            0 => UrlBand::Clean,
            1..=2 => UrlBand::PossibleFalsePositive,
            3..=5 => UrlBand::Suspicious,
            _ => UrlBand::Malicious,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UrlBand::Clean => "clean",
            UrlBand::PossibleFalsePositive => "possible false positive",
            UrlBand::Suspicious => "suspicious",
            UrlBand::Malicious => "malicious",
        }
    }

    fn points(&self) -> u8 {
        match self {
            UrlBand::Clean => 0,
            UrlBand::PossibleFalsePositive => 1,
            UrlBand::Suspicious => 2,
            UrlBand::Malicious => 3,
        }
    }
}

/// Worker outputs of one scam lane run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScamSlots {
    pub scam_link: Envelope<Vec<UrlScan>>,
    pub scam_research: Envelope<ResearchAnswer>,
    pub scam_sentiment: Envelope<ManipulationAnalysis>,
}

impl ScamSlots {
    pub fn outcomes(&self) -> Vec<(Slot, Result<(), String>)> {
        vec![
            (Slot::ScamLink, outcome(&self.scam_link)),
            (Slot::ScamResearch, outcome(&self.scam_research)),
            (Slot::ScamSentiment, outcome(&self.scam_sentiment)),
        ]
    }
}

pub fn research_prompt(content: &str) -> String {
    format!(
        "Analyze this potential scam and search for related reports:\n\nContent: {content}\n\n\
         Provide:\n\
         1. Is this a known scam pattern?\n\
         2. Similar scam reports or warnings\n\
         3. Legitimate context (if it's NOT a scam)\n\
         4. Red flags or warning signs\n\
         5. Cite all sources (scam databases, consumer protection agencies, news reports)"
    )
}

/// Scan every URL one after another; the first failure fails the whole batch.
async fn scan_links(
    reputation: &dyn UrlReputation,
    urls: &[String],
) -> Result<Vec<UrlScan>, SourceError> {
    let mut scans = Vec::with_capacity(urls.len());
    for url in urls {
        scans.push(reputation.scan(url).await?);
    }
    Ok(scans)
}

/// The link worker scans sequentially, so each URL gets a full worker deadline.
fn link_deadline(per_link: Duration, url_count: usize) -> Duration {
    let links = u32::try_from(url_count.max(1)).unwrap_or(u32::MAX);
    per_link.saturating_mul(links)
}

pub async fn fan_out(claim: &str, sources: &SourceSet) -> ScamSlots {
    let urls = extract_urls(claim);
    let prompt = research_prompt(claim);
    let deadline = sources.worker_deadline;

    let (scam_link, scam_research, scam_sentiment) = tokio::join!(
        run_worker(
            Slot::ScamLink,
            urls.join(" "),
            link_deadline(deadline, urls.len()),
            scan_links(sources.reputation.as_ref(), &urls),
        ),
        run_worker(Slot::ScamResearch, claim, deadline, sources.research.research(&prompt)),
        run_worker(Slot::ScamSentiment, claim, deadline, async {
            Ok::<_, SourceError>(analyze_manipulation(claim))
        }),
    );

    ScamSlots {
        scam_link,
        scam_research,
        scam_sentiment,
    }
}

fn pattern_points(pattern: Option<PatternMatch>) -> u8 {
    match pattern {
        Some(PatternMatch::Strong) => 2,
        Some(PatternMatch::Weak) => 1,
        _ => 0,
    }
}

fn manipulation_points(level: Option<ManipulationLevel>) -> u8 {
    match level {
        Some(ManipulationLevel::High) => 2,
        Some(ManipulationLevel::Medium) => 1,
        _ => 0,
    }
}

/// Verdict and risk from the three scam signals; a missing signal counts as benign.
///
/// `scam`/`critical` needs a malicious URL, a strong pattern match and high
/// manipulation together. Otherwise the summed score picks the band and a
/// malicious URL alone never drops below `highly_suspicious`.
pub fn classify(
    band: Option<UrlBand>,
    pattern: Option<PatternMatch>,
    level: Option<ManipulationLevel>,
) -> (ScamVerdict, RiskLevel) {
    if band == Some(UrlBand::Malicious)
        && pattern == Some(PatternMatch::Strong)
        && level == Some(ManipulationLevel::High)
    {
        return (ScamVerdict::Scam, RiskLevel::Critical);
    }

    let score = band.map(|band| band.points()).unwrap_or(0)
        + pattern_points(pattern)
        + manipulation_points(level);
    let by_score = match score {
        4.. => (ScamVerdict::HighlySuspicious, RiskLevel::High),
        2..=3 => (ScamVerdict::Suspicious, RiskLevel::Medium),
        1 => (ScamVerdict::LikelyLegitimate, RiskLevel::Low),
        _ if pattern == Some(PatternMatch::Legitimate) => {
            (ScamVerdict::Legitimate, RiskLevel::Minimal)
        }
        _ => (ScamVerdict::LikelyLegitimate, RiskLevel::Low),
    };

    if band == Some(UrlBand::Malicious) && by_score.1 < RiskLevel::High {
        (ScamVerdict::HighlySuspicious, RiskLevel::High)
    } else {
        by_score
    }
}

pub fn merge(claim: &str, slots: &ScamSlots) -> LaneSummary {
    let errors: Vec<(Slot, String)> = slots
        .outcomes()
        .into_iter()
        .filter_map(|(slot, outcome)| outcome.err().map(|error| (slot, error)))
        .collect();
    let working = Lane::Scam.slots().len() - errors.len();
    if working == 0 {
        return LaneSummary::degraded(Lane::Scam, claim, &errors);
    }
    let mut notes: Vec<String> = errors
        .iter()
        .map(|(slot, error)| gap_note(*slot, error))
        .collect();

    let scans: &[UrlScan] = slots.scam_link.data().map(Vec::as_slice).unwrap_or_default();
    let research = slots.scam_research.data();
    let manipulation = slots.scam_sentiment.data();

    let worst = scans
        .iter()
        .max_by_key(|scan| (UrlBand::from_malicious_count(scan.malicious_count), scan.malicious_count));
    let band = if slots.scam_link.is_success() {
        Some(worst.map_or(UrlBand::Clean, |scan| {
            UrlBand::from_malicious_count(scan.malicious_count)
        }))
    } else {
        None
    };
    let pattern = research.map(|answer| assess_scam_pattern(&answer.answer));
    let level = manipulation.map(ManipulationAnalysis::level);

    let (verdict, risk) = classify(band, pattern, level);
    let confidence = if verdict == ScamVerdict::Scam {
        0.95
    } else {
        match working {
            3 => 0.85,
            2 => 0.65,
            _ => 0.45,
        }
    };

    for scan in scans {
        if UrlBand::from_malicious_count(scan.malicious_count) == UrlBand::PossibleFalsePositive {
            notes.push(format!(
                "{} of {} vendors flag {}; this may be a false positive",
                scan.malicious_count, scan.total_scanners, scan.url
            ));
        }
    }

    let mut findings = Vec::new();
    if slots.scam_link.is_success() {
        findings.push(match worst {
            None => "No links found in the message".to_string(),
            Some(scan) => format!(
                "Scanned {} link(s); worst result is {} ({}/{} vendors flag {})",
                scans.len(),
                UrlBand::from_malicious_count(scan.malicious_count).as_str(),
                scan.malicious_count,
                scan.total_scanners,
                scan.url
            ),
        });
    }
    if let Some(pattern) = pattern {
        findings.push(
            match pattern {
                PatternMatch::Strong => "Research matches a known scam pattern",
                PatternMatch::Weak => "Research notes some scam indicators",
                PatternMatch::None => "Research found no matching scam reports",
                PatternMatch::Legitimate => "Research points to a legitimate context",
            }
            .to_string(),
        );
    }
    if let Some(analysis) = manipulation {
        findings.push(if analysis.tactics.is_empty() {
            "No manipulation tactics detected".to_string()
        } else {
            format!(
                "Manipulation level {:?}: {} (urgency {:.2}, fear {:.2})",
                analysis.level(),
                analysis
                    .tactics
                    .iter()
                    .map(|tactic| tactic.label())
                    .collect::<Vec<_>>()
                    .join(", "),
                analysis.urgency_score,
                analysis.fear_score
            )
        });
    }

    let mut sources = SourceList::default();
    for scan in scans {
        sources.push(
            format!("VirusTotal report for {}", scan.url),
            &scan.analysis_url,
            SourceKind::UrlScan,
        );
    }
    if let Some(answer) = research {
        for citation in &answer.citations {
            let label = outlet_domain(citation).unwrap_or_else(|| citation.clone());
            sources.push(label, citation, SourceKind::Research);
        }
    }

    let mut details = Vec::new();
    if !scans.is_empty() {
        details.push(DetailSection::new(
            "URL Analysis",
            scans
                .iter()
                .map(|scan| {
                    format!(
                        "{}: {}/{} malicious, {} suspicious ({})",
                        scan.url,
                        scan.malicious_count,
                        scan.total_scanners,
                        scan.suspicious_count,
                        UrlBand::from_malicious_count(scan.malicious_count).as_str()
                    )
                })
                .collect(),
        ));
    }
    if let Some(analysis) = manipulation.filter(|analysis| !analysis.red_flags.is_empty()) {
        details.push(DetailSection::new(
            "Red Flags",
            analysis
                .red_flags
                .iter()
                .map(|flag| format!("\"{flag}\""))
                .collect(),
        ));
    }
    if let Some(answer) = research.filter(|answer| !answer.answer.trim().is_empty()) {
        details.push(DetailSection::new(
            "Pattern Research",
            vec![excerpt(&answer.answer, EXCERPT_CHARS)],
        ));
    }

    LaneSummary {
        lane: Lane::Scam,
        verdict: LaneVerdict::Scam(verdict),
        confidence,
        classification: Classification::Risk(risk),
        findings,
        sources: sources.into_vec(),
        notes,
        degraded: false,
        error_summary: Vec::new(),
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Tactic;

    fn scan(url: &str, malicious: u32, total: u32) -> UrlScan {
        UrlScan {
            url: url.into(),
            malicious_count: malicious,
            suspicious_count: 0,
            total_scanners: total,
            analysis_url: format!("https://www.virustotal.com/gui/url/{malicious}-{total}"),
            status: if malicious > 0 { "malicious" } else { "clean" }.into(),
        }
    }

    fn research(text: &str) -> Envelope<ResearchAnswer> {
        Envelope::success(
            "msg",
            ResearchAnswer {
                answer: text.into(),
                citations: vec!["https://consumer.ftc.gov/alerts".into()],
            },
        )
    }

    #[test]
    fn link_deadline_scales_with_url_count() {
        let per_link = Duration::from_secs(90);
        assert_eq!(link_deadline(per_link, 0), per_link);
        assert_eq!(link_deadline(per_link, 1), per_link);
        assert_eq!(link_deadline(per_link, 3), Duration::from_secs(270));
    }

    #[test]
    fn url_bands_are_boundary_exact() {
        let expected = [
            (0, UrlBand::Clean),
            (1, UrlBand::PossibleFalsePositive),
            (2, UrlBand::PossibleFalsePositive),
            (3, UrlBand::Suspicious),
            (5, UrlBand::Suspicious),
            (6, UrlBand::Malicious),
            (70, UrlBand::Malicious),
        ];
        for (count, band) in expected {
            assert_eq!(UrlBand::from_malicious_count(count), band, "count {count}");
        }
    }

    #[test]
    fn escalation_is_monotonic_in_every_signal() {
        let bands = [
            None,
            Some(UrlBand::Clean),
            Some(UrlBand::PossibleFalsePositive),
            Some(UrlBand::Suspicious),
            Some(UrlBand::Malicious),
        ];
        let patterns = [
            Some(PatternMatch::Legitimate),
            None,
            Some(PatternMatch::None),
            Some(PatternMatch::Weak),
            Some(PatternMatch::Strong),
        ];
        let levels = [
            None,
            Some(ManipulationLevel::Low),
            Some(ManipulationLevel::Medium),
            Some(ManipulationLevel::High),
        ];
        let risk = |b: usize, p: usize, l: usize| classify(bands[b], patterns[p], levels[l]).1;

        for b in 0..bands.len() {
            for p in 0..patterns.len() {
                for l in 0..levels.len() {
                    let base = risk(b, p, l);
                    if b + 1 < bands.len() {
                        assert!(risk(b + 1, p, l) >= base);
                    }
                    if p + 1 < patterns.len() {
                        assert!(risk(b, p + 1, l) >= base);
                    }
                    if l + 1 < levels.len() {
                        assert!(risk(b, p, l + 1) >= base);
                    }
                }
            }
        }
    }

    #[test]
    fn critical_requires_all_three_signals() {
        let (verdict, risk) = classify(
            Some(UrlBand::Malicious),
            Some(PatternMatch::Strong),
            Some(ManipulationLevel::High),
        );
        assert_eq!((verdict, risk), (ScamVerdict::Scam, RiskLevel::Critical));

        let (verdict, risk) = classify(
            Some(UrlBand::Malicious),
            Some(PatternMatch::Weak),
            Some(ManipulationLevel::High),
        );
        assert_eq!((verdict, risk), (ScamVerdict::HighlySuspicious, RiskLevel::High));
    }

    #[test]
    fn malicious_link_with_pressure_is_scam() {
        let slots = ScamSlots {
            scam_link: Envelope::success(
                "http://suspicious-link.com",
                vec![scan("http://suspicious-link.com", 8, 70)],
            ),
            scam_research: research(
                "This matches a known phishing scam; red flags include impersonation of a bank.",
            ),
            scam_sentiment: Envelope::success(
                "msg",
                ManipulationAnalysis {
                    tactics: vec![Tactic::ArtificialUrgency, Tactic::AuthorityImpersonation],
                    urgency_score: 0.9,
                    fear_score: 0.0,
                    red_flags: vec!["act now".into(), "verify your identity".into()],
                    analysis_confidence: 0.8,
                },
            ),
        };
        let summary = merge("msg", &slots);

        assert_eq!(summary.verdict, LaneVerdict::Scam(ScamVerdict::Scam));
        assert_eq!(summary.classification, Classification::Risk(RiskLevel::Critical));
        assert_eq!(summary.confidence, 0.95);
        assert!(summary.sources.iter().any(|s| s.kind == SourceKind::UrlScan));
        assert!(summary.details.iter().any(|d| d.title == "Red Flags"));
    }

    #[test]
    fn worker_error_lowers_confidence_without_blocking_verdict() {
        let slots = ScamSlots {
            scam_link: Envelope::error("http://x.example", "VT_API_KEY environment variable not set"),
            scam_research: research("Some users reported this as a scam."),
            scam_sentiment: Envelope::success("msg", analyze_manipulation("Act now! Urgent!")),
        };
        let summary = merge("msg", &slots);

        assert_eq!(summary.gap_notes().count(), 1);
        assert_eq!(summary.confidence, 0.65);
        assert_eq!(summary.verdict, LaneVerdict::Scam(ScamVerdict::Suspicious));
        assert_eq!(summary.classification, Classification::Risk(RiskLevel::Medium));
    }

    #[test]
    fn benign_message_is_legitimate() {
        let slots = ScamSlots {
            scam_link: Envelope::success("", Vec::new()),
            scam_research: research("This is a legitimate notice from the utility and not a scam."),
            scam_sentiment: Envelope::success("msg", analyze_manipulation("Your bill is ready.")),
        };
        let summary = merge("msg", &slots);

        assert_eq!(summary.verdict, LaneVerdict::Scam(ScamVerdict::Legitimate));
        assert_eq!(summary.classification, Classification::Risk(RiskLevel::Minimal));
        assert_eq!(summary.findings[0], "No links found in the message");
    }

    #[test]
    fn low_vendor_count_is_noted_as_possible_false_positive() {
        let slots = ScamSlots {
            scam_link: Envelope::success("u", vec![scan("https://shop.example", 1, 70)]),
            scam_research: research("No information found."),
            scam_sentiment: Envelope::success("msg", ManipulationAnalysis::default()),
        };
        let summary = merge("msg", &slots);

        assert!(summary.notes.iter().any(|n| n.contains("false positive")));
        assert_eq!(summary.verdict, LaneVerdict::Scam(ScamVerdict::LikelyLegitimate));
        assert_eq!(summary.gap_notes().count(), 0);
    }
}
