//! Markdown rendering of lane summaries and final reports.

use std::fmt::Write as _;

use crate::lanes::{Lane, LaneSummary};
use crate::report::FinalReport;

impl LaneSummary {
    /// Standalone Markdown block for this lane.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        write_lane(&mut out, self, "##");
        out
    }
}

impl FinalReport {
    pub fn to_markdown(&self) -> String {
        render_report(self)
    }
}

fn write_list(out: &mut String, items: &[String]) {
    for item in items {
        let _ = writeln!(out, "- {item}");
    }
}

fn write_lane(out: &mut String, summary: &LaneSummary, level: &str) {
    let sub = format!("{level}#");
    let _ = writeln!(out, "{level} {}\n", summary.lane.title());
    let _ = writeln!(
        out,
        "**Verdict:** {} | **Confidence:** {:.2} | **{}:** {}\n",
        summary.verdict.label().to_uppercase(),
        summary.confidence,
        summary.classification.heading(),
        summary.classification.value()
    );

    if !summary.findings.is_empty() {
        let _ = writeln!(out, "{sub} Key Findings\n");
        write_list(out, &summary.findings);
        out.push('\n');
    }

    for section in &summary.details {
        let _ = writeln!(out, "{sub} {}\n", section.title);
        write_list(out, &section.lines);
        out.push('\n');
    }

    if !summary.sources.is_empty() {
        let _ = writeln!(out, "{sub} Sources\n");
        for source in &summary.sources {
            let _ = writeln!(out, "- [{}]({})", source.label, source.url);
        }
        out.push('\n');
    }

    if !summary.notes.is_empty() {
        let _ = writeln!(out, "{sub} Notes\n");
        write_list(out, &summary.notes);
        out.push('\n');
    }

    if summary.degraded {
        let _ = writeln!(out, "{sub} Error Summary\n");
        write_list(out, &summary.error_summary);
        out.push('\n');
    }
}

fn methodology(lane: Lane) -> &'static str {
    match lane {
        Lane::News => {
            "News: news search, fact-check registry and open research queried in parallel; \
             the verdict combines fact-check consensus with the research stance and confidence \
             is banded by the number of distinct outlets"
        }
        Lane::Fact => {
            "Fact: fact-check registry and research against authoritative sources; agreement \
             between both carries the highest confidence"
        }
        Lane::Scam => {
            "Scam: URL reputation scan, scam-pattern research and local manipulation analysis; \
             risk escalates with each signal and scam detection needs all three"
        }
    }
}

fn render_report(report: &FinalReport) -> String {
    let mut out = String::from("# Claim Verification Report\n\n");
    let _ = writeln!(out, "**Claim:** {}\n", report.claim);

    let _ = writeln!(out, "## Executive Summary\n\n{}\n", report.executive_summary);

    let _ = writeln!(
        out,
        "## Overall Assessment: {}\n",
        report.overall_assessment.as_str()
    );
    let _ = writeln!(out, "- **Confidence Level:** {}", report.confidence_level.as_str());
    let _ = writeln!(
        out,
        "- **Risk Level:** {}\n",
        report.risk_level.as_str().to_uppercase()
    );

    if report.lanes.is_empty() {
        out.push_str("No verification lane was applicable to this input.\n\n");
    }
    for summary in &report.lanes {
        write_lane(&mut out, summary, "##");
    }

    if !report.cross_lane_notes.is_empty() {
        out.push_str("## Cross-Lane Analysis\n\n");
        write_list(&mut out, &report.cross_lane_notes);
        out.push('\n');
    }

    out.push_str("## Final Recommendations\n\n");
    if !report.recommendations.general.is_empty() {
        out.push_str("### For General Users\n\n");
        write_list(&mut out, &report.recommendations.general);
        out.push('\n');
    }
    if !report.recommendations.further_investigation.is_empty() {
        out.push_str("### For Further Investigation\n\n");
        write_list(&mut out, &report.recommendations.further_investigation);
        out.push('\n');
    }

    out.push_str("## Sources Summary\n\n");
    let sources = &report.sources_summary;
    if sources.per_lane.is_empty() {
        out.push_str("- No sources consulted\n");
    } else {
        for entry in &sources.per_lane {
            let _ = writeln!(out, "- {}: {} source(s)", entry.lane.title(), entry.sources);
        }
        for (label, count) in [
            ("News articles", sources.news_articles),
            ("Fact-check reviews", sources.fact_checks),
            ("URL scans", sources.url_scans),
            ("Research citations", sources.research_citations),
        ] {
            if count > 0 {
                let _ = writeln!(out, "- {label}: {count}");
            }
        }
        let _ = writeln!(out, "- **Total:** {}", sources.total);
    }
    out.push('\n');

    out.push_str("## Methodology\n\n");
    if report.lanes.is_empty() {
        out.push_str("- No data sources were queried\n");
    }
    for summary in &report.lanes {
        let _ = writeln!(out, "- {}", methodology(summary.lane));
    }
    if !report.triage_rationale.is_empty() {
        let _ = writeln!(out, "- Triage: {}", report.triage_rationale.join("; "));
    }

    let _ = writeln!(
        out,
        "\n---\n*Report generated at {}*",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    out
}
