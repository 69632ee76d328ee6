use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use claimcheck_core::lanes::{FactVerdict, ScamVerdict, run_lane};
use claimcheck_core::sources::{
    FactCheckLookup, FactCheckReview, NewsArticle, NewsSearch, Research, ResearchAnswer,
    UrlReputation, UrlScan,
};
use claimcheck_core::{
    Lane, LaneVerdict, OverallAssessment, RiskLevel, Router, SourceError, SourceSet,
    TriagePolicy, VerifyOptions, load_session_report, run_verification_session,
};
use graph_flow::InMemorySessionStorage;
use tokio::time::Instant;

struct FakeNews(Result<Vec<NewsArticle>, SourceError>);

#[async_trait]
impl NewsSearch for FakeNews {
    async fn search(&self, _query: &str) -> Result<Vec<NewsArticle>, SourceError> {
        self.0.clone()
    }
}

struct FakeFactCheck(Result<Vec<FactCheckReview>, SourceError>);

#[async_trait]
impl FactCheckLookup for FakeFactCheck {
    async fn lookup(&self, _claim: &str) -> Result<Vec<FactCheckReview>, SourceError> {
        self.0.clone()
    }
}

/// Flags every URL with the same number of malicious vendors.
struct FakeReputation(Result<u32, SourceError>);

#[async_trait]
impl UrlReputation for FakeReputation {
    async fn scan(&self, url: &str) -> Result<UrlScan, SourceError> {
        let malicious = self.0.clone()?;
        Ok(UrlScan {
            url: url.to_string(),
            malicious_count: malicious,
            suspicious_count: 0,
            total_scanners: 70,
            analysis_url: "https://www.virustotal.com/gui/url/abc".to_string(),
            status: if malicious > 0 { "malicious" } else { "clean" }.to_string(),
        })
    }
}

struct FakeResearch {
    answer: Result<ResearchAnswer, SourceError>,
    delay: Duration,
}

#[async_trait]
impl Research for FakeResearch {
    async fn research(&self, _prompt: &str) -> Result<ResearchAnswer, SourceError> {
        tokio::time::sleep(self.delay).await;
        self.answer.clone()
    }
}

fn answer(text: &str, citations: &[&str]) -> Result<ResearchAnswer, SourceError> {
    Ok(ResearchAnswer {
        answer: text.to_string(),
        citations: citations.iter().map(|c| c.to_string()).collect(),
    })
}

fn sources(
    news: Result<Vec<NewsArticle>, SourceError>,
    factcheck: Result<Vec<FactCheckReview>, SourceError>,
    reputation: Result<u32, SourceError>,
    research: Result<ResearchAnswer, SourceError>,
) -> SourceSet {
    SourceSet::new(
        Arc::new(FakeNews(news)),
        Arc::new(FakeFactCheck(factcheck)),
        Arc::new(FakeReputation(reputation)),
        Arc::new(FakeResearch {
            answer: research,
            delay: Duration::ZERO,
        }),
    )
}

fn quiet_sources() -> SourceSet {
    sources(
        Ok(Vec::new()),
        Ok(Vec::new()),
        Ok(0),
        answer("Here is some background.", &[]),
    )
}

fn failing_sources() -> SourceSet {
    sources(
        Err(SourceError::MissingCredential("GNEWS_API_KEY".into())),
        Err(SourceError::Api {
            status: 503,
            message: "unavailable".into(),
        }),
        Err(SourceError::Network("connection refused".into())),
        Err(SourceError::MissingCredential("PERPLEXITY_API_KEY".into())),
    )
}

#[tokio::test]
async fn flat_earth_runs_only_the_fact_lane() {
    let sources = sources(
        Ok(Vec::new()),
        Ok(Vec::new()),
        Ok(0),
        answer(
            "Verdict: False. Scientific consensus contradicts the claim; the Earth is an oblate spheroid.",
            &["https://www.nasa.gov/earth"],
        ),
    );

    let outcome = run_verification_session(sources, VerifyOptions::new("Earth is flat"))
        .await
        .expect("session completes");

    let report = &outcome.report;
    assert_eq!(report.lanes.len(), 1);
    let fact = report.lane(Lane::Fact).expect("fact lane ran");
    assert_eq!(fact.verdict, LaneVerdict::Fact(FactVerdict::False));
    assert!(fact.confidence >= 0.7);
    assert_eq!(report.overall_assessment, OverallAssessment::Refuted);
    assert!(outcome.markdown.contains("## Fact Check"));
    assert!(!outcome.markdown.contains("## News Verification"));

    let tasks: Vec<&str> = outcome
        .trace_events
        .iter()
        .map(|event| event.task_id.as_str())
        .collect();
    assert_eq!(tasks.first(), Some(&"triage"));
    assert!(tasks.contains(&"lane.fact"));
    assert_eq!(tasks.last(), Some(&"final_report"));
}

#[tokio::test]
async fn summaries_match_the_selected_lanes() {
    let claims = [
        "Earth is flat",
        "Breaking news: scientists say coffee causes cancer, see https://health.example/story",
        "Police reported that vaccines cause autism",
        "Claim your prize now, you have won a gift card",
        "hello there",
    ];

    for policy in [TriagePolicy::Multi, TriagePolicy::Single] {
        for claim in claims {
            let expected = Router::new(policy).classify(claim).lanes;
            let outcome = run_verification_session(
                quiet_sources(),
                VerifyOptions::new(claim).with_policy(policy),
            )
            .await
            .expect("session completes");

            let produced: Vec<Lane> = outcome.report.lanes.iter().map(|s| s.lane).collect();
            assert_eq!(produced, expected, "claim {claim:?} under {policy:?}");
        }
    }
}

#[tokio::test]
async fn phishing_message_is_scam_detected() {
    let claim = "URGENT: Your account will be suspended unless you verify your identity \
                 immediately at http://suspicious-link.com. Act now!";
    let sources = sources(
        Ok(Vec::new()),
        Ok(Vec::new()),
        Ok(8),
        answer(
            "This is a known phishing scam. Red flags include impersonation of banks and urgent threats.",
            &["https://consumer.ftc.gov/phishing"],
        ),
    );

    let outcome = run_verification_session(sources, VerifyOptions::new(claim))
        .await
        .expect("session completes");

    let scam = outcome.report.lane(Lane::Scam).expect("scam lane ran");
    assert_eq!(scam.verdict, LaneVerdict::Scam(ScamVerdict::Scam));
    assert_eq!(scam.classification.risk(), Some(RiskLevel::Critical));
    assert_eq!(outcome.report.overall_assessment, OverallAssessment::ScamDetected);
    assert!(outcome.markdown.contains("## Overall Assessment: SCAM DETECTED"));
}

#[tokio::test]
async fn total_failure_still_produces_a_report() {
    let outcome = run_verification_session(
        failing_sources(),
        VerifyOptions::new("Breaking news: police arrested the mayor today"),
    )
    .await
    .expect("session completes");

    let news = outcome.report.lane(Lane::News).expect("news lane ran");
    assert!(news.degraded);
    assert_eq!(news.confidence, 0.0);
    assert_eq!(news.gap_notes().count(), 3);
    assert_eq!(news.error_summary.len(), 3);
    assert_eq!(
        outcome.report.overall_assessment,
        OverallAssessment::InsufficientData
    );
    assert!(outcome.markdown.contains("Error Summary"));
    assert!(outcome.markdown.contains("GNEWS_API_KEY environment variable not set"));
}

#[tokio::test]
async fn partial_failure_is_acknowledged_per_worker() {
    let sources = sources(
        Ok(Vec::new()),
        Err(SourceError::Network("dns failure".into())),
        Ok(0),
        answer("The claim is false.", &[]),
    );

    let outcome = run_verification_session(sources, VerifyOptions::new("Earth is flat"))
        .await
        .expect("session completes");

    let fact = outcome.report.lane(Lane::Fact).expect("fact lane ran");
    assert!(!fact.degraded);
    assert_eq!(fact.gap_notes().count(), 1);
    assert_eq!(fact.verdict, LaneVerdict::Fact(FactVerdict::False));
}

#[tokio::test]
async fn slow_worker_is_cut_off_by_the_deadline() {
    let sources = SourceSet::new(
        Arc::new(FakeNews(Ok(Vec::new()))),
        Arc::new(FakeFactCheck(Ok(Vec::new()))),
        Arc::new(FakeReputation(Ok(0))),
        Arc::new(FakeResearch {
            answer: answer("Verdict: true.", &[]),
            delay: Duration::from_secs(30),
        }),
    )
    .with_worker_deadline(Duration::from_millis(50));

    let outcome = run_verification_session(sources, VerifyOptions::new("Earth is flat"))
        .await
        .expect("session completes");

    let fact = outcome.report.lane(Lane::Fact).expect("fact lane ran");
    assert_eq!(fact.gap_notes().count(), 1);
    assert!(fact.gap_notes().any(|note| note.contains("deadline")));
    assert_eq!(fact.verdict, LaneVerdict::Fact(FactVerdict::Unverified));
}

#[tokio::test]
async fn unmatched_input_reports_no_applicable_lane() {
    let outcome = run_verification_session(quiet_sources(), VerifyOptions::new("hello there"))
        .await
        .expect("session completes");

    assert!(outcome.report.lanes.is_empty());
    assert_eq!(
        outcome.report.overall_assessment,
        OverallAssessment::InsufficientData
    );
    assert!(outcome.markdown.contains("No verification lane was applicable"));
}

#[tokio::test]
async fn sessions_can_be_reloaded_from_shared_storage() {
    let storage = Arc::new(InMemorySessionStorage::new());
    let outcome = run_verification_session(
        quiet_sources(),
        VerifyOptions::new("Earth is flat")
            .with_session_id("session-reload")
            .with_shared_storage(storage.clone()),
    )
    .await
    .expect("session completes");

    let loaded = load_session_report(&*storage, "session-reload")
        .await
        .expect("storage readable")
        .expect("session stored");
    assert_eq!(loaded.report, outcome.report);
    assert_eq!(loaded.trace_events, outcome.trace_events);

    let missing = load_session_report(&*storage, "unknown").await.expect("storage readable");
    assert!(missing.is_none());
}

#[tokio::test]
async fn trace_is_persisted_when_requested() {
    let dir = tempfile::tempdir().unwrap();
    let outcome = run_verification_session(
        quiet_sources(),
        VerifyOptions::new("Earth is flat")
            .with_session_id("session-trace")
            .with_trace_output_dir(dir.path()),
    )
    .await
    .expect("session completes");

    let path = outcome.trace_path.clone().expect("trace path recorded");
    assert_eq!(path, dir.path().join("session-trace.json"));
    assert!(outcome.explain_mermaid().starts_with("flowchart TD"));
    assert!(outcome.explain_markdown().contains("`triage`"));
}

#[tokio::test]
async fn empty_claim_is_rejected() {
    let err = run_verification_session(quiet_sources(), VerifyOptions::new("   "))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("claim must not be empty"));
}

/// Every capability answers after the same delay; URL scans take `per_url`.
struct DelayedSources {
    delay: Duration,
    per_url: Duration,
}

#[async_trait]
impl NewsSearch for DelayedSources {
    async fn search(&self, _query: &str) -> Result<Vec<NewsArticle>, SourceError> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }
}

#[async_trait]
impl FactCheckLookup for DelayedSources {
    async fn lookup(&self, _claim: &str) -> Result<Vec<FactCheckReview>, SourceError> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }
}

#[async_trait]
impl UrlReputation for DelayedSources {
    async fn scan(&self, url: &str) -> Result<UrlScan, SourceError> {
        tokio::time::sleep(self.per_url).await;
        Ok(UrlScan {
            url: url.to_string(),
            malicious_count: 0,
            suspicious_count: 0,
            total_scanners: 70,
            analysis_url: "https://www.virustotal.com/gui/url/abc".to_string(),
            status: "clean".to_string(),
        })
    }
}

#[async_trait]
impl Research for DelayedSources {
    async fn research(&self, _prompt: &str) -> Result<ResearchAnswer, SourceError> {
        tokio::time::sleep(self.delay).await;
        Ok(ResearchAnswer::default())
    }
}

fn delayed_sources(delay: Duration, per_url: Duration) -> SourceSet {
    let delayed = Arc::new(DelayedSources { delay, per_url });
    SourceSet::new(delayed.clone(), delayed.clone(), delayed.clone(), delayed)
}

#[tokio::test(start_paused = true)]
async fn lane_workers_run_concurrently() {
    let delay = Duration::from_millis(200);
    let sources = delayed_sources(delay, delay);

    for (lane, claim) in [
        (Lane::News, "Breaking news: the mayor resigned today"),
        (Lane::Fact, "Earth is flat"),
        (Lane::Scam, "Act now and claim your prize at http://prize.example/win"),
    ] {
        let started = Instant::now();
        let run = run_lane(lane, claim, &sources).await;
        let elapsed = started.elapsed();

        assert_eq!(run.summary.gap_notes().count(), 0, "{lane} had a failed worker");
        assert!(elapsed >= delay, "{lane} finished before its workers");
        assert!(
            elapsed < Duration::from_millis(400),
            "{lane} workers ran one after another ({elapsed:?})"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn link_deadline_covers_every_scanned_url() {
    let sources = delayed_sources(Duration::from_millis(10), Duration::from_secs(50))
        .with_worker_deadline(Duration::from_secs(60));
    let claim = "Urgent: verify your account at http://a.example/login, \
                 http://b.example/verify and http://c.example/pay";

    let run = run_lane(Lane::Scam, claim, &sources).await;

    assert_eq!(run.summary.gap_notes().count(), 0);
    assert!(
        run.events
            .iter()
            .any(|event| event.message == "scam_link: success")
    );
}
