//! News lane: news search, fact-check registry and research in parallel.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::worker::run_worker;
use super::{
    Classification, Coverage, DetailSection, Lane, LaneSummary, LaneVerdict, Slot, SourceKind,
    SourceList, Truth, excerpt, gap_note, outcome, stance_phrase,
};
use crate::analysis::{Consensus, RatingClass, Stance, assess_answer, outlet_domain};
use crate::envelope::Envelope;
use crate::query::derive_news_query;
use crate::sources::{FactCheckReview, NewsArticle, ResearchAnswer, SourceSet};

const TOP_ARTICLES: usize = 5;
const EXCERPT_CHARS: usize = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NewsVerdict {
    True,
    False,
    Mixed,
    Unverified,
}

impl NewsVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            NewsVerdict::True => "true",
            NewsVerdict::False => "false",
            NewsVerdict::Mixed => "mixed",
            NewsVerdict::Unverified => "unverified",
        }
    }

    pub fn truth(&self) -> Truth {
        match self {
            NewsVerdict::True => Truth::True,
            NewsVerdict::False => Truth::False,
            NewsVerdict::Mixed => Truth::Mixed,
            NewsVerdict::Unverified => Truth::Unverified,
        }
    }
}

/// Worker outputs of one news lane run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsSlots {
    pub news_api: Envelope<Vec<NewsArticle>>,
    pub news_fact: Envelope<Vec<FactCheckReview>>,
    pub news_research: Envelope<ResearchAnswer>,
}

impl NewsSlots {
    pub fn outcomes(&self) -> Vec<(Slot, Result<(), String>)> {
        vec![
            (Slot::NewsApi, outcome(&self.news_api)),
            (Slot::NewsFact, outcome(&self.news_fact)),
            (Slot::NewsResearch, outcome(&self.news_research)),
        ]
    }

    fn errors(&self) -> Vec<(Slot, String)> {
        self.outcomes()
            .into_iter()
            .filter_map(|(slot, outcome)| outcome.err().map(|error| (slot, error)))
            .collect()
    }
}

pub fn research_prompt(claim: &str) -> String {
    format!(
        "Research this news claim and verify its accuracy:\n\nClaim: {claim}\n\nProvide:\n\
         1. Whether the claim is supported by credible news sources\n\
         2. Key facts and evidence\n\
         3. Any contradictory information\n\
         4. Cite all sources"
    )
}

pub async fn fan_out(claim: &str, sources: &SourceSet) -> NewsSlots {
    let query = derive_news_query(claim);
    let prompt = research_prompt(claim);
    let deadline = sources.worker_deadline;

    let (news_api, news_fact, news_research) = tokio::join!(
        run_worker(Slot::NewsApi, query.as_str(), deadline, sources.news.search(&query)),
        run_worker(Slot::NewsFact, claim, deadline, sources.factcheck.lookup(claim)),
        run_worker(Slot::NewsResearch, claim, deadline, sources.research.research(&prompt)),
    );

    NewsSlots {
        news_api,
        news_fact,
        news_research,
    }
}

fn signal_from_consensus(consensus: &Consensus) -> Truth {
    match consensus.class {
        RatingClass::True => Truth::True,
        RatingClass::False => Truth::False,
        _ => Truth::Mixed,
    }
}

fn signal_from_stance(stance: Stance) -> Option<Truth> {
    match stance {
        Stance::Supports => Some(Truth::True),
        Stance::Refutes => Some(Truth::False),
        Stance::Partial | Stance::Misleading => Some(Truth::Mixed),
        Stance::Inconclusive => None,
    }
}

fn verdict_of(truth: Truth) -> NewsVerdict {
    match truth {
        Truth::True => NewsVerdict::True,
        Truth::False => NewsVerdict::False,
        Truth::Mixed => NewsVerdict::Mixed,
        Truth::Unverified => NewsVerdict::Unverified,
    }
}

/// Apply the news rubric to the three slots.
///
/// | fact-check | research | verdict | confidence |
/// |---|---|---|---|
/// | X | X (true/false) | X | 0.9, 0.95 if widespread |
/// | mixed | mixed | mixed | 0.6 |
/// | true | false (or reverse) | mixed | 0.2 |
/// | one mixed | other decisive | mixed | 0.5 |
/// | one signal only | | that signal | 0.75 / 0.6 / 0.5 by coverage |
/// | none | | unverified | 0.4 / 0.3 / 0.1 by coverage |
pub fn merge(claim: &str, slots: &NewsSlots) -> LaneSummary {
    let errors = slots.errors();
    if errors.len() == Lane::News.slots().len() {
        return LaneSummary::degraded(Lane::News, claim, &errors);
    }
    let mut notes: Vec<String> = errors
        .iter()
        .map(|(slot, error)| gap_note(*slot, error))
        .collect();

    let articles: &[NewsArticle] = slots.news_api.data().map(Vec::as_slice).unwrap_or_default();
    let reviews: &[FactCheckReview] = slots.news_fact.data().map(Vec::as_slice).unwrap_or_default();
    let research = slots.news_research.data();
    let citations: &[String] = research.map(|r| r.citations.as_slice()).unwrap_or_default();

    // research citations are reference material, not news outlets
    let outlets: BTreeSet<String> = articles
        .iter()
        .filter_map(|article| outlet_domain(&article.url))
        .collect();
    let coverage = Coverage::from_outlets(outlets.len());

    let consensus = Consensus::from_reviews(reviews);
    let fact_signal = consensus.as_ref().map(signal_from_consensus);
    let stance = research.map(|answer| assess_answer(&answer.answer));
    let research_signal = stance.and_then(signal_from_stance);

    let (verdict, confidence) = match (fact_signal, research_signal) {
        (Some(a), Some(b)) if a == b && a == Truth::Mixed => (NewsVerdict::Mixed, 0.6),
        (Some(a), Some(b)) if a == b => {
            let confidence = if coverage == Coverage::Widespread { 0.95 } else { 0.9 };
            (verdict_of(a), confidence)
        }
        (Some(a), Some(b)) if a != Truth::Mixed && b != Truth::Mixed => {
            notes.push(format!(
                "Conflict: published fact-checks read the claim as {} while research reads it as {}",
                verdict_of(a).as_str(),
                verdict_of(b).as_str()
            ));
            (NewsVerdict::Mixed, 0.2)
        }
        (Some(_), Some(_)) => (NewsVerdict::Mixed, 0.5),
        (Some(single), None) | (None, Some(single)) => {
            let confidence = match coverage {
                Coverage::Widespread => 0.75,
                Coverage::Limited => 0.6,
                Coverage::None => 0.5,
            };
            (verdict_of(single), confidence)
        }
        (None, None) => {
            let confidence = match coverage {
                Coverage::Widespread => 0.4,
                Coverage::Limited => 0.3,
                Coverage::None => 0.1,
            };
            (NewsVerdict::Unverified, confidence)
        }
    };

    let mut findings = Vec::new();
    if slots.news_api.is_success() {
        findings.push(if articles.is_empty() {
            "News search found no matching coverage".to_string()
        } else {
            format!(
                "News search returned {} article(s); coverage is {} ({} distinct outlet(s))",
                articles.len(),
                coverage.as_str(),
                outlets.len()
            )
        });
    }
    if slots.news_fact.is_success() {
        findings.push(match &consensus {
            Some(consensus) => format!(
                "{} published fact-check review(s); {} of {} rated it {}",
                reviews.len(),
                consensus.agreeing,
                consensus.rated,
                consensus.class.as_str()
            ),
            None if reviews.is_empty() => "No published fact-checks match this claim".to_string(),
            None => format!("{} fact-check review(s) without a usable rating", reviews.len()),
        });
    }
    if let (Some(answer), Some(stance)) = (research, stance) {
        findings.push(format!(
            "Research answer {} the claim, citing {} source(s)",
            stance_phrase(stance),
            answer.citations.len()
        ));
    }

    let mut sources = SourceList::default();
    for article in articles {
        sources.push(
            format!("{}: {}", article.source, article.title),
            &article.url,
            SourceKind::NewsArticle,
        );
    }
    for review in reviews {
        sources.push(
            format!("{} fact-check ({})", review.source, review.rating),
            &review.url,
            SourceKind::FactCheck,
        );
    }
    for citation in citations {
        let label = outlet_domain(citation).unwrap_or_else(|| citation.clone());
        sources.push(label, citation, SourceKind::Research);
    }

    let mut details = Vec::new();
    if !articles.is_empty() {
        details.push(DetailSection::new(
            "Top Articles",
            articles
                .iter()
                .take(TOP_ARTICLES)
                .map(|article| {
                    format!(
                        "{} ({}, {})",
                        article.title, article.source, article.published_date
                    )
                })
                .collect(),
        ));
    }
    if !reviews.is_empty() {
        details.push(DetailSection::new(
            "Fact-Check Reviews",
            reviews
                .iter()
                .map(|review| format!("{}: {} ({})", review.source, review.rating, review.claim))
                .collect(),
        ));
    }
    if let Some(answer) = research.filter(|answer| !answer.answer.trim().is_empty()) {
        details.push(DetailSection::new(
            "Research Summary",
            vec![excerpt(&answer.answer, EXCERPT_CHARS)],
        ));
    }

    LaneSummary {
        lane: Lane::News,
        verdict: LaneVerdict::News(verdict),
        confidence,
        classification: Classification::Coverage(coverage),
        findings,
        sources: sources.into_vec(),
        notes,
        degraded: false,
        error_summary: Vec::new(),
        details,
    }
}
