//! Fact lane: fact-check registry and research against authoritative sources.

use serde::{Deserialize, Serialize};

use super::worker::run_worker;
use super::{
    Classification, DetailSection, Lane, LaneSummary, LaneVerdict, Slot, SourceKind, SourceList,
    Truth, excerpt, gap_note, outcome, stance_phrase,
};
use crate::analysis::{Consensus, RatingClass, Stance, assess_answer, classify_category, outlet_domain};
use crate::envelope::Envelope;
use crate::sources::{FactCheckReview, ResearchAnswer, SourceSet};

const EXCERPT_CHARS: usize = 800;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactVerdict {
    True,
    False,
    PartlyTrue,
    Misleading,
    Unverified,
}

impl FactVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            FactVerdict::True => "true",
            FactVerdict::False => "false",
            FactVerdict::PartlyTrue => "partly_true",
            FactVerdict::Misleading => "misleading",
            FactVerdict::Unverified => "unverified",
        }
    }

    pub fn truth(&self) -> Truth {
        match self {
            FactVerdict::True => Truth::True,
            FactVerdict::False => Truth::False,
            FactVerdict::PartlyTrue | FactVerdict::Misleading => Truth::Mixed,
            FactVerdict::Unverified => Truth::Unverified,
        }
    }

    fn is_decisive(&self) -> bool {
        matches!(self, FactVerdict::True | FactVerdict::False)
    }
}

/// Worker outputs of one fact lane run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactSlots {
    pub fact_primary: Envelope<Vec<FactCheckReview>>,
    pub fact_research: Envelope<ResearchAnswer>,
}

impl FactSlots {
    pub fn outcomes(&self) -> Vec<(Slot, Result<(), String>)> {
        vec![
            (Slot::FactPrimary, outcome(&self.fact_primary)),
            (Slot::FactResearch, outcome(&self.fact_research)),
        ]
    }
}

pub fn research_prompt(claim: &str) -> String {
    format!(
        "Fact-check this claim with authoritative sources:\n\nClaim: {claim}\n\nProvide:\n\
         1. Verdict (true/false/partly true/misleading)\n\
         2. Key evidence supporting or refuting the claim\n\
         3. Context and nuance\n\
         4. Cite all authoritative sources (scientific journals, government data, expert statements)"
    )
}

pub async fn fan_out(claim: &str, sources: &SourceSet) -> FactSlots {
    let prompt = research_prompt(claim);
    let deadline = sources.worker_deadline;

    let (fact_primary, fact_research) = tokio::join!(
        run_worker(Slot::FactPrimary, claim, deadline, sources.factcheck.lookup(claim)),
        run_worker(Slot::FactResearch, claim, deadline, sources.research.research(&prompt)),
    );

    FactSlots {
        fact_primary,
        fact_research,
    }
}

fn verdict_from_rating(class: RatingClass) -> Option<FactVerdict> {
    match class {
        RatingClass::True => Some(FactVerdict::True),
        RatingClass::False => Some(FactVerdict::False),
        RatingClass::Mixed => Some(FactVerdict::PartlyTrue),
        RatingClass::Misleading => Some(FactVerdict::Misleading),
        RatingClass::Unrated => None,
    }
}

fn verdict_from_stance(stance: Stance) -> Option<FactVerdict> {
    match stance {
        Stance::Supports => Some(FactVerdict::True),
        Stance::Refutes => Some(FactVerdict::False),
        Stance::Partial => Some(FactVerdict::PartlyTrue),
        Stance::Misleading => Some(FactVerdict::Misleading),
        Stance::Inconclusive => None,
    }
}

/// Apply the fact rubric.
///
/// Both signals agreeing land in the top band, a single signal in the
/// middle bands and no signal in the bottom band. When they disagree the
/// published fact-check verdict is kept at reduced confidence.
pub fn merge(claim: &str, slots: &FactSlots) -> LaneSummary {
    let errors: Vec<(Slot, String)> = slots
        .outcomes()
        .into_iter()
        .filter_map(|(slot, outcome)| outcome.err().map(|error| (slot, error)))
        .collect();
    if errors.len() == Lane::Fact.slots().len() {
        return LaneSummary::degraded(Lane::Fact, claim, &errors);
    }
    let mut notes: Vec<String> = errors
        .iter()
        .map(|(slot, error)| gap_note(*slot, error))
        .collect();

    let reviews: &[FactCheckReview] = slots
        .fact_primary
        .data()
        .map(Vec::as_slice)
        .unwrap_or_default();
    let research = slots.fact_research.data();
    let citations: &[String] = research.map(|r| r.citations.as_slice()).unwrap_or_default();

    let consensus = Consensus::from_reviews(reviews);
    let published = consensus.and_then(|consensus| verdict_from_rating(consensus.class));
    let stance = research.map(|answer| assess_answer(&answer.answer));
    let researched = stance.and_then(verdict_from_stance);

    let (verdict, confidence) = match (published, researched) {
        (Some(a), Some(b)) if a == b => {
            let unanimous = consensus.is_some_and(|c| c.strength() >= 1.0 && c.rated >= 2);
            (a, if unanimous { 0.95 } else { 0.9 })
        }
        (Some(a), Some(b)) => {
            notes.push(format!(
                "Conflict: published fact-checks rate the claim {} while research reads it as {}",
                a.as_str(),
                b.as_str()
            ));
            (a, 0.55)
        }
        (Some(a), None) => {
            let strong = consensus.is_some_and(|c| c.is_strong());
            (a, if strong { 0.7 } else { 0.6 })
        }
        (None, Some(b)) if b.is_decisive() => {
            (b, if citations.len() >= 3 { 0.75 } else { 0.7 })
        }
        (None, Some(b)) => (b, 0.6),
        (None, None) => {
            let answered = research.is_some_and(|answer| !answer.answer.trim().is_empty());
            (FactVerdict::Unverified, if answered { 0.2 } else { 0.1 })
        }
    };

    let mut findings = Vec::new();
    if slots.fact_primary.is_success() {
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
            "Research against authoritative sources {} the claim, citing {} source(s)",
            stance_phrase(stance),
            answer.citations.len()
        ));
    }

    let mut sources = SourceList::default();
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
    if !reviews.is_empty() {
        details.push(DetailSection::new(
            "Published Reviews",
            reviews
                .iter()
                .map(|review| {
                    format!(
                        "{} rated \"{}\" as {} (claimant: {})",
                        review.source, review.claim, review.rating, review.claimant
                    )
                })
                .collect(),
        ));
    }
    if let Some(answer) = research.filter(|answer| !answer.answer.trim().is_empty()) {
        details.push(DetailSection::new(
            "Evidence Summary",
            vec![excerpt(&answer.answer, EXCERPT_CHARS)],
        ));
    }

    LaneSummary {
        lane: Lane::Fact,
        verdict: LaneVerdict::Fact(verdict),
        confidence,
        classification: Classification::Category(classify_category(claim)),
        findings,
        sources: sources.into_vec(),
        notes,
        degraded: false,
        error_summary: Vec::new(),
        details,
    }
}
