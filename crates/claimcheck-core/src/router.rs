//! Claim triage into verification lanes.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::analysis::extract_urls;
use crate::lanes::Lane;

/// How many lanes a claim may be routed to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriagePolicy {
    /// Every lane whose signals match runs.
    #[default]
    Multi,
    /// Only the highest-priority match runs (`scam > news > fact`).
    Single,
}

impl TriagePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriagePolicy::Multi => "multi",
            TriagePolicy::Single => "single",
        }
    }
}

impl std::str::FromStr for TriagePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "multi" => Ok(TriagePolicy::Multi),
            "single" => Ok(TriagePolicy::Single),
            other => Err(format!("unknown triage policy '{other}' (expected multi|single)")),
        }
    }
}

/// Outcome of routing one claim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Triage {
    /// Selected lanes in canonical order (news, fact, scam).
    pub lanes: Vec<Lane>,
    pub rationale: Vec<String>,
}

impl Triage {
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }
}

static SCAM_WORDS: Lazy<Regex> = Lazy::new(|| {
    markers(&[
        r"scams?",
        r"scammers?",
        "phishing",
        "fraud",
        "fraudulent",
        "smishing",
        "too good to be true",
    ])
});

static FINANCIAL_REQUEST: Lazy<Regex> = Lazy::new(|| {
    markers(&[
        "send money",
        "wire transfer",
        r"gift cards?",
        "bitcoin",
        "crypto",
        "bank details",
        "password",
        "ssn",
        "social security number",
        "processing fee",
        "claim your prize",
        "you have won",
        "you've won",
        "lottery",
        "inheritance",
        "investment opportunity",
        "guaranteed returns",
    ])
});

static PRESSURE_OR_IDENTITY: Lazy<Regex> = Lazy::new(|| {
    markers(&[
        "verify your account",
        "verify your identity",
        "account will be suspended",
        "account suspended",
        "click here",
        "click the link",
        "act now",
        "urgent",
        "confirm your details",
        "dear customer",
    ])
});

static NEWS_MARKERS: Lazy<Regex> = Lazy::new(|| {
    markers(&[
        "news",
        "breaking",
        r"report(?:s|ed)?",
        "announced",
        "according to",
        "yesterday",
        "today",
        "this week",
        "died",
        "killed",
        "arrested",
        "attack",
        "crash",
        "officials",
        "police",
        "new study",
    ])
});

static FACT_MARKERS: Lazy<Regex> = Lazy::new(|| {
    markers(&[
        "is it true",
        "true that",
        "fact",
        "myth",
        "proven",
        r"causes?",
        r"cures?",
        r"prevents?",
        r"reduces?",
        r"increases?",
        "scientists",
        "study",
        "percent",
    ])
});

static FACT_COPULAS: Lazy<Regex> =
    Lazy::new(|| markers(&["is", "are", "was", "were", "has", "have", "can", "does"]));

fn markers(patterns: &[&str]) -> Regex {
    Regex::new(&format!(r"(?i)\b(?:{})\b", patterns.join("|"))).expect("static router regex")
}

fn first_match(re: &Regex, text: &str) -> Option<String> {
    re.find(text).map(|m| m.as_str().to_lowercase())
}

/// Keyword and link based claim classifier.
#[derive(Debug, Clone, Default)]
pub struct Router {
    policy: TriagePolicy,
}

impl Router {
    pub fn new(policy: TriagePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> TriagePolicy {
        self.policy
    }

    pub fn classify(&self, claim: &str) -> Triage {
        let mut rationale = Vec::new();

        let scam = self.scam_signal(claim);
        if let Some(reason) = &scam {
            rationale.push(format!("scam: {reason}"));
        }

        let news = first_match(&NEWS_MARKERS, claim);
        if let Some(marker) = &news {
            rationale.push(format!("news: mentions '{marker}'"));
        }

        let fact = match first_match(&FACT_MARKERS, claim) {
            Some(marker) => Some(format!("checkable wording '{marker}'")),
            // a bare statement of fact only routes here when nothing else claimed it
            None if scam.is_none() && news.is_none() => first_match(&FACT_COPULAS, claim)
                .map(|marker| format!("factual statement ('{marker}')")),
            None => None,
        };
        if let Some(reason) = &fact {
            rationale.push(format!("fact: {reason}"));
        }

        let mut lanes = Vec::new();
        match self.policy {
            TriagePolicy::Multi => {
                if news.is_some() {
                    lanes.push(Lane::News);
                }
                if fact.is_some() {
                    lanes.push(Lane::Fact);
                }
                if scam.is_some() {
                    lanes.push(Lane::Scam);
                }
            }
            TriagePolicy::Single => {
                let winner = if scam.is_some() {
                    Some(Lane::Scam)
                } else if news.is_some() {
                    Some(Lane::News)
                } else if fact.is_some() {
                    Some(Lane::Fact)
                } else {
                    None
                };
                if let Some(lane) = winner {
                    if rationale.len() > 1 {
                        rationale.push(format!("single-lane policy kept {}", lane.as_str()));
                    }
                    lanes.push(lane);
                }
            }
        }

        if lanes.is_empty() {
            rationale.push("no lane signals matched".to_string());
        }

        Triage { lanes, rationale }
    }

    fn scam_signal(&self, claim: &str) -> Option<String> {
        if let Some(url) = extract_urls(claim).first() {
            return Some(format!("contains link {url}"));
        }
        if let Some(word) = first_match(&SCAM_WORDS, claim) {
            return Some(format!("mentions '{word}'"));
        }
        if let Some(phrase) = first_match(&FINANCIAL_REQUEST, claim) {
            return Some(format!("financial request '{phrase}'"));
        }
        first_match(&PRESSURE_OR_IDENTITY, claim).map(|phrase| format!("pressure wording '{phrase}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lanes(policy: TriagePolicy, claim: &str) -> Vec<Lane> {
        Router::new(policy).classify(claim).lanes
    }

    #[test]
    fn flat_earth_routes_to_fact_only() {
        assert_eq!(lanes(TriagePolicy::Multi, "Earth is flat"), vec![Lane::Fact]);
        assert_eq!(lanes(TriagePolicy::Single, "Earth is flat"), vec![Lane::Fact]);
    }

    #[test]
    fn phishing_message_routes_to_scam() {
        let claim = "URGENT: Your account will be suspended unless you verify your identity \
                     immediately at http://suspicious-link.com. Act now!";
        assert_eq!(lanes(TriagePolicy::Multi, claim), vec![Lane::Scam]);
    }

    #[test]
    fn multi_policy_keeps_every_match_in_canonical_order() {
        let claim = "Breaking news: scientists say coffee causes cancer, see https://health.example/story";
        assert_eq!(
            lanes(TriagePolicy::Multi, claim),
            vec![Lane::News, Lane::Fact, Lane::Scam]
        );
    }

    #[test]
    fn single_policy_uses_priority() {
        let claim = "Breaking news: scientists say coffee causes cancer, see https://health.example/story";
        assert_eq!(lanes(TriagePolicy::Single, claim), vec![Lane::Scam]);

        let claim = "Police reported that vaccines cause autism";
        assert_eq!(lanes(TriagePolicy::Multi, claim), vec![Lane::News, Lane::Fact]);
        assert_eq!(lanes(TriagePolicy::Single, claim), vec![Lane::News]);
    }

    #[test]
    fn unmatched_claim_selects_no_lane() {
        let triage = Router::default().classify("hello there");
        assert!(triage.is_empty());
        assert_eq!(triage.rationale, vec!["no lane signals matched".to_string()]);
    }

    #[test]
    fn policy_parses_from_str() {
        assert_eq!("Single".parse::<TriagePolicy>(), Ok(TriagePolicy::Single));
        assert_eq!("multi".parse::<TriagePolicy>(), Ok(TriagePolicy::Multi));
        assert!("both".parse::<TriagePolicy>().is_err());
    }
}
