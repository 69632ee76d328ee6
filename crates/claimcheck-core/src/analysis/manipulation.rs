use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{normalize_text, phrase_matchers};

/// Manipulation tactic recognised in a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tactic {
    ArtificialUrgency,
    AuthorityImpersonation,
    FinancialManipulation,
    ThreateningLanguage,
    TooGoodToBeTrue,
}

impl Tactic {
    pub fn label(&self) -> &'static str {
        match self {
            Tactic::ArtificialUrgency => "Artificial Urgency",
            Tactic::AuthorityImpersonation => "Authority Impersonation",
            Tactic::FinancialManipulation => "Financial Manipulation",
            Tactic::ThreateningLanguage => "Threatening Language",
            Tactic::TooGoodToBeTrue => "Too Good To Be True",
        }
    }
}

/// Severity bucket derived from tactic count and pressure scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManipulationLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManipulationAnalysis {
    pub tactics: Vec<Tactic>,
    pub urgency_score: f32,
    pub fear_score: f32,
    pub red_flags: Vec<String>,
    pub analysis_confidence: f32,
}

impl ManipulationAnalysis {
    pub fn level(&self) -> ManipulationLevel {
        let tactic_count = self.tactics.len();
        if self.urgency_score >= 0.7
            || self.fear_score >= 0.7
            || tactic_count >= 3
            || (self.urgency_score >= 0.5 && tactic_count >= 2)
        {
            ManipulationLevel::High
        } else if tactic_count >= 1 {
            ManipulationLevel::Medium
        } else {
            ManipulationLevel::Low
        }
    }
}

const URGENCY_PHRASES: &[&str] = &[
    "act now",
    "limited time",
    "expires soon",
    "urgent",
    "immediate action",
    "don't wait",
    "hurry",
    "right now",
    "within 24 hours",
    "before it's too late",
];

const AUTHORITY_PHRASES: &[&str] = &[
    "irs",
    "government",
    "bank",
    "official notice",
    "legal action",
    "warrant",
    "suspend your account",
    "verify your identity",
    "security alert",
];

const FINANCIAL_PHRASES: &[&str] = &[
    "send money",
    "wire transfer",
    "gift card",
    "bitcoin",
    "confirm payment",
    "refund",
    "tax refund",
    "prize",
    "won the lottery",
    "inheritance",
    "investment opportunity",
];

const THREAT_PHRASES: &[&str] = &[
    "arrest",
    "jail",
    "lawsuit",
    "legal consequences",
    "suspended",
    "terminated",
    "penalty",
    "fine",
];

const TOO_GOOD_PHRASES: &[&str] = &[
    "guaranteed",
    "risk-free",
    "100% profit",
    "make money fast",
    "work from home",
    "easy money",
    "no experience needed",
];

type PhraseTable = Vec<(&'static str, Regex)>;

static TABLES: Lazy<[(Tactic, PhraseTable); 5]> = Lazy::new(|| {
    [
        (Tactic::ArtificialUrgency, phrase_matchers(URGENCY_PHRASES)),
        (Tactic::AuthorityImpersonation, phrase_matchers(AUTHORITY_PHRASES)),
        (Tactic::FinancialManipulation, phrase_matchers(FINANCIAL_PHRASES)),
        (Tactic::ThreateningLanguage, phrase_matchers(THREAT_PHRASES)),
        (Tactic::TooGoodToBeTrue, phrase_matchers(TOO_GOOD_PHRASES)),
    ]
});

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

/// Local analysis of pressure and manipulation tactics; no external calls.
pub fn analyze_manipulation(text: &str) -> ManipulationAnalysis {
    let text = normalize_text(text);
    let mut analysis = ManipulationAnalysis::default();
    let mut urgency_hits = 0usize;
    let mut threat_hits = 0usize;

    for (tactic, table) in TABLES.iter() {
        let hits: Vec<&'static str> = table
            .iter()
            .filter(|(_, matcher)| matcher.is_match(&text))
            .map(|(phrase, _)| *phrase)
            .collect();
        if hits.is_empty() {
            continue;
        }

        match tactic {
            Tactic::ArtificialUrgency => urgency_hits = hits.len(),
            Tactic::ThreateningLanguage => threat_hits = hits.len(),
            _ => {}
        }

        analysis.tactics.push(*tactic);
        for phrase in hits {
            if !analysis.red_flags.iter().any(|flag| flag == phrase) {
                analysis.red_flags.push(phrase.to_string());
            }
        }
    }

    analysis.urgency_score = round2((urgency_hits as f32 * 0.25).min(1.0));
    analysis.fear_score = round2((threat_hits as f32 * 0.25).min(1.0));
    analysis.analysis_confidence = if analysis.tactics.is_empty() { 0.5 } else { 0.8 };
    analysis
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_phishing_message_tactics() {
        let analysis = analyze_manipulation(
            "URGENT: Your account will be suspended unless you verify your identity immediately \
             at http://suspicious-link.com. Act now!",
        );

        assert_eq!(
            analysis.tactics,
            vec![
                Tactic::ArtificialUrgency,
                Tactic::AuthorityImpersonation,
                Tactic::ThreateningLanguage
            ]
        );
        assert_eq!(analysis.urgency_score, 0.5);
        assert_eq!(analysis.fear_score, 0.25);
        assert!(analysis.red_flags.contains(&"verify your identity".to_string()));
        assert_eq!(analysis.analysis_confidence, 0.8);
        assert_eq!(analysis.level(), ManipulationLevel::High);
    }

    #[test]
    fn word_boundaries_avoid_false_hits() {
        // "first" contains "irs", "define" contains "fine"
        let analysis = analyze_manipulation("The first step is to define the problem.");
        assert!(analysis.tactics.is_empty());
        assert_eq!(analysis.analysis_confidence, 0.5);
        assert_eq!(analysis.level(), ManipulationLevel::Low);
    }

    #[test]
    fn urgency_score_caps_at_one() {
        let analysis = analyze_manipulation(
            "Urgent! Act now, limited time, hurry, don\u{2019}t wait, expires soon",
        );
        assert_eq!(analysis.urgency_score, 1.0);
        assert_eq!(analysis.tactics, vec![Tactic::ArtificialUrgency]);
    }

    #[test]
    fn level_thresholds() {
        let medium = ManipulationAnalysis {
            tactics: vec![Tactic::TooGoodToBeTrue],
            urgency_score: 0.0,
            ..ManipulationAnalysis::default()
        };
        assert_eq!(medium.level(), ManipulationLevel::Medium);

        let high = ManipulationAnalysis {
            tactics: vec![Tactic::AuthorityImpersonation],
            urgency_score: 0.9,
            ..ManipulationAnalysis::default()
        };
        assert_eq!(high.level(), ManipulationLevel::High);
    }
}
