//! Deterministic text signals feeding the lane rubrics.

mod category;
mod links;
mod manipulation;
mod ratings;
mod stance;

pub use category::{ClaimCategory, classify_category};
pub use links::{extract_urls, outlet_domain};
pub use manipulation::{ManipulationAnalysis, ManipulationLevel, Tactic, analyze_manipulation};
pub use ratings::{Consensus, RatingClass, normalize_rating};
pub use stance::{PatternMatch, Stance, assess_answer, assess_scam_pattern};

use regex::Regex;

/// Compile one case-insensitive, word-bounded matcher per phrase.
fn phrase_matchers(phrases: &[&'static str]) -> Vec<(&'static str, Regex)> {
    phrases
        .iter()
        .map(|phrase| {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(phrase));
            (
                *phrase,
                Regex::new(&pattern).expect("escaped phrase is a valid regex"),
            )
        })
        .collect()
}

/// Lowercase and fold typographic apostrophes so phrase tables match.
fn normalize_text(text: &str) -> String {
    text.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'")
}
