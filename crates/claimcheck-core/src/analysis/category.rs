use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Subject-matter category of a factual claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimCategory {
    Health,
    Politics,
    Science,
    Economics,
    History,
    Other,
}

impl ClaimCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimCategory::Health => "health",
            ClaimCategory::Politics => "politics",
            ClaimCategory::Science => "science",
            ClaimCategory::Economics => "economics",
            ClaimCategory::History => "history",
            ClaimCategory::Other => "other",
        }
    }
}

impl fmt::Display for ClaimCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Order doubles as the tie-break priority.
static CATEGORY_PATTERNS: Lazy<Vec<(ClaimCategory, Regex)>> = Lazy::new(|| {
    [
        (
            ClaimCategory::Health,
            r"health\w*|vaccin\w*|covid\w*|virus\w*|cancer|diseases?|doctors?|medicines?|medical|drugs?|diet\w*|coffee|vitamins?|hospitals?|cures?|symptoms?|infections?|pandemic|obesity|diabetes|heart attacks?|nutrition|calories",
        ),
        (
            ClaimCategory::Politics,
            r"elections?|president\w*|government|ministers?|congress|parliament|senat\w*|votes?|voting|voters?|polic(?:y|ies)|laws?|legislation|parties|democrat\w*|republican\w*|campaign\w*|politic\w*|governor|mayor|prime minister",
        ),
        (
            ClaimCategory::Science,
            r"earth|flat|climate|space|planets?|nasa|physics|chemistry|biology|evolution|scientists?|scientific|moon|gravity|species|quantum|dna|atoms?|universe|solar|globe|astronom\w*|carbon|temperature",
        ),
        (
            ClaimCategory::Economics,
            r"econom\w*|inflation|gdp|markets?|stocks?|unemployment|tax(?:es)?|prices?|trade|interest rates?|recession|dollars?|salar(?:y|ies)|wages?|crypto\w*|bitcoin|jobs|debt|budget",
        ),
        (
            ClaimCategory::History,
            r"history|historical|wars?|century|centuries|ancient|empire|revolution|medieval|founded|pharaohs?|pyramids?|dynasty|civil war|world war",
        ),
    ]
    .into_iter()
    .map(|(category, alternation)| {
        let pattern = format!(r"(?i)\b(?:{alternation})\b");
        (category, Regex::new(&pattern).expect("invalid category regex"))
    })
    .collect()
});

/// Classify a claim by subject matter only; verdicts never influence this.
pub fn classify_category(claim: &str) -> ClaimCategory {
    let mut best = (ClaimCategory::Other, 0usize);
    for (category, pattern) in CATEGORY_PATTERNS.iter() {
        let hits = pattern.find_iter(claim).count();
        if hits > best.1 {
            best = (*category, hits);
        }
    }
    best.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_subject() {
        assert_eq!(classify_category("Earth is flat"), ClaimCategory::Science);
        assert_eq!(
            classify_category("Is it true that drinking coffee reduces the risk of cancer?"),
            ClaimCategory::Health
        );
        assert_eq!(
            classify_category("The president rigged the election"),
            ClaimCategory::Politics
        );
        assert_eq!(
            classify_category("Inflation hit 9 percent and the stock market fell"),
            ClaimCategory::Economics
        );
        assert_eq!(
            classify_category("The pyramids were built by slaves in ancient Egypt"),
            ClaimCategory::History
        );
        assert_eq!(classify_category("My cat likes boxes"), ClaimCategory::Other);
    }

    #[test]
    fn ties_follow_fixed_priority() {
        // one health hit, one science hit
        assert_eq!(classify_category("vaccine scientists"), ClaimCategory::Health);
    }
}
