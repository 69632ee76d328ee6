use serde::{Deserialize, Serialize};

use crate::sources::FactCheckReview;

/// Normalized class of a publisher's textual rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingClass {
    True,
    False,
    Mixed,
    Misleading,
    Unrated,
}

impl RatingClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RatingClass::True => "true",
            RatingClass::False => "false",
            RatingClass::Mixed => "mixed",
            RatingClass::Misleading => "misleading",
            RatingClass::Unrated => "unrated",
        }
    }
}

/// Map free-form ratings ("Pants on Fire", "Half True", ...) to a class.
pub fn normalize_rating(rating: &str) -> RatingClass {
    let rating = rating.trim().to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|needle| rating.contains(needle));

    if rating.is_empty() || rating == "unknown" {
        RatingClass::Unrated
    } else if has(&["misleading", "missing context", "out of context", "exaggerat", "distort", "cherry"]) {
        RatingClass::Misleading
    } else if has(&["half", "mixed", "mixture", "partly", "partially", "part true"]) {
        RatingClass::Mixed
    } else if has(&[
        "false", "pants on fire", "fake", "incorrect", "wrong", "hoax", "not true", "untrue",
        "baseless", "fabricated", "no evidence", "unsupported", "scam", "debunked",
    ]) {
        RatingClass::False
    } else if has(&["true", "correct", "accurate", "verified", "legit"]) {
        RatingClass::True
    } else {
        RatingClass::Unrated
    }
}

/// Majority view of the rated reviews for one claim.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Consensus {
    pub class: RatingClass,
    pub agreeing: usize,
    pub rated: usize,
}

impl Consensus {
    /// `None` when no review carries a usable rating.
    ///
    /// A tie between different classes is reported as `Mixed`.
    pub fn from_reviews(reviews: &[FactCheckReview]) -> Option<Self> {
        let mut counts: Vec<(RatingClass, usize)> = Vec::new();
        for review in reviews {
            let class = normalize_rating(&review.rating);
            if class == RatingClass::Unrated {
                continue;
            }
            match counts.iter_mut().find(|(existing, _)| *existing == class) {
                Some((_, count)) => *count += 1,
                None => counts.push((class, 1)),
            }
        }

        let rated: usize = counts.iter().map(|(_, count)| count).sum();
        let top = counts.iter().map(|(_, count)| *count).max()?;
        let leaders: Vec<RatingClass> = counts
            .iter()
            .filter(|(_, count)| *count == top)
            .map(|(class, _)| *class)
            .collect();

        let class = if leaders.len() == 1 {
            leaders[0]
        } else {
            RatingClass::Mixed
        };

        Some(Self {
            class,
            agreeing: top,
            rated,
        })
    }

    pub fn strength(&self) -> f32 {
        if self.rated == 0 {
            0.0
        } else {
            self.agreeing as f32 / self.rated as f32
        }
    }

    /// Several reviewers, nearly all agreeing.
    pub fn is_strong(&self) -> bool {
        self.rated >= 2 && self.strength() >= 0.75
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(rating: &str) -> FactCheckReview {
        FactCheckReview {
            claim: "c".into(),
            claimant: "Unknown".into(),
            rating: rating.into(),
            url: format!("https://fc.example/{rating}"),
            source: "FC".into(),
            title: "t".into(),
        }
    }

    #[test]
    fn normalizes_common_ratings() {
        assert_eq!(normalize_rating("Pants on Fire"), RatingClass::False);
        assert_eq!(normalize_rating("FALSE"), RatingClass::False);
        assert_eq!(normalize_rating("Mostly False"), RatingClass::False);
        assert_eq!(normalize_rating("Half True"), RatingClass::Mixed);
        assert_eq!(normalize_rating("Missing context"), RatingClass::Misleading);
        assert_eq!(normalize_rating("Mostly True"), RatingClass::True);
        assert_eq!(normalize_rating("Correct"), RatingClass::True);
        assert_eq!(normalize_rating("Unknown"), RatingClass::Unrated);
        assert_eq!(normalize_rating("Needs review"), RatingClass::Unrated);
    }

    #[test]
    fn consensus_majority_and_strength() {
        let reviews = vec![review("False"), review("Pants on Fire"), review("Half True")];
        let consensus = Consensus::from_reviews(&reviews).expect("rated");
        assert_eq!(consensus.class, RatingClass::False);
        assert_eq!(consensus.agreeing, 2);
        assert_eq!(consensus.rated, 3);
        assert!(!consensus.is_strong());
    }

    #[test]
    fn consensus_tie_is_mixed_and_unrated_is_none() {
        let tie = Consensus::from_reviews(&[review("True"), review("False")]).unwrap();
        assert_eq!(tie.class, RatingClass::Mixed);

        assert!(Consensus::from_reviews(&[review("Unknown")]).is_none());
        assert!(Consensus::from_reviews(&[]).is_none());
    }
}
