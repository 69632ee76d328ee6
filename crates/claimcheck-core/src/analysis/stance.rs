use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::normalize_text;

/// Position a research answer takes on the claim it was asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Supports,
    Refutes,
    Partial,
    Misleading,
    Inconclusive,
}

impl Stance {
    pub fn is_decisive(&self) -> bool {
        matches!(self, Stance::Supports | Stance::Refutes)
    }
}

/// How strongly a research answer matches known scam patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternMatch {
    Strong,
    Weak,
    None,
    Legitimate,
}

const VERDICT_WORDS: &str = "partly true|partially true|half true|mostly true|mostly false|not true|\
                             true|false|misleading|unverified|unproven|inaccurate|accurate|\
                             incorrect|correct";

static EXPLICIT_VERDICT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r#"\b(?:verdict|conclusion|rating)[*_\s]*(?:is\b)?[*_\s]*[:\-]?[*_"'\s]*({VERDICT_WORDS})\b|\bthe claim is\s+[*_"']*({VERDICT_WORDS})\b"#
    ))
    .expect("static verdict regex")
});

/// Sentences naming the claim itself; their markers outrank the rest.
static CLAIM_SUBJECT: Lazy<Regex> = Lazy::new(|| group(&[r"claims?", "assertion", "allegation"]));

static UNCONFIRMED: Lazy<Regex> = Lazy::new(|| {
    group(&[
        "unverified",
        "unconfirmed",
        "unproven",
        "could not verify",
        "could not be verified",
        "cannot be verified",
        "unable to verify",
        "could not be confirmed",
        "has not been confirmed",
        "insufficient evidence",
        "not enough evidence",
        "inconclusive",
        "unclear",
    ])
});

static PARTIAL: Lazy<Regex> = Lazy::new(|| {
    group(&[
        "partly true",
        "partially true",
        "half true",
        "partly accurate",
        "partially accurate",
        "mixed evidence",
        "some truth",
    ])
});

static MISLEADING: Lazy<Regex> = Lazy::new(|| {
    group(&[
        "misleading",
        "missing context",
        "out of context",
        "lacks context",
        "exaggerated",
        "oversimplified",
    ])
});

static REFUTE: Lazy<Regex> = Lazy::new(|| {
    group(&[
        "not true",
        "untrue",
        "false",
        "debunked",
        "incorrect",
        "inaccurate",
        "not accurate",
        "no evidence",
        "not supported",
        "unsupported",
        "refuted",
        "refutes",
        "disproven",
        "myth",
        "hoax",
        "fabricated",
        "baseless",
        r"contradict\w*",
    ])
});

static SUPPORT: Lazy<Regex> = Lazy::new(|| {
    group(&[
        "true",
        "accurate",
        "correct",
        "confirmed",
        "confirms",
        "verified",
        "supported",
        "supports",
        "corroborated",
        "substantiated",
        "consistent with",
    ])
});

static NEGATED_LEGIT: Lazy<Regex> = Lazy::new(|| {
    group(&[
        "not legitimate",
        "not a legitimate",
        r"isn't legitimate",
        "not legit",
        "not genuine",
        "not official",
        "not authentic",
    ])
});

static LEGIT: Lazy<Regex> = Lazy::new(|| {
    group(&[
        "not a scam",
        "not a known scam",
        "no evidence of a scam",
        "no scam reports",
        "legitimate",
        "genuine",
        "authentic",
        "official communication",
    ])
});

static SCAM: Lazy<Regex> = Lazy::new(|| {
    group(&[
        r"scams?",
        "phishing",
        "fraud",
        "fraudulent",
        r"red flags?",
        r"warning signs?",
        r"impersonat\w*",
        "malicious",
        "deceptive",
        "social engineering",
        "smishing",
    ])
});

fn group(patterns: &[&str]) -> Regex {
    Regex::new(&format!(r"\b(?:{})\b", patterns.join("|"))).expect("static marker regex")
}

/// Count matches, blank them out in `text` and report the first position.
///
/// Blanking keeps byte offsets stable so later passes stay comparable.
fn scrub(text: &mut String, re: &Regex) -> (usize, Option<usize>) {
    let spans: Vec<(usize, usize)> = re.find_iter(text.as_str()).map(|m| (m.start(), m.end())).collect();
    let first = spans.first().map(|(start, _)| *start);
    for (start, end) in &spans {
        text.replace_range(*start..*end, &" ".repeat(end - start));
    }
    (spans.len(), first)
}

fn verdict_word(word: &str) -> Stance {
    match word {
        "partly true" | "partially true" | "half true" => Stance::Partial,
        "mostly true" | "true" | "accurate" | "correct" => Stance::Supports,
        "mostly false" | "not true" | "false" | "inaccurate" | "incorrect" => Stance::Refutes,
        "misleading" => Stance::Misleading,
        _ => Stance::Inconclusive,
    }
}

/// Classify a research answer as supporting, refuting or inconclusive.
///
/// An explicit "Verdict: X" or "the claim is X" wins. Next, markers in
/// sentences that name the claim are counted on their own, so support for
/// a competing fact ("confirms the Earth is a spheroid") cannot outvote a
/// refutation of the claim. Otherwise markers across the whole answer are
/// counted; hedging that outweighs every decisive marker, or no decisive
/// marker at all, is inconclusive.
pub fn assess_answer(answer: &str) -> Stance {
    let text = normalize_text(answer);

    if let Some(caps) = EXPLICIT_VERDICT.captures(&text) {
        if let Some(word) = caps.get(1).or_else(|| caps.get(2)) {
            return verdict_word(word.as_str());
        }
    }

    if let Some(focused) = claim_sentences(&text) {
        let tally = Tally::count(focused);
        if tally.has_markers() {
            return tally.stance();
        }
    }

    Tally::count(text).stance()
}

/// `text` with every sentence that does not name the claim blanked out.
fn claim_sentences(text: &str) -> Option<String> {
    let mut focused = String::with_capacity(text.len());
    let mut any = false;
    for sentence in text.split_inclusive(['.', '!', '?', ';', '\n']) {
        if CLAIM_SUBJECT.is_match(sentence) {
            any = true;
            focused.push_str(sentence);
        } else {
            focused.push_str(&" ".repeat(sentence.len()));
        }
    }
    any.then_some(focused)
}

struct Tally {
    unconfirmed: usize,
    candidates: [(Stance, (usize, Option<usize>)); 4],
}

impl Tally {
    fn count(mut text: String) -> Self {
        let (unconfirmed, _) = scrub(&mut text, &UNCONFIRMED);
        // refutations go before support so "not supported" is not read twice
        let candidates = [
            (Stance::Partial, scrub(&mut text, &PARTIAL)),
            (Stance::Misleading, scrub(&mut text, &MISLEADING)),
            (Stance::Refutes, scrub(&mut text, &REFUTE)),
            (Stance::Supports, scrub(&mut text, &SUPPORT)),
        ];
        Self {
            unconfirmed,
            candidates,
        }
    }

    fn decisive(&self) -> usize {
        self.candidates.iter().map(|(_, (count, _))| count).sum()
    }

    fn has_markers(&self) -> bool {
        self.unconfirmed > 0 || self.decisive() > 0
    }

    fn stance(&self) -> Stance {
        let decisive = self.decisive();
        if decisive == 0 || self.unconfirmed > decisive {
            return Stance::Inconclusive;
        }

        self.candidates
            .iter()
            .filter(|(_, (count, _))| *count > 0)
            .max_by(|(_, (a_count, a_pos)), (_, (b_count, b_pos))| {
                // more hits wins; on a tie the earlier first mention wins
                a_count.cmp(b_count).then_with(|| b_pos.cmp(a_pos))
            })
            .map(|(stance, _)| *stance)
            .unwrap_or(Stance::Inconclusive)
    }
}

/// Grade a research answer against scam vocabulary.
pub fn assess_scam_pattern(answer: &str) -> PatternMatch {
    let mut text = normalize_text(answer);

    let (negated, _) = scrub(&mut text, &NEGATED_LEGIT);
    let (legit, _) = scrub(&mut text, &LEGIT);
    let (scam_hits, _) = scrub(&mut text, &SCAM);
    let scam = scam_hits + negated;

    if scam >= 3 && scam > legit {
        PatternMatch::Strong
    } else if scam >= 1 && scam > legit {
        PatternMatch::Weak
    } else if legit > scam {
        PatternMatch::Legitimate
    } else {
        PatternMatch::None
    }
}
