//! Search query derivation for the news worker.

const MAX_QUERY_CHARS: usize = 200;
const TRUNCATE_CHARS: usize = 150;
const MAX_TOKENS: usize = 15;
const STOP_WORDS: &[&str] = &[
    "that", "this", "with", "from", "have", "been", "were", "said", "told",
];

/// Derive a search query from a claim.
///
/// Punctuation that confuses news search (`,` `;` `:`) becomes whitespace and
/// runs of whitespace collapse. Claims longer than 200 characters are reduced
/// to at most 15 salient tokens from their first 150 characters. Applying the
/// function to its own output returns the same string.
pub fn derive_news_query(claim: &str) -> String {
    let cleaned = claim
        .replace([',', ';', ':'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if cleaned.chars().count() <= MAX_QUERY_CHARS {
        return cleaned;
    }

    let head: String = cleaned.chars().take(TRUNCATE_CHARS).collect();
    head.split_whitespace()
        .filter(|token| token.chars().count() > 3)
        .filter(|token| !STOP_WORDS.contains(&token.to_lowercase().as_str()))
        .take(MAX_TOKENS)
        .collect::<Vec<_>>()
        .join(" ")
}
