//! Text -> normalized token sequence.

use crate::stem::stem;

/// Fragments shorter than this (in chars) are dropped.
const MIN_TOKEN_CHARS: usize = 2;

/// Characters trimmed from the edges of a word before it is checked for
/// being an e-mail address or URL.
const EDGE_PUNCTUATION: &[char] = &[
    '.', ',', ';', ':', '!', '?', '(', ')', '[', ']', '<', '>', '"', '\'',
];

/// Fixed English stopword list.
pub const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "i", "if", "in", "into", "is", "it", "its",
    "itself", "just", "me", "more", "most", "my", "myself", "no", "nor", "not", "now", "of",
    "off", "on", "once", "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own",
    "same", "she", "should", "so", "some", "such", "than", "that", "the", "their", "theirs",
    "them", "themselves", "then", "there", "these", "they", "this", "those", "through", "to",
    "too", "under", "until", "up", "very", "was", "we", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
    "yourselves",
];

/// Whether a lowercased word is on the stopword list.
pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

/// Normalize text into an ordered token sequence.
///
/// Pure and deterministic. Empty or punctuation-only input yields an empty
/// sequence, which downstream stages treat as "no match".
pub fn normalize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();

    for word in text.split_whitespace() {
        let trimmed = word.trim_matches(EDGE_PUNCTUATION);
        if is_email(trimmed) || is_url(trimmed) {
            tokens.push(trimmed.to_lowercase());
            continue;
        }

        for piece in word.split(|c: char| !c.is_alphanumeric()) {
            if piece.chars().count() < MIN_TOKEN_CHARS {
                continue;
            }
            let lower = piece.to_lowercase();
            if is_stopword(&lower) {
                continue;
            }
            tokens.push(stem(&lower));
        }
    }

    tokens
}

fn is_email(word: &str) -> bool {
    let Some((local, domain)) = word.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let local_ok = local
        .chars()
        .all(|c| c.is_alphanumeric() || "._%+-".contains(c));
    let labels: Vec<&str> = domain.split('.').collect();
    let domain_ok = labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty() && label.chars().all(|c| c.is_alphanumeric() || c == '-')
        });
    local_ok && domain_ok
}

fn is_url(word: &str) -> bool {
    ["http://", "https://"]
        .iter()
        .any(|scheme| word.len() > scheme.len() && word.to_ascii_lowercase().starts_with(scheme))
}
