//! Lightweight text normalization shared by keyword lookup, query
//! classification, and claim grouping.

use std::collections::BTreeSet;

/// Words that carry no subject information.
const STOPWORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "am", "of", "to", "in",
    "on", "at", "by", "for", "with", "about", "as", "and", "or", "but", "if", "then", "than",
    "that", "this", "these", "those", "it", "its", "do", "does", "did", "has", "have", "had",
    "will", "would", "should", "can", "could", "may", "might", "must", "so", "such", "from",
    "into", "what", "which", "who", "whom", "whose", "when", "where", "why", "how", "i", "you",
    "we", "they", "he", "she", "me", "my", "our", "your", "their", "please", "tell", "really",
    "very", "also", "just",
];

/// Words that flip the polarity of an assertion.
const NEGATIONS: &[&str] = &[
    "not", "no", "never", "none", "false", "untrue", "incorrect", "wrong", "isn't", "aren't",
    "wasn't", "weren't", "doesn't", "don't", "didn't", "cannot", "can't", "won't", "nobody",
    "nothing", "neither", "nor",
];

/// Words that assert truth without adding subject information.
const AFFIRMATIONS: &[&str] = &["true", "correct", "yes", "indeed", "right", "confirmed"];

/// Linking verbs that split a claim into its subject and what is asserted
/// about it.
const COPULAS: &[&str] = &[
    "is", "are", "was", "were", "will", "isn't", "aren't", "wasn't", "weren't", "won't",
];

/// Lowercased alphanumeric words, apostrophes kept inside words.
pub fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|w| w.trim_matches('\'').to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Content-bearing terms: words minus stopwords, negations, and affirmations.
pub fn terms(text: &str) -> Vec<String> {
    words(text)
        .into_iter()
        .filter(|w| {
            let w = w.as_str();
            !STOPWORDS.contains(&w) && !NEGATIONS.contains(&w) && !AFFIRMATIONS.contains(&w)
        })
        .collect()
}

/// Distinct content-bearing terms.
pub fn term_set(text: &str) -> BTreeSet<String> {
    terms(text).into_iter().collect()
}

/// `true` when the text asserts the negation of its subject
/// (an odd number of negation markers).
pub fn is_negated(text: &str) -> bool {
    let count = words(text)
        .iter()
        .filter(|w| NEGATIONS.contains(&w.as_str()) || w.ends_with("n't"))
        .count();
    count % 2 == 1
}

/// Subject and value terms of a copular claim ("the launch is on Monday"
/// gives `{launch}` and `{monday}`). `None` when the text has no linking
/// verb or nothing content-bearing precedes it.
pub fn split_claim(text: &str) -> Option<(BTreeSet<String>, BTreeSet<String>)> {
    let words = words(text);
    let at = words.iter().position(|w| COPULAS.contains(&w.as_str()))?;
    let content = |ws: &[String]| -> BTreeSet<String> {
        terms(&ws.join(" ")).into_iter().collect()
    };
    let subject = content(&words[..at]);
    if subject.is_empty() {
        return None;
    }
    Some((subject, content(&words[at + 1..])))
}

/// Jaccard similarity of two term sets; two empty sets are dissimilar.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Case-insensitive phrase containment.
pub fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    haystack.to_lowercase().contains(&phrase.to_lowercase())
}

/// Truncate to at most `max_chars` characters, appending "..." if truncated.
pub fn truncate(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        None => content.to_string(),
        Some((end, _)) => format!("{}...", &content[..end]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terms_drop_polarity_and_stopwords() {
        assert_eq!(terms("X is false"), vec!["x"]);
        assert_eq!(terms("The launch is NOT delayed"), vec!["launch", "delayed"]);
    }

    #[test]
    fn negation_parity() {
        assert!(is_negated("X is false"));
        assert!(!is_negated("X is true"));
        assert!(!is_negated("it is not false"));
        assert!(is_negated("the bridge isn't open"));
    }

    #[test]
    fn claims_split_at_the_linking_verb() {
        let (subject, value) = split_claim("The launch is on Monday").unwrap();
        assert_eq!(subject, term_set("launch"));
        assert_eq!(value, term_set("monday"));

        let (subject, value) = split_claim("The door isn't open").unwrap();
        assert_eq!(subject, term_set("door"));
        assert_eq!(value, term_set("open"));

        assert_eq!(split_claim("X is false").unwrap().1, BTreeSet::new());
        assert!(split_claim("It is raining").is_none());
        assert!(split_claim("The ferry leaves at noon").is_none());
    }

    #[test]
    fn jaccard_bounds() {
        let a = term_set("coffee improves focus");
        let b = term_set("coffee does not improve focus");
        assert!(jaccard(&a, &a) > 0.99);
        assert!(jaccard(&a, &b) > 0.0 && jaccard(&a, &b) < 1.0);
        assert_eq!(jaccard(&BTreeSet::new(), &BTreeSet::new()), 0.0);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo world", 5), "héllo...");
        assert_eq!(truncate("short", 10), "short");
    }
}
