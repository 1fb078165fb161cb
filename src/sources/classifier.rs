//! Query classification by trigger phrases.

use serde::Serialize;
use std::collections::BTreeSet;

use super::SourceCategory;
use crate::config::ClassifierConfig;
use crate::text;

/// How costly a wrong answer would be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stakes {
    Low,
    Medium,
    High,
}

/// Which categories a query needs and how much is at stake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub needed: BTreeSet<SourceCategory>,
    pub stakes: Stakes,
}

/// Pluggable classification strategy.
pub trait QueryClassifier: Send + Sync {
    fn classify(&self, query: &str) -> Classification;
}

/// Trigger-phrase classifier.
///
/// Canon and project are always needed. Verification language pulls in
/// connected knowledge and web; freshness language pulls in web;
/// high-stakes language pulls in both and raises stakes to high.
pub struct KeywordClassifier {
    verification: Vec<Vec<String>>,
    freshness: Vec<Vec<String>>,
    high_stakes: Vec<Vec<String>>,
}

impl KeywordClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        let split = |phrases: &[String]| -> Vec<Vec<String>> {
            phrases
                .iter()
                .map(|p| text::words(p))
                .filter(|w| !w.is_empty())
                .collect()
        };
        Self {
            verification: split(&config.verification_triggers),
            freshness: split(&config.freshness_triggers),
            high_stakes: split(&config.high_stakes_triggers),
        }
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

impl QueryClassifier for KeywordClassifier {
    fn classify(&self, query: &str) -> Classification {
        let words = text::words(query);
        let verification = any_phrase(&words, &self.verification);
        let freshness = any_phrase(&words, &self.freshness);
        let high_stakes = any_phrase(&words, &self.high_stakes);

        let mut needed = BTreeSet::from([SourceCategory::Canon, SourceCategory::Project]);
        if verification || high_stakes {
            needed.insert(SourceCategory::ConnectedKnowledge);
            needed.insert(SourceCategory::Web);
        }
        if freshness {
            needed.insert(SourceCategory::Web);
        }

        let stakes = if high_stakes {
            Stakes::High
        } else if verification || freshness {
            Stakes::Medium
        } else {
            Stakes::Low
        };

        tracing::debug!(
            verification,
            freshness,
            high_stakes,
            needed = needed.len(),
            "classified query"
        );
        Classification { needed, stakes }
    }
}

/// Whole-word phrase match: `phrase` appears as a contiguous run of `words`.
fn any_phrase(words: &[String], phrases: &[Vec<String>]) -> bool {
    phrases.iter().any(|phrase| {
        words
            .windows(phrase.len())
            .any(|window| window == phrase.as_slice())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use SourceCategory::*;

    fn classify(q: &str) -> Classification {
        KeywordClassifier::default().classify(q)
    }

    #[test]
    fn plain_queries_stay_local() {
        let c = classify("what did we decide about the garden");
        assert_eq!(c.needed, BTreeSet::from([Canon, Project]));
        assert_eq!(c.stakes, Stakes::Low);
    }

    #[test]
    fn verification_language_adds_external_sources() {
        let c = classify("can you verify that claim with a source");
        assert!(c.needed.contains(&ConnectedKnowledge));
        assert!(c.needed.contains(&Web));
        assert_eq!(c.stakes, Stakes::Medium);
    }

    #[test]
    fn freshness_language_adds_web_only() {
        let c = classify("what is the latest release");
        assert_eq!(c.needed, BTreeSet::from([Canon, Project, Web]));
    }

    #[test]
    fn high_stakes_raise_stakes() {
        let c = classify("what dosage of this medication is safe");
        assert_eq!(c.stakes, Stakes::High);
        assert_eq!(c.needed.len(), 4);
    }

    #[test]
    fn triggers_match_whole_words() {
        // "now" must not fire inside "know"
        let c = classify("I know the answer");
        assert_eq!(c.stakes, Stakes::Low);
    }
}
