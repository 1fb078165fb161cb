//! Credibility of external passages.
//!
//! Web and connected-knowledge passages are tiered by the domain of their
//! identifier, scanned for bias markers, and scored. Canon and project
//! passages are never assessed; their standing comes from category
//! precedence alone.

use serde::{Deserialize, Serialize};

use super::{Passage, SourceCategory};
use crate::text;

/// Domains whose labels mark a primary source.
const PRIMARY_LABELS: &[&str] = &["gov", "edu"];
/// Domains (and their subdomains) treated as primary.
const PRIMARY_DOMAINS: &[&str] = &[
    "arxiv.org",
    "nature.com",
    "science.org",
    "who.int",
    "un.org",
    "ieee.org",
    "acm.org",
];
/// Domain labels marking an established secondary outlet.
const SECONDARY_LABELS: &[&str] = &[
    "bbc",
    "reuters",
    "ap",
    "apnews",
    "nytimes",
    "guardian",
    "theguardian",
    "economist",
    "wikipedia",
    "britannica",
];

/// Word prefixes that mark opinion or paid content.
const BIAS_MARKERS: &[(&str, &str)] = &[
    ("opinion", "мнени"),
    ("editorial", "редакционн"),
    ("sponsored", "спонсор"),
    ("advertisement", "реклам"),
    ("paid", "оплачен"),
];

/// Word prefixes in a title that suggest the passage is the original work.
const ORIGINAL_MARKERS: &[&str] = &[
    "original",
    "study",
    "research",
    "paper",
    "report",
    "исследовани",
    "оригинал",
    "отчёт",
];

/// How close a source sits to the thing it reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTier {
    Primary,
    Secondary,
    Tertiary,
}

impl SourceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
            Self::Tertiary => "tertiary",
        }
    }

    fn base_score(self) -> f64 {
        match self {
            Self::Primary => 0.9,
            Self::Secondary => 0.7,
            Self::Tertiary => 0.4,
        }
    }
}

impl std::fmt::Display for SourceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assessment attached to an external passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credibility {
    pub tier: SourceTier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bias_indicators: Vec<String>,
    /// Source score in `[0.1, 1.0]`.
    pub score: f64,
    /// A primary source that looks like the original work.
    pub original: bool,
}

/// Host of `identifier` when it parses as a URL with a host.
pub fn domain_of(identifier: &str) -> Option<String> {
    let url = reqwest::Url::parse(identifier).ok()?;
    url.host_str().map(|h| h.trim_start_matches("www.").to_lowercase())
}

/// Tier from the domain. No domain is tertiary.
pub fn classify_tier(domain: Option<&str>) -> SourceTier {
    let Some(domain) = domain.map(str::to_lowercase) else {
        return SourceTier::Tertiary;
    };
    let labels: Vec<&str> = domain.split('.').collect();

    let under = |root: &str| domain == root || domain.ends_with(&format!(".{root}"));
    if labels.iter().any(|l| PRIMARY_LABELS.contains(l)) || PRIMARY_DOMAINS.iter().any(|&d| under(d)) {
        return SourceTier::Primary;
    }
    if labels.iter().any(|l| SECONDARY_LABELS.contains(l)) {
        return SourceTier::Secondary;
    }
    SourceTier::Tertiary
}

/// Bias markers present in `text`, by their English name.
pub fn detect_bias(text: &str) -> Vec<String> {
    let words = text::words(text);
    BIAS_MARKERS
        .iter()
        .filter(|(en, ru)| words.iter().any(|w| w.starts_with(en) || w.starts_with(ru)))
        .map(|(en, _)| en.to_string())
        .collect()
}

/// Tier base, minus 0.1 per bias marker and 0.05 without an author,
/// clamped to `[0.1, 1.0]`.
pub fn source_score(tier: SourceTier, bias_markers: usize, has_author: bool) -> f64 {
    let mut score = tier.base_score() - 0.1 * bias_markers as f64;
    if !has_author {
        score -= 0.05;
    }
    score.clamp(0.1, 1.0)
}

fn looks_original(tier: SourceTier, title: &str) -> bool {
    tier == SourceTier::Primary
        && text::words(title)
            .iter()
            .any(|w| ORIGINAL_MARKERS.iter().any(|m| w.starts_with(m)))
}

/// Assess an external passage. `None` for canon and project.
pub fn assess(passage: &Passage) -> Option<Credibility> {
    if !matches!(
        passage.category,
        SourceCategory::ConnectedKnowledge | SourceCategory::Web
    ) {
        return None;
    }

    let domain = domain_of(&passage.identifier);
    let tier = classify_tier(domain.as_deref());
    let title = passage.title.as_deref().unwrap_or(&passage.text);
    let bias_indicators = detect_bias(&format!("{title} {}", passage.text));
    let score = source_score(tier, bias_indicators.len(), passage.author.is_some());

    Some(Credibility {
        tier,
        domain,
        original: looks_original(tier, title),
        bias_indicators,
        score,
    })
}

/// Attach an assessment to an external passage that has none yet.
pub fn assessed(mut passage: Passage) -> Passage {
    if passage.credibility.is_none() {
        passage.credibility = assess(&passage);
    }
    passage
}
