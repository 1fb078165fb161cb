//! Trace step: check whether external evidence reaches an original source.
//!
//! Runs once over the final evidence. Nothing here changes which passages
//! are returned; it only produces [`TraceWarning`]s for the caller.

use serde::Serialize;

use crate::sources::{Passage, SourceTier};
use crate::text;

/// Query words that signal emotionally charged framing.
const EMOTIONAL_TRIGGERS: &[&str] = &[
    "breaking", "urgent", "shocking", "exclusive", "срочно", "шок", "скандал", "сенсация",
];

/// Something the caller should know about how well-sourced the answer is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TraceWarning {
    /// The query uses charged framing; treat matching sources with care.
    EmotionalTriggers { triggers: Vec<String> },
    /// No external passage came from a primary source.
    NoPrimarySource { external: usize },
    /// No external passage traced back to the original work.
    NoOriginalSource {
        /// Identifier of the highest-scored external passage.
        best: String,
        tier: SourceTier,
    },
    /// The caller required an original source and none was found.
    OriginalRequired,
}

/// Warnings for `query` given the final `evidence`.
pub fn trace(query: &str, evidence: &[Passage], require_original: bool) -> Vec<TraceWarning> {
    let mut warnings = Vec::new();

    let words = text::words(query);
    let triggers: Vec<String> = EMOTIONAL_TRIGGERS
        .iter()
        .filter(|t| words.iter().any(|w| w.as_str() == **t))
        .map(|t| t.to_string())
        .collect();
    if !triggers.is_empty() {
        warnings.push(TraceWarning::EmotionalTriggers { triggers });
    }

    let external: Vec<(&Passage, f64, SourceTier, bool)> = evidence
        .iter()
        .filter_map(|p| {
            let c = p.credibility.as_ref()?;
            Some((p, c.score, c.tier, c.original))
        })
        .collect();
    if external.is_empty() {
        return warnings;
    }

    if !external.iter().any(|(_, _, tier, _)| *tier == SourceTier::Primary) {
        warnings.push(TraceWarning::NoPrimarySource {
            external: external.len(),
        });
    }

    if !external.iter().any(|(_, _, _, original)| *original) {
        // Highest score, first in evidence order on ties
        let mut best: Option<&(&Passage, f64, SourceTier, bool)> = None;
        for entry in &external {
            if best.map_or(true, |b| entry.1 > b.1) {
                best = Some(entry);
            }
        }
        if let Some((passage, _, tier, _)) = best {
            warnings.push(TraceWarning::NoOriginalSource {
                best: passage.identifier.clone(),
                tier: *tier,
            });
        }
        if require_original {
            warnings.push(TraceWarning::OriginalRequired);
        }
    }

    if !warnings.is_empty() {
        tracing::debug!(warnings = warnings.len(), "trace step raised warnings");
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::credibility::assessed;
    use crate::sources::SourceCategory;

    fn web(url: &str, text: &str) -> Passage {
        assessed(Passage::new(SourceCategory::Web, url, text))
    }

    #[test]
    fn internal_evidence_raises_nothing() {
        let evidence = vec![Passage::new(SourceCategory::Project, "notes.md", "Tide tables")];
        assert!(trace("tide tables", &evidence, true).is_empty());
    }

    #[test]
    fn original_primary_source_satisfies_the_trace() {
        let evidence = vec![
            assessed(
                Passage::new(SourceCategory::Web, "https://noaa.gov/tides", "Tide tables")
                    .with_title("Original tide study"),
            ),
            web("https://blog.example/tides", "Tide tables explained"),
        ];
        assert!(trace("tide tables", &evidence, true).is_empty());
    }

    #[test]
    fn secondhand_evidence_names_the_best_source() {
        let evidence = vec![
            web("https://blog.example/tides", "Opinion: tides are late"),
            web("https://www.reuters.com/tides", "Tides are late"),
        ];
        let warnings = trace("BREAKING: are tides late", &evidence, true);
        assert_eq!(
            warnings,
            vec![
                TraceWarning::EmotionalTriggers { triggers: vec!["breaking".into()] },
                TraceWarning::NoPrimarySource { external: 2 },
                TraceWarning::NoOriginalSource {
                    best: "https://www.reuters.com/tides".into(),
                    tier: SourceTier::Secondary,
                },
                TraceWarning::OriginalRequired,
            ]
        );
    }
}
