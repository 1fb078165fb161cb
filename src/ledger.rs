//! Evidence Ledger.
//!
//! Every claim handed back to a caller carries an [`EvidenceTag`]. Its
//! [`Confidence`] can only be built through a checked constructor that
//! rejects values at or above 1.0, so no tag can assert certainty.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{MemoryError, MemoryResult};
use crate::sift::conflict::{group_claims, Stance};
use crate::sources::{Passage, SourceCategory};

/// Epistemic status of a surfaced claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceLabel {
    Fact,
    Inference,
    Hypothesis,
    Design,
    Plan,
    Quote,
}

impl EvidenceLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fact => "fact",
            Self::Inference => "inference",
            Self::Hypothesis => "hypothesis",
            Self::Design => "design",
            Self::Plan => "plan",
            Self::Quote => "quote",
        }
    }
}

impl std::fmt::Display for EvidenceLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upper bound for claims with no supporting source.
pub const HYPOTHESIS_CEILING: f64 = 0.3;
/// Upper bound for claims with one supporting source.
pub const INFERENCE_CEILING: f64 = 0.7;
/// Upper bound for claims with two or more independent sources.
pub const FACT_CEILING: f64 = 0.95;

/// A confidence value in `[0.0, 1.0)`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Confidence(f64);

impl Confidence {
    /// Fails with `InvariantViolation` (logged) for NaN, negative values,
    /// and anything `>= 1.0`. Never clamps.
    pub fn new(value: f64) -> MemoryResult<Self> {
        if !(0.0..1.0).contains(&value) {
            return Err(MemoryError::invariant(format!(
                "confidence {value} outside [0, 1)"
            )));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Confidence for a claim given how many sources were consulted and how
/// many independently support it.
///
/// - 0 found: fixed hypothesis value below [`HYPOTHESIS_CEILING`]
/// - 1 found: inference range, below [`INFERENCE_CEILING`]
/// - 2+ found: fact range, approaching but never reaching [`FACT_CEILING`]
///
/// The support ratio `found / checked` scales the value within its range.
pub fn compute_confidence(sources_checked: usize, sources_found: usize) -> MemoryResult<Confidence> {
    let ratio = if sources_checked == 0 {
        1.0
    } else {
        (sources_found as f64 / sources_checked as f64).min(1.0)
    };
    let value = match sources_found {
        0 => 0.25,
        1 => 0.5 + 0.15 * ratio,
        n => 0.8 + 0.15 * (1.0 - 1.0 / n as f64) * ratio,
    };
    Confidence::new(value)
}

/// Share of a claim's confidence kept when its source scores zero.
pub const CREDIBILITY_FLOOR: f64 = 0.6;

/// Scale `confidence` by an external source's credibility score in
/// `[0.0, 1.0]`. A perfect score keeps the value, the worst keeps
/// [`CREDIBILITY_FLOOR`] of it. Never raises a value.
pub fn weigh_credibility(confidence: Confidence, source_score: f64) -> MemoryResult<Confidence> {
    let factor = CREDIBILITY_FLOOR + (1.0 - CREDIBILITY_FLOOR) * source_score.clamp(0.0, 1.0);
    Confidence::new(confidence.value() * factor)
}

/// Label implied by corroboration alone.
pub fn label_for(sources_found: usize) -> EvidenceLabel {
    match sources_found {
        0 => EvidenceLabel::Hypothesis,
        1 => EvidenceLabel::Inference,
        _ => EvidenceLabel::Fact,
    }
}

/// Provenance and confidence attached to one surfaced claim.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceTag {
    pub source_category: SourceCategory,
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
    pub label: EvidenceLabel,
    pub confidence: Confidence,
}

impl EvidenceTag {
    pub fn new(passage: &Passage, label: EvidenceLabel, confidence: Confidence) -> Self {
        Self {
            source_category: passage.category,
            identifier: passage.identifier.clone(),
            anchor: passage.anchor.clone(),
            label,
            confidence,
        }
    }

    /// `category:identifier#anchor`
    pub fn locator(&self) -> String {
        match &self.anchor {
            Some(anchor) => format!("{}:{}#{}", self.source_category, self.identifier, anchor),
            None => format!("{}:{}", self.source_category, self.identifier),
        }
    }
}

/// Render a claim with its label, confidence and sources, e.g.
/// `[fact 0.90] The ferry leaves at noon (project:doc1; web:https://a)`.
///
/// The confidence shown is the highest among `evidence`; with no evidence
/// the claim is shown as unsourced.
pub fn format_claim(label: EvidenceLabel, text: &str, evidence: &[EvidenceTag]) -> String {
    let best = evidence
        .iter()
        .map(|t| t.confidence)
        .max_by(|a, b| a.value().total_cmp(&b.value()));
    let head = match best {
        Some(confidence) => format!("[{label} {confidence}]"),
        None => format!("[{label}]"),
    };
    if evidence.is_empty() {
        return format!("{head} {text} (unsourced)");
    }
    let sources = evidence
        .iter()
        .map(EvidenceTag::locator)
        .collect::<Vec<_>>()
        .join("; ");
    format!("{head} {text} ({sources})")
}

/// A retrieved passage with its evidence tag.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotatedPassage {
    #[serde(flatten)]
    pub passage: Passage,
    pub evidence: EvidenceTag,
}

impl AnnotatedPassage {
    pub fn render(&self) -> String {
        format_claim(
            self.evidence.label,
            &self.passage.text,
            std::slice::from_ref(&self.evidence),
        )
    }
}

/// Tag every passage.
///
/// Within a claim group, a passage's support is the number of independent
/// sources whose stance does not contradict its own; the group's independent
/// source count is what was checked. External passages then have their
/// confidence weighed by source credibility. A passage's own label hint wins
/// over the corroboration label. Output order matches input order.
pub fn annotate(passages: &[Passage], similarity_threshold: f64) -> MemoryResult<Vec<AnnotatedPassage>> {
    let mut tags: Vec<Option<EvidenceTag>> = vec![None; passages.len()];

    for group in group_claims(passages, similarity_threshold) {
        let checked = group
            .members
            .iter()
            .map(|&i| passages[i].source_key())
            .collect::<HashSet<_>>()
            .len();

        let stances: Vec<Stance> = group
            .members
            .iter()
            .map(|&i| Stance::of(&passages[i].text))
            .collect();

        for (k, &i) in group.members.iter().enumerate() {
            let found = group
                .members
                .iter()
                .zip(&stances)
                .filter(|(_, stance)| !stances[k].contradicts(stance))
                .map(|(&j, _)| passages[j].source_key())
                .collect::<HashSet<_>>()
                .len();
            let mut confidence = compute_confidence(checked, found)?;
            if let Some(credibility) = &passages[i].credibility {
                confidence = weigh_credibility(confidence, credibility.score)?;
            }
            let label = passages[i].label_hint.unwrap_or_else(|| label_for(found));
            tags[i] = Some(EvidenceTag::new(&passages[i], label, confidence));
        }
    }

    passages
        .iter()
        .zip(tags)
        .map(|(passage, tag)| {
            let evidence = tag.ok_or_else(|| {
                MemoryError::invariant(format!("passage {} left untagged", passage.identifier))
            })?;
            Ok(AnnotatedPassage {
                passage: passage.clone(),
                evidence,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_rejects_certainty() {
        assert!(matches!(
            Confidence::new(1.0),
            Err(MemoryError::InvariantViolation(_))
        ));
        assert!(Confidence::new(f64::NAN).is_err());
        assert!(Confidence::new(-0.1).is_err());
        assert_eq!(Confidence::new(0.0).unwrap().value(), 0.0);
    }

    #[test]
    fn confidence_ranges() {
        let none = compute_confidence(3, 0).unwrap().value();
        assert!(none <= HYPOTHESIS_CEILING);

        let one = compute_confidence(1, 1).unwrap().value();
        assert!(one > HYPOTHESIS_CEILING && one <= INFERENCE_CEILING);

        let three = compute_confidence(3, 3).unwrap().value();
        assert!((three - 0.9).abs() < 1e-9);
    }

    #[test]
    fn confidence_never_reaches_one() {
        for checked in 0..50 {
            for found in 0..200 {
                let c = compute_confidence(checked, found).unwrap().value();
                assert!(c < 1.0 && c < FACT_CEILING + 1e-12, "checked={checked} found={found}");
            }
        }
    }

    #[test]
    fn labels_follow_corroboration() {
        assert_eq!(label_for(0), EvidenceLabel::Hypothesis);
        assert_eq!(label_for(1), EvidenceLabel::Inference);
        assert_eq!(label_for(2), EvidenceLabel::Fact);
    }

    #[test]
    fn three_corroborating_project_passages_are_facts() {
        let passages = vec![
            Passage::new(SourceCategory::Project, "doc1", "The ferry leaves at noon"),
            Passage::new(SourceCategory::Project, "doc2", "The ferry leaves at noon"),
            Passage::new(SourceCategory::Project, "doc3", "the ferry leaves at noon"),
        ];
        let annotated = annotate(&passages, 0.5).unwrap();
        for a in &annotated {
            assert_eq!(a.evidence.label, EvidenceLabel::Fact);
            assert!(a.evidence.confidence.value() >= 0.85 && a.evidence.confidence.value() < 1.0);
        }
    }

    #[test]
    fn differing_values_split_support() {
        let passages = vec![
            Passage::new(SourceCategory::Project, "a", "The launch is on Monday"),
            Passage::new(SourceCategory::Web, "b", "The launch is on Monday"),
            Passage::new(SourceCategory::Web, "c", "The launch is on Friday"),
        ];
        let annotated = annotate(&passages, 0.5).unwrap();
        assert_eq!(annotated[0].evidence.label, EvidenceLabel::Fact);
        assert_eq!(annotated[1].evidence.label, EvidenceLabel::Fact);
        assert_eq!(annotated[2].evidence.label, EvidenceLabel::Inference);
        assert_eq!(annotated[2].evidence.confidence, compute_confidence(3, 1).unwrap());
    }

    #[test]
    fn weak_sources_lower_confidence_but_not_the_label() {
        let passages: Vec<Passage> = vec![
            Passage::new(SourceCategory::Web, "https://data.noaa.gov/tides", "Spring tides peak at new moon")
                .with_author("NOAA"),
            Passage::new(SourceCategory::Web, "https://blog.example/tides", "Opinion: spring tides peak at new moon"),
        ]
        .into_iter()
        .map(crate::sources::credibility::assessed)
        .collect();

        let annotated = annotate(&passages, 0.5).unwrap();
        let primary = annotated[0].evidence.confidence.value();
        let blog = annotated[1].evidence.confidence.value();
        assert_eq!(annotated[0].evidence.label, EvidenceLabel::Fact);
        assert_eq!(annotated[1].evidence.label, EvidenceLabel::Fact);
        assert!(blog < primary && primary < compute_confidence(2, 2).unwrap().value());
        assert!(blog >= CREDIBILITY_FLOOR * compute_confidence(2, 2).unwrap().value());
    }

    #[test]
    fn credibility_never_lifts_confidence() {
        for score in [0.0, 0.1, 0.55, 1.0, 7.0] {
            let base = compute_confidence(9, 9).unwrap();
            let weighed = weigh_credibility(base, score).unwrap();
            assert!(weighed.value() <= base.value() && weighed.value() < 1.0);
        }
        assert!(weigh_credibility(Confidence::new(0.5).unwrap(), f64::NAN).is_err());
    }

    #[test]
    fn hints_override_labels() {
        let passages = vec![Passage::new(SourceCategory::Canon, "c1", "Honesty comes first")
            .with_label_hint(EvidenceLabel::Quote)];
        let annotated = annotate(&passages, 0.5).unwrap();
        assert_eq!(annotated[0].evidence.label, EvidenceLabel::Quote);
    }

    #[test]
    fn format_claim_lists_sources() {
        let p = Passage::new(SourceCategory::Web, "https://a.example", "Sky is blue").with_anchor("p1");
        let tag = EvidenceTag::new(&p, EvidenceLabel::Inference, Confidence::new(0.65).unwrap());
        assert_eq!(
            format_claim(EvidenceLabel::Inference, "Sky is blue", &[tag]),
            "[inference 0.65] Sky is blue (web:https://a.example#p1)"
        );
        assert_eq!(
            format_claim(EvidenceLabel::Hypothesis, "Maybe", &[]),
            "[hypothesis] Maybe (unsourced)"
        );
    }
}
