//! Conflict Detector.
//!
//! Passages are grouped by claim subject: single-linkage over Jaccard
//! similarity of content terms, plus a direct link between copular claims
//! with the same subject. A group holding two [`Stance`]s that cannot both
//! hold becomes a [`ConflictRecord`]. That covers opposite polarity ("X is
//! true" / "X is false") and different values for one subject ("the launch
//! is on Monday" / "the launch is on Friday"). Grouping is computed over a
//! canonical ordering of the input so the output does not depend on arrival
//! order.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::sources::{Passage, SourceCategory};
use crate::text;

/// Passages about the same claim subject, as indices into the input slice.
/// Members are ordered by category precedence, then identifier, then text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimGroup {
    pub members: Vec<usize>,
}

/// Group `passages` by claim subject.
pub fn group_claims(passages: &[Passage], threshold: f64) -> Vec<ClaimGroup> {
    let mut order: Vec<usize> = (0..passages.len()).collect();
    order.sort_by(|&a, &b| canonical_cmp(&passages[a], &passages[b]));

    let terms: Vec<BTreeSet<String>> = order
        .iter()
        .map(|&i| text::term_set(&passages[i].text))
        .collect();
    let subjects: Vec<Option<BTreeSet<String>>> = order
        .iter()
        .map(|&i| text::split_claim(&passages[i].text).map(|(subject, _)| subject))
        .collect();

    // Union-find over positions in `order`; the root is always the smallest position
    let mut parent: Vec<usize> = (0..order.len()).collect();
    fn find(parent: &mut [usize], mut x: usize) -> usize {
        while parent[x] != x {
            parent[x] = parent[parent[x]];
            x = parent[x];
        }
        x
    }

    for i in 0..order.len() {
        for j in (i + 1)..order.len() {
            let same_subject = matches!((&subjects[i], &subjects[j]), (Some(a), Some(b)) if a == b);
            if same_subject || text::jaccard(&terms[i], &terms[j]) >= threshold {
                let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                if ri != rj {
                    let (lo, hi) = if ri < rj { (ri, rj) } else { (rj, ri) };
                    parent[hi] = lo;
                }
            }
        }
    }

    let mut groups: Vec<(usize, Vec<usize>)> = Vec::new();
    for pos in 0..order.len() {
        let root = find(&mut parent, pos);
        match groups.iter_mut().find(|(r, _)| *r == root) {
            Some((_, members)) => members.push(order[pos]),
            None => groups.push((root, vec![order[pos]])),
        }
    }

    groups
        .into_iter()
        .map(|(_, members)| ClaimGroup { members })
        .collect()
}

fn canonical_cmp(a: &Passage, b: &Passage) -> std::cmp::Ordering {
    a.category
        .cmp(&b.category)
        .then_with(|| a.identifier.cmp(&b.identifier))
        .then_with(|| a.text.cmp(&b.text))
        .then_with(|| a.anchor.cmp(&b.anchor))
}

/// What a passage asserts about its claim subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stance {
    /// `true` for an affirmative assertion, `false` for a negated one.
    pub affirms: bool,
    /// Terms asserted about the subject of a copular claim. Empty when the
    /// passage only affirms or denies.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub value: Vec<String>,
}

impl Stance {
    pub fn of(passage_text: &str) -> Self {
        Self {
            affirms: !text::is_negated(passage_text),
            value: text::split_claim(passage_text)
                .map(|(_, value)| value.into_iter().collect())
                .unwrap_or_default(),
        }
    }

    /// Whether two stances on the same subject cannot both hold.
    ///
    /// Comparable values (equal, one empty, or one a subset of the other)
    /// contradict only on opposite polarity. Incomparable values contradict
    /// only when both are affirmed: "is Monday" against "is Friday", but not
    /// "is not Monday" against "is Friday".
    pub fn contradicts(&self, other: &Self) -> bool {
        let mine: BTreeSet<&String> = self.value.iter().collect();
        let theirs: BTreeSet<&String> = other.value.iter().collect();
        let comparable = mine.is_subset(&theirs) || theirs.is_subset(&mine);
        if comparable {
            self.affirms != other.affirms
        } else {
            self.affirms && other.affirms
        }
    }
}

/// One side's statement inside a conflict.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub source_category: SourceCategory,
    pub passage: String,
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(flatten)]
    pub stance: Stance,
}

/// Why a conflict was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ResolutionReason {
    /// The adopted side had the highest-precedence category.
    Precedence,
    /// The adopted side had at least the required number of independent
    /// sources and strictly more than the other side.
    Corroboration { sources: usize },
}

/// A contested claim and the positions taken on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    pub claim: String,
    /// Ordered by category precedence.
    pub positions: Vec<Position>,
    pub resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_source_category: Option<SourceCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_reason: Option<ResolutionReason>,
    /// Stance of the adopted side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adopted_stance: Option<Stance>,
}

impl ConflictRecord {
    /// Distinct categories among the positions.
    pub fn categories(&self) -> BTreeSet<SourceCategory> {
        self.positions.iter().map(|p| p.source_category).collect()
    }

    /// `true` when every position comes from canon.
    pub fn is_canon_only(&self) -> bool {
        !self.positions.is_empty()
            && self
                .positions
                .iter()
                .all(|p| p.source_category == SourceCategory::Canon)
    }

    /// Independent sources per distinct stance, in stance order.
    pub fn stance_counts(&self) -> Vec<(Stance, usize)> {
        let mut sources: BTreeMap<&Stance, HashSet<(SourceCategory, &str)>> = BTreeMap::new();
        for p in &self.positions {
            sources
                .entry(&p.stance)
                .or_default()
                .insert((p.source_category, p.identifier.as_str()));
        }
        sources
            .into_iter()
            .map(|(stance, keys)| (stance.clone(), keys.len()))
            .collect()
    }

    /// Settle by corroboration if one stance has at least `min_sources`
    /// independent sources and strictly more than every other stance.
    pub fn try_resolve_by_corroboration(&mut self, min_sources: usize) -> bool {
        if self.resolved {
            return true;
        }
        let counts = self.stance_counts();
        let Some((stance, sources)) = counts.iter().max_by_key(|(_, n)| *n).cloned() else {
            return false;
        };
        let contested = counts.iter().filter(|(_, n)| *n == sources).count() > 1;
        if sources < min_sources || contested {
            return false;
        }
        let Some(category) = self
            .positions
            .iter()
            .filter(|p| p.stance == stance)
            .map(|p| p.source_category)
            .min()
        else {
            return false;
        };
        self.settle(category, stance, ResolutionReason::Corroboration { sources });
        true
    }

    /// Settle by precedence if one stance's best category strictly outranks
    /// the best category of every other stance.
    pub fn try_resolve_by_precedence(&mut self) -> bool {
        if self.resolved {
            return true;
        }
        let mut best: BTreeMap<&Stance, SourceCategory> = BTreeMap::new();
        for p in &self.positions {
            best.entry(&p.stance)
                .and_modify(|c| *c = (*c).min(p.source_category))
                .or_insert(p.source_category);
        }
        if best.len() < 2 {
            return false;
        }
        let Some(top) = best.values().min().copied() else {
            return false;
        };
        let mut leaders = best.iter().filter(|(_, c)| **c == top);
        let (Some((stance, _)), None) = (leaders.next(), leaders.next()) else {
            return false;
        };
        let stance = (*stance).clone();
        self.settle(top, stance, ResolutionReason::Precedence);
        true
    }

    fn settle(&mut self, category: SourceCategory, stance: Stance, reason: ResolutionReason) {
        tracing::debug!(claim = %self.claim, category = %category, ?reason, "conflict resolved");
        self.resolved = true;
        self.resolution_source_category = Some(category);
        self.resolution_reason = Some(reason);
        self.adopted_stance = Some(stance);
    }
}

/// Find contested claims in `passages`. Groups where no two members
/// contradict each other produce nothing.
pub fn detect_conflicts(passages: &[Passage], threshold: f64) -> Vec<ConflictRecord> {
    group_claims(passages, threshold)
        .into_iter()
        .filter_map(|group| {
            let positions: Vec<Position> = group
                .members
                .iter()
                .map(|&i| {
                    let p = &passages[i];
                    Position {
                        source_category: p.category,
                        passage: p.text.clone(),
                        identifier: p.identifier.clone(),
                        node_id: p.node_id.clone(),
                        stance: Stance::of(&p.text),
                    }
                })
                .collect();

            let contested = positions.iter().enumerate().any(|(i, a)| {
                positions[i + 1..].iter().any(|b| a.stance.contradicts(&b.stance))
            });
            if !contested {
                return None;
            }
            Some(ConflictRecord {
                claim: positions[0].passage.clone(),
                positions,
                resolved: false,
                resolution_source_category: None,
                resolution_reason: None,
                adopted_stance: None,
            })
        })
        .collect()
}
