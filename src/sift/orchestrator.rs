//! Re-query Orchestrator.
//!
//! State machine: `Initial → Searching → ConflictCheck → {Terminated |
//! Requerying → Searching → ConflictCheck ...}`. Rounds are sequential;
//! lookups inside a round fan out over a [`JoinSet`] and fan back in
//! before the next conflict check. Evidence only accumulates.

use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};

use super::conflict::{detect_conflicts, ConflictRecord};
use super::trace::{self, TraceWarning};
use super::MAX_SIFT_ITERATIONS;
use crate::config::{EmberConfig, SiftConfig};
use crate::error::{MemoryError, MemoryResult};
use crate::sources::credibility;
use crate::sources::{Classification, Passage, SourceCategory, SourceRegistry};

/// Loop tuning fixed at construction.
#[derive(Debug, Clone)]
pub struct SiftSettings {
    pub max_iterations: u32,
    pub verification_suffix: String,
    pub similarity_threshold: f64,
    pub min_corroboration: usize,
}

impl SiftSettings {
    pub fn from_config(config: &SiftConfig) -> Self {
        Self {
            max_iterations: config.effective_max_iterations(),
            verification_suffix: config.verification_suffix.clone(),
            similarity_threshold: config.similarity_threshold,
            min_corroboration: config.min_corroboration.max(2),
        }
    }
}

impl Default for SiftSettings {
    fn default() -> Self {
        Self::from_config(&SiftConfig::default())
    }
}

/// Per-query caller options.
#[derive(Debug, Clone)]
pub struct QueryOptions {
    /// Passages requested from each source per lookup.
    pub max_memories: usize,
    /// Graph-backed passages whose node resonance is below this are dropped.
    pub min_score: f64,
    /// Overrides the classifier's category choice for the first round.
    pub categories: Option<BTreeSet<SourceCategory>>,
    pub enable_requery: bool,
    /// Wall-clock budget across all rounds.
    pub deadline: Option<Duration>,
    /// Warn when external evidence never reaches an original source.
    pub require_original: bool,
}

impl QueryOptions {
    pub fn from_config(config: &EmberConfig) -> Self {
        Self {
            max_memories: config.retrieval.max_memories,
            min_score: config.retrieval.min_score,
            categories: None,
            enable_requery: config.sift.enable_requery,
            deadline: config.sift.deadline(),
            require_original: config.sift.require_original,
        }
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::from_config(&EmberConfig::default())
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// No unresolved conflicts remained.
    Resolved,
    /// Only canon-vs-canon disagreements remained; canon is taken as
    /// authoritative and never re-queried against itself.
    ResolvedByCanonTrust,
    /// The round cap was reached with conflicts still open.
    IterationCap,
    /// Re-querying was disabled for this query.
    ReQueryDisabled,
    /// The caller's deadline passed; results are partial.
    DeadlineExceeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiftState {
    Initial,
    Searching,
    ConflictCheck,
    Requerying,
    Terminated(Termination),
}

/// A lookup that produced nothing because it failed or was cut off.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalFailure {
    pub round: u32,
    /// `None` when the lookup task itself died.
    pub category: Option<SourceCategory>,
    pub query: String,
    pub reason: String,
}

/// What one round did.
#[derive(Debug, Clone, Serialize)]
pub struct RoundReport {
    /// 0 is the initial retrieval.
    pub round: u32,
    pub queries: Vec<String>,
    pub categories: Vec<SourceCategory>,
    pub new_passages: usize,
    /// Evidence held after this round.
    pub evidence_total: usize,
    pub failures: usize,
    pub timed_out: bool,
}

/// Result of one query through the loop.
#[derive(Debug, Clone, Serialize)]
pub struct SiftOutcome {
    pub classification: Classification,
    /// All gathered passages, stably ordered by category precedence.
    pub evidence: Vec<Passage>,
    pub conflicts: Vec<ConflictRecord>,
    pub sift_iterations: u32,
    pub termination: Termination,
    pub rounds: Vec<RoundReport>,
    pub failures: Vec<RetrievalFailure>,
    /// Categories wanted for the first round that have no registered source.
    pub skipped_categories: Vec<SourceCategory>,
    pub warnings: Vec<TraceWarning>,
    pub elapsed_ms: u64,
}

impl SiftOutcome {
    pub fn conflicts_resolved(&self) -> usize {
        self.conflicts.iter().filter(|c| c.resolved).count()
    }
}

type EvidenceKey = (SourceCategory, String, Option<String>, String);

/// Accumulated, deduplicated evidence in arrival order.
#[derive(Default)]
struct Evidence {
    passages: Vec<Passage>,
    seen: HashSet<EvidenceKey>,
}

impl Evidence {
    /// Add passages not seen before; returns how many were new.
    fn absorb(&mut self, passages: Vec<Passage>, min_score: f64) -> usize {
        let before = self.passages.len();
        for passage in passages {
            if passage.resonance.is_some_and(|r| r < min_score) {
                continue;
            }
            let (category, identifier, anchor, text) = passage.dedup_key();
            let key = (
                category,
                identifier.to_string(),
                anchor.map(str::to_string),
                text.to_string(),
            );
            if self.seen.insert(key) {
                self.passages.push(passage);
            }
        }
        self.passages.len() - before
    }
}

struct RoundResult {
    passages: Vec<Passage>,
    failures: Vec<RetrievalFailure>,
    timed_out: bool,
}

/// Drives one query through classification, retrieval, conflict checks
/// and verification rounds.
#[derive(Clone)]
pub struct SiftOrchestrator {
    registry: SourceRegistry,
    settings: SiftSettings,
}

impl SiftOrchestrator {
    pub fn new(registry: SourceRegistry, settings: SiftSettings) -> Self {
        Self { registry, settings }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &SiftSettings {
        &self.settings
    }

    pub async fn run(&self, query: &str, options: &QueryOptions) -> SiftOutcome {
        let started = Instant::now();
        let deadline = options.deadline.map(|budget| started + budget);
        let max_iterations = self.settings.max_iterations.min(MAX_SIFT_ITERATIONS);

        let classification = self.registry.classify(query);
        let registered = self.registry.categories();
        let wanted = options
            .categories
            .clone()
            .unwrap_or_else(|| classification.needed.clone());
        let skipped_categories: Vec<SourceCategory> =
            wanted.difference(&registered).copied().collect();
        for category in &skipped_categories {
            tracing::info!(category = %category, "no source registered, category skipped");
        }

        let mut evidence = Evidence::default();
        let mut rounds: Vec<RoundReport> = Vec::new();
        let mut failures: Vec<RetrievalFailure> = Vec::new();
        let mut iterations: u32 = 0;
        let mut jobs: Vec<(SourceCategory, String)> = Vec::new();
        let mut state = SiftState::Initial;

        let termination = loop {
            tracing::debug!(?state, iterations, evidence = evidence.passages.len(), "sift state");
            state = match state {
                SiftState::Initial => {
                    jobs = wanted
                        .intersection(&registered)
                        .map(|&category| (category, query.to_string()))
                        .collect();
                    SiftState::Searching
                }
                SiftState::Searching => {
                    let round = iterations;
                    let queries: Vec<String> = jobs
                        .iter()
                        .map(|(_, q)| q.clone())
                        .collect::<BTreeSet<_>>()
                        .into_iter()
                        .collect();
                    let categories: Vec<SourceCategory> = jobs
                        .iter()
                        .map(|(c, _)| *c)
                        .collect::<BTreeSet<_>>()
                        .into_iter()
                        .collect();

                    let result = self
                        .fan_out(round, std::mem::take(&mut jobs), options.max_memories, deadline, started)
                        .await;
                    let new_passages = evidence.absorb(result.passages, options.min_score);
                    rounds.push(RoundReport {
                        round,
                        queries,
                        categories,
                        new_passages,
                        evidence_total: evidence.passages.len(),
                        failures: result.failures.len(),
                        timed_out: result.timed_out,
                    });
                    failures.extend(result.failures);

                    if result.timed_out {
                        SiftState::Terminated(Termination::DeadlineExceeded)
                    } else {
                        SiftState::ConflictCheck
                    }
                }
                SiftState::ConflictCheck => {
                    let conflicts = self.assess(&evidence.passages);
                    let open: Vec<&ConflictRecord> =
                        conflicts.iter().filter(|c| !c.resolved).collect();

                    if open.is_empty() {
                        SiftState::Terminated(Termination::Resolved)
                    } else if open.iter().all(|c| c.is_canon_only()) {
                        SiftState::Terminated(Termination::ResolvedByCanonTrust)
                    } else if !options.enable_requery {
                        SiftState::Terminated(Termination::ReQueryDisabled)
                    } else if iterations >= max_iterations {
                        SiftState::Terminated(Termination::IterationCap)
                    } else {
                        let verification: BTreeSet<String> = open
                            .iter()
                            .filter(|c| !c.is_canon_only())
                            .map(|c| self.verification_query(&c.claim))
                            .collect();
                        jobs = verification
                            .iter()
                            .flat_map(|q| registered.iter().map(move |&c| (c, q.clone())))
                            .collect();
                        SiftState::Requerying
                    }
                }
                SiftState::Requerying => {
                    if deadline.is_some_and(|d| Instant::now() >= d) {
                        SiftState::Terminated(Termination::DeadlineExceeded)
                    } else {
                        iterations += 1;
                        SiftState::Searching
                    }
                }
                SiftState::Terminated(reason) => break reason,
            };
        };

        // Final view: corroboration first, then precedence for anything still open
        let mut conflicts = self.assess(&evidence.passages);
        for record in conflicts.iter_mut().filter(|c| !c.resolved) {
            record.try_resolve_by_precedence();
        }

        let mut passages = evidence.passages;
        passages.sort_by_key(|p| p.category);
        let warnings = trace::trace(query, &passages, options.require_original);

        let outcome = SiftOutcome {
            classification,
            evidence: passages,
            conflicts,
            sift_iterations: iterations,
            termination,
            rounds,
            failures,
            skipped_categories,
            warnings,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            ?termination,
            sift_iterations = outcome.sift_iterations,
            passages = outcome.evidence.len(),
            conflicts = outcome.conflicts.len(),
            resolved = outcome.conflicts_resolved(),
            failures = outcome.failures.len(),
            "sift terminated"
        );
        outcome
    }

    /// Claim text plus the fixed verification suffix.
    pub fn verification_query(&self, claim: &str) -> String {
        let suffix = self.settings.verification_suffix.trim();
        if suffix.is_empty() {
            claim.to_string()
        } else {
            format!("{claim} {suffix}")
        }
    }

    /// Detect conflicts and settle those that corroboration already decides.
    fn assess(&self, passages: &[Passage]) -> Vec<ConflictRecord> {
        let mut conflicts = detect_conflicts(passages, self.settings.similarity_threshold);
        for record in &mut conflicts {
            record.try_resolve_by_corroboration(self.settings.min_corroboration);
        }
        conflicts
    }

    /// Run every `(category, query)` lookup concurrently. Results are
    /// returned in job order regardless of completion order. Lookups still
    /// running at the deadline are aborted and reported as failures.
    async fn fan_out(
        &self,
        round: u32,
        jobs: Vec<(SourceCategory, String)>,
        limit: usize,
        deadline: Option<Instant>,
        started: Instant,
    ) -> RoundResult {
        let mut set: JoinSet<(usize, MemoryResult<Vec<Passage>>)> = JoinSet::new();
        let mut slots: Vec<Option<Vec<Passage>>> = vec![None; jobs.len()];
        let mut failures = Vec::new();

        for (idx, (category, query)) in jobs.iter().enumerate() {
            let Some(source) = self.registry.get(*category) else {
                continue;
            };
            let query = query.clone();
            set.spawn(async move { (idx, source.retrieve(&query, limit).await) });
        }

        let mut done: Vec<bool> = vec![false; jobs.len()];
        let mut timed_out = false;
        loop {
            let next = match deadline {
                Some(at) => match timeout_at(at, set.join_next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        timed_out = true;
                        set.abort_all();
                        break;
                    }
                },
                None => set.join_next().await,
            };
            let Some(joined) = next else { break };

            match joined {
                Ok((idx, Ok(passages))) => {
                    done[idx] = true;
                    slots[idx] = Some(passages);
                }
                Ok((idx, Err(e))) => {
                    done[idx] = true;
                    let (category, query) = &jobs[idx];
                    tracing::warn!(round, category = %category, error = %e, "retrieval failed");
                    failures.push(RetrievalFailure {
                        round,
                        category: Some(*category),
                        query: query.clone(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    tracing::warn!(round, error = %e, "retrieval task failed");
                    failures.push(RetrievalFailure {
                        round,
                        category: None,
                        query: String::new(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        if timed_out {
            let reason = MemoryError::DeadlineExceeded {
                elapsed_ms: started.elapsed().as_millis() as u64,
            }
            .to_string();
            for (idx, (category, query)) in jobs.iter().enumerate() {
                if !done[idx] {
                    tracing::warn!(round, category = %category, "retrieval cut off by deadline");
                    failures.push(RetrievalFailure {
                        round,
                        category: Some(*category),
                        query: query.clone(),
                        reason: reason.clone(),
                    });
                }
            }
        }

        RoundResult {
            passages: slots
                .into_iter()
                .flatten()
                .flatten()
                .map(credibility::assessed)
                .collect(),
            failures,
            timed_out,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{InMemorySource, KeywordClassifier, RetrievalSource};
    use crate::sift::ResolutionReason;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FailingSource(SourceCategory);

    #[async_trait]
    impl RetrievalSource for FailingSource {
        fn category(&self) -> SourceCategory {
            self.0
        }

        async fn retrieve(&self, _query: &str, _limit: usize) -> MemoryResult<Vec<Passage>> {
            Err(MemoryError::RetrievalUnavailable {
                category: self.0,
                reason: "connection refused".into(),
            })
        }
    }

    fn registry() -> SourceRegistry {
        SourceRegistry::new(Arc::new(KeywordClassifier::default()))
    }

    fn canon_and_project() -> SourceRegistry {
        registry()
            .with_source(Arc::new(
                InMemorySource::new(SourceCategory::Canon).with_text("canon-x", "X is false"),
            ))
            .with_source(Arc::new(
                InMemorySource::new(SourceCategory::Project).with_text("doc-x", "X is true"),
            ))
    }

    #[tokio::test]
    async fn precedence_resolves_to_canon_at_the_cap() {
        let sift = SiftOrchestrator::new(canon_and_project(), SiftSettings::default());
        let outcome = sift.run("X", &QueryOptions::default()).await;

        assert_eq!(outcome.termination, Termination::IterationCap);
        assert_eq!(outcome.sift_iterations, MAX_SIFT_ITERATIONS);
        assert_eq!(outcome.conflicts.len(), 1);
        let record = &outcome.conflicts[0];
        assert!(record.resolved);
        assert_eq!(record.resolution_source_category, Some(SourceCategory::Canon));
        assert_eq!(record.resolution_reason, Some(ResolutionReason::Precedence));
    }

    #[tokio::test]
    async fn requery_disabled_never_iterates() {
        let sift = SiftOrchestrator::new(canon_and_project(), SiftSettings::default());
        let options = QueryOptions {
            enable_requery: false,
            ..QueryOptions::default()
        };
        let outcome = sift.run("X", &options).await;

        assert_eq!(outcome.sift_iterations, 0);
        assert_eq!(outcome.termination, Termination::ReQueryDisabled);
        assert_eq!(outcome.conflicts.len(), 1);
    }

    #[tokio::test]
    async fn verification_round_finds_corroboration() {
        let registry = canon_and_project().with_source(Arc::new(
            InMemorySource::new(SourceCategory::Web).with_text("https://w.example", "X is true"),
        ));
        let sift = SiftOrchestrator::new(registry, SiftSettings::default());
        let outcome = sift.run("X", &QueryOptions::default()).await;

        // The first round skips web; the verification round reaches it
        assert_eq!(outcome.rounds[0].categories, vec![SourceCategory::Canon, SourceCategory::Project]);
        assert_eq!(outcome.sift_iterations, 1);
        assert_eq!(outcome.termination, Termination::Resolved);
        let record = &outcome.conflicts[0];
        assert_eq!(record.resolution_source_category, Some(SourceCategory::Project));
        assert_eq!(
            record.resolution_reason,
            Some(ResolutionReason::Corroboration { sources: 2 })
        );
        assert_eq!(outcome.rounds[1].queries, vec!["X is false primary source verification"]);
    }

    #[tokio::test]
    async fn canon_only_conflict_is_not_requeried() {
        let registry = registry()
            .with_source(Arc::new(
                InMemorySource::new(SourceCategory::Canon)
                    .with_text("c1", "The lantern is lit")
                    .with_text("c2", "The lantern is not lit"),
            ))
            .with_source(Arc::new(InMemorySource::new(SourceCategory::Project)));
        let sift = SiftOrchestrator::new(registry, SiftSettings::default());
        let outcome = sift.run("lantern", &QueryOptions::default()).await;

        assert_eq!(outcome.termination, Termination::ResolvedByCanonTrust);
        assert_eq!(outcome.sift_iterations, 0);
        assert_eq!(outcome.conflicts.len(), 1);
        assert!(!outcome.conflicts[0].resolved);
    }

    #[tokio::test]
    async fn failed_sources_are_recorded_not_fatal() {
        let registry = canon_and_project()
            .with_source(Arc::new(FailingSource(SourceCategory::Web)));
        let sift = SiftOrchestrator::new(registry, SiftSettings::default());
        let outcome = sift.run("X", &QueryOptions::default()).await;

        assert_eq!(outcome.termination, Termination::IterationCap);
        assert_eq!(outcome.failures.len(), MAX_SIFT_ITERATIONS as usize);
        assert!(outcome
            .failures
            .iter()
            .all(|f| f.category == Some(SourceCategory::Web) && f.round > 0));
        assert_eq!(outcome.evidence.len(), 2);
    }

    #[tokio::test]
    async fn no_conflicts_terminates_immediately() {
        let registry = registry().with_source(Arc::new(
            InMemorySource::new(SourceCategory::Project)
                .with_text("a", "The ferry leaves at noon")
                .with_text("b", "The ferry leaves at noon"),
        ));
        let sift = SiftOrchestrator::new(registry, SiftSettings::default());
        let outcome = sift.run("ferry", &QueryOptions::default()).await;

        assert_eq!(outcome.termination, Termination::Resolved);
        assert_eq!(outcome.sift_iterations, 0);
        assert!(outcome.conflicts.is_empty());
        assert_eq!(outcome.skipped_categories, vec![SourceCategory::Canon]);
    }

    #[tokio::test]
    async fn evidence_is_ordered_by_precedence() {
        let sift = SiftOrchestrator::new(canon_and_project(), SiftSettings::default());
        let outcome = sift.run("X", &QueryOptions::default()).await;
        let categories: Vec<SourceCategory> = outcome.evidence.iter().map(|p| p.category).collect();
        let mut sorted = categories.clone();
        sorted.sort();
        assert_eq!(categories, sorted);
    }
}
