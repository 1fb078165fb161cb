mod helpers;

use ember::ledger::{EvidenceLabel, FACT_CEILING};
use ember::sift::{QueryOptions, ResolutionReason, Termination, TraceWarning, MAX_SIFT_ITERATIONS};
use ember::sources::{InMemorySource, SourceCategory, SourceRegistry, SourceTier};
use helpers::{engine, registry, shared, test_db, FailingSource, SlowSource};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

fn contested() -> SourceRegistry {
    registry()
        .with_source(Arc::new(
            InMemorySource::new(SourceCategory::Canon).with_text("canon-x", "X is false"),
        ))
        .with_source(Arc::new(
            InMemorySource::new(SourceCategory::Project).with_text("notes.md", "X is true"),
        ))
}

fn categories(list: &[SourceCategory]) -> Option<BTreeSet<SourceCategory>> {
    Some(list.iter().copied().collect())
}

#[tokio::test]
async fn canon_wins_contested_claim_without_corroboration() {
    let engine = engine(shared(test_db()), contested());
    let response = engine.query("X", &QueryOptions::default()).await.unwrap();

    assert_eq!(response.conflicts.len(), 1);
    let record = &response.conflicts[0];
    assert!(record.resolved);
    assert_eq!(record.resolution_source_category, Some(SourceCategory::Canon));
    assert_eq!(record.resolution_reason, Some(ResolutionReason::Precedence));
    assert_eq!(record.adopted_stance.as_ref().map(|s| s.affirms), Some(false));
    assert_eq!(response.conflicts_resolved, 1);
    assert_eq!(response.sift_iterations, MAX_SIFT_ITERATIONS);
    assert_eq!(response.termination, Termination::IterationCap);
}

#[tokio::test]
async fn three_agreeing_project_passages_read_as_fact() {
    let registry = registry().with_source(Arc::new(
        InMemorySource::new(SourceCategory::Project)
            .with_text("minutes-03", "The launch moved to Thursday")
            .with_text("minutes-04", "The launch moved to Thursday")
            .with_text("roadmap.md", "The launch moved to Thursday"),
    ));
    let engine = engine(shared(test_db()), registry);
    let response = engine.query("launch Thursday", &QueryOptions::default()).await.unwrap();

    assert_eq!(response.passages.len(), 3);
    assert!(response.conflicts.is_empty());
    for passage in &response.passages {
        assert_eq!(passage.evidence.label, EvidenceLabel::Fact);
        let value = passage.evidence.confidence.value();
        assert!((0.85..FACT_CEILING).contains(&value), "confidence {value}");
        assert!(value < 1.0);
    }
}

#[tokio::test]
async fn disabled_requery_never_iterates() {
    let engine = engine(shared(test_db()), contested());
    let options = QueryOptions {
        enable_requery: false,
        ..QueryOptions::default()
    };
    let response = engine.query("X", &options).await.unwrap();

    assert_eq!(response.sift_iterations, 0);
    assert_eq!(response.termination, Termination::ReQueryDisabled);
    assert_eq!(response.rounds.len(), 1);
    // Still surfaced, and still settled by precedence
    assert_eq!(response.conflicts.len(), 1);
    assert_eq!(
        response.conflicts[0].resolution_source_category,
        Some(SourceCategory::Canon)
    );
}

#[tokio::test]
async fn deadline_keeps_partial_evidence() {
    let registry = contested().with_source(Arc::new(SlowSource {
        category: SourceCategory::Web,
        delay: Duration::from_secs(5),
        passages: vec![("https://slow.example".into(), "X is true".into())],
    }));
    let engine = engine(shared(test_db()), registry);
    let options = QueryOptions {
        categories: categories(&[SourceCategory::Canon, SourceCategory::Project, SourceCategory::Web]),
        deadline: Some(Duration::from_millis(150)),
        ..QueryOptions::default()
    };

    let response = engine.query("X", &options).await.unwrap();

    assert_eq!(response.termination, Termination::DeadlineExceeded);
    assert_eq!(response.sift_iterations, 0);
    assert_eq!(response.passages.len(), 2);
    assert!(response.rounds[0].timed_out);
    assert!(response
        .failures
        .iter()
        .any(|f| f.category == Some(SourceCategory::Web) && f.reason.contains("deadline")));
    assert!(response.elapsed_ms < 5_000);
}

#[tokio::test]
async fn failed_source_does_not_abort_the_query() {
    let registry = contested().with_source(Arc::new(FailingSource(SourceCategory::Web)));
    let engine = engine(shared(test_db()), registry);
    let options = QueryOptions {
        categories: categories(&[SourceCategory::Canon, SourceCategory::Project, SourceCategory::Web]),
        ..QueryOptions::default()
    };

    let response = engine.query("X", &options).await.unwrap();

    assert_eq!(response.passages.len(), 2);
    // One failure per round, including the verification rounds
    assert_eq!(response.failures.len() as u32, response.sift_iterations + 1);
    assert!(response
        .failures
        .iter()
        .all(|f| f.category == Some(SourceCategory::Web)));
    assert_eq!(response.conflicts[0].resolution_source_category, Some(SourceCategory::Canon));
}

#[tokio::test]
async fn rounds_are_bounded_and_evidence_only_grows() {
    let registries = vec![
        contested(),
        contested().with_source(Arc::new(
            InMemorySource::new(SourceCategory::Web)
                .with_text("https://a.example", "X is true")
                .with_text("https://b.example", "X is not true at all"),
        )),
        contested().with_source(Arc::new(
            InMemorySource::new(SourceCategory::ConnectedKnowledge)
                .with_text("wiki/x", "X is false")
                .with_text("wiki/y", "Y is false"),
        )),
        registry().with_source(Arc::new(
            InMemorySource::new(SourceCategory::Project)
                .with_text("a", "The door is open")
                .with_text("b", "The door is not open")
                .with_text("c", "The door is closed"),
        )),
    ];

    for registry in registries {
        let engine = engine(shared(test_db()), registry);
        for query in ["X", "door", "X verify source"] {
            let response = engine.query(query, &QueryOptions::default()).await.unwrap();
            assert!(response.sift_iterations <= MAX_SIFT_ITERATIONS);
            assert_eq!(response.rounds.len() as u32, response.sift_iterations + 1);
            let totals: Vec<usize> = response.rounds.iter().map(|r| r.evidence_total).collect();
            assert!(totals.windows(2).all(|w| w[0] <= w[1]), "shrinking evidence {totals:?}");
            assert!(response
                .passages
                .iter()
                .all(|p| p.evidence.confidence.value() < 1.0));
        }
    }
}

#[tokio::test]
async fn passages_come_back_in_precedence_order() {
    let registry = contested().with_source(Arc::new(
        InMemorySource::new(SourceCategory::Web).with_text("https://w.example", "X is false"),
    ));
    let engine = engine(shared(test_db()), registry);
    let options = QueryOptions {
        categories: categories(&[SourceCategory::Web, SourceCategory::Project, SourceCategory::Canon]),
        enable_requery: false,
        ..QueryOptions::default()
    };
    let response = engine.query("X", &options).await.unwrap();

    let order: Vec<SourceCategory> = response.passages.iter().map(|p| p.passage.category).collect();
    assert_eq!(
        order,
        vec![SourceCategory::Canon, SourceCategory::Project, SourceCategory::Web]
    );
}

#[tokio::test]
async fn value_disagreement_is_settled_by_precedence() {
    let registry = registry()
        .with_source(Arc::new(
            InMemorySource::new(SourceCategory::Canon).with_text("canon-launch", "The launch is on Monday"),
        ))
        .with_source(Arc::new(
            InMemorySource::new(SourceCategory::Project).with_text("plan.md", "The launch is on Friday"),
        ));
    let engine = engine(shared(test_db()), registry);
    let options = QueryOptions {
        categories: categories(&[SourceCategory::Canon, SourceCategory::Project]),
        ..QueryOptions::default()
    };
    let response = engine.query("launch day", &options).await.unwrap();

    assert_eq!(response.conflicts.len(), 1);
    let record = &response.conflicts[0];
    assert!(record.resolved);
    assert_eq!(record.resolution_source_category, Some(SourceCategory::Canon));
    assert_eq!(
        record.adopted_stance.as_ref().map(|s| s.value.clone()),
        Some(vec!["monday".to_string()])
    );
    // Neither side corroborates the other
    assert!(response
        .passages
        .iter()
        .all(|p| p.evidence.label != EvidenceLabel::Fact));
}

#[tokio::test]
async fn external_evidence_is_tiered_and_traced() {
    let registry = registry().with_source(Arc::new(
        InMemorySource::new(SourceCategory::Web)
            .with_text("https://blog.example/kiln", "Sponsored: the kiln reaches 1300 degrees")
            .with_text("https://www.reuters.com/kiln", "The kiln reaches 1300 degrees"),
    ));
    let engine = engine(shared(test_db()), registry);
    let options = QueryOptions {
        categories: categories(&[SourceCategory::Web]),
        require_original: true,
        ..QueryOptions::default()
    };
    let response = engine.query("kiln degrees", &options).await.unwrap();

    assert_eq!(response.passages.len(), 2);
    let blog = response
        .passages
        .iter()
        .find(|p| p.passage.identifier.contains("blog"))
        .unwrap();
    let wire = response
        .passages
        .iter()
        .find(|p| p.passage.identifier.contains("reuters"))
        .unwrap();
    let blog_credibility = blog.passage.credibility.as_ref().unwrap();
    assert_eq!(blog_credibility.tier, SourceTier::Tertiary);
    assert_eq!(blog_credibility.bias_indicators, vec!["sponsored"]);
    assert_eq!(wire.passage.credibility.as_ref().unwrap().tier, SourceTier::Secondary);
    assert!(blog.evidence.confidence.value() < wire.evidence.confidence.value());

    assert_eq!(
        response.warnings,
        vec![
            TraceWarning::NoPrimarySource { external: 2 },
            TraceWarning::NoOriginalSource {
                best: "https://www.reuters.com/kiln".into(),
                tier: SourceTier::Secondary,
            },
            TraceWarning::OriginalRequired,
        ]
    );
}
