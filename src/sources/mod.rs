//! Source Registry.
//!
//! Source categories carry a fixed precedence (canon > project >
//! connected knowledge > web). The [`SourceRegistry`] owns one
//! [`RetrievalSource`] per registered category and a pluggable
//! [`QueryClassifier`] that decides which categories a query needs.

pub mod classifier;
pub mod credibility;
pub mod documents;
pub mod graph;
pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::MemoryResult;
use crate::ledger::EvidenceLabel;

pub use classifier::{Classification, KeywordClassifier, QueryClassifier, Stakes};
pub use credibility::{Credibility, SourceTier};
pub use documents::InMemorySource;
pub use graph::GraphSource;
pub use http::HttpSource;

/// Where a passage came from. Declaration order is precedence order,
/// so `Canon < Project < ConnectedKnowledge < Web` under `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceCategory {
    Canon,
    Project,
    ConnectedKnowledge,
    Web,
}

impl SourceCategory {
    /// All categories, highest precedence first.
    pub const PRECEDENCE: [SourceCategory; 4] =
        [Self::Canon, Self::Project, Self::ConnectedKnowledge, Self::Web];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Canon => "canon",
            Self::Project => "project",
            Self::ConnectedKnowledge => "connectedKnowledge",
            Self::Web => "web",
        }
    }

    /// Precedence rank; 0 is highest.
    pub fn rank(&self) -> u8 {
        *self as u8
    }

    /// `true` when `self` strictly outranks `other`.
    pub fn outranks(&self, other: SourceCategory) -> bool {
        self.rank() < other.rank()
    }

    /// The single highest-precedence category among `categories`, if it
    /// strictly outranks every other category present.
    pub fn strict_winner(categories: impl IntoIterator<Item = SourceCategory>) -> Option<Self> {
        let distinct: BTreeSet<SourceCategory> = categories.into_iter().collect();
        let mut iter = distinct.into_iter();
        let best = iter.next()?;
        // A set has one entry per category, so the first is strictly best
        // unless nothing else is present to compare against.
        if iter.next().is_none() {
            None
        } else {
            Some(best)
        }
    }
}

impl std::fmt::Display for SourceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SourceCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "canon" => Ok(Self::Canon),
            "project" => Ok(Self::Project),
            "connectedKnowledge" | "connected_knowledge" | "connected-knowledge" => {
                Ok(Self::ConnectedKnowledge)
            }
            "web" => Ok(Self::Web),
            _ => Err(format!("unknown source category: {s}")),
        }
    }
}

/// One retrieved passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub category: SourceCategory,
    pub text: String,
    /// Locates the source (node id, document id, URL).
    pub identifier: String,
    /// Locates the passage within its source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
    /// Set for graph-backed passages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    /// Label the source itself implies, overriding corroboration-based labels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_hint: Option<EvidenceLabel>,
    /// Resonance of the backing node, when it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resonance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Tier, bias markers and score. Set for web and connected-knowledge
    /// passages once retrieved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credibility: Option<Credibility>,
}

impl Passage {
    pub fn new(
        category: SourceCategory,
        identifier: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            category,
            text: text.into(),
            identifier: identifier.into(),
            anchor: None,
            node_id: None,
            label_hint: None,
            resonance: None,
            title: None,
            author: None,
            credibility: None,
        }
    }

    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        self.anchor = Some(anchor.into());
        self
    }

    pub fn with_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_label_hint(mut self, label: EvidenceLabel) -> Self {
        self.label_hint = Some(label);
        self
    }

    pub fn with_resonance(mut self, score: Option<f64>) -> Self {
        self.resonance = score;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Identity used to deduplicate accumulated evidence.
    pub fn dedup_key(&self) -> (SourceCategory, &str, Option<&str>, &str) {
        (self.category, &self.identifier, self.anchor.as_deref(), &self.text)
    }

    /// Identity of the underlying source; passages sharing it are not
    /// independent of each other.
    pub fn source_key(&self) -> (SourceCategory, &str) {
        (self.category, &self.identifier)
    }
}

/// A backend that can answer queries for one source category.
#[async_trait]
pub trait RetrievalSource: Send + Sync {
    fn category(&self) -> SourceCategory;

    /// Up to `limit` passages relevant to `query`. Failures surface as
    /// `MemoryError::RetrievalUnavailable`.
    async fn retrieve(&self, query: &str, limit: usize) -> MemoryResult<Vec<Passage>>;
}

/// Category → source mapping plus the classifier that picks categories.
#[derive(Clone)]
pub struct SourceRegistry {
    sources: BTreeMap<SourceCategory, Arc<dyn RetrievalSource>>,
    classifier: Arc<dyn QueryClassifier>,
}

impl SourceRegistry {
    pub fn new(classifier: Arc<dyn QueryClassifier>) -> Self {
        Self {
            sources: BTreeMap::new(),
            classifier,
        }
    }

    /// Register `source` under its category, replacing any earlier one.
    pub fn register(&mut self, source: Arc<dyn RetrievalSource>) {
        let category = source.category();
        if self.sources.insert(category, source).is_some() {
            tracing::warn!(category = %category, "replaced retrieval source");
        } else {
            tracing::debug!(category = %category, "registered retrieval source");
        }
    }

    pub fn with_source(mut self, source: Arc<dyn RetrievalSource>) -> Self {
        self.register(source);
        self
    }

    pub fn get(&self, category: SourceCategory) -> Option<Arc<dyn RetrievalSource>> {
        self.sources.get(&category).cloned()
    }

    /// Registered categories in precedence order.
    pub fn categories(&self) -> BTreeSet<SourceCategory> {
        self.sources.keys().copied().collect()
    }

    pub fn classify(&self, query: &str) -> Classification {
        self.classifier.classify(query)
    }
}
