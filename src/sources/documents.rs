//! Keyword-matched retrieval over passages held in memory.

use async_trait::async_trait;
use std::collections::BTreeSet;

use super::{Passage, RetrievalSource, SourceCategory};
use crate::error::MemoryResult;
use crate::text;

/// A fixed passage list matched by keyword overlap. Used for user-supplied
/// documents that live outside the graph.
pub struct InMemorySource {
    category: SourceCategory,
    passages: Vec<(Passage, BTreeSet<String>)>,
}

impl InMemorySource {
    pub fn new(category: SourceCategory) -> Self {
        Self {
            category,
            passages: Vec::new(),
        }
    }

    /// Add a passage; its category is forced to this source's category.
    pub fn push(&mut self, mut passage: Passage) {
        passage.category = self.category;
        let terms = text::term_set(&passage.text);
        self.passages.push((passage, terms));
    }

    pub fn with_passage(mut self, passage: Passage) -> Self {
        self.push(passage);
        self
    }

    /// Convenience for `with_passage(Passage::new(category, identifier, text))`.
    pub fn with_text(self, identifier: impl Into<String>, text: impl Into<String>) -> Self {
        let category = self.category;
        self.with_passage(Passage::new(category, identifier, text))
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

#[async_trait]
impl RetrievalSource for InMemorySource {
    fn category(&self) -> SourceCategory {
        self.category
    }

    /// Passages sharing at least one term with `query`, most overlap first,
    /// insertion order breaking ties.
    async fn retrieve(&self, query: &str, limit: usize) -> MemoryResult<Vec<Passage>> {
        let wanted = text::term_set(query);
        let mut scored: Vec<(usize, usize, &Passage)> = self
            .passages
            .iter()
            .enumerate()
            .filter_map(|(i, (passage, terms))| {
                let overlap = terms.intersection(&wanted).count();
                (overlap > 0).then_some((overlap, i, passage))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, _, p)| p.clone())
            .collect())
    }
}
