//! MCP `query_memory` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::sift::QueryOptions;
use crate::sources::SourceCategory;

/// Parameters for the `query_memory` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct QueryMemoryParams {
    #[schemars(description = "Natural language query")]
    pub query: String,

    #[schemars(description = "Passages requested per source (default from config)")]
    pub max_memories: Option<usize>,

    #[schemars(description = "Drop graph passages whose node resonance is below this, 0.0-1.0")]
    pub min_score: Option<f64>,

    /// Overrides automatic classification for the first round.
    #[schemars(
        description = "Source categories to consult first: canon, project, connectedKnowledge, web"
    )]
    pub categories: Option<Vec<String>>,

    #[schemars(description = "Allow verification re-queries when sources conflict (default true)")]
    pub enable_requery: Option<bool>,

    #[schemars(description = "Wall-clock budget for the whole query in milliseconds")]
    pub deadline_ms: Option<u64>,

    #[schemars(description = "Warn when web or connected-knowledge evidence never reaches an original primary source (default from config)")]
    pub require_original: Option<bool>,

    #[schemars(description = "Persist unresolved conflicts as archive nodes (default false)")]
    pub archive_conflicts: Option<bool>,
}

impl QueryMemoryParams {
    /// Overlay these parameters on `defaults`.
    pub fn options(&self, defaults: QueryOptions) -> Result<QueryOptions, String> {
        let mut options = defaults;
        if let Some(n) = self.max_memories {
            options.max_memories = n;
        }
        if let Some(score) = self.min_score {
            if !(0.0..=1.0).contains(&score) {
                return Err("min_score must be between 0.0 and 1.0".into());
            }
            options.min_score = score;
        }
        if let Some(names) = &self.categories {
            let categories = names
                .iter()
                .map(|n| n.parse::<SourceCategory>())
                .collect::<Result<BTreeSet<_>, _>>()?;
            options.categories = Some(categories);
        }
        if let Some(enabled) = self.enable_requery {
            options.enable_requery = enabled;
        }
        if let Some(ms) = self.deadline_ms {
            options.deadline = Some(Duration::from_millis(ms));
        }
        if let Some(required) = self.require_original {
            options.require_original = required;
        }
        Ok(options)
    }
}
