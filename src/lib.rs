//! Companion memory core: a graph of memories, a registry of retrieval
//! sources, and a bounded verification loop that reconciles sources when
//! they disagree.
//!
//! Ember answers a query by consulting up to four source categories in a
//! fixed precedence order:
//!
//! | Category | Backed by | Precedence |
//! |----------|-----------|------------|
//! | **canon** | `core` graph nodes, seeded and read-only | 1 (highest) |
//! | **project** | `archive` (and optionally `shadow`) graph nodes | 2 |
//! | **connectedKnowledge** | external HTTP retrieval endpoint | 3 |
//! | **web** | external HTTP retrieval endpoint | 4 |
//!
//! When retrieved passages contradict each other, the SIFT loop issues
//! verification re-queries (at most [`sift::MAX_SIFT_ITERATIONS`] rounds)
//! and settles what it can by corroboration, then by precedence. Every
//! passage in the result carries an evidence label and a confidence that
//! is always below 1.0.
//!
//! # Modules
//!
//! - [`config`]: configuration loading from TOML files and environment variables
//! - [`db`]: SQLite initialization, schema, migrations and health checks
//! - [`memory`]: graph store, traversal, keyword search and statistics
//! - [`sources`]: source categories, the registry and retrieval backends
//! - [`sift`]: conflict detection and the re-query orchestrator
//! - [`ledger`]: evidence labels and confidence
//! - [`engine`]: the entry point tying the above together
//! - [`tools`] and [`server`]: the MCP surface

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod seed;
pub mod server;
pub mod sift;
pub mod sources;
pub mod text;
pub mod tools;

pub use engine::{MemoryEngine, QueryResponse};
pub use error::{MemoryError, MemoryResult};
