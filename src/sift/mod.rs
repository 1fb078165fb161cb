//! Conflict detection and the bounded SIFT re-query loop.

pub mod conflict;
pub mod orchestrator;
pub mod trace;

pub use conflict::{detect_conflicts, ConflictRecord, Position, ResolutionReason, Stance};
pub use orchestrator::{
    QueryOptions, RetrievalFailure, RoundReport, SiftOrchestrator, SiftOutcome, SiftSettings,
    SiftState, Termination,
};
pub use trace::TraceWarning;

/// Hard upper bound on re-query rounds per query.
pub const MAX_SIFT_ITERATIONS: u32 = 3;
