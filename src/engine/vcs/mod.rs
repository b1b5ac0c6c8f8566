//! minigit Commit Graph Engine
//!
//! Commits, branch heads, first-parent ancestry, the strict and forced merge
//! policies, and read-only projections (graph view, statistics) over one
//! shared [`Database`](crate::engine::database::Database).

pub mod ancestry;
pub mod commit;
pub mod error;
pub mod graph;
pub mod merge;
pub mod model;
pub mod stats;

#[cfg(test)]
mod testing;

pub use ancestry::AncestryOracle;
pub use commit::CommitGraph;
pub use error::{Entity, VcsError};
pub use graph::{CommitGraphView, GraphSerializer};
pub use merge::{ConflictReason, MergeConflict, MergeEngine, MergeOutcome};
pub use model::{Branch, Commit, FileSnapshot, Repository, User};
pub use stats::{BranchDiff, RepositoryInsights, RepositoryStats};
