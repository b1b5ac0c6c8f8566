//! Commit Graph Error Types

use std::fmt;
use thiserror::Error;

use crate::engine::database::DatabaseError;
use crate::engine::vcs::model::BranchId;

/// Kind of record a lookup failed to find
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    User,
    Repository,
    Branch,
    Commit,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::User => write!(f, "User"),
            Entity::Repository => write!(f, "Repository"),
            Entity::Branch => write!(f, "Branch"),
            Entity::Commit => write!(f, "Commit"),
        }
    }
}

#[derive(Error, Debug)]
pub enum VcsError {
    #[error("{0} not found: {1}")]
    NotFound(Entity, i64),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// A head or parent reference points at a commit that does not exist
    /// (or lives in another repository). Never expected; fails closed.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Head of branch {branch_id} moved during update")]
    HeadMoved { branch_id: BranchId },
}

impl VcsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, VcsError::NotFound(..))
    }
}

pub type Result<T> = std::result::Result<T, VcsError>;
