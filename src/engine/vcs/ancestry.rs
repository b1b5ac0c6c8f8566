//! First-Parent Ancestry
//!
//! Answers "is X an ancestor of Y" by walking `parent_id` links only. The
//! second parent of a merge commit is never followed, so a commit reachable
//! only through a merge's second parent is reported as not an ancestor.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::engine::database::Database;
use crate::engine::vcs::error::{Entity, Result, VcsError};
use crate::engine::vcs::model::CommitId;

#[derive(Clone)]
pub struct AncestryOracle {
    db: Database,
}

impl AncestryOracle {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// True when `candidate` lies on the first-parent chain of `descendant`
    /// (a commit is its own ancestor).
    pub fn is_ancestor(&self, candidate: CommitId, descendant: CommitId) -> Result<bool> {
        self.db.read(|tx| is_first_parent_ancestor(tx, candidate, descendant))
    }
}

pub(crate) fn is_first_parent_ancestor(
    conn: &Connection,
    candidate: CommitId,
    descendant: CommitId,
) -> Result<bool> {
    if candidate == descendant {
        return Ok(true);
    }

    let mut current = descendant;
    let mut parent = first_parent(conn, current)?.ok_or(VcsError::NotFound(Entity::Commit, current))?;
    let mut steps = 0usize;

    loop {
        let Some(next) = parent else {
            debug!(candidate, descendant, steps, "reached root");
            return Ok(false);
        };
        // Parents are always created before their children.
        if next >= current {
            return Err(VcsError::InvariantViolation(format!(
                "commit {} has parent {} that is not older",
                current, next
            )));
        }
        if next == candidate {
            debug!(candidate, descendant, steps, "ancestor found");
            return Ok(true);
        }
        if next < candidate {
            debug!(candidate, descendant, steps, "walked past candidate");
            return Ok(false);
        }

        current = next;
        steps += 1;
        parent = first_parent(conn, current)?.ok_or_else(|| {
            VcsError::InvariantViolation(format!("commit {} is referenced but missing", current))
        })?;
    }
}

/// `None` when the commit does not exist, `Some(None)` for a root commit
fn first_parent(conn: &Connection, commit_id: CommitId) -> Result<Option<Option<CommitId>>> {
    Ok(conn
        .query_row(
            "SELECT parent_commit_id FROM git_commit WHERE id = ?1",
            params![commit_id],
            |row| row.get::<_, Option<CommitId>>(0),
        )
        .optional()?)
}
