//! Repository Insights
//!
//! Summary counts for a repository and a line-count comparison of two
//! branch heads.

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::engine::database::Database;
use crate::engine::vcs::commit::{require_branch, snapshot_content};
use crate::engine::vcs::error::{Entity, Result, VcsError};
use crate::engine::vcs::model::{BranchId, Repository, RepositoryId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryStats {
    pub repository_id: RepositoryId,
    pub commit_count: i64,
    pub branch_count: i64,
    /// Distinct tracked filenames across all commits
    pub file_count: i64,
    pub last_commit_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchDiff {
    pub branch_id_1: BranchId,
    pub branch_id_2: BranchId,
    /// Lines the second head has beyond the first
    pub additions: usize,
    /// Lines the first head has beyond the second
    pub deletions: usize,
    pub has_conflicts: bool,
}

impl BranchDiff {
    fn between(branch_id_1: BranchId, content_1: &str, branch_id_2: BranchId, content_2: &str) -> Self {
        let lines_1 = line_count(content_1);
        let lines_2 = line_count(content_2);
        Self {
            branch_id_1,
            branch_id_2,
            additions: lines_2.saturating_sub(lines_1),
            deletions: lines_1.saturating_sub(lines_2),
            has_conflicts: content_1 != content_2,
        }
    }
}

/// Newline-separated segments: `""` is one line, `"a\n"` is two
fn line_count(content: &str) -> usize {
    content.split('\n').count()
}

#[derive(Clone)]
pub struct RepositoryInsights {
    db: Database,
}

impl RepositoryInsights {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn repository_stats(&self, repository_id: RepositoryId) -> Result<RepositoryStats> {
        self.db.read(|tx| {
            if Repository::load(tx, repository_id)?.is_none() {
                return Err(VcsError::NotFound(Entity::Repository, repository_id));
            }

            let (commit_count, last_commit_at): (i64, Option<DateTime<Utc>>) = tx.query_row(
                "SELECT COUNT(*), MAX(created_at) FROM git_commit WHERE repository_id = ?1",
                params![repository_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            let branch_count: i64 = tx.query_row(
                "SELECT COUNT(*) FROM branch WHERE repository_id = ?1",
                params![repository_id],
                |row| row.get(0),
            )?;
            let file_count: i64 = tx.query_row(
                "SELECT COUNT(DISTINCT f.filename) FROM file f
                 JOIN git_commit c ON f.commit_id = c.id
                 WHERE c.repository_id = ?1",
                params![repository_id],
                |row| row.get(0),
            )?;

            Ok(RepositoryStats {
                repository_id,
                commit_count,
                branch_count,
                file_count,
                last_commit_at,
            })
        })
    }

    /// Compare the head contents of two branches.
    /// `None` when either branch has no head yet.
    pub fn branch_diff(&self, branch_id_1: BranchId, branch_id_2: BranchId) -> Result<Option<BranchDiff>> {
        self.db.read(|tx| {
            let branch_1 = require_branch(tx, branch_id_1)?;
            let branch_2 = require_branch(tx, branch_id_2)?;
            let (Some(head_1), Some(head_2)) = (branch_1.head_commit_id, branch_2.head_commit_id) else {
                return Ok(None);
            };

            let content_1 = snapshot_content(tx, head_1)?;
            let content_2 = snapshot_content(tx, head_2)?;
            Ok(Some(BranchDiff::between(branch_id_1, &content_1, branch_id_2, &content_2)))
        })
    }
}
