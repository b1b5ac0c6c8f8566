//! Commit Creation
//!
//! Records ordinary and merge commits, writes their file snapshots and moves
//! branch heads. Every public write is a single transaction.

use chrono::Utc;
use rusqlite::{params, Connection};
use tracing::{info, warn};

use crate::engine::database::Database;
use crate::engine::vcs::error::{Entity, Result, VcsError};
use crate::engine::vcs::model::{
    Branch, BranchId, Commit, CommitId, FileSnapshot, Repository, RepositoryId, User, UserId,
    TRACKED_FILENAME,
};

pub const MERGE_COMMIT_MESSAGE: &str = "Merge commit";

/// Creates commits and advances branch heads
#[derive(Clone)]
pub struct CommitGraph {
    db: Database,
}

impl CommitGraph {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record `content` as a new commit on top of the branch head.
    ///
    /// The new commit's first parent is the previous head (none for the
    /// first commit on a branch), and the branch head moves to it.
    pub fn create_commit(
        &self,
        branch_id: BranchId,
        author_id: UserId,
        message: &str,
        content: &str,
    ) -> Result<CommitId> {
        self.db.write(|tx| {
            let branch = require_branch(tx, branch_id)?;
            if User::load(tx, author_id)?.is_none() {
                return Err(VcsError::NotFound(Entity::User, author_id));
            }
            if let Some(head) = branch.head_commit_id {
                require_commit_in(tx, head, branch.repository_id)?;
            }

            let commit_id = insert_commit(
                tx,
                branch.repository_id,
                author_id,
                message,
                branch.head_commit_id,
                None,
            )?;
            insert_snapshot(tx, commit_id, content)?;
            advance_head(tx, branch_id, branch.head_commit_id, commit_id)?;

            info!(
                repository_id = branch.repository_id,
                branch_id,
                commit_id,
                parent_id = ?branch.head_commit_id,
                "commit created"
            );
            Ok(commit_id)
        })
    }

    /// Record a two-parent commit holding `content`. Branch heads are left
    /// untouched; moving them is the merge caller's job.
    pub fn create_merge_commit(
        &self,
        repository_id: RepositoryId,
        parent_id_1: CommitId,
        parent_id_2: CommitId,
        content: &str,
    ) -> Result<CommitId> {
        self.db.write(|tx| {
            insert_merge_commit(
                tx,
                repository_id,
                parent_id_1,
                parent_id_2,
                content,
                MERGE_COMMIT_MESSAGE,
            )
        })
    }

    /// All commits, newest first, optionally restricted to one repository
    pub fn get_commits(&self, repository_id: Option<RepositoryId>) -> Result<Vec<Commit>> {
        let conn = self.db.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, repository_id, author_id, message, parent_commit_id, parent_commit_id_2, created_at
             FROM git_commit
             WHERE ?1 IS NULL OR repository_id = ?1
             ORDER BY id DESC",
        )?;
        let commits = stmt
            .query_map(params![repository_id], Commit::from_row)?
            .collect::<std::result::Result<Vec<Commit>, _>>()?;
        Ok(commits)
    }

    /// Files of the branch's head commit; empty when the branch has no head
    pub fn get_files_by_branch(&self, branch_id: BranchId) -> Result<Vec<FileSnapshot>> {
        let conn = self.db.get_connection()?;
        let branch = require_branch(&conn, branch_id)?;
        let Some(head) = branch.head_commit_id else {
            return Ok(Vec::new());
        };

        let mut stmt = conn.prepare(
            "SELECT id, commit_id, filename, content FROM file WHERE commit_id = ?1 ORDER BY id",
        )?;
        let files = stmt
            .query_map(params![head], FileSnapshot::from_row)?
            .collect::<std::result::Result<Vec<FileSnapshot>, _>>()?;
        Ok(files)
    }
}

pub(crate) fn require_branch(conn: &Connection, branch_id: BranchId) -> Result<Branch> {
    Branch::load(conn, branch_id)?.ok_or(VcsError::NotFound(Entity::Branch, branch_id))
}

/// Load a commit that a head or parent reference points at.
/// A dangling or cross-repository reference is an invariant violation.
pub(crate) fn require_commit_in(
    conn: &Connection,
    commit_id: CommitId,
    repository_id: RepositoryId,
) -> Result<Commit> {
    let commit = Commit::load(conn, commit_id)?.ok_or_else(|| {
        VcsError::InvariantViolation(format!("commit {} is referenced but missing", commit_id))
    })?;
    if commit.repository_id != repository_id {
        return Err(VcsError::InvariantViolation(format!(
            "commit {} belongs to repository {}, expected {}",
            commit_id, commit.repository_id, repository_id
        )));
    }
    Ok(commit)
}

/// Content of the snapshot owned by `commit_id`
pub(crate) fn snapshot_content(conn: &Connection, commit_id: CommitId) -> Result<String> {
    FileSnapshot::load_for_commit(conn, commit_id)?
        .map(|file| file.content)
        .ok_or_else(|| {
            VcsError::InvariantViolation(format!("commit {} has no file snapshot", commit_id))
        })
}

/// Insert a merge commit and its snapshot inside the caller's transaction.
/// The repository owner is recorded as the author.
pub(crate) fn insert_merge_commit(
    conn: &Connection,
    repository_id: RepositoryId,
    parent_id_1: CommitId,
    parent_id_2: CommitId,
    content: &str,
    message: &str,
) -> Result<CommitId> {
    let repository = Repository::load(conn, repository_id)?
        .ok_or(VcsError::NotFound(Entity::Repository, repository_id))?;
    require_commit_in(conn, parent_id_1, repository_id)?;
    require_commit_in(conn, parent_id_2, repository_id)?;

    let commit_id = insert_commit(
        conn,
        repository_id,
        repository.owner_id,
        message,
        Some(parent_id_1),
        Some(parent_id_2),
    )?;
    insert_snapshot(conn, commit_id, content)?;

    info!(repository_id, commit_id, parent_id_1, parent_id_2, "merge commit created");
    Ok(commit_id)
}

/// Move a branch head from `expected` to `new_head`.
///
/// Compare-and-swap: if the stored head is no longer `expected` nothing is
/// written and the transaction must be abandoned.
pub(crate) fn advance_head(
    conn: &Connection,
    branch_id: BranchId,
    expected: Option<CommitId>,
    new_head: CommitId,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE branch SET head_commit_id = ?1 WHERE id = ?2 AND head_commit_id IS ?3",
        params![new_head, branch_id, expected],
    )?;
    if updated != 1 {
        warn!(branch_id, ?expected, new_head, "branch head moved concurrently");
        return Err(VcsError::HeadMoved { branch_id });
    }
    Ok(())
}

fn insert_commit(
    conn: &Connection,
    repository_id: RepositoryId,
    author_id: UserId,
    message: &str,
    parent_id: Option<CommitId>,
    parent_id_2: Option<CommitId>,
) -> Result<CommitId> {
    conn.execute(
        "INSERT INTO git_commit (repository_id, author_id, message, parent_commit_id, parent_commit_id_2, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![repository_id, author_id, message, parent_id, parent_id_2, Utc::now()],
    )?;
    Ok(conn.last_insert_rowid())
}

fn insert_snapshot(conn: &Connection, commit_id: CommitId, content: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO file (commit_id, filename, content) VALUES (?1, ?2, ?3)",
        params![commit_id, TRACKED_FILENAME, content],
    )?;
    Ok(())
}
