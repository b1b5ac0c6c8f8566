//! Commit Graph Records
//!
//! Row types for users, repositories, branches, commits and file snapshots,
//! plus the lookups every component shares.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type RepositoryId = i64;
pub type BranchId = i64;
pub type CommitId = i64;
pub type FileId = i64;

/// The single file tracked by every commit
pub const TRACKED_FILENAME: &str = "main.txt";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

impl User {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            username: row.get("username")?,
        })
    }

    pub(crate) fn load(conn: &Connection, id: UserId) -> rusqlite::Result<Option<Self>> {
        conn.query_row(
            "SELECT id, username FROM user_account WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .optional()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: RepositoryId,
    pub name: String,
    pub owner_id: UserId,
}

impl Repository {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            owner_id: row.get("owner_id")?,
        })
    }

    pub(crate) fn load(conn: &Connection, id: RepositoryId) -> rusqlite::Result<Option<Self>> {
        conn.query_row(
            "SELECT id, name, owner_id FROM repository WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .optional()
    }
}

/// A named, movable pointer into a repository's commit graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub name: String,
    pub repository_id: RepositoryId,
    pub head_commit_id: Option<CommitId>,
}

impl Branch {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            repository_id: row.get("repository_id")?,
            head_commit_id: row.get("head_commit_id")?,
        })
    }

    pub(crate) fn load(conn: &Connection, id: BranchId) -> rusqlite::Result<Option<Self>> {
        conn.query_row(
            "SELECT id, name, repository_id, head_commit_id FROM branch WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .optional()
    }
}

/// An immutable node of the commit graph.
///
/// `parent_id` is the first parent (the branch head the commit was made on);
/// `parent_id_2` is only set on merge commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: CommitId,
    pub repository_id: RepositoryId,
    pub author_id: UserId,
    pub message: String,
    pub parent_id: Option<CommitId>,
    pub parent_id_2: Option<CommitId>,
    pub created_at: DateTime<Utc>,
}

impl Commit {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none() && self.parent_id_2.is_none()
    }

    pub fn is_merge(&self) -> bool {
        self.parent_id.is_some() && self.parent_id_2.is_some()
    }

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            repository_id: row.get("repository_id")?,
            author_id: row.get("author_id")?,
            message: row.get("message")?,
            parent_id: row.get("parent_commit_id")?,
            parent_id_2: row.get("parent_commit_id_2")?,
            created_at: row.get("created_at")?,
        })
    }

    pub(crate) fn load(conn: &Connection, id: CommitId) -> rusqlite::Result<Option<Self>> {
        conn.query_row(
            "SELECT id, repository_id, author_id, message, parent_commit_id, parent_commit_id_2, created_at
             FROM git_commit WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .optional()
    }
}

/// The content of the tracked file at one commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSnapshot {
    pub id: FileId,
    pub commit_id: CommitId,
    pub filename: String,
    pub content: String,
}

impl FileSnapshot {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            commit_id: row.get("commit_id")?,
            filename: row.get("filename")?,
            content: row.get("content")?,
        })
    }

    pub(crate) fn load_for_commit(
        conn: &Connection,
        commit_id: CommitId,
    ) -> rusqlite::Result<Option<Self>> {
        conn.query_row(
            "SELECT id, commit_id, filename, content FROM file WHERE commit_id = ?1 ORDER BY id LIMIT 1",
            params![commit_id],
            Self::from_row,
        )
        .optional()
    }
}
