//! minigit Database Module
//! SQLite store with connection pooling

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, ErrorCode, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::engine::config::DatabaseConfig;
use crate::engine::vcs::model::{Branch, BranchId, Repository, RepositoryId, User, UserId};

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

const DEFAULT_POOL_SIZE: u32 = 10;
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS user_account (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS repository (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    owner_id INTEGER NOT NULL REFERENCES user_account(id),
    UNIQUE (owner_id, name)
);

CREATE TABLE IF NOT EXISTS git_commit (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    repository_id INTEGER NOT NULL REFERENCES repository(id),
    author_id INTEGER NOT NULL REFERENCES user_account(id),
    message TEXT NOT NULL,
    parent_commit_id INTEGER REFERENCES git_commit(id),
    parent_commit_id_2 INTEGER REFERENCES git_commit(id),
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS branch (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    repository_id INTEGER NOT NULL REFERENCES repository(id),
    head_commit_id INTEGER REFERENCES git_commit(id),
    UNIQUE (repository_id, name)
);

CREATE TABLE IF NOT EXISTS file (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    commit_id INTEGER NOT NULL UNIQUE REFERENCES git_commit(id),
    filename TEXT NOT NULL,
    content TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_git_commit_repository ON git_commit(repository_id);
CREATE INDEX IF NOT EXISTS idx_branch_repository ON branch(repository_id);
";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to create database pool: {0}")]
    PoolError(#[from] r2d2::Error),
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    #[error("Constraint violated: {0}")]
    Constraint(String),
}

/// Shared handle to the store. Cloning is cheap; clones share the pool.
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    pub fn new(db_path: &Path) -> Result<Self, DatabaseError> {
        Self::open(db_path, DEFAULT_POOL_SIZE, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open the database described by a project's config.
    /// Relative paths resolve against `project_dir`.
    pub fn from_config(project_dir: &Path, config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let db_path = if config.path.is_absolute() {
            config.path.clone()
        } else {
            project_dir.join(&config.path)
        };
        Self::open(&db_path, config.pool_size.max(1), config.busy_timeout())
    }

    fn open(db_path: &Path, pool_size: u32, busy_timeout: Duration) -> Result<Self, DatabaseError> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let manager = SqliteConnectionManager::file(db_path)
            .with_init(move |conn| configure_connection(conn, busy_timeout));
        let pool = Pool::builder().max_size(pool_size).build(manager)?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    pub fn in_memory() -> Result<Self, DatabaseError> {
        // Every in-memory connection is its own database, so the pool holds one.
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| configure_connection(conn, DEFAULT_BUSY_TIMEOUT));
        let pool = Pool::builder().max_size(1).build(manager)?;
        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.pool.get()?;

        // PRAGMA journal_mode returns a row; in-memory databases answer "memory"
        let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        conn.execute_batch(SCHEMA)?;

        debug!(journal_mode = %mode, "schema ready");
        Ok(())
    }

    pub fn get_connection(&self) -> Result<DbConnection, DatabaseError> {
        Ok(self.pool.get()?)
    }

    /// Run `op` inside one write transaction.
    ///
    /// The transaction starts with `BEGIN IMMEDIATE`, so the write lock is
    /// held from the first read: read-modify-write sequences on branch heads
    /// cannot interleave with another writer. `op` returning `Err` rolls
    /// everything back.
    pub fn write<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<DatabaseError>,
    {
        self.transaction(TransactionBehavior::Immediate, op)
    }

    /// Run `op` against one consistent read snapshot.
    pub fn read<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<DatabaseError>,
    {
        self.transaction(TransactionBehavior::Deferred, op)
    }

    fn transaction<T, E, F>(&self, behavior: TransactionBehavior, op: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<DatabaseError>,
    {
        let mut conn = self.get_connection()?;
        let tx = conn
            .transaction_with_behavior(behavior)
            .map_err(DatabaseError::from)?;
        let value = op(&tx)?;
        tx.commit().map_err(DatabaseError::from)?;
        Ok(value)
    }

    pub fn create_user(&self, username: &str) -> Result<UserId, DatabaseError> {
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO user_account (username) VALUES (?1)",
            params![username],
        )
        .map_err(|e| unique_violation(e, format!("user '{}'", username)))?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_users(&self) -> Result<Vec<User>, DatabaseError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare("SELECT id, username FROM user_account ORDER BY id")?;
        let users = stmt
            .query_map([], User::from_row)?
            .collect::<Result<Vec<User>, _>>()?;
        Ok(users)
    }

    pub fn create_repository(&self, name: &str, owner_id: UserId) -> Result<RepositoryId, DatabaseError> {
        self.write(|tx| {
            if User::load(tx, owner_id)?.is_none() {
                return Err(DatabaseError::NotFound(format!("user {}", owner_id)));
            }
            tx.execute(
                "INSERT INTO repository (name, owner_id) VALUES (?1, ?2)",
                params![name, owner_id],
            )
            .map_err(|e| unique_violation(e, format!("repository '{}'", name)))?;
            Ok(tx.last_insert_rowid())
        })
    }

    pub fn get_repository(&self, id: RepositoryId) -> Result<Option<Repository>, DatabaseError> {
        let conn = self.get_connection()?;
        Ok(Repository::load(&conn, id)?)
    }

    pub fn list_repositories(&self, owner_id: Option<UserId>) -> Result<Vec<Repository>, DatabaseError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, owner_id FROM repository
             WHERE ?1 IS NULL OR owner_id = ?1 ORDER BY id",
        )?;
        let repositories = stmt
            .query_map(params![owner_id], Repository::from_row)?
            .collect::<Result<Vec<Repository>, _>>()?;
        Ok(repositories)
    }

    /// Create a branch. Without `source` the branch starts with no head;
    /// with `source` it starts at the source branch's current head.
    pub fn create_branch(
        &self,
        name: &str,
        repository_id: RepositoryId,
        source: Option<BranchId>,
    ) -> Result<BranchId, DatabaseError> {
        self.write(|tx| {
            if Repository::load(tx, repository_id)?.is_none() {
                return Err(DatabaseError::NotFound(format!("repository {}", repository_id)));
            }

            let head = match source {
                None => None,
                Some(source_id) => {
                    let source = Branch::load(tx, source_id)?
                        .ok_or_else(|| DatabaseError::NotFound(format!("branch {}", source_id)))?;
                    if source.repository_id != repository_id {
                        return Err(DatabaseError::Constraint(format!(
                            "branch {} belongs to repository {}, not {}",
                            source_id, source.repository_id, repository_id
                        )));
                    }
                    source.head_commit_id
                }
            };

            tx.execute(
                "INSERT INTO branch (name, repository_id, head_commit_id) VALUES (?1, ?2, ?3)",
                params![name, repository_id, head],
            )
            .map_err(|e| unique_violation(e, format!("branch '{}'", name)))?;
            Ok(tx.last_insert_rowid())
        })
    }

    pub fn get_branch(&self, id: BranchId) -> Result<Option<Branch>, DatabaseError> {
        let conn = self.get_connection()?;
        Ok(Branch::load(&conn, id)?)
    }

    pub fn list_branches(&self, repository_id: Option<RepositoryId>) -> Result<Vec<Branch>, DatabaseError> {
        let conn = self.get_connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, repository_id, head_commit_id FROM branch
             WHERE ?1 IS NULL OR repository_id = ?1 ORDER BY id",
        )?;
        let branches = stmt
            .query_map(params![repository_id], Branch::from_row)?
            .collect::<Result<Vec<Branch>, _>>()?;
        Ok(branches)
    }
}

// Foreign keys are a per-connection setting in SQLite.
fn configure_connection(conn: &mut rusqlite::Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch("PRAGMA foreign_keys=ON")
}

fn unique_violation(err: rusqlite::Error, what: String) -> DatabaseError {
    match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) if err.to_string().contains("UNIQUE") => {
            DatabaseError::AlreadyExists(what)
        }
        _ => DatabaseError::SqliteError(err),
    }
}
