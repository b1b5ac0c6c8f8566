//! Shared setup for commit graph unit tests

use crate::engine::database::Database;
use crate::engine::vcs::model::{BranchId, CommitId, RepositoryId, UserId};

/// In-memory store with one user ("alice"), one repository ("notes") and
/// an empty `main` branch.
pub(crate) struct Fixture {
    pub db: Database,
    pub alice: UserId,
    pub repo: RepositoryId,
    pub main: BranchId,
}

impl Fixture {
    pub fn new() -> Self {
        let db = Database::in_memory().unwrap();
        let alice = db.create_user("alice").unwrap();
        let repo = db.create_repository("notes", alice).unwrap();
        let main = db.create_branch("main", repo, None).unwrap();
        Self { db, alice, repo, main }
    }

    pub fn head(&self, branch_id: BranchId) -> Option<CommitId> {
        self.db.get_branch(branch_id).unwrap().unwrap().head_commit_id
    }

    pub fn branch_from(&self, name: &str, source: BranchId) -> BranchId {
        self.db.create_branch(name, self.repo, Some(source)).unwrap()
    }

    /// Run raw SQL outside the engine, for tests that need states the
    /// engine never produces.
    pub fn execute(&self, sql: &str) {
        let conn = self.db.get_connection().unwrap();
        conn.execute_batch(sql).unwrap();
    }

    /// Make every later snapshot insert abort, as a disk or constraint
    /// failure midway through a commit would.
    pub fn fail_snapshot_inserts(&self) {
        self.execute(
            "CREATE TRIGGER fail_snapshot BEFORE INSERT ON file
             BEGIN SELECT RAISE(ABORT, 'injected failure'); END;",
        );
    }
}
