//! Branch Merges
//!
//! Two policies over the single tracked file:
//! - strict: fast-forward when one head descends from the other, otherwise
//!   merge only if both heads hold identical content
//! - force: always merge, storing caller-resolved content

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use crate::engine::database::Database;
use crate::engine::vcs::ancestry::is_first_parent_ancestor;
use crate::engine::vcs::commit::{
    advance_head, insert_merge_commit, require_branch, snapshot_content, MERGE_COMMIT_MESSAGE,
};
use crate::engine::vcs::error::Result;
use crate::engine::vcs::model::{Branch, BranchId, CommitId, Repository};

pub const FORCE_MERGE_COMMIT_MESSAGE: &str = "Force merge commit";

/// Result of a strict merge attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MergeOutcome {
    /// Both heads held the same content; a merge commit now heads both branches
    Merged {
        commit_id: CommitId,
        branch_id_1: BranchId,
        branch_id_2: BranchId,
    },
    /// One branch was behind and has been moved to the other's head
    FastForward {
        branch_id: BranchId,
        from: CommitId,
        to: CommitId,
    },
    /// Both branches already point at the same commit
    UpToDate { commit_id: CommitId },
    /// Manual resolution required; nothing was written
    Conflict(MergeConflict),
}

impl MergeOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, MergeOutcome::Conflict(_))
    }

    pub fn conflict(&self) -> Option<&MergeConflict> {
        match self {
            MergeOutcome::Conflict(conflict) => Some(conflict),
            _ => None,
        }
    }
}

/// Both sides of a refused merge, verbatim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConflict {
    pub branch_id_1: BranchId,
    pub content_1: String,
    pub branch_id_2: BranchId,
    pub content_2: String,
    pub reason: ConflictReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConflictReason {
    ContentMismatch,
    MissingHead { branch_id: BranchId },
    RepositoryMismatch,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictReason::ContentMismatch => {
                write!(f, "Contents differ; resolve manually and force merge")
            }
            ConflictReason::MissingHead { branch_id } => {
                write!(f, "Branch {} has no HEAD commit", branch_id)
            }
            ConflictReason::RepositoryMismatch => {
                write!(f, "Branches belong to different repositories")
            }
        }
    }
}

#[derive(Clone)]
pub struct MergeEngine {
    db: Database,
}

impl MergeEngine {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Merge two branches without caller input.
    ///
    /// Runs as one transaction. Only `Merged` and `FastForward` write;
    /// conflicts leave both branches untouched.
    pub fn perform_strict_merge(&self, branch_id_1: BranchId, branch_id_2: BranchId) -> Result<MergeOutcome> {
        self.db.write(|tx| {
            let branch_1 = require_branch(tx, branch_id_1)?;
            let branch_2 = require_branch(tx, branch_id_2)?;

            if branch_1.repository_id != branch_2.repository_id {
                warn!(branch_id_1, branch_id_2, "merge across repositories refused");
                return Ok(refused(&branch_1, &branch_2, ConflictReason::RepositoryMismatch));
            }

            let (head_1, head_2) = match (branch_1.head_commit_id, branch_2.head_commit_id) {
                (Some(head_1), Some(head_2)) => (head_1, head_2),
                (None, _) => {
                    warn!(branch_id = branch_id_1, "merge refused: no HEAD commit");
                    return Ok(refused(&branch_1, &branch_2, ConflictReason::MissingHead { branch_id: branch_id_1 }));
                }
                (_, None) => {
                    warn!(branch_id = branch_id_2, "merge refused: no HEAD commit");
                    return Ok(refused(&branch_1, &branch_2, ConflictReason::MissingHead { branch_id: branch_id_2 }));
                }
            };

            if head_1 == head_2 {
                return Ok(MergeOutcome::UpToDate { commit_id: head_1 });
            }

            if is_first_parent_ancestor(tx, head_2, head_1)? {
                advance_head(tx, branch_id_2, Some(head_2), head_1)?;
                info!(branch_id = branch_id_2, from = head_2, to = head_1, "fast-forward");
                return Ok(MergeOutcome::FastForward { branch_id: branch_id_2, from: head_2, to: head_1 });
            }
            if is_first_parent_ancestor(tx, head_1, head_2)? {
                advance_head(tx, branch_id_1, Some(head_1), head_2)?;
                info!(branch_id = branch_id_1, from = head_1, to = head_2, "fast-forward");
                return Ok(MergeOutcome::FastForward { branch_id: branch_id_1, from: head_1, to: head_2 });
            }

            let content_1 = snapshot_content(tx, head_1)?;
            let content_2 = snapshot_content(tx, head_2)?;
            if content_1 != content_2 {
                warn!(branch_id_1, branch_id_2, "merge conflict");
                return Ok(MergeOutcome::Conflict(MergeConflict {
                    branch_id_1,
                    content_1,
                    branch_id_2,
                    content_2,
                    reason: ConflictReason::ContentMismatch,
                }));
            }

            let commit_id = insert_merge_commit(
                tx,
                branch_1.repository_id,
                head_1,
                head_2,
                &content_1,
                MERGE_COMMIT_MESSAGE,
            )?;
            advance_head(tx, branch_id_1, Some(head_1), commit_id)?;
            advance_head(tx, branch_id_2, Some(head_2), commit_id)?;

            info!(branch_id_1, branch_id_2, commit_id, "branches merged");
            Ok(MergeOutcome::Merged { commit_id, branch_id_1, branch_id_2 })
        })
    }

    /// Merge two branches with `resolved_content`, whatever their heads hold.
    ///
    /// Returns `Ok(false)` without writing when either branch or their
    /// repository cannot be resolved, a branch has no head, or both heads
    /// are already the same commit.
    pub fn perform_force_merge(
        &self,
        branch_id_1: BranchId,
        branch_id_2: BranchId,
        resolved_content: &str,
    ) -> Result<bool> {
        self.db.write(|tx| {
            let (Some(branch_1), Some(branch_2)) =
                (Branch::load(tx, branch_id_1)?, Branch::load(tx, branch_id_2)?)
            else {
                warn!(branch_id_1, branch_id_2, "force merge: branch not found");
                return Ok(false);
            };
            if branch_1.repository_id != branch_2.repository_id
                || Repository::load(tx, branch_1.repository_id)?.is_none()
            {
                warn!(branch_id_1, branch_id_2, "force merge: repository not resolved");
                return Ok(false);
            }
            let (Some(head_1), Some(head_2)) = (branch_1.head_commit_id, branch_2.head_commit_id) else {
                warn!(branch_id_1, branch_id_2, "force merge: no HEAD commit");
                return Ok(false);
            };
            if head_1 == head_2 {
                warn!(branch_id_1, branch_id_2, commit_id = head_1, "force merge: heads already equal");
                return Ok(false);
            }

            let commit_id = insert_merge_commit(
                tx,
                branch_1.repository_id,
                head_1,
                head_2,
                resolved_content,
                FORCE_MERGE_COMMIT_MESSAGE,
            )?;
            advance_head(tx, branch_id_1, Some(head_1), commit_id)?;
            advance_head(tx, branch_id_2, Some(head_2), commit_id)?;

            info!(branch_id_1, branch_id_2, commit_id, "branches force merged");
            Ok(true)
        })
    }
}

fn refused(branch_1: &Branch, branch_2: &Branch, reason: ConflictReason) -> MergeOutcome {
    MergeOutcome::Conflict(MergeConflict {
        branch_id_1: branch_1.id,
        content_1: String::new(),
        branch_id_2: branch_2.id,
        content_2: String::new(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::vcs::commit::CommitGraph;
    use crate::engine::vcs::testing::Fixture;

    fn diverged(fx: &Fixture, left: &str, right: &str) -> (BranchId, CommitId, CommitId) {
        let graph = CommitGraph::new(fx.db.clone());
        graph.create_commit(fx.main, fx.alice, "init", "A").unwrap();
        let feature = fx.branch_from("feature", fx.main);
        let head_main = graph.create_commit(fx.main, fx.alice, "main work", left).unwrap();
        let head_feature = graph.create_commit(feature, fx.alice, "feature work", right).unwrap();
        (feature, head_main, head_feature)
    }

    #[test]
    fn test_equal_content_merges() {
        let fx = Fixture::new();
        let engine = MergeEngine::new(fx.db.clone());
        let graph = CommitGraph::new(fx.db.clone());
        let (feature, head_main, head_feature) = diverged(&fx, "same", "same");
        let before = graph.get_commits(Some(fx.repo)).unwrap().len();

        let outcome = engine.perform_strict_merge(fx.main, feature).unwrap();

        let MergeOutcome::Merged { commit_id, .. } = outcome else {
            panic!("expected merge, got {:?}", outcome);
        };
        let commits = graph.get_commits(Some(fx.repo)).unwrap();
        assert_eq!(commits.len(), before + 1);
        assert_eq!(commits[0].parent_id, Some(head_main));
        assert_eq!(commits[0].parent_id_2, Some(head_feature));
        assert_eq!(fx.head(fx.main), Some(commit_id));
        assert_eq!(fx.head(feature), Some(commit_id));
        assert_eq!(graph.get_files_by_branch(feature).unwrap()[0].content, "same");
    }

    #[test]
    fn test_different_content_conflicts() {
        let fx = Fixture::new();
        let engine = MergeEngine::new(fx.db.clone());
        let (feature, head_main, head_feature) = diverged(&fx, "C", "B");

        let outcome = engine.perform_strict_merge(fx.main, feature).unwrap();

        assert!(!outcome.is_success());
        let conflict = outcome.conflict().unwrap();
        assert_eq!(conflict.branch_id_1, fx.main);
        assert_eq!(conflict.content_1, "C");
        assert_eq!(conflict.branch_id_2, feature);
        assert_eq!(conflict.content_2, "B");
        assert_eq!(conflict.reason, ConflictReason::ContentMismatch);
        assert_eq!(fx.head(fx.main), Some(head_main));
        assert_eq!(fx.head(feature), Some(head_feature));
    }

    #[test]
    fn test_fast_forward_lagging_branch() {
        let fx = Fixture::new();
        let engine = MergeEngine::new(fx.db.clone());
        let graph = CommitGraph::new(fx.db.clone());
        let base = graph.create_commit(fx.main, fx.alice, "init", "A").unwrap();
        let feature = fx.branch_from("feature", fx.main);
        let ahead = graph.create_commit(fx.main, fx.alice, "more", "AB").unwrap();

        let outcome = engine.perform_strict_merge(fx.main, feature).unwrap();
        assert_eq!(
            outcome,
            MergeOutcome::FastForward { branch_id: feature, from: base, to: ahead }
        );
        assert_eq!(fx.head(feature), Some(ahead));
        assert_eq!(graph.get_commits(Some(fx.repo)).unwrap().len(), 2);
    }

    #[test]
    fn test_fast_forward_first_branch() {
        let fx = Fixture::new();
        let engine = MergeEngine::new(fx.db.clone());
        let graph = CommitGraph::new(fx.db.clone());
        let base = graph.create_commit(fx.main, fx.alice, "init", "A").unwrap();
        let feature = fx.branch_from("feature", fx.main);
        let ahead = graph.create_commit(feature, fx.alice, "more", "AB").unwrap();

        let outcome = engine.perform_strict_merge(fx.main, feature).unwrap();
        assert_eq!(
            outcome,
            MergeOutcome::FastForward { branch_id: fx.main, from: base, to: ahead }
        );
        assert_eq!(fx.head(fx.main), Some(ahead));
    }

    #[test]
    fn test_same_head_is_up_to_date() {
        let fx = Fixture::new();
        let engine = MergeEngine::new(fx.db.clone());
        let graph = CommitGraph::new(fx.db.clone());
        let base = graph.create_commit(fx.main, fx.alice, "init", "A").unwrap();
        let feature = fx.branch_from("feature", fx.main);

        assert_eq!(
            engine.perform_strict_merge(fx.main, feature).unwrap(),
            MergeOutcome::UpToDate { commit_id: base }
        );
    }

    #[test]
    fn test_missing_head_is_reported() {
        let fx = Fixture::new();
        let engine = MergeEngine::new(fx.db.clone());
        let graph = CommitGraph::new(fx.db.clone());
        let head = graph.create_commit(fx.main, fx.alice, "init", "A").unwrap();
        let empty = fx.db.create_branch("empty", fx.repo, None).unwrap();

        let outcome = engine.perform_strict_merge(fx.main, empty).unwrap();
        let conflict = outcome.conflict().unwrap();
        assert_eq!(conflict.reason, ConflictReason::MissingHead { branch_id: empty });
        assert!(conflict.reason.to_string().contains("no HEAD"));
        assert_eq!(fx.head(fx.main), Some(head));
        assert_eq!(fx.head(empty), None);
    }

    #[test]
    fn test_strict_merge_unknown_branch() {
        let fx = Fixture::new();
        let engine = MergeEngine::new(fx.db.clone());

        assert!(engine.perform_strict_merge(fx.main, 404).unwrap_err().is_not_found());
    }

    #[test]
    fn test_force_merge_takes_resolved_content() {
        let fx = Fixture::new();
        let engine = MergeEngine::new(fx.db.clone());
        let graph = CommitGraph::new(fx.db.clone());
        let (feature, head_main, head_feature) = diverged(&fx, "C", "B");

        assert!(engine.perform_force_merge(fx.main, feature, "C+B").unwrap());

        let commits = graph.get_commits(Some(fx.repo)).unwrap();
        let merge = &commits[0];
        assert!(merge.is_merge());
        assert_eq!(merge.parent_id, Some(head_main));
        assert_eq!(merge.parent_id_2, Some(head_feature));
        assert_eq!(merge.message, FORCE_MERGE_COMMIT_MESSAGE);
        assert_eq!(fx.head(fx.main), Some(merge.id));
        assert_eq!(fx.head(feature), Some(merge.id));
        assert_eq!(graph.get_files_by_branch(fx.main).unwrap()[0].content, "C+B");
    }

    #[test]
    fn test_force_merge_of_equal_content_still_commits() {
        let fx = Fixture::new();
        let engine = MergeEngine::new(fx.db.clone());
        let graph = CommitGraph::new(fx.db.clone());
        let (feature, _, _) = diverged(&fx, "same", "same");
        let before = graph.get_commits(Some(fx.repo)).unwrap().len();

        assert!(engine.perform_force_merge(fx.main, feature, "same").unwrap());
        assert_eq!(graph.get_commits(Some(fx.repo)).unwrap().len(), before + 1);
    }

    #[test]
    fn test_force_merge_unresolvable_branches() {
        let fx = Fixture::new();
        let engine = MergeEngine::new(fx.db.clone());
        let graph = CommitGraph::new(fx.db.clone());
        graph.create_commit(fx.main, fx.alice, "init", "A").unwrap();
        let empty = fx.db.create_branch("empty", fx.repo, None).unwrap();

        assert!(!engine.perform_force_merge(fx.main, 404, "X").unwrap());
        assert!(!engine.perform_force_merge(fx.main, empty, "X").unwrap());
        assert_eq!(graph.get_commits(None).unwrap().len(), 1);
    }

    #[test]
    fn test_strict_merge_across_repositories() {
        let fx = Fixture::new();
        let engine = MergeEngine::new(fx.db.clone());
        let graph = CommitGraph::new(fx.db.clone());
        let local = graph.create_commit(fx.main, fx.alice, "init", "A").unwrap();

        let other_repo = fx.db.create_repository("other", fx.alice).unwrap();
        let other_main = fx.db.create_branch("main", other_repo, None).unwrap();
        let foreign = graph.create_commit(other_main, fx.alice, "init", "A").unwrap();

        let outcome = engine.perform_strict_merge(fx.main, other_main).unwrap();
        let conflict = outcome.conflict().unwrap();
        assert_eq!(conflict.reason, ConflictReason::RepositoryMismatch);
        assert_eq!((conflict.branch_id_1, conflict.branch_id_2), (fx.main, other_main));
        assert_eq!(fx.head(fx.main), Some(local));
        assert_eq!(fx.head(other_main), Some(foreign));
        assert_eq!(graph.get_commits(None).unwrap().len(), 2);
    }

    #[test]
    fn test_force_merge_across_repositories() {
        let fx = Fixture::new();
        let engine = MergeEngine::new(fx.db.clone());
        let graph = CommitGraph::new(fx.db.clone());
        let local = graph.create_commit(fx.main, fx.alice, "init", "A").unwrap();

        let other_repo = fx.db.create_repository("other", fx.alice).unwrap();
        let other_main = fx.db.create_branch("main", other_repo, None).unwrap();
        let foreign = graph.create_commit(other_main, fx.alice, "init", "X").unwrap();

        assert!(!engine.perform_force_merge(fx.main, other_main, "AX").unwrap());
        assert_eq!(graph.get_commits(None).unwrap().len(), 2);
        assert_eq!(fx.head(fx.main), Some(local));
        assert_eq!(fx.head(other_main), Some(foreign));
    }

    #[test]
    fn test_force_merge_of_identical_heads_writes_nothing() {
        let fx = Fixture::new();
        let engine = MergeEngine::new(fx.db.clone());
        let graph = CommitGraph::new(fx.db.clone());
        let head = graph.create_commit(fx.main, fx.alice, "init", "A").unwrap();
        let feature = fx.branch_from("feature", fx.main);

        assert!(!engine.perform_force_merge(fx.main, fx.main, "B").unwrap());
        assert!(!engine.perform_force_merge(fx.main, feature, "B").unwrap());
        assert_eq!(graph.get_commits(None).unwrap().len(), 1);
        assert_eq!(fx.head(fx.main), Some(head));
        assert_eq!(fx.head(feature), Some(head));
    }
}
