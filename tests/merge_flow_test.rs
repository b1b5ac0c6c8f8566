use minigit_lib::engine::config::Config;
use minigit_lib::engine::database::Database;
use minigit_lib::engine::vcs::graph::EdgeKind;
use minigit_lib::engine::vcs::merge::{ConflictReason, FORCE_MERGE_COMMIT_MESSAGE};
use minigit_lib::engine::vcs::{
    AncestryOracle, CommitGraph, GraphSerializer, MergeEngine, MergeOutcome, RepositoryInsights,
};
use std::thread;

#[test]
fn test_conflict_then_force_merge_flow() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Project on disk with the default config
    let root = tempfile::tempdir()?;
    let config = Config::default_for_project("notes");
    config.save(root.path())?;
    let db = Database::from_config(root.path(), &config.database)?;

    let alice = db.create_user("alice")?;
    let repo = db.create_repository("notes", alice)?;
    let main = db.create_branch("main", repo, None)?;

    let commits = CommitGraph::new(db.clone());
    let merges = MergeEngine::new(db.clone());

    // 2. main gets "A", feature branches off it and diverges
    let c1 = commits.create_commit(main, alice, "first", "A")?;
    let feature = db.create_branch("feature", repo, Some(main))?;
    assert_eq!(db.get_branch(feature)?.unwrap().head_commit_id, Some(c1));

    let c2 = commits.create_commit(feature, alice, "feature work", "B")?;
    let c3 = commits.create_commit(main, alice, "main work", "C")?;
    assert_eq!((c1, c2, c3), (1, 2, 3));

    // 3. Strict merge refuses and reports both sides verbatim
    let outcome = merges.perform_strict_merge(main, feature)?;
    let conflict = outcome.conflict().expect("diverged contents must conflict");
    assert_eq!(conflict.reason, ConflictReason::ContentMismatch);
    assert_eq!((conflict.branch_id_1, conflict.content_1.as_str()), (main, "C"));
    assert_eq!((conflict.branch_id_2, conflict.content_2.as_str()), (feature, "B"));
    assert_eq!(commits.get_commits(Some(repo))?.len(), 3);

    // 4. Force merge with the resolved content
    assert!(merges.perform_force_merge(main, feature, "C+B")?);

    let history = commits.get_commits(Some(repo))?;
    assert_eq!(history.len(), 4);
    let merge = &history[0];
    assert_eq!(merge.id, 4);
    assert_eq!(merge.parent_id, Some(c3));
    assert_eq!(merge.parent_id_2, Some(c2));
    assert_eq!(merge.message, FORCE_MERGE_COMMIT_MESSAGE);
    assert_eq!(merge.author_id, alice);

    assert_eq!(db.get_branch(main)?.unwrap().head_commit_id, Some(4));
    assert_eq!(db.get_branch(feature)?.unwrap().head_commit_id, Some(4));
    assert_eq!(commits.get_files_by_branch(feature)?[0].content, "C+B");

    // 5. Both branches now agree
    assert_eq!(
        merges.perform_strict_merge(main, feature)?,
        MergeOutcome::UpToDate { commit_id: 4 }
    );
    let diff = RepositoryInsights::new(db.clone()).branch_diff(main, feature)?.unwrap();
    assert!(!diff.has_conflicts);

    // 6. Graph shows the merge with its dashed second-parent edge
    let view = GraphSerializer::new(db.clone()).build_graph(repo)?;
    assert_eq!(view.nodes.len(), 6);
    assert_eq!(view.edges_of(EdgeKind::Parent).count(), 3);
    assert_eq!(view.edges_of(EdgeKind::SecondParent).count(), 1);
    assert_eq!(view.edges_of(EdgeKind::BranchHead).count(), 2);

    // 7. Everything survives a reopen
    drop(db);
    let reopened = Database::from_config(root.path(), &config.database)?;
    let oracle = AncestryOracle::new(reopened.clone());
    assert!(oracle.is_ancestor(c1, 4)?);
    assert!(oracle.is_ancestor(c3, 4)?);
    assert!(!oracle.is_ancestor(c2, 4)?);

    let stats = RepositoryInsights::new(reopened).repository_stats(repo)?;
    assert_eq!(stats.commit_count, 4);
    assert_eq!(stats.branch_count, 2);
    assert_eq!(stats.file_count, 1);

    Ok(())
}

#[test]
fn test_fast_forward_flow() -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::in_memory()?;
    let alice = db.create_user("alice")?;
    let repo = db.create_repository("notes", alice)?;
    let main = db.create_branch("main", repo, None)?;

    let commits = CommitGraph::new(db.clone());
    commits.create_commit(main, alice, "first", "A")?;
    let feature = db.create_branch("feature", repo, Some(main))?;
    let tip = commits.create_commit(feature, alice, "more", "A\nB")?;

    let outcome = MergeEngine::new(db.clone()).perform_strict_merge(main, feature)?;
    assert!(matches!(outcome, MergeOutcome::FastForward { branch_id, to, .. } if branch_id == main && to == tip));
    assert_eq!(commits.get_commits(None)?.len(), 2);
    assert_eq!(db.get_branch(main)?.unwrap().head_commit_id, Some(tip));

    Ok(())
}

#[test]
fn test_concurrent_commits_keep_a_linear_chain() -> Result<(), Box<dyn std::error::Error>> {
    const WRITERS: usize = 4;
    const COMMITS_EACH: usize = 10;

    let root = tempfile::tempdir()?;
    let db = Database::new(&root.path().join("minigit.db"))?;
    let alice = db.create_user("alice")?;
    let repo = db.create_repository("notes", alice)?;
    let main = db.create_branch("main", repo, None)?;

    let handles: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let commits = CommitGraph::new(db.clone());
            thread::spawn(move || {
                for i in 0..COMMITS_EACH {
                    commits
                        .create_commit(main, alice, &format!("writer {} #{}", writer, i), &i.to_string())
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("writer panicked");
    }

    // Every commit must sit on the head's first-parent chain: no lost updates
    let history = CommitGraph::new(db.clone()).get_commits(Some(repo))?;
    assert_eq!(history.len(), WRITERS * COMMITS_EACH);
    assert_eq!(db.get_branch(main)?.unwrap().head_commit_id, Some(history[0].id));
    for pair in history.windows(2) {
        assert_eq!(pair[0].parent_id, Some(pair[1].id));
    }
    assert!(history.last().unwrap().is_root());

    Ok(())
}
