//! Commit Graph Visualization
//!
//! Projects a repository's commits and branch heads into the node/edge
//! layout consumed by vis-network style renderers.

use rusqlite::{params, Connection};
use serde::{Serialize, Serializer};
use std::fmt;

use crate::engine::database::Database;
use crate::engine::vcs::error::{Entity, Result, VcsError};
use crate::engine::vcs::model::{Branch, BranchId, Commit, CommitId, Repository, RepositoryId};

const MERGE_EDGE_COLOR: &str = "#ff6b6b";
const BRANCH_COLOR: &str = "#4ecdc4";

/// Commit nodes serialize as their numeric id, branch nodes as `"branch-<id>"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    Commit(CommitId),
    Branch(BranchId),
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Commit(id) => write!(f, "{}", id),
            NodeId::Branch(id) => write!(f, "branch-{}", id),
        }
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            NodeId::Commit(id) => serializer.serialize_i64(*id),
            NodeId::Branch(_) => serializer.collect_str(self),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeShape {
    Dot,
    Ellipse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub label: String,
    pub shape: NodeShape,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<&'static str>,
}

/// What an edge means. Only the rendering hints differ between a first and
/// a second parent; both are full parent links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Parent,
    SecondParent,
    BranchHead,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub from: NodeId,
    pub to: NodeId,
    #[serde(skip)]
    pub kind: EdgeKind,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub dashes: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl GraphEdge {
    fn parent(parent: CommitId, child: CommitId) -> Self {
        Self {
            from: NodeId::Commit(parent),
            to: NodeId::Commit(child),
            kind: EdgeKind::Parent,
            dashes: false,
            color: None,
            label: None,
        }
    }

    fn second_parent(parent: CommitId, child: CommitId) -> Self {
        Self {
            kind: EdgeKind::SecondParent,
            dashes: true,
            color: Some(MERGE_EDGE_COLOR),
            ..Self::parent(parent, child)
        }
    }

    fn branch_head(branch: &Branch, head: CommitId) -> Self {
        Self {
            from: NodeId::Branch(branch.id),
            to: NodeId::Commit(head),
            kind: EdgeKind::BranchHead,
            dashes: false,
            color: Some(BRANCH_COLOR),
            label: Some(branch.name.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitGraphView {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl CommitGraphView {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn edges_of(&self, kind: EdgeKind) -> impl Iterator<Item = &GraphEdge> {
        self.edges.iter().filter(move |edge| edge.kind == kind)
    }
}

#[derive(Clone)]
pub struct GraphSerializer {
    db: Database,
}

impl GraphSerializer {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn build_graph(&self, repository_id: RepositoryId) -> Result<CommitGraphView> {
        self.db.read(|tx| {
            if Repository::load(tx, repository_id)?.is_none() {
                return Err(VcsError::NotFound(Entity::Repository, repository_id));
            }

            let mut view = CommitGraphView::default();

            for commit in commits_in_creation_order(tx, repository_id)? {
                view.nodes.push(GraphNode {
                    id: NodeId::Commit(commit.id),
                    label: commit.message.clone(),
                    shape: NodeShape::Dot,
                    color: None,
                });
                if let Some(parent) = commit.parent_id {
                    view.edges.push(GraphEdge::parent(parent, commit.id));
                }
                if let Some(parent) = commit.parent_id_2 {
                    view.edges.push(GraphEdge::second_parent(parent, commit.id));
                }
            }

            for branch in branches_with_head(tx, repository_id)? {
                let Some(head) = branch.head_commit_id else {
                    continue;
                };
                view.nodes.push(GraphNode {
                    id: NodeId::Branch(branch.id),
                    label: branch.name.clone(),
                    shape: NodeShape::Ellipse,
                    color: Some(BRANCH_COLOR),
                });
                view.edges.push(GraphEdge::branch_head(&branch, head));
            }

            Ok(view)
        })
    }
}

fn commits_in_creation_order(conn: &Connection, repository_id: RepositoryId) -> Result<Vec<Commit>> {
    let mut stmt = conn.prepare(
        "SELECT id, repository_id, author_id, message, parent_commit_id, parent_commit_id_2, created_at
         FROM git_commit WHERE repository_id = ?1 ORDER BY id",
    )?;
    let commits = stmt
        .query_map(params![repository_id], Commit::from_row)?
        .collect::<std::result::Result<Vec<Commit>, _>>()?;
    Ok(commits)
}

fn branches_with_head(conn: &Connection, repository_id: RepositoryId) -> Result<Vec<Branch>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, repository_id, head_commit_id FROM branch
         WHERE repository_id = ?1 AND head_commit_id IS NOT NULL ORDER BY id",
    )?;
    let branches = stmt
        .query_map(params![repository_id], Branch::from_row)?
        .collect::<std::result::Result<Vec<Branch>, _>>()?;
    Ok(branches)
}
