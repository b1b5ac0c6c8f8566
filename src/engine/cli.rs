//! minigit CLI Module
//! Command-line interface for commit graph operations

pub mod formatter;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::engine::vcs::model::{BranchId, CommitId, RepositoryId, UserId};

#[derive(Parser, Debug)]
#[command(name = "minigit")]
#[command(author = "minigit Team")]
#[command(version)]
#[command(about = "SQLite-backed commit graph and merge engine", long_about = None)]
pub struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Database file to use instead of the project's configured one
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Output format (json for scripting)
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a minigit project in the project directory
    Init {
        /// Project name
        #[arg(short, long)]
        name: String,
    },

    /// User management
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Repository management
    Repo {
        #[command(subcommand)]
        action: RepoAction,
    },

    /// Branch management
    Branch {
        #[command(subcommand)]
        action: BranchAction,
    },

    /// Record new content on a branch
    Commit {
        /// Branch to commit on
        #[arg(short, long)]
        branch: BranchId,

        /// Author user id
        #[arg(short, long)]
        author: UserId,

        /// Commit message
        #[arg(short, long)]
        message: String,

        /// Full content of the tracked file
        #[arg(short, long, group = "source")]
        content: Option<String>,

        /// Read the content from a file
        #[arg(long, group = "source")]
        file: Option<PathBuf>,
    },

    /// List commits, newest first
    Log {
        /// Restrict to one repository
        #[arg(short, long)]
        repo: Option<RepositoryId>,
    },

    /// Show the files at a branch head
    Show {
        branch: BranchId,
    },

    /// Check whether one commit is a first-parent ancestor of another
    Ancestor {
        candidate: CommitId,
        descendant: CommitId,
    },

    /// Merge two branches (identical content or fast-forward only)
    Merge {
        branch_1: BranchId,
        branch_2: BranchId,
    },

    /// Merge two branches with caller-resolved content
    ForceMerge {
        branch_1: BranchId,
        branch_2: BranchId,

        /// Resolved content for the merge commit
        #[arg(short, long)]
        content: String,
    },

    /// Print the commit graph of a repository as JSON
    Graph {
        repo: RepositoryId,
    },

    /// Show repository statistics
    Stats {
        repo: RepositoryId,
    },

    /// Compare the heads of two branches by line count
    Diff {
        branch_1: BranchId,
        branch_2: BranchId,
    },
}

#[derive(Subcommand, Debug)]
pub enum UserAction {
    /// Register a user
    Add {
        username: String,
    },

    /// List all users
    List,
}

#[derive(Subcommand, Debug)]
pub enum RepoAction {
    /// Create a repository
    Create {
        /// Repository name
        name: String,

        /// Owner user id
        #[arg(short, long)]
        owner: UserId,
    },

    /// List repositories
    List {
        /// Only repositories owned by this user
        #[arg(short, long)]
        owner: Option<UserId>,
    },
}

#[derive(Subcommand, Debug)]
pub enum BranchAction {
    /// Create a branch (empty, or starting at another branch's head)
    Create {
        /// Repository id
        #[arg(short, long)]
        repo: RepositoryId,

        /// Branch name
        name: String,

        /// Start at this branch's head
        #[arg(long)]
        from: Option<BranchId>,
    },

    /// List branches
    List {
        /// Only branches of this repository
        #[arg(short, long)]
        repo: Option<RepositoryId>,
    },
}

impl Cli {
    pub fn get_project_dir(&self) -> PathBuf {
        self.project
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
}
