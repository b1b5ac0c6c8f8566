//! minigit CLI - Main entry point for CLI binary
//!
//! This binary provides the `minigit` tool for driving the commit graph
//! engine against a project's SQLite database.

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use minigit_lib::engine::{
    cli::formatter::{format_head, format_parents, format_timestamp, summarize, CliFormatter},
    cli::{BranchAction, Cli, Commands, OutputFormat, RepoAction, UserAction},
    config::{Config, ConfigError},
    database::Database,
    vcs::{
        AncestryOracle, CommitGraph, GraphSerializer, MergeEngine, MergeOutcome, RepositoryInsights,
    },
};
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run_cli(cli) {
        CliFormatter::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> anyhow::Result<()> {
    let project_dir = cli.get_project_dir();
    let json_output = cli.format == OutputFormat::Json;

    let config = match Config::load(&project_dir) {
        Ok(config) => Some(config),
        Err(ConfigError::NotFound(_)) => None,
        Err(e) => return Err(e).context("Failed to load project config"),
    };
    init_tracing(config.as_ref().map_or("warn", |c| c.logging.level.as_str()));

    if let Commands::Init { name } = &cli.command {
        return cmd_init(&project_dir, name, json_output);
    }

    let db = open_database(&project_dir, config.as_ref(), cli.db.as_deref())?;

    match cli.command {
        Commands::Init { .. } => unreachable!("handled above"),
        Commands::User { action } => cmd_user(action, &db, json_output)?,
        Commands::Repo { action } => cmd_repo(action, &db, json_output)?,
        Commands::Branch { action } => cmd_branch(action, &db, json_output)?,
        Commands::Commit {
            branch,
            author,
            message,
            content,
            file,
        } => {
            let content = match (content, file) {
                (Some(content), _) => content,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, None) => bail!("Provide the new content with --content or --file"),
            };
            cmd_commit(&db, branch, author, &message, &content, json_output)?;
        }
        Commands::Log { repo } => cmd_log(&db, repo, json_output)?,
        Commands::Show { branch } => cmd_show(&db, branch, json_output)?,
        Commands::Ancestor {
            candidate,
            descendant,
        } => cmd_ancestor(&db, candidate, descendant, json_output)?,
        Commands::Merge { branch_1, branch_2 } => {
            if !cmd_merge(&db, branch_1, branch_2, json_output)? {
                std::process::exit(2);
            }
        }
        Commands::ForceMerge {
            branch_1,
            branch_2,
            content,
        } => cmd_force_merge(&db, branch_1, branch_2, &content, json_output)?,
        Commands::Graph { repo } => {
            let view = GraphSerializer::new(db).build_graph(repo)?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Commands::Stats { repo } => cmd_stats(&db, repo, json_output)?,
        Commands::Diff { branch_1, branch_2 } => cmd_diff(&db, branch_1, branch_2, json_output)?,
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise the project's configured level.
/// Logs go to stderr so `--format json` output stays parseable.
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_database(project_dir: &Path, config: Option<&Config>, db_override: Option<&Path>) -> anyhow::Result<Database> {
    if let Some(path) = db_override {
        return Database::new(path).with_context(|| format!("Failed to open {}", path.display()));
    }

    let config = config.ok_or_else(|| {
        anyhow!(
            "No minigit project in {}. Run `minigit init` or pass --db",
            project_dir.display()
        )
    })?;
    Ok(Database::from_config(project_dir, &config.database)?)
}

fn cmd_init(project_dir: &Path, name: &str, json: bool) -> anyhow::Result<()> {
    if Config::load(project_dir).is_ok() {
        bail!("Project already initialized: {}", project_dir.display());
    }

    std::fs::create_dir_all(project_dir)?;
    let config = Config::default_for_project(name);
    config.save(project_dir)?;

    // Creates the database file and schema
    Database::from_config(project_dir, &config.database)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "success": true,
                "project_dir": project_dir.display().to_string(),
                "name": name
            })
        );
    } else {
        CliFormatter::success(&format!("Created minigit project: {}", name));
        CliFormatter::kv("Directory", &project_dir.display().to_string());
        CliFormatter::kv("Database", &config.database.path.display().to_string());
    }

    Ok(())
}

fn cmd_user(action: UserAction, db: &Database, json: bool) -> anyhow::Result<()> {
    match action {
        UserAction::Add { username } => {
            let id = db.create_user(&username)?;
            if json {
                println!("{}", serde_json::json!({ "id": id, "username": username }));
            } else {
                CliFormatter::success(&format!("Created user {} (#{})", username, id));
            }
        }
        UserAction::List => {
            let users = db.list_users()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&users)?);
            } else if users.is_empty() {
                CliFormatter::info("No users yet");
            } else {
                CliFormatter::header("Users");
                CliFormatter::table_header(&["ID", "Username"]);
                for user in &users {
                    CliFormatter::table_row(&[&user.id.to_string(), &user.username]);
                }
            }
        }
    }
    Ok(())
}

fn cmd_repo(action: RepoAction, db: &Database, json: bool) -> anyhow::Result<()> {
    match action {
        RepoAction::Create { name, owner } => {
            let id = db.create_repository(&name, owner)?;
            if json {
                println!("{}", serde_json::json!({ "id": id, "name": name, "owner_id": owner }));
            } else {
                CliFormatter::success(&format!("Created repository {} (#{})", name, id));
            }
        }
        RepoAction::List { owner } => {
            let repositories = db.list_repositories(owner)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&repositories)?);
            } else if repositories.is_empty() {
                CliFormatter::info("No repositories yet");
            } else {
                CliFormatter::header("Repositories");
                CliFormatter::table_header(&["ID", "Name", "Owner"]);
                for repo in &repositories {
                    CliFormatter::table_row(&[
                        &repo.id.to_string(),
                        &repo.name,
                        &repo.owner_id.to_string(),
                    ]);
                }
            }
        }
    }
    Ok(())
}

fn cmd_branch(action: BranchAction, db: &Database, json: bool) -> anyhow::Result<()> {
    match action {
        BranchAction::Create { repo, name, from } => {
            let id = db.create_branch(&name, repo, from)?;
            let branch = db
                .get_branch(id)?
                .ok_or_else(|| anyhow!("Branch #{} vanished after creation", id))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&branch)?);
            } else {
                CliFormatter::success(&format!("Created branch {} (#{})", branch.name, branch.id));
                CliFormatter::kv("HEAD", &format_head(branch.head_commit_id));
            }
        }
        BranchAction::List { repo } => {
            let branches = db.list_branches(repo)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&branches)?);
            } else if branches.is_empty() {
                CliFormatter::info("No branches yet");
            } else {
                CliFormatter::header("Branches");
                CliFormatter::table_header(&["ID", "Repo", "Name", "HEAD"]);
                for branch in &branches {
                    CliFormatter::table_row(&[
                        &branch.id.to_string(),
                        &branch.repository_id.to_string(),
                        &branch.name,
                        &format_head(branch.head_commit_id),
                    ]);
                }
            }
        }
    }
    Ok(())
}

fn cmd_commit(db: &Database, branch: i64, author: i64, message: &str, content: &str, json: bool) -> anyhow::Result<()> {
    let commit_id = CommitGraph::new(db.clone()).create_commit(branch, author, message, content)?;

    if json {
        println!("{}", serde_json::json!({ "commit_id": commit_id, "branch_id": branch }));
    } else {
        CliFormatter::success(&format!("Committed #{} on branch #{}", commit_id, branch));
    }
    Ok(())
}

fn cmd_log(db: &Database, repo: Option<i64>, json: bool) -> anyhow::Result<()> {
    let commits = CommitGraph::new(db.clone()).get_commits(repo)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&commits)?);
        return Ok(());
    }
    if commits.is_empty() {
        CliFormatter::info("No commits yet");
        return Ok(());
    }

    CliFormatter::header("Commits");
    CliFormatter::table_header(&["ID", "Parents", "Author", "Date", "Message"]);
    for commit in &commits {
        CliFormatter::table_row(&[
            &format!("#{}", commit.id),
            &format_parents(commit.parent_id, commit.parent_id_2),
            &commit.author_id.to_string(),
            &format_timestamp(&commit.created_at),
            &summarize(&commit.message, 50),
        ]);
    }
    Ok(())
}

fn cmd_show(db: &Database, branch: i64, json: bool) -> anyhow::Result<()> {
    let files = CommitGraph::new(db.clone()).get_files_by_branch(branch)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&files)?);
    } else if files.is_empty() {
        CliFormatter::warning(&format!("Branch #{} has no commits yet", branch));
    } else {
        for file in &files {
            CliFormatter::header(&file.filename);
            CliFormatter::kv("Commit", &format!("#{}", file.commit_id));
            CliFormatter::content_block(&file.content);
        }
    }
    Ok(())
}

fn cmd_ancestor(db: &Database, candidate: i64, descendant: i64, json: bool) -> anyhow::Result<()> {
    let is_ancestor = AncestryOracle::new(db.clone()).is_ancestor(candidate, descendant)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "candidate": candidate,
                "descendant": descendant,
                "is_ancestor": is_ancestor
            })
        );
    } else if is_ancestor {
        CliFormatter::success(&format!("#{} is an ancestor of #{}", candidate, descendant));
    } else {
        CliFormatter::info(&format!("#{} is not a first-parent ancestor of #{}", candidate, descendant));
    }
    Ok(())
}

/// Returns false when the merge was refused
fn cmd_merge(db: &Database, branch_1: i64, branch_2: i64, json: bool) -> anyhow::Result<bool> {
    let outcome = MergeEngine::new(db.clone()).perform_strict_merge(branch_1, branch_2)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(outcome.is_success());
    }

    match &outcome {
        MergeOutcome::Merged { commit_id, .. } => {
            CliFormatter::success(&format!(
                "Merged branches #{} and #{} into commit #{}",
                branch_1, branch_2, commit_id
            ));
        }
        MergeOutcome::FastForward { branch_id, from, to } => {
            CliFormatter::success(&format!("Fast-forwarded branch #{} from #{} to #{}", branch_id, from, to));
        }
        MergeOutcome::UpToDate { commit_id } => {
            CliFormatter::info(&format!("Already up to date at #{}", commit_id));
        }
        MergeOutcome::Conflict(conflict) => {
            CliFormatter::warning(&format!("Merge refused: {}", conflict.reason));
            CliFormatter::header(&format!("Branch #{}", conflict.branch_id_1));
            CliFormatter::content_block(&conflict.content_1);
            CliFormatter::header(&format!("Branch #{}", conflict.branch_id_2));
            CliFormatter::content_block(&conflict.content_2);
            CliFormatter::info("Resolve the content and run `minigit force-merge`");
        }
    }
    Ok(outcome.is_success())
}

fn cmd_force_merge(db: &Database, branch_1: i64, branch_2: i64, content: &str, json: bool) -> anyhow::Result<()> {
    let merged = MergeEngine::new(db.clone()).perform_force_merge(branch_1, branch_2, content)?;
    if !merged {
        bail!(
            "Cannot force merge #{} and #{}: both branches must exist in the same repository and have a HEAD commit",
            branch_1,
            branch_2
        );
    }

    let head = db.get_branch(branch_1)?.and_then(|b| b.head_commit_id);
    if json {
        println!("{}", serde_json::json!({ "success": true, "commit_id": head }));
    } else {
        CliFormatter::success(&format!(
            "Force merged branches #{} and #{} into commit {}",
            branch_1,
            branch_2,
            format_head(head)
        ));
    }
    Ok(())
}

fn cmd_stats(db: &Database, repo: i64, json: bool) -> anyhow::Result<()> {
    let stats = RepositoryInsights::new(db.clone()).repository_stats(repo)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        CliFormatter::header(&format!("Repository #{}", repo));
        CliFormatter::kv("Commits", &stats.commit_count.to_string());
        CliFormatter::kv("Branches", &stats.branch_count.to_string());
        CliFormatter::kv("Files", &stats.file_count.to_string());
        CliFormatter::kv(
            "Last commit",
            &stats
                .last_commit_at
                .as_ref()
                .map_or_else(|| "never".to_string(), format_timestamp),
        );
    }
    Ok(())
}

fn cmd_diff(db: &Database, branch_1: i64, branch_2: i64, json: bool) -> anyhow::Result<()> {
    let diff = RepositoryInsights::new(db.clone()).branch_diff(branch_1, branch_2)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&diff)?);
        return Ok(());
    }

    match diff {
        None => CliFormatter::warning("Both branches need a HEAD commit to compare"),
        Some(diff) => {
            CliFormatter::header(&format!("Branch #{} → #{}", diff.branch_id_1, diff.branch_id_2));
            CliFormatter::kv("Additions", &format!("+{}", diff.additions));
            CliFormatter::kv("Deletions", &format!("-{}", diff.deletions));
            if diff.has_conflicts {
                CliFormatter::item("Contents differ");
            } else {
                CliFormatter::item("Contents identical");
            }
        }
    }
    Ok(())
}
