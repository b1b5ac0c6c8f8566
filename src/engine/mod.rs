// minigit Engine - Core module structure
pub mod cli;
pub mod config;
pub mod database;
pub mod vcs;

pub use config::Config;
pub use database::Database;
