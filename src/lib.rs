//! minigit - SQLite-backed commit graph and merge engine
//!
//! Library half of the `minigit` CLI. Everything lives under [`engine`].

pub mod engine;
