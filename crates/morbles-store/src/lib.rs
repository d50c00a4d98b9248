//! # morbles-store
//!
//! Durable storage for the Morbles backend, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for levels, players,
//! credentials and per-player level status. Level status writes go through
//! the update-then-insert writer in [`level_status`].

pub mod database;
pub mod level_status;
pub mod levels;
pub mod migrations;
pub mod models;
pub mod players;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
