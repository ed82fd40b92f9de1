//! AIRI session memory.
//!
//! Bounded per-session conversation history with two interchangeable
//! backends: a process-local map and a WAL-mode SQLite store whose entries
//! expire a fixed time after their last write.

pub mod db;
pub mod error;
pub mod migrations;
pub mod service;
pub mod store;

pub use db::Database;
pub use error::{MemoryError, Result};
pub use service::{SessionMemory, KEY_PREFIX};
pub use store::{InProcessStore, SqliteStore, TurnStore};
