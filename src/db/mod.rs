//! Database module for SQLite operations.
//!
//! This module provides:
//! - Database initialization and schema
//! - SQLite pragma configuration
//! - Repository layer for the transaction ledger and portfolio snapshots
//! - The `SnapshotStore` abstraction and an in-memory implementation

pub mod migrations;
pub mod repo;
pub mod snapshot_store;

pub use migrations::init_db;
pub use repo::Repository;
pub use snapshot_store::{MemorySnapshotStore, SnapshotError, SnapshotInfo, SnapshotStore};
