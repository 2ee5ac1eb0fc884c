//! Storage abstraction for persisted startups.
//!
//! The [`Store`] trait is the seam between the merge engine and the
//! storage collaborator. Writes go through a [`StoreTx`] so every merged
//! record gets its own transaction: committing makes it durable, dropping
//! the transaction without committing rolls it back.
//!
//! | Backend | Module | Use |
//! |---------|--------|-----|
//! | SQLite | [`sqlite`] | CLI and HTTP server |
//! | In-memory | [`memory`] | tests |
//!
//! The `name` column is a lookup key, not a uniqueness constraint: a lookup
//! returns the oldest row carrying that exact name.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::{Startup, StartupRecord};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a write transaction.
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<Startup>, StoreError>;

    /// Returns up to `limit` startups ordered by id, skipping the first `skip`.
    async fn list(&self, skip: i64, limit: i64) -> Result<Vec<Startup>, StoreError>;
}

/// One open write transaction.
#[async_trait]
pub trait StoreTx: Send {
    /// Finds the oldest startup whose name equals `name` exactly.
    async fn find_by_name(&mut self, name: &str) -> Result<Option<Startup>, StoreError>;

    /// Inserts a new startup and returns its id.
    async fn insert(
        &mut self,
        fields: &StartupRecord,
        updated_at: DateTime<Utc>,
    ) -> Result<i64, StoreError>;

    /// Overwrites every column of the row identified by `startup.id`.
    async fn update(&mut self, startup: &Startup) -> Result<(), StoreError>;

    /// Reads a row as seen inside this transaction.
    async fn get(&mut self, id: i64) -> Result<Option<Startup>, StoreError>;

    /// Makes the transaction's writes durable. Further calls fail.
    async fn commit(&mut self) -> Result<(), StoreError>;
}
