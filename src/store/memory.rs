//! In-memory [`Store`] implementation for tests.
//!
//! A transaction holds the store's mutex for its whole lifetime and stages
//! writes on a copy of the rows, so transactions are serialized and a
//! dropped transaction leaves no trace.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::StoreError;
use crate::models::{Startup, StartupRecord};

use super::{Store, StoreTx};

#[derive(Debug, Clone, Default)]
struct State {
    rows: Vec<Startup>,
    next_id: i64,
}

/// In-memory store; rows live in insertion order.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every committed row, in id order.
    pub async fn all(&self) -> Vec<Startup> {
        self.state.lock().await.rows.clone()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let guard = self.state.clone().lock_owned().await;
        let staged = (*guard).clone();
        Ok(Box::new(MemoryTx {
            guard: Some(guard),
            staged,
        }))
    }

    async fn get(&self, id: i64) -> Result<Option<Startup>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.rows.iter().find(|s| s.id == id).cloned())
    }

    async fn list(&self, skip: i64, limit: i64) -> Result<Vec<Startup>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .rows
            .iter()
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

struct MemoryTx {
    guard: Option<OwnedMutexGuard<State>>,
    staged: State,
}

impl MemoryTx {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.guard.is_none() {
            return Err(StoreError::Corrupt("transaction already committed".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn find_by_name(&mut self, name: &str) -> Result<Option<Startup>, StoreError> {
        self.ensure_open()?;
        Ok(self
            .staged
            .rows
            .iter()
            .find(|s| s.fields.name == name)
            .cloned())
    }

    async fn insert(
        &mut self,
        fields: &StartupRecord,
        updated_at: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        self.ensure_open()?;
        self.staged.next_id += 1;
        let id = self.staged.next_id;
        self.staged.rows.push(Startup {
            id,
            fields: fields.clone(),
            updated_at,
        });
        Ok(id)
    }

    async fn update(&mut self, startup: &Startup) -> Result<(), StoreError> {
        self.ensure_open()?;
        let row = self
            .staged
            .rows
            .iter_mut()
            .find(|s| s.id == startup.id)
            .ok_or_else(|| StoreError::Corrupt(format!("no startup with id {}", startup.id)))?;
        *row = startup.clone();
        Ok(())
    }

    async fn get(&mut self, id: i64) -> Result<Option<Startup>, StoreError> {
        self.ensure_open()?;
        Ok(self.staged.rows.iter().find(|s| s.id == id).cloned())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let mut guard = self
            .guard
            .take()
            .ok_or_else(|| StoreError::Corrupt("transaction already committed".into()))?;
        *guard = std::mem::take(&mut self.staged);
        Ok(())
    }
}
