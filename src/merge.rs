//! Merge engine: folds candidate records into persisted startups.
//!
//! Identity is the startup name. With [`IdentityMode::Exact`] the lookup
//! is case- and whitespace-sensitive, so `"Acme"` and `" acme "` are two
//! entities. [`IdentityMode::Normalized`] canonicalizes names before both
//! lookup and storage.
//!
//! Each record is merged in its own transaction. A batch that fails
//! partway keeps every record merged before the failure; nothing after it
//! is attempted. Merges within one engine are serialized by an async
//! mutex; across processes the store's own locking applies.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::IdentityMode;
use crate::error::{MergeError, StoreError};
use crate::models::{Startup, StartupRecord};
use crate::normalize::{canonical_name, normalize_unknown};
use crate::store::Store;

pub struct MergeEngine {
    store: Arc<dyn Store>,
    identity: IdentityMode,
    lock: Mutex<()>,
}

impl MergeEngine {
    pub fn new(store: Arc<dyn Store>, identity: IdentityMode) -> Self {
        Self {
            store,
            identity,
            lock: Mutex::new(()),
        }
    }

    /// Merges `records` in order and returns the resulting startups in the
    /// same order.
    ///
    /// # Errors
    ///
    /// Stops at the first storage failure. The returned [`MergeError`]
    /// reports how many records were committed before it.
    pub async fn merge(&self, records: &[StartupRecord]) -> Result<Vec<Startup>, MergeError> {
        let mut merged = Vec::with_capacity(records.len());
        for record in records {
            match self.merge_one(record).await {
                Ok(startup) => merged.push(startup),
                Err(source) => {
                    return Err(MergeError {
                        committed: merged.len(),
                        name: record.name.clone(),
                        source,
                    })
                }
            }
        }
        Ok(merged)
    }

    /// Creates or updates the startup named by `record` and returns its
    /// state as read back from the store.
    ///
    /// Present fields overwrite stored ones; absent fields never do. An
    /// absent investor becomes the unknown sentinel.
    pub async fn merge_one(&self, record: &StartupRecord) -> Result<Startup, StoreError> {
        let candidate = self.prepare(record);

        let _guard = self.lock.lock().await;
        let mut tx = self.store.begin().await?;

        let id = match tx.find_by_name(&candidate.name).await? {
            Some(mut existing) => {
                candidate.overlay_onto(&mut existing.fields);
                existing.updated_at = next_timestamp(Some(existing.updated_at));
                tx.update(&existing).await?;
                debug!(id = existing.id, name = %candidate.name, "updated startup");
                existing.id
            }
            None => {
                let id = tx.insert(&candidate, next_timestamp(None)).await?;
                debug!(id, name = %candidate.name, "created startup");
                id
            }
        };

        let merged = tx
            .get(id)
            .await?
            .ok_or_else(|| StoreError::Corrupt(format!("startup {} missing after write", id)))?;
        tx.commit().await?;
        Ok(merged)
    }

    fn prepare(&self, record: &StartupRecord) -> StartupRecord {
        let mut candidate = record.clone();
        candidate.investor_name = Some(normalize_unknown(record.investor_name.as_deref()));
        if self.identity == IdentityMode::Normalized {
            candidate.name = canonical_name(&record.name);
        }
        candidate
    }
}

/// Current time at millisecond precision, strictly after `previous`.
fn next_timestamp(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now().trunc_subsecs(3);
    match previous {
        Some(prev) if now <= prev => prev + Duration::milliseconds(1),
        _ => now,
    }
}
