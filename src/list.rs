//! `radar list`: paginated dump of stored startups as JSON lines.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::db;
use crate::models::Startup;
use crate::store::{SqliteStore, Store};

/// Reads one page of startups ordered by id.
pub async fn list_startups(config: &Config, skip: i64, limit: i64) -> Result<Vec<Startup>> {
    if skip < 0 || limit < 0 {
        bail!("skip and limit must not be negative");
    }
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let page = store.list(skip, limit).await?;
    pool.close().await;
    Ok(page)
}

pub async fn run_list(config: &Config, skip: i64, limit: Option<i64>) -> Result<()> {
    let limit = limit.unwrap_or(config.server.page_limit);
    for startup in list_startups(config, skip, limit).await? {
        println!("{}", serde_json::to_string(&startup)?);
    }
    Ok(())
}
