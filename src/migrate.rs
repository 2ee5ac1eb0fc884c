use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Creates the schema on an open pool. Safe to run repeatedly.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    // `name` is a lookup key, not UNIQUE.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS startups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            website TEXT,
            sector TEXT,
            founding_year INTEGER,
            investment_amount TEXT,
            round_label TEXT,
            investment_date TEXT,
            investor_name TEXT,
            short_description TEXT,
            founder_contact TEXT,
            location TEXT,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_startups_name ON startups(name)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_startups_updated_at ON startups(updated_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
