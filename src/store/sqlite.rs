//! SQLite-backed [`Store`] implementation.
//!
//! Dates are stored as `YYYY-MM-DD` text and `updated_at` as Unix
//! milliseconds.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{Sqlite, SqliteRow};
use sqlx::{Row, SqlitePool, Transaction};

use crate::error::StoreError;
use crate::models::{Startup, StartupRecord};

use super::{Store, StoreTx};

const SELECT_COLUMNS: &str = "SELECT id, name, website, sector, founding_year, investment_amount, \
     round_label, investment_date, investor_name, short_description, founder_contact, location, \
     updated_at FROM startups";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite implementation of the [`Store`] trait.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_startup(row: &SqliteRow) -> Result<Startup, StoreError> {
    let investment_date: Option<String> = row.try_get("investment_date")?;
    let investment_date = investment_date
        .map(|d| {
            NaiveDate::parse_from_str(&d, DATE_FORMAT)
                .map_err(|e| StoreError::Corrupt(format!("investment_date '{}': {}", d, e)))
        })
        .transpose()?;

    let updated_ms: i64 = row.try_get("updated_at")?;
    let updated_at = DateTime::from_timestamp_millis(updated_ms)
        .ok_or_else(|| StoreError::Corrupt(format!("updated_at out of range: {}", updated_ms)))?;

    Ok(Startup {
        id: row.try_get("id")?,
        fields: StartupRecord {
            name: row.try_get("name")?,
            website: row.try_get("website")?,
            sector: row.try_get("sector")?,
            founding_year: row.try_get("founding_year")?,
            investment_amount: row.try_get("investment_amount")?,
            round_label: row.try_get("round_label")?,
            investment_date,
            investor_name: row.try_get("investor_name")?,
            short_description: row.try_get("short_description")?,
            founder_contact: row.try_get("founder_contact")?,
            location: row.try_get("location")?,
        },
        updated_at,
    })
}

fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
}

#[async_trait]
impl Store for SqliteStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteTx { tx: Some(tx) }))
    }

    async fn get(&self, id: i64) -> Result<Option<Startup>, StoreError> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_startup).transpose()
    }

    async fn list(&self, skip: i64, limit: i64) -> Result<Vec<Startup>, StoreError> {
        let rows = sqlx::query(&format!("{} ORDER BY id LIMIT ? OFFSET ?", SELECT_COLUMNS))
            .bind(limit.max(0))
            .bind(skip.max(0))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_startup).collect()
    }
}

/// A write transaction. Dropping it uncommitted rolls it back.
struct SqliteTx {
    tx: Option<Transaction<'static, Sqlite>>,
}

impl SqliteTx {
    fn open(&mut self) -> Result<&mut Transaction<'static, Sqlite>, StoreError> {
        self.tx
            .as_mut()
            .ok_or_else(|| StoreError::Corrupt("transaction already committed".into()))
    }
}

#[async_trait]
impl StoreTx for SqliteTx {
    async fn find_by_name(&mut self, name: &str) -> Result<Option<Startup>, StoreError> {
        let tx = self.open()?;
        let row = sqlx::query(&format!(
            "{} WHERE name = ? ORDER BY id LIMIT 1",
            SELECT_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&mut **tx)
        .await?;
        row.as_ref().map(row_to_startup).transpose()
    }

    async fn insert(
        &mut self,
        fields: &StartupRecord,
        updated_at: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let tx = self.open()?;
        let result = sqlx::query(
            r#"
            INSERT INTO startups (name, website, sector, founding_year, investment_amount,
                                  round_label, investment_date, investor_name,
                                  short_description, founder_contact, location, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&fields.name)
        .bind(&fields.website)
        .bind(&fields.sector)
        .bind(fields.founding_year)
        .bind(&fields.investment_amount)
        .bind(&fields.round_label)
        .bind(format_date(fields.investment_date))
        .bind(&fields.investor_name)
        .bind(&fields.short_description)
        .bind(&fields.founder_contact)
        .bind(&fields.location)
        .bind(updated_at.timestamp_millis())
        .execute(&mut **tx)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn update(&mut self, startup: &Startup) -> Result<(), StoreError> {
        let tx = self.open()?;
        let fields = &startup.fields;
        let result = sqlx::query(
            r#"
            UPDATE startups SET
                name = ?, website = ?, sector = ?, founding_year = ?, investment_amount = ?,
                round_label = ?, investment_date = ?, investor_name = ?, short_description = ?,
                founder_contact = ?, location = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&fields.name)
        .bind(&fields.website)
        .bind(&fields.sector)
        .bind(fields.founding_year)
        .bind(&fields.investment_amount)
        .bind(&fields.round_label)
        .bind(format_date(fields.investment_date))
        .bind(&fields.investor_name)
        .bind(&fields.short_description)
        .bind(&fields.founder_contact)
        .bind(&fields.location)
        .bind(startup.updated_at.timestamp_millis())
        .bind(startup.id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Corrupt(format!(
                "no startup with id {}",
                startup.id
            )));
        }
        Ok(())
    }

    async fn get(&mut self, id: i64) -> Result<Option<Startup>, StoreError> {
        let tx = self.open()?;
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;
        row.as_ref().map(row_to_startup).transpose()
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| StoreError::Corrupt("transaction already committed".into()))?;
        tx.commit().await?;
        Ok(())
    }
}
