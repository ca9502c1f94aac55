//! PostgreSQL store
//!
//! Bulk writes use multi-row `INSERT` statements built with
//! `QueryBuilder::push_values`, chunked by the configured batch size.
//! Prices are `NUMERIC` columns mapped to `Decimal`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};
use std::collections::HashMap;
use tracing::{debug, info};

use series_common::data::{DailyReturn, Sample};
use series_common::error::DatabaseError;

use super::{SeriesStore, SeriesTransaction, StoreError, StoreResult, UnitStats};
use crate::config::{DatabaseSettings, MAX_BATCH_INSERT_SIZE};

const SAMPLE_SELECT: &str = "SELECT id, unit, datetime, opening, closing, interpolated FROM entries";
const RETURN_SELECT: &str = "SELECT id, date, opening, closing, unit FROM rolling_returns";

/// Postgres-backed series store
#[derive(Clone)]
pub struct PgSeriesStore {
    pool: PgPool,
    batch_size: usize,
}

impl PgSeriesStore {
    /// Create a new store with the given connection pool
    pub fn new(pool: PgPool, batch_size: usize) -> Self {
        Self {
            pool,
            batch_size: batch_size.clamp(1, MAX_BATCH_INSERT_SIZE),
        }
    }

    /// Connect using database settings
    pub async fn from_settings(settings: &DatabaseSettings) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .acquire_timeout(settings.acquire_timeout())
            .connect(&settings.url)
            .await
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;

        Ok(Self::new(pool, settings.batch_insert_size))
    }

    /// Get the database pool reference
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the tables and indexes if they do not exist
    pub async fn run_migrations(&self) -> StoreResult<()> {
        info!("Running series migrations...");

        for statement in MIGRATION_SQL.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        info!("Series migrations complete");
        Ok(())
    }
}

#[async_trait]
impl SeriesStore for PgSeriesStore {
    async fn begin(&self) -> StoreResult<Box<dyn SeriesTransaction>> {
        let tx = self.pool.begin().await.map_err(DatabaseError::transaction)?;
        Ok(Box::new(PgSeriesTransaction {
            tx,
            batch_size: self.batch_size,
        }))
    }

    async fn recent_samples(&self, unit: &str, limit: usize) -> StoreResult<Vec<Sample>> {
        let rows = sqlx::query(&format!(
            "{} WHERE unit = $1 ORDER BY datetime DESC LIMIT $2",
            SAMPLE_SELECT
        ))
        .bind(unit)
        .bind(to_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(sample_from_row).collect()
    }

    async fn recent_returns(&self, unit: &str, limit: usize) -> StoreResult<Vec<DailyReturn>> {
        let rows = sqlx::query(&format!(
            "{} WHERE unit = $1 ORDER BY date DESC LIMIT $2",
            RETURN_SELECT
        ))
        .bind(unit)
        .bind(to_limit(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(return_from_row).collect()
    }

    async fn units(&self) -> StoreResult<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT unit FROM entries ORDER BY unit")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get("unit").map_err(StoreError::from))
            .collect()
    }

    async fn stats(&self) -> StoreResult<Vec<UnitStats>> {
        let rows = sqlx::query(
            r#"
            SELECT
                e.unit,
                COUNT(*) AS entries,
                COUNT(*) FILTER (WHERE e.interpolated) AS interpolated,
                MIN(e.datetime) AS earliest,
                MAX(e.datetime) AS latest,
                (SELECT COUNT(*) FROM rolling_returns r WHERE r.unit = e.unit) AS returns
            FROM entries e
            GROUP BY e.unit
            ORDER BY e.unit
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> StoreResult<UnitStats> {
                Ok(UnitStats {
                    unit: row.try_get("unit")?,
                    entries: to_count(row.try_get("entries")?)?,
                    interpolated: to_count(row.try_get("interpolated")?)?,
                    returns: to_count(row.try_get("returns")?)?,
                    earliest: row.try_get("earliest")?,
                    latest: row.try_get("latest")?,
                })
            })
            .collect()
    }
}

/// Open transaction on a pooled connection
pub struct PgSeriesTransaction {
    tx: Transaction<'static, Postgres>,
    batch_size: usize,
}

impl PgSeriesTransaction {
    async fn insert_sample_batch(&mut self, samples: &[Sample]) -> StoreResult<usize> {
        let mut query_builder = sample_insert(samples);
        let result = query_builder
            .build()
            .execute(&mut *self.tx)
            .await
            .map_err(DatabaseError::write)?;
        Ok(result.rows_affected() as usize)
    }

    async fn insert_return_batch(&mut self, returns: &[DailyReturn]) -> StoreResult<usize> {
        let mut query_builder = return_insert(returns);
        let result = query_builder
            .build()
            .execute(&mut *self.tx)
            .await
            .map_err(DatabaseError::write)?;
        Ok(result.rows_affected() as usize)
    }
}

#[async_trait]
impl SeriesTransaction for PgSeriesTransaction {
    async fn latest_sample_times(&mut self) -> StoreResult<HashMap<String, DateTime<Utc>>> {
        let rows = sqlx::query("SELECT unit, MAX(datetime) AS latest FROM entries GROUP BY unit")
            .fetch_all(&mut *self.tx)
            .await?;

        rows.iter()
            .map(|row| -> StoreResult<(String, DateTime<Utc>)> {
                Ok((row.try_get("unit")?, row.try_get("latest")?))
            })
            .collect()
    }

    async fn recent_real_samples(
        &mut self,
        unit: &str,
        limit: usize,
    ) -> StoreResult<Vec<Sample>> {
        let rows = sqlx::query(&format!(
            "{} WHERE unit = $1 AND interpolated = FALSE ORDER BY datetime DESC LIMIT $2",
            SAMPLE_SELECT
        ))
        .bind(unit)
        .bind(to_limit(limit))
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(sample_from_row).collect()
    }

    async fn insert_samples(&mut self, samples: &[Sample]) -> StoreResult<usize> {
        if samples.is_empty() {
            return Ok(0);
        }

        let mut total_inserted = 0;
        for chunk in samples.chunks(self.batch_size) {
            total_inserted += self.insert_sample_batch(chunk).await?;
        }

        debug!("Batch inserted {} entries", total_inserted);
        Ok(total_inserted)
    }

    async fn samples_in_window(
        &mut self,
        unit: &str,
        after: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> StoreResult<Vec<Sample>> {
        let rows = sqlx::query(&format!(
            "{} WHERE unit = $1 AND datetime > $2 AND datetime <= $3 ORDER BY datetime ASC",
            SAMPLE_SELECT
        ))
        .bind(unit)
        .bind(after)
        .bind(until)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(sample_from_row).collect()
    }

    async fn insert_returns(&mut self, returns: &[DailyReturn]) -> StoreResult<usize> {
        if returns.is_empty() {
            return Ok(0);
        }

        let mut total_inserted = 0;
        for chunk in returns.chunks(self.batch_size) {
            total_inserted += self.insert_return_batch(chunk).await?;
        }

        debug!("Batch inserted {} rolling returns", total_inserted);
        Ok(total_inserted)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await.map_err(DatabaseError::transaction)?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await.map_err(DatabaseError::transaction)?;
        Ok(())
    }
}

/// Multi-row insert for a chunk of entries
fn sample_insert(samples: &[Sample]) -> QueryBuilder<'_, Postgres> {
    let mut query_builder =
        QueryBuilder::new("INSERT INTO entries (unit, datetime, opening, closing, interpolated) ");

    query_builder.push_values(samples, |mut b, sample| {
        b.push_bind(&sample.unit)
            .push_bind(sample.datetime)
            .push_bind(sample.opening)
            .push_bind(sample.closing)
            .push_bind(sample.interpolated);
    });

    query_builder
}

/// Multi-row insert for a chunk of rolling returns
fn return_insert(returns: &[DailyReturn]) -> QueryBuilder<'_, Postgres> {
    let mut query_builder =
        QueryBuilder::new("INSERT INTO rolling_returns (date, opening, closing, unit) ");

    query_builder.push_values(returns, |mut b, ret| {
        b.push_bind(ret.date)
            .push_bind(ret.opening)
            .push_bind(ret.closing)
            .push_bind(&ret.unit);
    });

    query_builder
}

fn to_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn to_count(value: i64) -> StoreResult<u64> {
    u64::try_from(value).map_err(|_| StoreError::InvalidData(format!("negative count {}", value)))
}

fn sample_from_row(row: &PgRow) -> StoreResult<Sample> {
    Ok(Sample {
        id: row.try_get("id")?,
        unit: row.try_get("unit")?,
        datetime: row.try_get("datetime")?,
        opening: row.try_get("opening")?,
        closing: row.try_get("closing")?,
        interpolated: row.try_get("interpolated")?,
    })
}

fn return_from_row(row: &PgRow) -> StoreResult<DailyReturn> {
    Ok(DailyReturn {
        id: row.try_get("id")?,
        date: row.try_get("date")?,
        opening: row.try_get("opening")?,
        closing: row.try_get("closing")?,
        unit: row.try_get("unit")?,
    })
}

/// Schema for the series tables
pub const MIGRATION_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    id BIGSERIAL PRIMARY KEY,
    unit VARCHAR(32) NOT NULL,
    datetime TIMESTAMPTZ NOT NULL,
    opening NUMERIC(24, 2) NOT NULL,
    closing NUMERIC(24, 2) NOT NULL,
    interpolated BOOLEAN NOT NULL DEFAULT FALSE,
    CONSTRAINT entries_unit_datetime_key UNIQUE (unit, datetime)
);

CREATE INDEX IF NOT EXISTS idx_entries_real
    ON entries (unit, datetime DESC) WHERE interpolated = FALSE;

CREATE TABLE IF NOT EXISTS rolling_returns (
    id BIGSERIAL PRIMARY KEY,
    date DATE NOT NULL,
    opening NUMERIC(24, 6) NOT NULL,
    closing NUMERIC(24, 6) NOT NULL,
    unit VARCHAR(32) NOT NULL,
    CONSTRAINT rolling_returns_date_unit_key UNIQUE (date, unit)
);

CREATE INDEX IF NOT EXISTS idx_rolling_returns_unit_date
    ON rolling_returns (unit, date DESC);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal_macros::dec;

    fn sample(hour: u32) -> Sample {
        Sample {
            id: None,
            unit: "BTCUSDT".to_string(),
            datetime: Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
            opening: dec!(42000.50),
            closing: dec!(42010.25),
            interpolated: false,
        }
    }

    #[test]
    fn test_sample_insert_binds_every_row() {
        let samples = vec![sample(0), sample(1)];
        let query_builder = sample_insert(&samples);
        assert_eq!(
            query_builder.sql(),
            "INSERT INTO entries (unit, datetime, opening, closing, interpolated) \
             VALUES ($1, $2, $3, $4, $5), ($6, $7, $8, $9, $10)"
        );
    }

    #[test]
    fn test_return_insert_binds_every_row() {
        let returns = vec![DailyReturn {
            id: None,
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            opening: dec!(0.001234),
            closing: dec!(-0.000456),
            unit: "ETHUSDT".to_string(),
        }];
        let query_builder = return_insert(&returns);
        assert_eq!(
            query_builder.sql(),
            "INSERT INTO rolling_returns (date, opening, closing, unit) VALUES ($1, $2, $3, $4)"
        );
    }

    #[test]
    fn test_migration_sql_has_unique_keys() {
        assert!(MIGRATION_SQL.contains("UNIQUE (unit, datetime)"));
        assert!(MIGRATION_SQL.contains("UNIQUE (date, unit)"));
        assert_eq!(
            MIGRATION_SQL
                .split(';')
                .filter(|s| !s.trim().is_empty())
                .count(),
            4
        );
    }

    #[test]
    fn test_count_and_limit_conversion() {
        assert_eq!(to_count(5).unwrap(), 5);
        assert!(to_count(-1).is_err());
        assert_eq!(to_limit(24), 24);
    }
}
