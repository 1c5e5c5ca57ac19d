//! Trend persistence
//!
//! Best-effort telemetry: per-hour/per-label aggregate buckets updated with an
//! incremental mean, so no raw samples are retained. Write failures are
//! retried exactly once, then logged and dropped. This is not a durability
//! guarantee and the ingestion pipeline never waits on it.

use chrono::{DateTime, Timelike, Utc};
use sentimux_common::types::{FusionResult, SentimentLabel};
use sentimux_common::{Error, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// One aggregate bucket keyed by (date, hour, label)
#[derive(Debug, Clone, PartialEq)]
pub struct TrendBucket {
    /// Calendar date, "YYYY-MM-DD" (UTC)
    pub date: String,
    /// Hour of day, 0-23
    pub hour: u32,
    pub label: SentimentLabel,
    pub count: i64,
    /// Running average confidence over the bucket's samples
    pub avg_confidence: f64,
}

/// Ordered buckets plus aggregates over a queried range
#[derive(Debug, Clone)]
pub struct TrendRange {
    /// Buckets ordered by (date, hour, label)
    pub buckets: Vec<TrendBucket>,
    /// Total sample count across buckets
    pub total_count: i64,
    /// Sample-weighted average confidence across buckets
    pub overall_avg_confidence: f64,
    /// (date, hour) with the highest sample count; ties go to the earliest hour
    pub peak_hour: Option<(String, u32)>,
}

/// SQLite-backed trend bucket store
pub struct TrendStore {
    pool: SqlitePool,
    dropped_writes: AtomicU64,
}

impl TrendStore {
    /// Open (creating if needed) the trend database at `path`
    pub async fn open(path: &Path) -> Result<Self> {
        let newly_created = !path.exists();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        if newly_created {
            info!("Initialized new trend database: {}", path.display());
        } else {
            info!("Opened existing trend database: {}", path.display());
        }

        // WAL for concurrent readers while the writer task runs
        sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
        sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

        Self::init_schema(&pool).await?;
        Ok(Self {
            pool,
            dropped_writes: AtomicU64::new(0),
        })
    }

    /// In-memory store for tests
    pub async fn open_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::init_schema(&pool).await?;
        Ok(Self {
            pool,
            dropped_writes: AtomicU64::new(0),
        })
    }

    async fn init_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS trend_buckets (
                date TEXT NOT NULL,
                hour INTEGER NOT NULL,
                label TEXT NOT NULL,
                count INTEGER NOT NULL DEFAULT 0,
                avg_confidence REAL NOT NULL DEFAULT 0.0,
                PRIMARY KEY (date, hour, label)
            )",
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record one fused result into its (date, hour, label) bucket
    ///
    /// Retries the write exactly once; a second failure is logged and the
    /// sample dropped.
    pub async fn record(&self, result: &FusionResult) {
        let date = result.timestamp.format("%Y-%m-%d").to_string();
        let hour = result.timestamp.hour();

        if let Err(first) = self
            .upsert_bucket(&date, hour, result.label, result.confidence)
            .await
        {
            debug!("Trend write failed ({}), retrying once", first);
            if let Err(second) = self
                .upsert_bucket(&date, hour, result.label, result.confidence)
                .await
            {
                let dropped = self.dropped_writes.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    "Trend write dropped after retry (total dropped: {}): {}",
                    dropped, second
                );
            }
        }
    }

    /// Increment a bucket's count and fold `confidence` into its running average
    ///
    /// The incremental mean (`avg += (x - avg) / (count + 1)`) runs inside the
    /// UPSERT so no raw samples ever leave the statement.
    pub async fn upsert_bucket(
        &self,
        date: &str,
        hour: u32,
        label: SentimentLabel,
        confidence: f64,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO trend_buckets (date, hour, label, count, avg_confidence)
             VALUES (?, ?, ?, 1, ?)
             ON CONFLICT (date, hour, label) DO UPDATE SET
                 avg_confidence = avg_confidence + (excluded.avg_confidence - avg_confidence) / (count + 1),
                 count = count + 1",
        )
        .bind(date)
        .bind(hour as i64)
        .bind(label.as_str())
        .bind(confidence.clamp(0.0, 1.0))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Query buckets whose (date, hour) falls within `[from, to]`
    pub async fn query_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<TrendRange> {
        let from_date = from.format("%Y-%m-%d").to_string();
        let from_hour = from.hour() as i64;
        let to_date = to.format("%Y-%m-%d").to_string();
        let to_hour = to.hour() as i64;

        let rows = sqlx::query_as::<_, (String, i64, String, i64, f64)>(
            "SELECT date, hour, label, count, avg_confidence
             FROM trend_buckets
             WHERE (date > ? OR (date = ? AND hour >= ?))
               AND (date < ? OR (date = ? AND hour <= ?))
             ORDER BY date, hour, label",
        )
        .bind(&from_date)
        .bind(&from_date)
        .bind(from_hour)
        .bind(&to_date)
        .bind(&to_date)
        .bind(to_hour)
        .fetch_all(&self.pool)
        .await?;

        let mut buckets = Vec::with_capacity(rows.len());
        for (date, hour, label, count, avg_confidence) in rows {
            let label = SentimentLabel::parse(&label)
                .ok_or_else(|| Error::Persistence(format!("unknown label '{}'", label)))?;
            buckets.push(TrendBucket {
                date,
                hour: hour as u32,
                label,
                count,
                avg_confidence,
            });
        }

        Ok(Self::summarize(buckets))
    }

    fn summarize(buckets: Vec<TrendBucket>) -> TrendRange {
        let total_count: i64 = buckets.iter().map(|b| b.count).sum();
        let overall_avg_confidence = if total_count > 0 {
            buckets
                .iter()
                .map(|b| b.avg_confidence * b.count as f64)
                .sum::<f64>()
                / total_count as f64
        } else {
            0.0
        };

        // Peak hour: argmax of per-hour sample count; buckets arrive ordered
        // by (date, hour), so strict greater-than keeps the earliest on ties.
        let mut per_hour: Vec<((String, u32), i64)> = Vec::new();
        for bucket in &buckets {
            let key = (bucket.date.clone(), bucket.hour);
            match per_hour.iter_mut().find(|(k, _)| *k == key) {
                Some((_, count)) => *count += bucket.count,
                None => per_hour.push((key, bucket.count)),
            }
        }
        let mut peak_hour = None;
        let mut peak_count = 0i64;
        for (key, count) in per_hour {
            if count > peak_count {
                peak_count = count;
                peak_hour = Some(key);
            }
        }

        TrendRange {
            buckets,
            total_count,
            overall_avg_confidence,
            peak_hour,
        }
    }

    /// Writes dropped after the single retry (observability metric)
    pub fn dropped_writes(&self) -> u64 {
        self.dropped_writes.load(Ordering::Relaxed)
    }
}
