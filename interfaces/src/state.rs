use crate::defs::{ExternalId, NewRecord, Record, StoreStats};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    url TEXT NOT NULL,
    summary TEXT NOT NULL,
    published INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS records_pending_idx ON records(published, id);
"#;

const RECORD_COLUMNS: &str = "id, external_id, title, url, summary, published, created_at";

/// Durable single-table record store, one per relay instance.
///
/// Every method is a single statement, so a record is either fully present or
/// absent and a release is never half-applied.
#[derive(Clone)]
pub struct RecordStore {
    pool: SqlitePool,
}

impl RecordStore {
    /// Open (creating if needed) the SQLite file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating store directory {}", parent.display()))?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
            .context("building sqlite connect options")?
            .journal_mode(SqliteJournalMode::Wal)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("opening record store {}", path.display()))?;

        Self::with_pool(pool).await
    }

    /// Private in-memory store. The pool is pinned to one connection that is
    /// never recycled, otherwise the database would vanish with it.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .context("opening in-memory record store")?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(SCHEMA)
            .execute(&pool)
            .await
            .context("creating records schema")?;
        Ok(Self { pool })
    }

    /// Authoritative point lookup by dedup key.
    pub async fn contains(&self, external_id: &ExternalId) -> Result<bool> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM records WHERE external_id = ?1")
            .bind(external_id.as_str())
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("looking up record {}", external_id))?;
        Ok(row.get::<i64, _>("count") > 0)
    }

    /// Insert an unpublished record. Returns `false` when a record with the
    /// same external id already exists; the existing row is left untouched.
    pub async fn insert_if_absent(&self, record: &NewRecord) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO records (external_id, title, url, summary, published, created_at)
            VALUES (?1, ?2, ?3, ?4, 0, ?5)
            ON CONFLICT(external_id) DO NOTHING
            "#,
        )
        .bind(record.external_id.as_str())
        .bind(&record.title)
        .bind(&record.url)
        .bind(&record.summary)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .with_context(|| format!("inserting record {}", record.external_id))?;

        Ok(result.rows_affected() > 0)
    }

    /// Select the oldest unpublished record and flip it to published in one
    /// statement. The write lock is taken before the row is chosen, and the
    /// `published = 0` guard makes the update a compare-and-set, so two
    /// callers can never claim the same record.
    pub async fn take_next_unpublished(&self) -> Result<Option<Record>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE records SET published = 1
            WHERE published = 0
              AND id = (SELECT id FROM records WHERE published = 0 ORDER BY id ASC LIMIT 1)
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .fetch_optional(&self.pool)
        .await
        .context("releasing oldest unpublished record")?;

        row.as_ref().map(record_from_row).transpose()
    }

    pub async fn get(&self, external_id: &ExternalId) -> Result<Option<Record>> {
        let row = sqlx::query(&format!("SELECT {RECORD_COLUMNS} FROM records WHERE external_id = ?1"))
            .bind(external_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("fetching record {}", external_id))?;

        row.as_ref().map(record_from_row).transpose()
    }

    /// Unpublished records in release order.
    pub async fn list_pending(&self) -> Result<Vec<Record>> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM records WHERE published = 0 ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .context("listing pending records")?;

        rows.iter().map(record_from_row).collect()
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total,
                   COALESCE(SUM(CASE WHEN published = 1 THEN 1 ELSE 0 END), 0) AS published
            FROM records
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("counting records")?;

        let total: i64 = row.get("total");
        let published: i64 = row.get("published");
        Ok(StoreStats {
            total,
            published,
            pending: total - published,
        })
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn record_from_row(row: &SqliteRow) -> Result<Record> {
    let external_id: String = row.try_get("external_id").context("decoding external_id")?;
    let created_at: DateTime<Utc> = row.try_get("created_at").context("decoding created_at")?;
    Ok(Record {
        id: row.try_get("id").context("decoding id")?,
        external_id: ExternalId(external_id),
        title: row.try_get("title").context("decoding title")?,
        url: row.try_get("url").context("decoding url")?,
        summary: row.try_get("summary").context("decoding summary")?,
        published: row.try_get("published").context("decoding published")?,
        created_at,
    })
}
