// src/store/sqlite.rs
//! SQLite-backed `NewsStore` (single file, WAL journal).

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use tracing::info;

use super::{NewArticle, NewsRecord, NewsStore};
use crate::error::StoreError;
use crate::feeds::Category;

const SCHEMA: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS news (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  title TEXT NOT NULL,
  summary TEXT NOT NULL DEFAULT '',
  source_url TEXT NOT NULL,
  source_name TEXT NOT NULL,
  category TEXT NOT NULL,
  publish_date TEXT NOT NULL,
  rank INTEGER NOT NULL,
  created_at TEXT NOT NULL
)"#,
    "CREATE INDEX IF NOT EXISTS news_date_category_idx ON news(publish_date, category)",
];

#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database file and its parent directory.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Unavailable(format!("create {}: {e}", parent.display())))?;
        }

        let opts = SqliteConnectOptions::new()
            .filename(path)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!(target: "store", path = %path.display(), "sqlite store ready");
        Ok(store)
    }

    /// Private in-memory database. One connection, so every query sees the same data.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Close the pool; later calls fail with `StoreError::Unavailable`.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn single_date(&self, sql: &str, date: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query(sql).bind(date).fetch_optional(&self.pool).await?;
        match row {
            Some(r) => Ok(r.try_get::<Option<String>, _>("d")?),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl NewsStore for SqliteStore {
    async fn insert_article(&self, article: &NewArticle) -> Result<i64, StoreError> {
        let res = sqlx::query(
            r#"
INSERT INTO news
  (title, summary, source_url, source_name, category, publish_date, rank, created_at)
VALUES
  (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
"#,
        )
        .bind(&article.title)
        .bind(&article.summary)
        .bind(&article.source_url)
        .bind(&article.source_name)
        .bind(article.category.as_str())
        .bind(&article.publish_date)
        .bind(article.rank as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    async fn delete_articles_for_date(&self, date: &str) -> Result<u64, StoreError> {
        let res = sqlx::query("DELETE FROM news WHERE publish_date = ?1")
            .bind(date)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }

    async fn has_articles_for_date(&self, date: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM news WHERE publish_date = ?1) AS present")
            .bind(date)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("present")? != 0)
    }

    async fn articles_for_date(&self, date: &str) -> Result<Vec<NewsRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
SELECT id, title, summary, source_url, source_name, category, publish_date, rank, created_at
FROM news
WHERE publish_date = ?1
ORDER BY category ASC, rank ASC
"#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn latest_date(&self) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT MAX(publish_date) AS d FROM news")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<Option<String>, _>("d")?)
    }

    async fn prev_date(&self, date: &str) -> Result<Option<String>, StoreError> {
        self.single_date("SELECT MAX(publish_date) AS d FROM news WHERE publish_date < ?1", date)
            .await
    }

    async fn next_date(&self, date: &str) -> Result<Option<String>, StoreError> {
        self.single_date("SELECT MIN(publish_date) AS d FROM news WHERE publish_date > ?1", date)
            .await
    }

    async fn all_dates(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query("SELECT DISTINCT publish_date AS d FROM news ORDER BY d DESC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| r.try_get::<String, _>("d").map_err(StoreError::from))
            .collect()
    }
}

fn row_to_record(row: &SqliteRow) -> Result<NewsRecord, StoreError> {
    let category: String = row.try_get("category")?;
    let category = Category::from_str(&category).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    let created_at: String = row.try_get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("created_at {created_at:?}: {e}")))?;

    Ok(NewsRecord {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        summary: row.try_get("summary")?,
        source_url: row.try_get("source_url")?,
        source_name: row.try_get("source_name")?,
        category,
        publish_date: row.try_get("publish_date")?,
        rank: row.try_get::<i64, _>("rank")?.max(0) as u32,
        created_at,
    })
}
