//! # SQLite
//!
//! One row per choice in `votes(choice TEXT PRIMARY KEY, count INTEGER DEFAULT 0)`.
//! Every mutation is a single upsert, so it is atomic under SQLite's file lock
//! and recreates a missing row instead of failing. WAL mode lets readers keep
//! going while a writer holds the lock.
//!
//! Writers that find the file locked are retried by [`RetryPolicy`]. The
//! startup flag is a marker file claimed with `create_new`, so concurrent
//! starts agree on which one resets.
use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use shared::{Choice, VoteCounts, coerce_count, coerce_signed};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::config::SqliteConfig;
use crate::error::StoreError;
use crate::retry::RetryPolicy;
use crate::store::VoteBackend;

const SEED_COUNTS: &str =
    "INSERT INTO votes (choice, count) VALUES (?1, 0), (?2, 0) ON CONFLICT(choice) DO NOTHING";

const INCREMENT: &str = "INSERT INTO votes (choice, count) VALUES (?1, 1)
     ON CONFLICT(choice) DO UPDATE SET count = MAX(CAST(count AS INTEGER), 0) + 1
     RETURNING count";

const DECREMENT: &str = "INSERT INTO votes (choice, count) VALUES (?1, 0)
     ON CONFLICT(choice) DO UPDATE SET count = MAX(CAST(count AS INTEGER) - 1, 0)
     RETURNING count";

const RESET: &str =
    "INSERT INTO votes (choice, count) VALUES (?1, 0), (?2, 0) ON CONFLICT(choice) DO UPDATE SET count = 0";

pub struct SqliteBackend {
    pool: SqlitePool,
    schema: OnceCell<()>,
    path: PathBuf,
    startup_flag_path: PathBuf,
    retry: RetryPolicy,
}

impl SqliteBackend {
    /// Builds the pool without touching the file; the schema is created by
    /// the first operation.
    pub fn open(config: &SqliteConfig, retry: RetryPolicy) -> Self {
        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_lazy_with(options);

        Self {
            pool,
            schema: OnceCell::new(),
            path: config.path.clone(),
            startup_flag_path: config.startup_flag_path.clone(),
            retry,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn schema(&self) -> Result<(), StoreError> {
        self.schema
            .get_or_try_init(|| async {
                for file in [&self.path, &self.startup_flag_path] {
                    if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
                sqlx::migrate!("./migrations").run(&self.pool).await?;
                info!("Vote table ready");
                Ok::<_, StoreError>(())
            })
            .await
            .map(|_| ())
    }

    async fn upsert_count(&self, sql: &'static str, choice: Choice) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(sql)
            .bind(choice.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(coerce_signed(count))
    }

    async fn write_both(&self, sql: &'static str) -> Result<(), StoreError> {
        let [first, second] = Choice::ALL;
        sqlx::query(sql)
            .bind(first.as_str())
            .bind(second.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn claim_startup_flag(&self) -> Result<bool, StoreError> {
        let claimed = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.startup_flag_path)
            .await;

        match claimed {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl VoteBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn ensure_initialized(&self) -> Result<(), StoreError> {
        self.schema().await?;
        self.retry.run("ensure_initialized", || self.write_both(SEED_COUNTS)).await
    }

    async fn load(&self) -> Result<VoteCounts, StoreError> {
        self.schema().await?;
        let rows: Vec<(String, Option<String>)> = self
            .retry
            .run("load", || async {
                sqlx::query_as("SELECT choice, CAST(count AS TEXT) FROM votes")
                    .fetch_all(&self.pool)
                    .await
                    .map_err(StoreError::from)
            })
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(choice, raw)| match choice.parse::<Choice>() {
                Ok(choice) => Some((choice, coerce_count(raw.as_deref()))),
                Err(_) => {
                    warn!(%choice, "Ignoring unknown row in votes table");
                    None
                }
            })
            .collect())
    }

    async fn increment(&self, choice: Choice) -> Result<u64, StoreError> {
        self.schema().await?;
        self.retry.run("increment", || self.upsert_count(INCREMENT, choice)).await
    }

    async fn decrement(&self, choice: Choice) -> Result<u64, StoreError> {
        self.schema().await?;
        self.retry.run("decrement", || self.upsert_count(DECREMENT, choice)).await
    }

    async fn reset_all(&self) -> Result<(), StoreError> {
        self.schema().await?;
        self.retry.run("reset_all", || self.write_both(RESET)).await
    }

    async fn reset_on_startup(&self) -> Result<bool, StoreError> {
        self.schema().await?;
        if !self.claim_startup_flag().await? {
            return Ok(false);
        }

        if let Err(e) = self.reset_all().await {
            // Let the next start try again.
            let _ = tokio::fs::remove_file(&self.startup_flag_path).await;
            return Err(e);
        }
        Ok(true)
    }
}
