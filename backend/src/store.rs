use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use shared::{Choice, VoteCounts, VoteSnapshot, VoteStatus, VoteTransition};
use tracing::{error, info, instrument, warn};

use crate::config::{BackendKind, Config};
use crate::error::StoreError;
use crate::redis_store::RedisBackend;
use crate::sqlite_store::SqliteBackend;

/// Fallible counter primitives. Implementations must make `increment` and
/// `decrement` atomic in the backing store and must never produce a negative
/// count.
#[async_trait]
pub trait VoteBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Creates missing counters at zero without touching existing ones.
    async fn ensure_initialized(&self) -> Result<(), StoreError>;

    async fn load(&self) -> Result<VoteCounts, StoreError>;

    /// Returns the new count for `choice`.
    async fn increment(&self, choice: Choice) -> Result<u64, StoreError>;

    /// Floors at zero. Returns the new count for `choice`.
    async fn decrement(&self, choice: Choice) -> Result<u64, StoreError>;

    async fn reset_all(&self) -> Result<(), StoreError>;

    /// Resets every counter if the startup flag is absent, then sets it.
    /// Returns whether the reset happened.
    async fn reset_on_startup(&self) -> Result<bool, StoreError>;
}

/// Vote store handed to request handlers.
///
/// Never fails: every call returns counts, and a backend failure is carried
/// in [`VoteSnapshot::error`] instead. `load` falls back to zeros; mutations
/// fall back to the last counts that were read successfully.
pub struct VoteStore {
    backend: Arc<dyn VoteBackend>,
    op_timeout: Duration,
    last_known: Mutex<VoteCounts>,
}

impl VoteStore {
    pub fn new(backend: Arc<dyn VoteBackend>, op_timeout: Duration) -> Self {
        Self {
            backend,
            op_timeout,
            last_known: Mutex::new(VoteCounts::zero()),
        }
    }

    /// Builds the configured backend. Neither backend connects here, so an
    /// unreachable store does not stop startup.
    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        let backend: Arc<dyn VoteBackend> = match config.backend {
            BackendKind::Redis => Arc::new(RedisBackend::new(&config.redis, config.op_timeout)?),
            BackendKind::Sqlite => Arc::new(SqliteBackend::open(&config.sqlite, config.retry)),
        };
        info!(backend = backend.name(), "Vote store configured");
        Ok(Self::new(backend, config.op_timeout))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    async fn bounded<T>(&self, fut: impl Future<Output = Result<T, StoreError>>) -> Result<T, StoreError> {
        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout { seconds: self.op_timeout.as_secs() })?
    }

    fn last_known(&self) -> VoteCounts {
        self.last_known.lock().map(|counts| *counts).unwrap_or_default()
    }

    fn remember(&self, counts: VoteCounts) {
        if let Ok(mut last) = self.last_known.lock() {
            *last = counts;
        }
    }

    /// Returns the error message to surface, if any.
    pub async fn ensure_initialized(&self) -> Option<String> {
        match self.bounded(self.backend.ensure_initialized()).await {
            Ok(()) => None,
            Err(e) => {
                error!(code = ?e.code(), "Error initializing votes: {}", e);
                Some(format!("Error initializing votes: {e}"))
            }
        }
    }

    pub async fn load(&self) -> VoteSnapshot {
        match self.bounded(self.backend.load()).await {
            Ok(counts) => {
                self.remember(counts);
                VoteSnapshot::ok(counts)
            }
            Err(e) => {
                error!(code = ?e.code(), "Error loading votes: {}", e);
                VoteSnapshot::degraded(VoteCounts::zero(), format!("Error loading votes: {e}"))
            }
        }
    }

    /// Reads fresh counts after a successful mutation. If that read fails, the
    /// mutated count is still known and is patched into the last snapshot.
    async fn refreshed(&self, choice: Choice, count: u64) -> VoteSnapshot {
        match self.bounded(self.backend.load()).await {
            Ok(counts) => {
                self.remember(counts);
                VoteSnapshot::ok(counts)
            }
            Err(e) => {
                warn!("Could not refresh votes, using last known counts: {}", e);
                let mut counts = self.last_known();
                counts.set(choice, count);
                self.remember(counts);
                VoteSnapshot::degraded(counts, format!("Error loading votes: {e}"))
            }
        }
    }

    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn increment(&self, choice: Choice) -> VoteSnapshot {
        match self.bounded(self.backend.increment(choice)).await {
            Ok(count) => {
                info!(%choice, count, "Vote recorded");
                self.refreshed(choice, count).await
            }
            Err(e) => {
                error!(%choice, code = ?e.code(), "Error incrementing vote: {}", e);
                VoteSnapshot::degraded(self.last_known(), format!("Error incrementing vote: {e}"))
            }
        }
    }

    #[instrument(skip(self), fields(backend = self.backend.name()))]
    pub async fn decrement(&self, choice: Choice) -> VoteSnapshot {
        match self.bounded(self.backend.decrement(choice)).await {
            Ok(count) => {
                info!(%choice, count, "Vote removed");
                self.refreshed(choice, count).await
            }
            Err(e) => {
                error!(%choice, code = ?e.code(), "Error decrementing vote: {}", e);
                VoteSnapshot::degraded(self.last_known(), format!("Error decrementing vote: {e}"))
            }
        }
    }

    pub async fn reset_all(&self) -> VoteSnapshot {
        match self.bounded(self.backend.reset_all()).await {
            Ok(()) => {
                info!("All votes reset to zero");
                self.remember(VoteCounts::zero());
                VoteSnapshot::ok(VoteCounts::zero())
            }
            Err(e) => {
                error!(code = ?e.code(), "Error resetting votes: {}", e);
                VoteSnapshot::degraded(self.last_known(), format!("Error resetting votes: {e}"))
            }
        }
    }

    /// Meant to be called once per process. Returns whether counts were reset.
    pub async fn reset_on_startup(&self) -> bool {
        match self.bounded(self.backend.reset_on_startup()).await {
            Ok(true) => {
                info!("First start detected, votes reset");
                self.remember(VoteCounts::zero());
                true
            }
            Ok(false) => false,
            Err(e) => {
                error!(code = ?e.code(), "Error checking startup flag: {}", e);
                false
            }
        }
    }

    /// Applies a session's button press to the counters.
    ///
    /// A changed vote is a decrement followed by an increment; the two are not
    /// one transaction, so a reader in between can see the old vote removed
    /// before the new one lands.
    pub async fn cast(&self, status: VoteStatus, choice: Choice) -> (VoteStatus, VoteTransition, VoteSnapshot) {
        let (next, transition) = status.vote(choice);

        let snapshot = match transition {
            VoteTransition::FirstVote { choice } => self.increment(choice).await,
            VoteTransition::Changed { from, to } => {
                let removed = self.decrement(from).await;
                let added = self.increment(to).await;
                match (removed.error, added.error) {
                    (Some(first), Some(second)) => VoteSnapshot::degraded(added.counts, format!("{first}; {second}")),
                    (Some(err), None) | (None, Some(err)) => VoteSnapshot::degraded(added.counts, err),
                    (None, None) => VoteSnapshot::ok(added.counts),
                }
            }
            VoteTransition::AlreadyVoted { .. } => self.load().await,
        };

        (next, transition, snapshot)
    }
}
