//! # Redis
//!
//! Counters live in plain string keys, `votes:<choice>`, so every mutation is
//! a single server-side atomic step:
//!
//! - increment is `INCR`
//! - decrement is a Lua script that only runs `DECR` while the value is
//!   positive, so check-and-decrement cannot interleave with another client
//! - reset is one `MSET`
//!
//! The `app:started` key marks that this deployment has already been reset
//! once. It is claimed with `SET NX`, so exactly one process performs the
//! startup reset.
//!
//! The connection is opened lazily and re-attempted on the next call after a
//! failure, so the app starts (and serves zeros) with Redis down.
use std::time::Duration;

use async_trait::async_trait;
use redis::{
    AsyncCommands, Client, Script,
    aio::{ConnectionManager, ConnectionManagerConfig},
};
use shared::{Choice, VoteCounts, coerce_count, coerce_signed};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::config::RedisConfig;
use crate::error::StoreError;
use crate::store::VoteBackend;

pub const STARTED_KEY: &str = "app:started";

const DECREMENT_FLOORED: &str = r"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
if current == nil then
    redis.call('SET', KEYS[1], 0)
    return 0
end
if current > 0 then
    return redis.call('DECR', KEYS[1])
end
return current
";

pub fn vote_key(choice: Choice) -> String {
    format!("votes:{}", choice.as_str())
}

pub struct RedisBackend {
    client: Client,
    connection: OnceCell<ConnectionManager>,
    connect_timeout: Duration,
    decrement: Script,
}

impl RedisBackend {
    pub fn new(config: &RedisConfig, connect_timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::open(config.url())?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
            connect_timeout,
            decrement: Script::new(DECREMENT_FLOORED),
        })
    }

    async fn conn(&self) -> Result<ConnectionManager, StoreError> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                let config = ConnectionManagerConfig::new()
                    .set_number_of_retries(1)
                    .set_connection_timeout(Some(self.connect_timeout))
                    .set_response_timeout(Some(self.connect_timeout));

                let manager = self.client.get_connection_manager_with_config(config).await?;
                info!("Connected to Redis");
                Ok::<_, StoreError>(manager)
            })
            .await?;

        Ok(manager.clone())
    }
}

#[async_trait]
impl VoteBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn ensure_initialized(&self) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        for choice in Choice::ALL {
            let created: bool = conn.set_nx(vote_key(choice), 0).await?;
            if created {
                debug!(%choice, "Initialized vote counter");
            }
        }
        Ok(())
    }

    async fn load(&self) -> Result<VoteCounts, StoreError> {
        let mut conn = self.conn().await?;
        let keys: Vec<String> = Choice::ALL.into_iter().map(vote_key).collect();
        let values: Vec<Option<String>> = conn.mget(&keys).await?;

        Ok(Choice::ALL
            .into_iter()
            .zip(values)
            .map(|(choice, raw)| (choice, coerce_count(raw.as_deref())))
            .collect())
    }

    async fn increment(&self, choice: Choice) -> Result<u64, StoreError> {
        let mut conn = self.conn().await?;
        let count: i64 = conn.incr(vote_key(choice), 1).await?;
        Ok(coerce_signed(count))
    }

    async fn decrement(&self, choice: Choice) -> Result<u64, StoreError> {
        let mut conn = self.conn().await?;
        let count: i64 = self.decrement.key(vote_key(choice)).invoke_async(&mut conn).await?;
        Ok(coerce_signed(count))
    }

    async fn reset_all(&self) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        let items: Vec<(String, i64)> = Choice::ALL.into_iter().map(|choice| (vote_key(choice), 0)).collect();
        let _: () = conn.mset(&items).await?;
        Ok(())
    }

    async fn reset_on_startup(&self) -> Result<bool, StoreError> {
        let mut conn = self.conn().await?;
        let first_start: bool = conn.set_nx(STARTED_KEY, "1").await?;
        if first_start {
            if let Err(e) = self.reset_all().await {
                let _: redis::RedisResult<i64> = conn.del(STARTED_KEY).await;
                return Err(e);
            }
        }
        Ok(first_start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_votes_prefix() {
        assert_eq!(vote_key(Choice::ClassicMusic), "votes:classic_music");
        assert_eq!(vote_key(Choice::RockMusic), "votes:rock_music");
    }

    #[tokio::test]
    async fn unreachable_server_is_an_error_not_a_panic() {
        let config = RedisConfig { host: "127.0.0.1".into(), port: 1, password: None, db: 0 };
        let backend = RedisBackend::new(&config, Duration::from_millis(200)).unwrap();

        assert!(backend.load().await.is_err());
        // The failed connect is not cached; the next call tries again.
        assert!(backend.increment(Choice::RockMusic).await.is_err());
        assert!(backend.connection.get().is_none());
    }
}
