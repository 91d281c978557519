use std::collections::BTreeSet;

use anyhow::{Context, Result};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::{debug, info};

use crate::{DiscoveryStore, JobStore};

/// Connection URL for database `db` on `host` (`host` or `host:port`).
pub fn redis_url(host: &str, db: u32) -> String {
    let host = host.trim().trim_start_matches("redis://").trim_end_matches('/');
    format!("redis://{host}/{db}")
}

/// Board backed by the redis database the forwarder writes discoveries to.
///
/// Lists map to `LRANGE key 0 -1` / `DEL key`, sets to `SADD` / `SMEMBERS`.
#[derive(Clone)]
pub struct RedisBoard {
    conn: MultiplexedConnection,
}

impl std::fmt::Debug for RedisBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBoard").finish_non_exhaustive()
    }
}

impl RedisBoard {
    /// Open a multiplexed connection to `db` on `host`. Fails fast when the
    /// server is unreachable.
    pub async fn connect(host: &str, db: u32) -> Result<Self> {
        let url = redis_url(host, db);
        let client = redis::Client::open(url.as_str())
            .with_context(|| format!("invalid redis url {url}"))?;
        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .with_context(|| format!("connect to redis at {url}"))?;
        info!(%url, "redis board connected");
        Ok(Self { conn })
    }
}

#[async_trait::async_trait]
impl DiscoveryStore for RedisBoard {
    async fn list_range(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let ids: Vec<String> = conn
            .lrange(key, 0, -1)
            .await
            .with_context(|| format!("LRANGE {key}"))?;
        Ok(ids)
    }

    async fn clear(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let removed: usize = conn.del(key).await.with_context(|| format!("DEL {key}"))?;
        debug!(key, existed = removed > 0, "discovery list cleared");
        Ok(())
    }
}

#[async_trait::async_trait]
impl JobStore for RedisBoard {
    async fn add_members(&self, key: &str, ids: &[String]) -> Result<usize> {
        // SADD with no members is a protocol error.
        if ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let added: usize = conn
            .sadd(key, ids)
            .await
            .with_context(|| format!("SADD {key}"))?;
        Ok(added)
    }

    async fn members(&self, key: &str) -> Result<BTreeSet<String>> {
        let mut conn = self.conn.clone();
        let members: BTreeSet<String> = conn
            .smembers(key)
            .await
            .with_context(|| format!("SMEMBERS {key}"))?;
        Ok(members)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_carries_host_and_db() {
        assert_eq!(redis_url("localhost", 15), "redis://localhost/15");
        assert_eq!(redis_url("redis.cp:6380", 0), "redis://redis.cp:6380/0");
    }

    #[test]
    fn url_tolerates_scheme_and_trailing_slash() {
        assert_eq!(redis_url(" redis://board/ ", 2), "redis://board/2");
    }

    #[tokio::test]
    async fn unreachable_server_is_an_error() {
        // Grab a free port, then close it so the connect is refused.
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let err = RedisBoard::connect(&format!("127.0.0.1:{port}"), 0)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("connect to redis"), "got: {err:#}");
    }
}
