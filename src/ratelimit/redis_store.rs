//! Redis-backed counter store.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::store::CounterBackend;
use crate::error::{Result, TollgateError};

/// Increment, and set the expiry only when this call created the key.
///
/// Redis runs a script without interleaving other commands, so two first touches can never
/// both skip the EXPIRE, and later increments never move an existing expiry.
const INCREMENT_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

/// Counter store backed by a shared Redis server.
///
/// The connection is opened on first use and then reused; the connection manager
/// reconnects on its own after a failure. An unreachable server at startup is therefore not
/// fatal, it only makes calls fail until the server is back.
pub struct RedisCounterStore {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
    script: Script,
}

impl RedisCounterStore {
    /// Create a store for the server at `url`. Only the URL is validated here.
    pub fn new(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| TollgateError::Config(format!("invalid Redis URL {:?}: {}", url, e)))?;

        Ok(Self {
            client,
            connection: OnceCell::new(),
            script: Script::new(INCREMENT_SCRIPT),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager> {
        let manager = self
            .connection
            .get_or_try_init(|| async {
                debug!("Opening Redis connection");
                let manager = ConnectionManager::new(self.client.clone()).await?;
                info!("Connected to Redis");
                Ok::<_, redis::RedisError>(manager)
            })
            .await?;
        Ok(manager.clone())
    }

    /// Round-trip a PING to the server.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

impl std::fmt::Debug for RedisCounterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCounterStore")
            .field("connected", &self.connection.initialized())
            .finish()
    }
}

#[async_trait]
impl CounterBackend for RedisCounterStore {
    async fn increment(&self, key: &str, ttl_secs: u64) -> Result<u64> {
        let mut conn = self.connection().await?;
        // EVALSHA, falling back to EVAL when the script is not cached yet.
        let count: u64 = self
            .script
            .key(key)
            .arg(ttl_secs)
            .invoke_async(&mut conn)
            .await?;
        Ok(count)
    }
}
