//! Redis implementation of the coordination store
//!
//! A `MultiplexedConnection` is cheap to clone and pipelines requests from
//! every clone over one socket, so each call works on its own clone.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, Script};

use crate::backend::coordination::CoordinationStore;
use crate::backend::error::BackendResult;

/// Clamped decrement: DECR, and drop the key once it is no longer positive
const DECR_CLAMPED_LUA: &str = r#"
local value = redis.call('DECR', KEYS[1])
if value <= 0 then
    redis.call('DEL', KEYS[1])
    return 0
end
return value
"#;

const SCAN_BATCH: u32 = 200;

/// Coordination store backed by Redis
#[derive(Clone)]
pub struct RedisCoordination {
    client: Client,
    connection: MultiplexedConnection,
    decr_clamped: Script,
}

impl RedisCoordination {
    /// Open a client and establish the multiplexed connection
    pub async fn connect(url: &str) -> BackendResult<Self> {
        let client = Client::open(url)?;
        let mut connection = client.get_multiplexed_async_connection().await?;

        let _: String = redis::cmd("PING").query_async(&mut connection).await?;

        Ok(Self {
            client,
            connection,
            decr_clamped: Script::new(DECR_CLAMPED_LUA),
        })
    }

    /// The underlying client, for opening pub/sub connections
    pub fn client(&self) -> &Client {
        &self.client
    }

    fn conn(&self) -> MultiplexedConnection {
        self.connection.clone()
    }
}

#[async_trait]
impl CoordinationStore for RedisCoordination {
    async fn get(&self, key: &str) -> BackendResult<Option<String>> {
        let mut conn = self.conn();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> BackendResult<()> {
        let mut conn = self.conn();
        let _: () = redis::cmd("SETEX")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .arg(value)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn incr(&self, key: &str) -> BackendResult<i64> {
        let mut conn = self.conn();
        let value: i64 = redis::cmd("INCR").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn decr_clamped(&self, key: &str) -> BackendResult<i64> {
        let mut conn = self.conn();
        let value: i64 = self.decr_clamped.key(key).invoke_async(&mut conn).await?;
        Ok(value)
    }

    async fn zadd(&self, key: &str, member: &str, score: i64) -> BackendResult<()> {
        let mut conn = self.conn();
        let _: i64 = redis::cmd("ZADD")
            .arg(key)
            .arg(score)
            .arg(member)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn zrem(&self, key: &str, member: &str) -> BackendResult<bool> {
        let mut conn = self.conn();
        let removed: i64 = redis::cmd("ZREM").arg(key).arg(member).query_async(&mut conn).await?;
        Ok(removed > 0)
    }

    async fn zrange_by_score(&self, key: &str, max: i64) -> BackendResult<Vec<(String, i64)>> {
        let mut conn = self.conn();
        let entries: Vec<(String, f64)> = redis::cmd("ZRANGEBYSCORE")
            .arg(key)
            .arg("-inf")
            .arg(max)
            .arg("WITHSCORES")
            .query_async(&mut conn)
            .await?;
        Ok(entries
            .into_iter()
            .map(|(member, score)| (member, score as i64))
            .collect())
    }

    async fn sadd(&self, key: &str, member: &str) -> BackendResult<()> {
        let mut conn = self.conn();
        let _: i64 = redis::cmd("SADD").arg(key).arg(member).query_async(&mut conn).await?;
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> BackendResult<()> {
        let mut conn = self.conn();
        let _: i64 = redis::cmd("SREM").arg(key).arg(member).query_async(&mut conn).await?;
        Ok(())
    }

    async fn sismember(&self, key: &str, member: &str) -> BackendResult<bool> {
        let mut conn = self.conn();
        let present: bool = redis::cmd("SISMEMBER")
            .arg(key)
            .arg(member)
            .query_async(&mut conn)
            .await?;
        Ok(present)
    }

    async fn scan_prefix(&self, prefix: &str) -> BackendResult<Vec<String>> {
        let mut conn = self.conn();
        let pattern = format!("{}*", prefix);
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once across iterations
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}
