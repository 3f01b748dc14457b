//! Coordination Store
//!
//! The process-wide key/value service shared by every server instance. It is
//! the single source of truth for session counts, the presence cache, the
//! deferred-offline delay queue and unread markers. Every primitive here is
//! atomic on its own; callers never read-modify-write across two calls.
//!
//! Adapters:
//!
//! - [`RedisCoordination`] - the `redis` crate over a multiplexed connection
//! - [`MemoryCoordination`] - a single in-process lock, for single-instance mode and tests

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::error::BackendResult;

pub mod memory;
pub mod redis;

pub use self::memory::MemoryCoordination;
pub use self::redis::RedisCoordination;

/// Shared handle to a coordination store
pub type SharedCoordination = Arc<dyn CoordinationStore>;

#[async_trait]
pub trait CoordinationStore: Send + Sync {
    async fn get(&self, key: &str) -> BackendResult<Option<String>>;

    /// Set `key` to `value`, expiring after `ttl`
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> BackendResult<()>;

    /// Increment and return the new value
    async fn incr(&self, key: &str) -> BackendResult<i64>;

    /// Decrement and return the new value, never going below zero. The key is
    /// deleted once it reaches zero.
    async fn decr_clamped(&self, key: &str) -> BackendResult<i64>;

    /// Insert or move a sorted-set member
    async fn zadd(&self, key: &str, member: &str, score: i64) -> BackendResult<()>;

    /// Remove a sorted-set member. Returns `true` only for the caller whose
    /// call actually removed it.
    async fn zrem(&self, key: &str, member: &str) -> BackendResult<bool>;

    /// Members with score `<= max`, with their scores, lowest first
    async fn zrange_by_score(&self, key: &str, max: i64) -> BackendResult<Vec<(String, i64)>>;

    async fn sadd(&self, key: &str, member: &str) -> BackendResult<()>;

    async fn srem(&self, key: &str, member: &str) -> BackendResult<()>;

    async fn sismember(&self, key: &str, member: &str) -> BackendResult<bool>;

    /// Every key starting with `prefix`
    async fn scan_prefix(&self, prefix: &str) -> BackendResult<Vec<String>>;
}

/// Key layout shared by all instances
pub mod keys {
    use uuid::Uuid;

    /// Sorted set of users awaiting their offline flip, scored by due time (unix millis)
    pub const DISCONNECT_TIMERS: &str = "disconnect_timers";

    /// Live session counter of a user
    pub fn active_sessions(user_id: Uuid) -> String {
        format!("active_sessions:{}", user_id)
    }

    /// Cached presence status of a user
    pub fn user_status(user_id: Uuid) -> String {
        format!("user_status:{}", user_id)
    }

    /// Pending recipients of one message
    pub fn unread_messages(conversation_id: Uuid, message_id: Uuid) -> String {
        format!("{}{}", unread_prefix(conversation_id), message_id)
    }

    /// Prefix of every unread marker of a conversation
    pub fn unread_prefix(conversation_id: Uuid) -> String {
        format!("unread_messages:{}:", conversation_id)
    }
}
