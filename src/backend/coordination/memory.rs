//! In-memory implementation of the coordination store
//!
//! Only valid for a single server instance. Expiry uses `tokio::time` so
//! tests running with a paused clock see TTLs elapse.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::backend::coordination::CoordinationStore;
use crate::backend::error::{BackendError, BackendResult};

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Debug, Default)]
struct State {
    strings: HashMap<String, Entry>,
    sorted_sets: HashMap<String, HashMap<String, i64>>,
    sets: HashMap<String, HashSet<String>>,
}

impl State {
    fn live_value(&mut self, key: &str) -> Option<&str> {
        let now = Instant::now();
        if self.strings.get(key).is_some_and(|e| !e.is_live(now)) {
            self.strings.remove(key);
        }
        self.strings.get(key).map(|e| e.value.as_str())
    }

    fn counter(&mut self, key: &str) -> BackendResult<i64> {
        match self.live_value(key) {
            Some(raw) => raw
                .parse()
                .map_err(|_| BackendError::internal(format!("value at `{}` is not an integer", key))),
            None => Ok(0),
        }
    }

    fn store_counter(&mut self, key: &str, value: i64) {
        self.strings.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
    }
}

/// Coordination store kept in process memory
#[derive(Debug, Default)]
pub struct MemoryCoordination {
    state: Mutex<State>,
}

impl MemoryCoordination {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CoordinationStore for MemoryCoordination {
    async fn get(&self, key: &str) -> BackendResult<Option<String>> {
        let mut state = self.state.lock().await;
        Ok(state.live_value(key).map(str::to_string))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> BackendResult<()> {
        let mut state = self.state.lock().await;
        state.strings.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn incr(&self, key: &str) -> BackendResult<i64> {
        let mut state = self.state.lock().await;
        let next = state.counter(key)? + 1;
        state.store_counter(key, next);
        Ok(next)
    }

    async fn decr_clamped(&self, key: &str) -> BackendResult<i64> {
        let mut state = self.state.lock().await;
        let next = state.counter(key)? - 1;
        if next <= 0 {
            state.strings.remove(key);
            return Ok(0);
        }
        state.store_counter(key, next);
        Ok(next)
    }

    async fn zadd(&self, key: &str, member: &str, score: i64) -> BackendResult<()> {
        let mut state = self.state.lock().await;
        state
            .sorted_sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn zrem(&self, key: &str, member: &str) -> BackendResult<bool> {
        let mut state = self.state.lock().await;
        Ok(state
            .sorted_sets
            .get_mut(key)
            .is_some_and(|set| set.remove(member).is_some()))
    }

    async fn zrange_by_score(&self, key: &str, max: i64) -> BackendResult<Vec<(String, i64)>> {
        let state = self.state.lock().await;
        let mut due: Vec<(String, i64)> = state
            .sorted_sets
            .get(key)
            .map(|set| {
                set.iter()
                    .filter(|(_, score)| **score <= max)
                    .map(|(member, &score)| (member.clone(), score))
                    .collect()
            })
            .unwrap_or_default();
        due.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        Ok(due)
    }

    async fn sadd(&self, key: &str, member: &str) -> BackendResult<()> {
        let mut state = self.state.lock().await;
        state
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> BackendResult<()> {
        let mut state = self.state.lock().await;
        if let Some(set) = state.sets.get_mut(key) {
            set.remove(member);
            // Redis drops empty sets
            if set.is_empty() {
                state.sets.remove(key);
            }
        }
        Ok(())
    }

    async fn sismember(&self, key: &str, member: &str) -> BackendResult<bool> {
        let state = self.state.lock().await;
        Ok(state.sets.get(key).is_some_and(|set| set.contains(member)))
    }

    async fn scan_prefix(&self, prefix: &str) -> BackendResult<Vec<String>> {
        let state = self.state.lock().await;
        let now = Instant::now();
        let mut keys: Vec<String> = state
            .strings
            .iter()
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(key, _)| key)
            .chain(state.sets.keys())
            .chain(state.sorted_sets.keys())
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_decr_clamps_at_zero() {
        let store = MemoryCoordination::new();
        assert_eq!(store.incr("c").await.unwrap(), 1);
        assert_eq!(store.decr_clamped("c").await.unwrap(), 0);
        assert_eq!(store.decr_clamped("c").await.unwrap(), 0);
        assert_eq!(store.get("c").await.unwrap(), None);
        assert_eq!(store.incr("c").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_zrem_reports_single_winner() {
        let store = MemoryCoordination::new();
        store.zadd("z", "u", 10).await.unwrap();
        assert!(store.zrem("z", "u").await.unwrap());
        assert!(!store.zrem("z", "u").await.unwrap());
    }

    #[tokio::test]
    async fn test_zrange_by_score_filters_and_orders() {
        let store = MemoryCoordination::new();
        store.zadd("z", "late", 30).await.unwrap();
        store.zadd("z", "early", 10).await.unwrap();
        store.zadd("z", "mid", 20).await.unwrap();

        let due = store.zrange_by_score("z", 20).await.unwrap();
        assert_eq!(due, vec![("early".to_string(), 10), ("mid".to_string(), 20)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_ex_expires() {
        let store = MemoryCoordination::new();
        store.set_ex("k", "v", Duration::from_secs(5)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_scan_prefix_sees_sets() {
        let store = MemoryCoordination::new();
        store.sadd("unread_messages:c1:m1", "u").await.unwrap();
        store.sadd("unread_messages:c1:m2", "u").await.unwrap();
        store.sadd("unread_messages:c2:m3", "u").await.unwrap();

        let keys = store.scan_prefix("unread_messages:c1:").await.unwrap();
        assert_eq!(keys, vec!["unread_messages:c1:m1", "unread_messages:c1:m2"]);

        store.srem("unread_messages:c1:m1", "u").await.unwrap();
        assert_eq!(store.scan_prefix("unread_messages:c1:").await.unwrap().len(), 1);
    }
}
