//! Common test utilities and helpers
//!
//! - A harness wiring the services over the in-memory adapters and a
//!   manual clock
//! - Helpers to open sessions and to listen on topics
//! - A coordination store that fails on demand
//! - Assertion macros

#![allow(dead_code)]

#[macro_use]
pub mod assertions;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use pulsechat::backend::coordination::{CoordinationStore, MemoryCoordination, SharedCoordination};
use pulsechat::backend::error::BackendResult;
use pulsechat::backend::BackendError;
use pulsechat::backend::gateway::{Session, SessionKind};
use pulsechat::backend::presence::{ManualClock, PresenceSettings};
use pulsechat::backend::realtime::{ConnectionId, RoomHub, Topic};
use pulsechat::backend::server::AppState;
use pulsechat::backend::store::{MemoryStore, PersistentStore};
use pulsechat::shared::event::{OutboundFrame, SendMessagePayload};
use tokio::sync::mpsc;
use uuid::Uuid;

pub struct Harness {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub coordination: Arc<MemoryCoordination>,
    pub clock: Arc<ManualClock>,
}

pub fn harness() -> Harness {
    let coordination = Arc::new(MemoryCoordination::new());
    harness_over(coordination.clone(), coordination)
}

/// A harness whose services see a [`FlakyCoordination`] over the shared state
pub fn flaky_harness() -> (Harness, Arc<FlakyCoordination>) {
    let coordination = Arc::new(MemoryCoordination::new());
    let flaky = Arc::new(FlakyCoordination::new(coordination.clone()));
    (harness_over(flaky.clone(), coordination), flaky)
}

fn harness_over(services: SharedCoordination, coordination: Arc<MemoryCoordination>) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::starting_now());
    let state = AppState::new(
        store.clone(),
        services,
        Arc::new(RoomHub::new()),
        clock.clone(),
        PresenceSettings::default(),
    );
    Harness {
        state,
        store,
        coordination,
        clock,
    }
}

/// An open session plus everything sent to it
pub struct TestSession {
    pub session: Session,
    pub rx: mpsc::UnboundedReceiver<OutboundFrame>,
}

impl TestSession {
    pub async fn send(&self, frame: serde_json::Value) {
        // Errors are reported on `rx`
        let _ = self.session.handle_frame(&frame.to_string()).await;
    }

    pub fn drain(&mut self) -> Vec<OutboundFrame> {
        drain(&mut self.rx)
    }

    pub async fn close(self) {
        self.session.close().await;
    }
}

impl Harness {
    pub async fn user(&self, login: &str) -> Uuid {
        self.store.create_user(login).await.unwrap().id
    }

    /// Contact edges in both directions
    pub async fn befriend(&self, a: Uuid, b: Uuid) {
        self.store.create_contact(a, b).await.unwrap();
        self.store.create_contact(b, a).await.unwrap();
    }

    pub async fn connect(&self, user_id: Uuid) -> TestSession {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session::open(self.state.clone(), tx, SessionKind::User(user_id))
            .await
            .unwrap();
        TestSession { session, rx }
    }

    /// A bare connection joined to `topic`
    pub fn listen(&self, topic: Topic) -> (ConnectionId, mpsc::UnboundedReceiver<OutboundFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = self.state.hub.register(tx);
        self.state.hub.join(connection, topic);
        (connection, rx)
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }
}

pub fn drain(rx: &mut mpsc::UnboundedReceiver<OutboundFrame>) -> Vec<OutboundFrame> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(frame);
    }
    frames
}

pub fn first_message(sender_id: Uuid, receiver_id: Uuid, content: &str) -> SendMessagePayload {
    SendMessagePayload {
        id: Uuid::new_v4(),
        created_at: Utc::now(),
        content: content.to_string(),
        attachments: Vec::new(),
        sender_id,
        receiver_id,
        conversation_id: None,
    }
}

/// Delegates to memory, failing the next `sadd` once armed
pub struct FlakyCoordination {
    inner: Arc<MemoryCoordination>,
    fail_sadd: AtomicBool,
}

impl FlakyCoordination {
    pub fn new(inner: Arc<MemoryCoordination>) -> Self {
        Self {
            inner,
            fail_sadd: AtomicBool::new(false),
        }
    }

    pub fn fail_next_sadd(&self) {
        self.fail_sadd.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CoordinationStore for FlakyCoordination {
    async fn get(&self, key: &str) -> BackendResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> BackendResult<()> {
        self.inner.set_ex(key, value, ttl).await
    }

    async fn incr(&self, key: &str) -> BackendResult<i64> {
        self.inner.incr(key).await
    }

    async fn decr_clamped(&self, key: &str) -> BackendResult<i64> {
        self.inner.decr_clamped(key).await
    }

    async fn zadd(&self, key: &str, member: &str, score: i64) -> BackendResult<()> {
        self.inner.zadd(key, member, score).await
    }

    async fn zrem(&self, key: &str, member: &str) -> BackendResult<bool> {
        self.inner.zrem(key, member).await
    }

    async fn zrange_by_score(&self, key: &str, max: i64) -> BackendResult<Vec<(String, i64)>> {
        self.inner.zrange_by_score(key, max).await
    }

    async fn sadd(&self, key: &str, member: &str) -> BackendResult<()> {
        if self.fail_sadd.swap(false, Ordering::SeqCst) {
            return Err(BackendError::internal("coordination store unavailable"));
        }
        self.inner.sadd(key, member).await
    }

    async fn srem(&self, key: &str, member: &str) -> BackendResult<()> {
        self.inner.srem(key, member).await
    }

    async fn sismember(&self, key: &str, member: &str) -> BackendResult<bool> {
        self.inner.sismember(key, member).await
    }

    async fn scan_prefix(&self, prefix: &str) -> BackendResult<Vec<String>> {
        self.inner.scan_prefix(prefix).await
    }
}
