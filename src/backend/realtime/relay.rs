//! Cross-instance fan-out over Redis pub/sub
//!
//! Every instance publishes its room operations on one channel and replays
//! the operations of the other instances onto its local [`RoomHub`]. An
//! instance ignores its own envelopes, which it already applied locally.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::backend::error::BackendResult;
use crate::backend::realtime::hub::{RoomHub, Topic};
use crate::shared::event::OutboundFrame;

/// Pub/sub channel shared by all instances
pub const RELAY_CHANNEL: &str = "pulsechat:fanout";

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// One room operation as seen on the wire between instances
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelayEnvelope {
    /// Instance that performed the operation
    pub origin: Uuid,
    pub action: RelayAction,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayAction {
    Emit { topic: Topic, frame: OutboundFrame },
    Join { from: Topic, to: Topic },
}

impl RelayEnvelope {
    /// Apply a remote operation to the local hub. Own envelopes are skipped.
    pub fn apply(&self, hub: &RoomHub) {
        if self.origin == hub.instance_id() {
            return;
        }
        match &self.action {
            RelayAction::Emit { topic, frame } => {
                hub.emit_local(*topic, frame);
            }
            RelayAction::Join { from, to } => {
                hub.join_members_local(*from, *to);
            }
        }
    }
}

/// Handles of the relay's background tasks
pub struct FanoutRelay {
    publisher: JoinHandle<()>,
    listener: JoinHandle<()>,
}

impl FanoutRelay {
    /// Attach a relay to `hub`: spawn the publisher and the listener tasks.
    pub async fn start(client: redis::Client, hub: Arc<RoomHub>) -> BackendResult<Self> {
        let connection = client.get_multiplexed_async_connection().await?;
        let (tx, rx) = mpsc::unbounded_channel::<RelayEnvelope>();

        let publisher = tokio::spawn(run_publisher(connection, rx));
        let listener = tokio::spawn(run_listener(client, Arc::clone(&hub)));

        if !hub.attach_relay(tx) {
            tracing::warn!("[Relay] Hub already had a relay attached");
        }
        tracing::info!(instance_id = %hub.instance_id(), "[Relay] Cross-instance fan-out enabled");

        Ok(Self { publisher, listener })
    }

    pub fn shutdown(self) {
        self.publisher.abort();
        self.listener.abort();
    }
}

async fn run_publisher(
    mut connection: redis::aio::MultiplexedConnection,
    mut rx: mpsc::UnboundedReceiver<RelayEnvelope>,
) {
    while let Some(envelope) = rx.recv().await {
        let payload = match serde_json::to_string(&envelope) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "[Relay] Failed to encode envelope");
                continue;
            }
        };
        let published: redis::RedisResult<i64> = redis::cmd("PUBLISH")
            .arg(RELAY_CHANNEL)
            .arg(payload)
            .query_async(&mut connection)
            .await;
        if let Err(e) = published {
            tracing::warn!(error = %e, "[Relay] Publish failed");
        }
    }
}

async fn run_listener(client: redis::Client, hub: Arc<RoomHub>) {
    loop {
        if let Err(e) = listen_once(&client, &hub).await {
            tracing::warn!(error = %e, "[Relay] Subscription lost");
        }
        tokio::time::sleep(RESUBSCRIBE_DELAY).await;
    }
}

async fn listen_once(client: &redis::Client, hub: &RoomHub) -> redis::RedisResult<()> {
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.subscribe(RELAY_CHANNEL).await?;
    let mut messages = pubsub.on_message();

    while let Some(message) = messages.next().await {
        let payload: String = match message.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "[Relay] Unreadable payload");
                continue;
            }
        };
        match serde_json::from_str::<RelayEnvelope>(&payload) {
            Ok(envelope) => envelope.apply(hub),
            Err(e) => tracing::warn!(error = %e, "[Relay] Malformed envelope"),
        }
    }
    Ok(())
}
