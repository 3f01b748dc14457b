/**
 * Room Hub
 *
 * The per-instance registry of live connections and their room membership.
 *
 * Every connection owns an unbounded channel drained by its writer task.
 * Rooms are keyed by [`Topic`]: all sessions of a user, the participants of
 * a conversation, or the opt-in watchers of a user's presence.
 *
 * # Cross-instance fan-out
 *
 * When a [`FanoutRelay`](super::relay::FanoutRelay) is attached, `emit` and
 * `join_members` are also published to the other instances, which replay
 * them through `emit_local` / `join_members_local`. The hub itself keeps no
 * state another instance depends on.
 */

use std::collections::HashSet;
use std::sync::OnceLock;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::backend::realtime::relay::{RelayAction, RelayEnvelope};
use crate::shared::event::{OutboundFrame, ServerEvent};

/// Identifier of one live connection
pub type ConnectionId = Uuid;

/// Sender half of a connection's outbound channel
pub type ConnectionSender = mpsc::UnboundedSender<OutboundFrame>;

/// A broadcast group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Topic {
    /// Every session of a user
    User(Uuid),
    /// Participants of a conversation
    Conversation(Uuid),
    /// Watchers of a user's presence
    Status(Uuid),
}

#[derive(Debug)]
struct ConnectionEntry {
    sender: ConnectionSender,
    topics: HashSet<Topic>,
}

/// Connection registry plus topic membership for this instance
#[derive(Debug)]
pub struct RoomHub {
    instance_id: Uuid,
    connections: DashMap<ConnectionId, ConnectionEntry>,
    rooms: DashMap<Topic, HashSet<ConnectionId>>,
    relay: OnceLock<mpsc::UnboundedSender<RelayEnvelope>>,
}

impl Default for RoomHub {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomHub {
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            connections: DashMap::new(),
            rooms: DashMap::new(),
            relay: OnceLock::new(),
        }
    }

    /// Identifier stamped on every envelope this instance publishes
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Route `emit` / `join_members` to other instances through `publisher`.
    /// Returns `false` if a relay was already attached.
    pub fn attach_relay(&self, publisher: mpsc::UnboundedSender<RelayEnvelope>) -> bool {
        self.relay.set(publisher).is_ok()
    }

    /// Register a connection and hand back its id
    pub fn register(&self, sender: ConnectionSender) -> ConnectionId {
        let id = Uuid::new_v4();
        self.connections.insert(
            id,
            ConnectionEntry {
                sender,
                topics: HashSet::new(),
            },
        );
        tracing::debug!(connection_id = %id, "[Realtime] Connection registered");
        id
    }

    /// Drop a connection and leave every room it joined
    pub fn unregister(&self, connection: ConnectionId) {
        let Some((_, entry)) = self.connections.remove(&connection) else {
            return;
        };
        for topic in entry.topics {
            self.remove_member(topic, connection);
        }
        tracing::debug!(connection_id = %connection, "[Realtime] Connection unregistered");
    }

    pub fn is_registered(&self, connection: ConnectionId) -> bool {
        self.connections.contains_key(&connection)
    }

    /// Subscribe a connection to a topic. No-op for unknown connections.
    ///
    /// The room is updated while the connection entry is held, so a
    /// concurrent `unregister` always sees the topic and cleans it up.
    /// Nothing locks `rooms` and then `connections`.
    pub fn join(&self, connection: ConnectionId, topic: Topic) {
        let Some(mut entry) = self.connections.get_mut(&connection) else {
            return;
        };
        entry.topics.insert(topic);
        self.rooms.entry(topic).or_default().insert(connection);
    }

    pub fn leave(&self, connection: ConnectionId, topic: Topic) {
        if let Some(mut entry) = self.connections.get_mut(&connection) {
            entry.topics.remove(&topic);
        }
        self.remove_member(topic, connection);
    }

    fn remove_member(&self, topic: Topic, connection: ConnectionId) {
        if let Some(mut members) = self.rooms.get_mut(&topic) {
            members.remove(&connection);
        }
        self.rooms.remove_if(&topic, |_, members| members.is_empty());
    }

    /// Deliver an event to every subscriber of `topic`, on this instance and,
    /// when a relay is attached, on every other instance.
    /// Returns the number of local connections reached.
    pub fn emit(&self, topic: Topic, event: &ServerEvent) -> usize {
        let frame = event.to_frame();
        self.publish(RelayAction::Emit {
            topic,
            frame: frame.clone(),
        });
        self.emit_local(topic, &frame)
    }

    /// Deliver a frame to local subscribers only
    pub fn emit_local(&self, topic: Topic, frame: &OutboundFrame) -> usize {
        let members: Vec<ConnectionId> = match self.rooms.get(&topic) {
            Some(members) => members.iter().copied().collect(),
            None => return 0,
        };

        let delivered = members
            .into_iter()
            .filter(|id| self.deliver(*id, frame.clone()))
            .count();
        tracing::trace!(?topic, event = %frame.event, delivered, "[Realtime] Emitted");
        delivered
    }

    /// Send an event to one connection
    pub fn send_to(&self, connection: ConnectionId, event: &ServerEvent) -> bool {
        self.deliver(connection, event.to_frame())
    }

    fn deliver(&self, connection: ConnectionId, frame: OutboundFrame) -> bool {
        match self.connections.get(&connection) {
            Some(entry) => entry.sender.send(frame).is_ok(),
            None => false,
        }
    }

    /// Subscribe every connection of `from` to `to`, everywhere
    pub fn join_members(&self, from: Topic, to: Topic) -> usize {
        self.publish(RelayAction::Join { from, to });
        self.join_members_local(from, to)
    }

    /// Subscribe every local connection of `from` to `to`
    pub fn join_members_local(&self, from: Topic, to: Topic) -> usize {
        let members: Vec<ConnectionId> = match self.rooms.get(&from) {
            Some(members) => members.iter().copied().collect(),
            None => return 0,
        };
        let joined = members.len();
        for connection in members {
            self.join(connection, to);
        }
        joined
    }

    /// Local subscribers of a topic
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.rooms.get(&topic).map_or(0, |members| members.len())
    }

    /// Live connections on this instance
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn publish(&self, action: RelayAction) {
        if let Some(publisher) = self.relay.get() {
            let envelope = RelayEnvelope {
                origin: self.instance_id,
                action,
            };
            if publisher.send(envelope).is_err() {
                tracing::warn!("[Realtime] Relay publisher stopped; fan-out is local only");
            }
        }
    }
}
