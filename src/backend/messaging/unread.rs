//! Unread Counter
//!
//! Pending state is one coordination-store set per message,
//! `unread_messages:<conversationId>:<messageId>`, holding the recipients who
//! have not acknowledged it yet. A count is a scan over the conversation's
//! markers; markers are removed on acknowledge so the scan stays small.

use std::sync::Arc;

use uuid::Uuid;

use crate::backend::coordination::{keys, SharedCoordination};
use crate::backend::error::BackendResult;
use crate::backend::realtime::{RoomHub, Topic};
use crate::backend::store::SharedStore;
use crate::shared::event::ServerEvent;

pub struct UnreadCounter {
    store: SharedStore,
    coordination: SharedCoordination,
    hub: Arc<RoomHub>,
}

impl UnreadCounter {
    pub fn new(store: SharedStore, coordination: SharedCoordination, hub: Arc<RoomHub>) -> Self {
        Self {
            store,
            coordination,
            hub,
        }
    }

    /// Record `recipient_id` as not having read `message_id` yet
    pub async fn mark_pending(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
        recipient_id: Uuid,
    ) -> BackendResult<()> {
        self.coordination
            .sadd(
                &keys::unread_messages(conversation_id, message_id),
                &recipient_id.to_string(),
            )
            .await
    }

    /// Messages of the conversation still pending for `recipient_id`
    pub async fn count(&self, conversation_id: Uuid, recipient_id: Uuid) -> BackendResult<u64> {
        let member = recipient_id.to_string();
        let markers = self
            .coordination
            .scan_prefix(&keys::unread_prefix(conversation_id))
            .await?;

        let mut unread = 0;
        for marker in markers {
            if self.coordination.sismember(&marker, &member).await? {
                unread += 1;
            }
        }
        Ok(unread)
    }

    /// Clear the markers, move the messages to `read`, tell the conversation
    /// room, and push the refreshed count to the recipient. Returns the count.
    pub async fn acknowledge(
        &self,
        message_ids: &[Uuid],
        conversation_id: Uuid,
        recipient_id: Uuid,
    ) -> BackendResult<u64> {
        let member = recipient_id.to_string();
        for message_id in message_ids {
            self.coordination
                .srem(&keys::unread_messages(conversation_id, *message_id), &member)
                .await?;
        }

        let changed = self
            .store
            .mark_messages_read(message_ids, conversation_id)
            .await?;
        tracing::debug!(
            conversation_id = %conversation_id,
            recipient_id = %recipient_id,
            acknowledged = message_ids.len(),
            changed,
            "[Unread] Messages acknowledged"
        );

        self.hub.emit(
            Topic::Conversation(conversation_id),
            &ServerEvent::MessagesRead {
                conversation_id,
                ids: message_ids.to_vec(),
            },
        );
        self.notify_count(conversation_id, recipient_id).await
    }

    /// Count and push `unread_count_<conversationId>` to every session of the recipient
    pub async fn notify_count(&self, conversation_id: Uuid, recipient_id: Uuid) -> BackendResult<u64> {
        let unread_count = self.count(conversation_id, recipient_id).await?;
        self.hub.emit(
            Topic::User(recipient_id),
            &ServerEvent::UnreadCount {
                conversation_id,
                unread_count,
            },
        );
        Ok(unread_count)
    }
}
