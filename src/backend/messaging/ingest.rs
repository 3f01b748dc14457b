//! Message Ingestion & Fan-out
//!
//! Persist, move the conversation's last-message pointer, broadcast to the
//! conversation room, then mark every other participant as a pending
//! recipient and push them their refreshed unread count.

use std::sync::Arc;

use uuid::Uuid;

use crate::backend::error::{BackendError, BackendResult};
use crate::backend::messaging::unread::UnreadCounter;
use crate::backend::realtime::{RoomHub, Topic};
use crate::backend::store::SharedStore;
use crate::shared::event::ServerEvent;
use crate::shared::messaging::{Conversation, Message, MessageStatus, NewMessage};

pub struct MessageIngestor {
    store: SharedStore,
    hub: Arc<RoomHub>,
    unread: Arc<UnreadCounter>,
}

impl MessageIngestor {
    pub fn new(store: SharedStore, hub: Arc<RoomHub>, unread: Arc<UnreadCounter>) -> Self {
        Self { store, hub, unread }
    }

    /// Ingest a message into an existing conversation.
    ///
    /// The sender is assumed to be a participant. Replaying an id that is
    /// already stored returns the stored message after finishing whatever
    /// the first attempt left undone.
    pub async fn create_message(&self, new_message: NewMessage) -> BackendResult<Message> {
        let conversation_id = new_message.conversation_id;
        let message_id = new_message.id;
        let sender_id = new_message.sender_id;
        let conversation = self
            .store
            .find_conversation(conversation_id)
            .await?
            .ok_or_else(|| {
                BackendError::not_found(format!("conversation {} does not exist", conversation_id))
            })?;

        let message = match self
            .store
            .create_message(new_message, MessageStatus::Delivered)
            .await
        {
            Ok(message) => message,
            Err(e) if e.is_conflict() => {
                let stored = self.store.find_message(message_id).await?.ok_or(e)?;
                if stored.conversation_id != conversation_id || stored.sender_id != sender_id {
                    return Err(BackendError::conflict(format!(
                        "message {} already exists with another sender or conversation",
                        message_id
                    )));
                }
                return self.resume(&conversation, stored).await;
            }
            Err(e) => return Err(e),
        };

        // The pointer moves before anyone can observe the message
        self.store.set_last_message(conversation_id, message.id).await?;
        self.fan_out(&message);
        self.mark_recipients(&conversation, &message).await?;

        Ok(message)
    }

    /// Redo the steps after the insert for a replayed message. The pointer
    /// not covering the message means the first attempt stopped before the
    /// broadcast; the unread markers are idempotent and redone while unread.
    async fn resume(&self, conversation: &Conversation, stored: Message) -> BackendResult<Message> {
        let broadcast = match conversation.last_message_id {
            None => false,
            Some(last) if last == stored.id => true,
            Some(last) => match self.store.find_message(last).await? {
                Some(latest) => latest.created_at >= stored.created_at,
                None => false,
            },
        };

        if !broadcast {
            tracing::info!(message_id = %stored.id, "[Ingest] Resuming interrupted ingest");
            self.store.set_last_message(conversation.id, stored.id).await?;
            self.fan_out(&stored);
        } else {
            tracing::debug!(message_id = %stored.id, "[Ingest] Replayed message id, skipping fan-out");
        }

        if stored.status < MessageStatus::Read {
            self.mark_recipients(conversation, &stored).await?;
        }
        Ok(stored)
    }

    fn fan_out(&self, message: &Message) {
        let delivered = self.hub.emit(
            Topic::Conversation(message.conversation_id),
            &ServerEvent::NewMessage {
                message: message.clone(),
            },
        );
        tracing::debug!(
            conversation_id = %message.conversation_id,
            message_id = %message.id,
            delivered,
            "[Ingest] Message fanned out"
        );
    }

    /// Mark every other participant pending and push them their count
    async fn mark_recipients(&self, conversation: &Conversation, message: &Message) -> BackendResult<()> {
        let recipients = conversation
            .participants
            .iter()
            .copied()
            .filter(|id| *id != message.sender_id);
        for recipient in recipients {
            self.unread
                .mark_pending(conversation.id, message.id, recipient)
                .await?;
            self.unread.notify_count(conversation.id, recipient).await?;
        }
        Ok(())
    }
}
