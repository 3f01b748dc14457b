//! Messaging facade used by the gateway
//!
//! Wires the resolver, the ingestor and the unread counter over the same
//! stores and hub, and exposes one method per messaging event.

use std::sync::Arc;

use uuid::Uuid;

use crate::backend::coordination::SharedCoordination;
use crate::backend::error::{BackendError, BackendResult};
use crate::backend::messaging::ingest::MessageIngestor;
use crate::backend::messaging::resolver::{ConversationResolver, Resolution};
use crate::backend::messaging::unread::UnreadCounter;
use crate::backend::realtime::{RoomHub, Topic};
use crate::backend::store::SharedStore;
use crate::shared::event::{SendMessagePayload, ServerEvent};
use crate::shared::messaging::Message;

pub struct MessagingService {
    store: SharedStore,
    resolver: ConversationResolver,
    ingestor: MessageIngestor,
    unread: Arc<UnreadCounter>,
    hub: Arc<RoomHub>,
}

impl MessagingService {
    pub fn new(store: SharedStore, coordination: SharedCoordination, hub: Arc<RoomHub>) -> Self {
        let unread = Arc::new(UnreadCounter::new(
            Arc::clone(&store),
            coordination,
            Arc::clone(&hub),
        ));
        Self {
            resolver: ConversationResolver::new(Arc::clone(&store), Arc::clone(&hub)),
            ingestor: MessageIngestor::new(Arc::clone(&store), Arc::clone(&hub), Arc::clone(&unread)),
            store,
            unread,
            hub,
        }
    }

    pub fn resolver(&self) -> &ConversationResolver {
        &self.resolver
    }

    pub fn ingestor(&self) -> &MessageIngestor {
        &self.ingestor
    }

    pub fn unread(&self) -> &UnreadCounter {
        &self.unread
    }

    /// `send_message`: resolve the conversation, then ingest into it
    pub async fn send_message(&self, payload: SendMessagePayload) -> BackendResult<(Resolution, Message)> {
        let resolution = self
            .resolver
            .resolve(payload.conversation_id, payload.sender_id, payload.receiver_id)
            .await?;
        let message = self
            .ingestor
            .create_message(payload.into_new_message(resolution.conversation.id))
            .await?;
        Ok((resolution, message))
    }

    /// `typing`: fire-and-forget to the conversation room
    pub fn typing(&self, conversation_id: Uuid, user_id: Uuid) -> usize {
        self.hub.emit(
            Topic::Conversation(conversation_id),
            &ServerEvent::Typing {
                conversation_id,
                user_id,
            },
        )
    }

    /// `messages_read`: bulk acknowledgment by `reader_id`.
    ///
    /// Only a participant may acknowledge, and only messages of this
    /// conversation that someone else sent; other ids are dropped.
    pub async fn messages_read(
        &self,
        message_ids: &[Uuid],
        conversation_id: Uuid,
        reader_id: Uuid,
    ) -> BackendResult<u64> {
        self.ensure_participant(conversation_id, reader_id).await?;

        let mut received = Vec::with_capacity(message_ids.len());
        for id in message_ids {
            match self.store.find_message(*id).await? {
                Some(message)
                    if message.conversation_id == conversation_id && message.sender_id != reader_id =>
                {
                    received.push(message.id)
                }
                _ => tracing::debug!(
                    message_id = %id,
                    reader_id = %reader_id,
                    "[Messaging] Ignoring acknowledgment of a message not received here"
                ),
            }
        }

        if received.is_empty() {
            return self.unread.notify_count(conversation_id, reader_id).await;
        }
        self.unread
            .acknowledge(&received, conversation_id, reader_id)
            .await
    }

    /// `request_unread_count`: push the current count to the user's sessions
    pub async fn request_unread_count(&self, conversation_id: Uuid, user_id: Uuid) -> BackendResult<u64> {
        self.ensure_participant(conversation_id, user_id).await?;
        self.unread.notify_count(conversation_id, user_id).await
    }

    async fn ensure_participant(&self, conversation_id: Uuid, user_id: Uuid) -> BackendResult<()> {
        let conversation = self
            .store
            .find_conversation(conversation_id)
            .await?
            .ok_or_else(|| {
                BackendError::not_found(format!("conversation {} does not exist", conversation_id))
            })?;
        if !conversation.has_participant(user_id) {
            return Err(BackendError::unauthorized(format!(
                "user {} is not a participant of conversation {}",
                user_id, conversation_id
            )));
        }
        Ok(())
    }
}
