/**
 * Conversation Resolver
 *
 * Finds or creates the one-to-one conversation for a sender/receiver pair.
 *
 * # Resolution order
 *
 * 1. An explicit conversation id must exist; it is never auto-created. The
 *    sender must be one of its participants and the receiver the other.
 * 2. Without an id, the sender's contact edge towards the receiver is
 *    required. Its cached conversation is reused when present.
 * 3. Otherwise an existing conversation for the pair is reused.
 * 4. Otherwise the conversation is created. The store rejects a second
 *    conversation for the same pair, so losing a creation race surfaces as
 *    `Conflict`, and the winner's row is fetched and used instead.
 *
 * Both contact edges (when the reverse edge exists) end up caching the
 * conversation id.
 */

use std::sync::Arc;

use uuid::Uuid;

use crate::backend::error::{BackendError, BackendResult};
use crate::backend::realtime::{RoomHub, Topic};
use crate::backend::store::SharedStore;
use crate::shared::event::ServerEvent;
use crate::shared::messaging::{Contact, Conversation};

/// Result of a resolve call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub conversation: Conversation,
    /// `true` only for the call that created the conversation
    pub created: bool,
}

pub struct ConversationResolver {
    store: SharedStore,
    hub: Arc<RoomHub>,
}

impl ConversationResolver {
    pub fn new(store: SharedStore, hub: Arc<RoomHub>) -> Self {
        Self { store, hub }
    }

    pub async fn resolve(
        &self,
        conversation_id: Option<Uuid>,
        sender_id: Uuid,
        receiver_id: Uuid,
    ) -> BackendResult<Resolution> {
        if let Some(id) = conversation_id {
            let conversation = self
                .store
                .find_conversation(id)
                .await?
                .ok_or_else(|| BackendError::not_found(format!("conversation {} does not exist", id)))?;
            ensure_pair(&conversation, sender_id, receiver_id)?;
            return Ok(Resolution {
                conversation,
                created: false,
            });
        }

        if sender_id == receiver_id {
            return Err(BackendError::validation("sender and receiver must differ"));
        }

        let sender_edge = self
            .store
            .find_contact(sender_id, receiver_id)
            .await?
            .ok_or_else(|| {
                BackendError::not_found(format!(
                    "user {} has no contact entry for {}",
                    sender_id, receiver_id
                ))
            })?;
        let reverse_edge = self.store.find_contact(receiver_id, sender_id).await?;

        if let Some(cached) = sender_edge.conversation_id {
            match self.store.find_conversation(cached).await? {
                Some(conversation) if ensure_pair(&conversation, sender_id, receiver_id).is_ok() => {
                    self.backfill(reverse_edge.as_ref(), &conversation).await?;
                    return Ok(Resolution {
                        conversation,
                        created: false,
                    });
                }
                Some(_) => tracing::warn!(
                    contact_id = %sender_edge.id,
                    conversation_id = %cached,
                    "[Resolver] Contact caches another pair's conversation"
                ),
                None => tracing::warn!(
                    contact_id = %sender_edge.id,
                    conversation_id = %cached,
                    "[Resolver] Contact caches a missing conversation"
                ),
            }
        }

        let (conversation, created) = match self
            .store
            .find_conversation_between(sender_id, receiver_id)
            .await?
        {
            Some(existing) => (existing, false),
            None => self.create(sender_id, receiver_id).await?,
        };

        self.backfill(Some(&sender_edge), &conversation).await?;
        self.backfill(reverse_edge.as_ref(), &conversation).await?;

        if created {
            self.announce(&conversation, sender_id);
        }

        Ok(Resolution {
            conversation,
            created,
        })
    }

    async fn create(&self, sender_id: Uuid, receiver_id: Uuid) -> BackendResult<(Conversation, bool)> {
        match self.store.create_conversation(sender_id, receiver_id).await {
            Ok(conversation) => {
                tracing::info!(
                    conversation_id = %conversation.id,
                    sender_id = %sender_id,
                    receiver_id = %receiver_id,
                    "[Resolver] Conversation created"
                );
                Ok((conversation, true))
            }
            Err(e) if e.is_conflict() => {
                tracing::debug!(
                    sender_id = %sender_id,
                    receiver_id = %receiver_id,
                    "[Resolver] Lost creation race, using existing conversation"
                );
                let existing = self
                    .store
                    .find_conversation_between(sender_id, receiver_id)
                    .await?
                    .ok_or_else(|| {
                        BackendError::internal("conversation conflict reported but no row found")
                    })?;
                Ok((existing, false))
            }
            Err(e) => Err(e),
        }
    }

    async fn backfill(&self, edge: Option<&Contact>, conversation: &Conversation) -> BackendResult<()> {
        match edge {
            Some(edge) if edge.conversation_id != Some(conversation.id) => {
                self.store
                    .set_contact_conversation(edge.id, conversation.id)
                    .await
            }
            _ => Ok(()),
        }
    }

    /// Put both participants' live sessions in the room, then notify them
    fn announce(&self, conversation: &Conversation, sender_id: Uuid) {
        let room = Topic::Conversation(conversation.id);
        for participant in conversation.participants {
            self.hub.join_members(Topic::User(participant), room);
        }

        let created = ServerEvent::NewConversation { id: conversation.id };
        for participant in conversation.participants {
            self.hub.emit(Topic::User(participant), &created);
        }
        self.hub.emit(
            Topic::User(sender_id),
            &ServerEvent::NewConversationOpened { id: conversation.id },
        );
    }
}

/// The conversation must be exactly the sender/receiver pair
fn ensure_pair(conversation: &Conversation, sender_id: Uuid, receiver_id: Uuid) -> BackendResult<()> {
    if !conversation.has_participant(sender_id) {
        return Err(BackendError::unauthorized(format!(
            "user {} is not a participant of conversation {}",
            sender_id, conversation.id
        )));
    }
    if conversation.other_participant(sender_id) != Some(receiver_id) {
        return Err(BackendError::validation(format!(
            "user {} is not the other participant of conversation {}",
            receiver_id, conversation.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::store::{MemoryStore, PersistentStore};
    use assert_matches::assert_matches;

    async fn setup() -> (ConversationResolver, Arc<MemoryStore>, Uuid, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let a = store.create_user("a").await.unwrap().id;
        let b = store.create_user("b").await.unwrap().id;
        let resolver = ConversationResolver::new(store.clone(), Arc::new(RoomHub::new()));
        (resolver, store, a, b)
    }

    #[tokio::test]
    async fn test_explicit_id_must_exist() {
        let (resolver, _store, a, b) = setup().await;
        let result = resolver.resolve(Some(Uuid::new_v4()), a, b).await;
        assert_matches!(result, Err(BackendError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_missing_sender_edge() {
        let (resolver, store, a, b) = setup().await;
        store.create_contact(b, a).await.unwrap();

        let result = resolver.resolve(None, a, b).await;
        assert_matches!(result, Err(BackendError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_creates_once_and_backfills_both_edges() {
        let (resolver, store, a, b) = setup().await;
        store.create_contact(a, b).await.unwrap();
        store.create_contact(b, a).await.unwrap();

        let first = resolver.resolve(None, a, b).await.unwrap();
        let second = resolver.resolve(None, a, b).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.conversation.id, second.conversation.id);

        let forward = store.find_contact(a, b).await.unwrap().unwrap();
        let reverse = store.find_contact(b, a).await.unwrap().unwrap();
        assert_eq!(forward.conversation_id, Some(first.conversation.id));
        assert_eq!(reverse.conversation_id, Some(first.conversation.id));
    }

    #[tokio::test]
    async fn test_reuses_pair_conversation_from_other_side() {
        let (resolver, store, a, b) = setup().await;
        store.create_contact(a, b).await.unwrap();
        store.create_contact(b, a).await.unwrap();

        let from_b = resolver.resolve(None, b, a).await.unwrap();
        let from_a = resolver.resolve(None, a, b).await.unwrap();

        assert_eq!(from_a.conversation.id, from_b.conversation.id);
        assert_eq!(store.conversation_count().await, 1);
    }

    #[tokio::test]
    async fn test_rejects_self_conversation() {
        let (resolver, store, a, _b) = setup().await;
        store.create_contact(a, a).await.unwrap();
        let result = resolver.resolve(None, a, a).await;
        assert_matches!(result, Err(BackendError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_explicit_id_requires_the_pair() {
        let (resolver, store, a, b) = setup().await;
        let c = store.create_user("c").await.unwrap().id;
        let conversation = store.create_conversation(a, b).await.unwrap();

        let outsider = resolver.resolve(Some(conversation.id), c, b).await;
        assert_matches!(outsider, Err(BackendError::Unauthorized { .. }));

        let wrong_receiver = resolver.resolve(Some(conversation.id), a, c).await;
        assert_matches!(wrong_receiver, Err(BackendError::Validation { .. }));

        let ok = resolver.resolve(Some(conversation.id), b, a).await.unwrap();
        assert_eq!(ok.conversation.id, conversation.id);
    }

    #[tokio::test]
    async fn test_cached_conversation_of_another_pair_is_ignored() {
        let (resolver, store, a, b) = setup().await;
        let c = store.create_user("c").await.unwrap().id;
        let foreign = store.create_conversation(b, c).await.unwrap();
        let edge = store.create_contact(a, b).await.unwrap();
        store.set_contact_conversation(edge.id, foreign.id).await.unwrap();

        let resolved = resolver.resolve(None, a, b).await.unwrap();
        assert!(resolved.created);
        assert_ne!(resolved.conversation.id, foreign.id);

        let edge = store.find_contact(a, b).await.unwrap().unwrap();
        assert_eq!(edge.conversation_id, Some(resolved.conversation.id));
    }
}
