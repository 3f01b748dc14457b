//! In-memory implementation of the persistent store
//!
//! Used when no `DATABASE_URL` is configured (single-instance mode) and by
//! the test suite. One lock guards all tables so each call is atomic.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::backend::error::{BackendError, BackendResult};
use crate::backend::store::PersistentStore;
use crate::shared::messaging::{
    participant_pair, Contact, Conversation, Message, MessageStatus, NewMessage, User, UserStatus,
};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    conversations: HashMap<Uuid, Conversation>,
    pairs: HashMap<[Uuid; 2], Uuid>,
    contacts: HashMap<Uuid, Contact>,
    messages: HashMap<Uuid, Message>,
}

/// Persistent store kept in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored conversations
    pub async fn conversation_count(&self) -> usize {
        self.tables.read().await.conversations.len()
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    async fn create_user(&self, login: &str) -> BackendResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.login == login) {
            return Err(BackendError::conflict(format!("login `{}` is taken", login)));
        }
        let user = User {
            id: Uuid::new_v4(),
            login: login.to_string(),
            status: UserStatus::Offline,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> BackendResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn update_user_status(&self, id: Uuid, status: UserStatus) -> BackendResult<()> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| BackendError::not_found(format!("user {} does not exist", id)))?;
        user.status = status;
        Ok(())
    }

    async fn find_conversation(&self, id: Uuid) -> BackendResult<Option<Conversation>> {
        Ok(self.tables.read().await.conversations.get(&id).cloned())
    }

    async fn find_conversation_between(&self, a: Uuid, b: Uuid) -> BackendResult<Option<Conversation>> {
        let tables = self.tables.read().await;
        Ok(tables
            .pairs
            .get(&participant_pair(a, b))
            .and_then(|id| tables.conversations.get(id))
            .cloned())
    }

    async fn create_conversation(&self, a: Uuid, b: Uuid) -> BackendResult<Conversation> {
        let mut tables = self.tables.write().await;
        let pair = participant_pair(a, b);
        if tables.pairs.contains_key(&pair) {
            return Err(BackendError::conflict(format!(
                "conversation between {} and {} already exists",
                pair[0], pair[1]
            )));
        }
        let conversation = Conversation::new_direct(a, b);
        tables.pairs.insert(pair, conversation.id);
        tables.conversations.insert(conversation.id, conversation.clone());
        Ok(conversation)
    }

    async fn conversation_ids_for_user(&self, user_id: Uuid) -> BackendResult<Vec<Uuid>> {
        let tables = self.tables.read().await;
        let mut owned: Vec<&Conversation> = tables
            .conversations
            .values()
            .filter(|c| c.has_participant(user_id))
            .collect();
        owned.sort_by_key(|c| c.created_at);
        Ok(owned.into_iter().map(|c| c.id).collect())
    }

    async fn set_last_message(&self, conversation_id: Uuid, message_id: Uuid) -> BackendResult<()> {
        let mut tables = self.tables.write().await;
        let conversation = tables.conversations.get_mut(&conversation_id).ok_or_else(|| {
            BackendError::not_found(format!("conversation {} does not exist", conversation_id))
        })?;
        conversation.last_message_id = Some(message_id);
        Ok(())
    }

    async fn create_contact(&self, user_id: Uuid, contact_id: Uuid) -> BackendResult<Contact> {
        let mut tables = self.tables.write().await;
        if tables
            .contacts
            .values()
            .any(|c| c.user_id == user_id && c.contact_id == contact_id)
        {
            return Err(BackendError::conflict("contact already exists"));
        }
        let contact = Contact::new(user_id, contact_id);
        tables.contacts.insert(contact.id, contact.clone());
        Ok(contact)
    }

    async fn find_contact(&self, user_id: Uuid, contact_id: Uuid) -> BackendResult<Option<Contact>> {
        Ok(self
            .tables
            .read()
            .await
            .contacts
            .values()
            .find(|c| c.user_id == user_id && c.contact_id == contact_id)
            .cloned())
    }

    async fn set_contact_conversation(&self, contact_id: Uuid, conversation_id: Uuid) -> BackendResult<()> {
        let mut tables = self.tables.write().await;
        let contact = tables
            .contacts
            .get_mut(&contact_id)
            .ok_or_else(|| BackendError::not_found(format!("contact {} does not exist", contact_id)))?;
        contact.conversation_id = Some(conversation_id);
        Ok(())
    }

    async fn create_message(&self, message: NewMessage, status: MessageStatus) -> BackendResult<Message> {
        let mut tables = self.tables.write().await;
        if tables.messages.contains_key(&message.id) {
            return Err(BackendError::conflict(format!("message {} already exists", message.id)));
        }
        if !tables.conversations.contains_key(&message.conversation_id) {
            return Err(BackendError::not_found(format!(
                "conversation {} does not exist",
                message.conversation_id
            )));
        }
        let message = message.into_message(status);
        tables.messages.insert(message.id, message.clone());
        Ok(message)
    }

    async fn find_message(&self, id: Uuid) -> BackendResult<Option<Message>> {
        Ok(self.tables.read().await.messages.get(&id).cloned())
    }

    async fn mark_messages_read(&self, ids: &[Uuid], conversation_id: Uuid) -> BackendResult<u64> {
        let mut tables = self.tables.write().await;
        let mut changed = 0;
        for id in ids {
            if let Some(message) = tables.messages.get_mut(id) {
                if message.conversation_id != conversation_id {
                    continue;
                }
                let next = message.status.advance(MessageStatus::Read);
                if next != message.status {
                    message.status = next;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn new_message(conversation_id: Uuid, sender_id: Uuid) -> NewMessage {
        NewMessage {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            content: "hello".to_string(),
            sender_id,
            conversation_id,
            attachments: vec![],
        }
    }

    #[tokio::test]
    async fn test_conversation_pair_is_unique() {
        let store = MemoryStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let first = store.create_conversation(a, b).await.unwrap();
        let second = store.create_conversation(b, a).await;

        assert_matches!(second, Err(BackendError::Conflict { .. }));
        let found = store.find_conversation_between(b, a).await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
    }

    #[tokio::test]
    async fn test_duplicate_message_id_conflicts() {
        let store = MemoryStore::new();
        let a = Uuid::new_v4();
        let conversation = store.create_conversation(a, Uuid::new_v4()).await.unwrap();
        let message = new_message(conversation.id, a);

        store
            .create_message(message.clone(), MessageStatus::Delivered)
            .await
            .unwrap();
        let replay = store.create_message(message, MessageStatus::Delivered).await;
        assert_matches!(replay, Err(BackendError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_mark_read_is_monotonic() {
        let store = MemoryStore::new();
        let a = Uuid::new_v4();
        let conversation = store.create_conversation(a, Uuid::new_v4()).await.unwrap();
        let message = store
            .create_message(new_message(conversation.id, a), MessageStatus::Delivered)
            .await
            .unwrap();

        assert_eq!(store.mark_messages_read(&[message.id], conversation.id).await.unwrap(), 1);
        assert_eq!(store.mark_messages_read(&[message.id], conversation.id).await.unwrap(), 0);

        let stored = store.find_message(message.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MessageStatus::Read);
    }

    #[tokio::test]
    async fn test_mark_read_ignores_other_conversations() {
        let store = MemoryStore::new();
        let a = Uuid::new_v4();
        let conversation = store.create_conversation(a, Uuid::new_v4()).await.unwrap();
        let message = store
            .create_message(new_message(conversation.id, a), MessageStatus::Delivered)
            .await
            .unwrap();

        assert_eq!(store.mark_messages_read(&[message.id], Uuid::new_v4()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_status_of_unknown_user() {
        let store = MemoryStore::new();
        let result = store.update_user_status(Uuid::new_v4(), UserStatus::Online).await;
        assert_matches!(result, Err(BackendError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_conversation_ids_for_user() {
        let store = MemoryStore::new();
        let a = Uuid::new_v4();
        let first = store.create_conversation(a, Uuid::new_v4()).await.unwrap();
        let second = store.create_conversation(Uuid::new_v4(), a).await.unwrap();
        store.create_conversation(Uuid::new_v4(), Uuid::new_v4()).await.unwrap();

        let ids = store.conversation_ids_for_user(a).await.unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&first.id) && ids.contains(&second.id));
    }
}
