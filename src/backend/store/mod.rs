//! Persistent Store
//!
//! The relational store holding users, conversations, messages and contact
//! edges. Each call is its own transaction; the realtime core never holds a
//! transaction across an await on another store.
//!
//! Two adapters implement [`PersistentStore`]:
//!
//! - [`PostgresStore`] - `sqlx` over PostgreSQL, schema in `migrations/`
//! - [`MemoryStore`] - in-process maps, used without `DATABASE_URL` and in tests
//!
//! Both enforce the same constraints: one conversation per unordered
//! participant pair and unique message ids, each surfacing as
//! [`BackendError::Conflict`](crate::backend::error::BackendError::Conflict).

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::backend::error::BackendResult;
use crate::shared::messaging::{Contact, Conversation, Message, MessageStatus, NewMessage, User, UserStatus};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Shared handle to a persistent store
pub type SharedStore = Arc<dyn PersistentStore>;

#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// Register a user with status `offline`
    async fn create_user(&self, login: &str) -> BackendResult<User>;

    async fn find_user(&self, id: Uuid) -> BackendResult<Option<User>>;

    /// Overwrite a user's status; `NotFound` when the user does not exist
    async fn update_user_status(&self, id: Uuid, status: UserStatus) -> BackendResult<()>;

    async fn find_conversation(&self, id: Uuid) -> BackendResult<Option<Conversation>>;

    /// Conversation for the unordered pair `{a, b}`
    async fn find_conversation_between(&self, a: Uuid, b: Uuid) -> BackendResult<Option<Conversation>>;

    /// Create the conversation for `{a, b}`; `Conflict` when one already exists
    async fn create_conversation(&self, a: Uuid, b: Uuid) -> BackendResult<Conversation>;

    /// Ids of every conversation the user participates in, oldest first
    async fn conversation_ids_for_user(&self, user_id: Uuid) -> BackendResult<Vec<Uuid>>;

    async fn set_last_message(&self, conversation_id: Uuid, message_id: Uuid) -> BackendResult<()>;

    /// Create the directional edge `user_id -> contact_id`
    async fn create_contact(&self, user_id: Uuid, contact_id: Uuid) -> BackendResult<Contact>;

    async fn find_contact(&self, user_id: Uuid, contact_id: Uuid) -> BackendResult<Option<Contact>>;

    /// Cache a conversation id on a contact edge
    async fn set_contact_conversation(&self, contact_id: Uuid, conversation_id: Uuid) -> BackendResult<()>;

    /// Persist a message; `Conflict` when the id is already taken
    async fn create_message(&self, message: NewMessage, status: MessageStatus) -> BackendResult<Message>;

    async fn find_message(&self, id: Uuid) -> BackendResult<Option<Message>>;

    /// Move the given messages of a conversation to `read`. Messages already
    /// read are untouched. Returns the number of messages that changed.
    async fn mark_messages_read(&self, ids: &[Uuid], conversation_id: Uuid) -> BackendResult<u64>;
}
