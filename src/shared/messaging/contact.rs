//! Contact Data Structure
//!
//! A directional edge from one user to another, with the conversation
//! between them cached once the first message is exchanged.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a contact edge `user_id -> contact_id`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Unique contact ID
    pub id: Uuid,
    /// The user who owns this contact entry
    pub user_id: Uuid,
    /// The user this entry points to
    pub contact_id: Uuid,
    /// Conversation between the two users, backfilled lazily
    pub conversation_id: Option<Uuid>,
}

impl Contact {
    /// Create a new contact edge without a cached conversation
    pub fn new(user_id: Uuid, contact_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            contact_id,
            conversation_id: None,
        }
    }
}
