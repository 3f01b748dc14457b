//! Conversation Data Structure
//!
//! Represents a one-to-one conversation between two users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a conversation between exactly two users
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Unique conversation ID
    pub id: Uuid,
    /// Participant user IDs, normalized so the smaller ID comes first
    pub participants: [Uuid; 2],
    /// Most recent message in the conversation
    pub last_message_id: Option<Uuid>,
    /// When the conversation was created
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new conversation between two users
    pub fn new_direct(user1: Uuid, user2: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            participants: participant_pair(user1, user2),
            last_message_id: None,
            created_at: Utc::now(),
        }
    }

    /// Check if user is a participant
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.participants.contains(&user_id)
    }

    /// Get the other participant
    pub fn other_participant(&self, current_user_id: Uuid) -> Option<Uuid> {
        if !self.has_participant(current_user_id) {
            return None;
        }
        self.participants
            .iter()
            .find(|&&id| id != current_user_id)
            .copied()
    }
}

/// Normalize an unordered pair so it can back a uniqueness constraint.
pub fn participant_pair(a: Uuid, b: Uuid) -> [Uuid; 2] {
    if a <= b {
        [a, b]
    } else {
        [b, a]
    }
}
