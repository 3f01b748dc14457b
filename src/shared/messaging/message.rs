//! Chat Message Data Structure
//!
//! Represents a message in a conversation.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shared::error::SharedError;

/// Delivery status of a message.
///
/// Variants are declared in transition order so the derived `Ord` matches
/// the only allowed direction: `Sent` -> `Delivered` -> `Read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    /// Move towards `next`, never backwards.
    pub fn advance(self, next: MessageStatus) -> MessageStatus {
        self.max(next)
    }

    /// Convert to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Read => "read",
        }
    }
}

impl FromStr for MessageStatus {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(MessageStatus::Sent),
            "delivered" => Ok(MessageStatus::Delivered),
            "read" => Ok(MessageStatus::Read),
            other => Err(SharedError::validation(
                "status",
                format!("unknown message status `{}`", other),
            )),
        }
    }
}

/// Media attached to a message; the media host itself is external.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub preview_url: String,
    pub original_url: String,
}

/// Represents a persisted chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Caller-supplied message ID
    pub id: Uuid,
    /// Conversation this message belongs to
    pub conversation_id: Uuid,
    /// User who sent the message
    pub sender_id: Uuid,
    /// Message text
    pub content: String,
    /// Attachments in the order the sender supplied them
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    /// Caller-supplied creation time
    pub created_at: DateTime<Utc>,
    /// Delivery status
    pub status: MessageStatus,
}

impl Message {
    /// Label used by clients to group messages by day.
    pub fn date_group(&self) -> String {
        date_group(self.created_at)
    }
}

/// Input for message ingestion. `id` and `created_at` come from the client
/// so offline-composed messages can be replayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub content: String,
    pub sender_id: Uuid,
    pub conversation_id: Uuid,
    pub attachments: Vec<Attachment>,
}

impl NewMessage {
    /// Materialize the stored form with the given initial status
    pub fn into_message(self, status: MessageStatus) -> Message {
        Message {
            id: self.id,
            conversation_id: self.conversation_id,
            sender_id: self.sender_id,
            content: self.content,
            attachments: self.attachments,
            created_at: self.created_at,
            status,
        }
    }
}

/// Date-group label for a creation time: the UTC calendar date, `YYYY-MM-DD`.
pub fn date_group(created_at: DateTime<Utc>) -> String {
    created_at.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_status_never_moves_backward() {
        assert_eq!(MessageStatus::Read.advance(MessageStatus::Delivered), MessageStatus::Read);
        assert_eq!(MessageStatus::Delivered.advance(MessageStatus::Read), MessageStatus::Read);
        assert_eq!(MessageStatus::Sent.advance(MessageStatus::Delivered), MessageStatus::Delivered);
    }

    #[test]
    fn test_status_round_trips_through_storage_form() {
        for status in [MessageStatus::Sent, MessageStatus::Delivered, MessageStatus::Read] {
            assert_eq!(status.as_str().parse::<MessageStatus>().unwrap(), status);
        }
        assert!("seen".parse::<MessageStatus>().is_err());
    }

    #[test]
    fn test_date_group() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 23, 59, 0).unwrap();
        assert_eq!(date_group(at), "2024-03-09");
    }

    #[test]
    fn test_message_wire_shape() {
        let message = NewMessage {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            content: "hi".to_string(),
            sender_id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            attachments: vec![Attachment {
                preview_url: "p".to_string(),
                original_url: "o".to_string(),
            }],
        }
        .into_message(MessageStatus::Delivered);

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["status"], "delivered");
        assert_eq!(json["attachments"][0]["previewUrl"], "p");
        assert!(json.get("conversationId").is_some());
    }
}
