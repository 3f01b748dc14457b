/**
 * Realtime Event Protocol
 *
 * This module defines the frames exchanged over a realtime connection.
 * Every frame is a JSON text message of the shape
 * `{"event": "<name>", "data": {...}}`.
 *
 * Client frames decode into the tagged [`ClientEvent`] enum, so a frame
 * with an unknown name or a payload missing a field is rejected before
 * any handler runs. Server frames are built from [`ServerEvent`], whose
 * event names carry the conversation or user suffix clients listen on
 * (`new_message_<conversationId>`, `status_<userId>`, ...).
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::shared::error::SharedError;
use crate::shared::messaging::{Attachment, Message, NewMessage, UserStatus};

/// Event sent by a client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Typing indicator, fire-and-forget
    Typing(TypingPayload),
    /// Send a message, resolving the conversation when no id is given
    SendMessage(SendMessagePayload),
    /// Bulk read acknowledgment
    MessagesRead(MessagesReadPayload),
    /// Ask for the current unread count of a conversation
    RequestUnreadCount(UnreadCountRequest),
    /// Start watching a user's presence
    GetStatus(StatusRequest),
    /// Stop watching a user's presence
    GetStatusOff(StatusRequest),
}

impl ClientEvent {
    /// Decode a text frame
    pub fn decode(text: &str) -> Result<Self, SharedError> {
        serde_json::from_str(text).map_err(|e| SharedError::validation("frame", e.to_string()))
    }

    /// Name of the event, for logging
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Typing(_) => "typing",
            ClientEvent::SendMessage(_) => "send_message",
            ClientEvent::MessagesRead(_) => "messages_read",
            ClientEvent::RequestUnreadCount(_) => "request_unread_count",
            ClientEvent::GetStatus(_) => "get_status",
            ClientEvent::GetStatusOff(_) => "get_status_off",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub user_id: Uuid,
    pub conversation_id: Uuid,
}

/// Payload of `send_message`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    /// Caller-supplied message id
    pub id: Uuid,
    /// Caller-supplied creation time
    pub created_at: DateTime<Utc>,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    /// Absent (or null) for the first message between two users
    #[serde(default)]
    pub conversation_id: Option<Uuid>,
}

impl SendMessagePayload {
    /// Ingestion input once the conversation is known
    pub fn into_new_message(self, conversation_id: Uuid) -> NewMessage {
        NewMessage {
            id: self.id,
            created_at: self.created_at,
            content: self.content,
            sender_id: self.sender_id,
            conversation_id,
            attachments: self.attachments,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessagesReadPayload {
    pub ids: Vec<Uuid>,
    pub conversation_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountRequest {
    pub conversation_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusRequest {
    pub id: Uuid,
}

/// Structured body of an `error` event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorPayload {
    /// Taxonomy name: `not_found`, `conflict`, `unauthorized`, `validation` or `internal`
    pub kind: String,
    pub message: String,
}

/// Event sent by the server
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    NewMessage { message: Message },
    Typing { conversation_id: Uuid, user_id: Uuid },
    MessagesRead { conversation_id: Uuid, ids: Vec<Uuid> },
    UnreadCount { conversation_id: Uuid, unread_count: u64 },
    Status { user_id: Uuid, status: UserStatus },
    NewConversation { id: Uuid },
    NewConversationOpened { id: Uuid },
    /// Conversation rooms joined on connect
    Conversations { ids: Vec<Uuid> },
    Error(ErrorPayload),
}

impl ServerEvent {
    /// Event name as seen by clients
    pub fn name(&self) -> String {
        match self {
            ServerEvent::NewMessage { message } => format!("new_message_{}", message.conversation_id),
            ServerEvent::Typing { conversation_id, .. } => format!("typing_{}", conversation_id),
            ServerEvent::MessagesRead { conversation_id, .. } => {
                format!("messages_read_{}", conversation_id)
            }
            ServerEvent::UnreadCount { conversation_id, .. } => {
                format!("unread_count_{}", conversation_id)
            }
            ServerEvent::Status { user_id, .. } => format!("status_{}", user_id),
            ServerEvent::NewConversation { .. } => "new_conversation".to_string(),
            ServerEvent::NewConversationOpened { .. } => "new_conversation_opened".to_string(),
            ServerEvent::Conversations { .. } => "conversations".to_string(),
            ServerEvent::Error(_) => "error".to_string(),
        }
    }

    /// Build the wire frame
    pub fn to_frame(&self) -> OutboundFrame {
        let data = match self {
            ServerEvent::NewMessage { message } => json!({
                "message": message,
                "dateGroup": message.date_group(),
            }),
            ServerEvent::Typing { user_id, .. } => json!({ "userId": user_id }),
            ServerEvent::MessagesRead { ids, .. } => json!({ "ids": ids }),
            ServerEvent::UnreadCount { unread_count, .. } => json!({ "unreadCount": unread_count }),
            ServerEvent::Status { status, .. } => json!({ "status": status }),
            ServerEvent::NewConversation { id } | ServerEvent::NewConversationOpened { id } => {
                json!({ "id": id })
            }
            ServerEvent::Conversations { ids } => json!({ "ids": ids }),
            ServerEvent::Error(payload) => json!({ "error": payload }),
        };

        OutboundFrame {
            event: self.name(),
            data,
        }
    }
}

/// A server frame as it travels over the wire and between instances
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutboundFrame {
    pub event: String,
    pub data: serde_json::Value,
}

impl OutboundFrame {
    /// Encode as a text frame
    pub fn to_text(&self) -> Result<String, SharedError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a text frame (used by clients and tests)
    pub fn parse(text: &str) -> Result<Self, SharedError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl From<ServerEvent> for OutboundFrame {
    fn from(event: ServerEvent) -> Self {
        event.to_frame()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::messaging::MessageStatus;
    use chrono::TimeZone;

    #[test]
    fn test_decode_send_message_without_conversation() {
        let sender = Uuid::new_v4();
        let receiver = Uuid::new_v4();
        let id = Uuid::new_v4();
        let text = json!({
            "event": "send_message",
            "data": {
                "id": id,
                "createdAt": "2024-05-01T10:00:00Z",
                "content": "hi",
                "senderId": sender,
                "receiverId": receiver,
                "conversationId": null,
            }
        })
        .to_string();

        match ClientEvent::decode(&text).unwrap() {
            ClientEvent::SendMessage(payload) => {
                assert_eq!(payload.id, id);
                assert_eq!(payload.conversation_id, None);
                assert!(payload.attachments.is_empty());
            }
            other => panic!("Expected SendMessage, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_unknown_event() {
        let err = ClientEvent::decode(r#"{"event":"shout","data":{}}"#).unwrap_err();
        assert!(matches!(err, SharedError::ValidationError { .. }));
    }

    #[test]
    fn test_decode_rejects_missing_field() {
        let text = json!({"event": "messages_read", "data": {"ids": []}}).to_string();
        assert!(ClientEvent::decode(&text).is_err());
    }

    #[test]
    fn test_new_message_frame() {
        let message = Message {
            id: Uuid::new_v4(),
            conversation_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            content: "hi".to_string(),
            attachments: vec![],
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
            status: MessageStatus::Delivered,
        };
        let frame = ServerEvent::NewMessage {
            message: message.clone(),
        }
        .to_frame();

        assert_eq!(frame.event, format!("new_message_{}", message.conversation_id));
        assert_eq!(frame.data["dateGroup"], "2024-05-01");
        assert_eq!(frame.data["message"]["content"], "hi");
    }

    #[test]
    fn test_error_frame() {
        let frame = ServerEvent::Error(ErrorPayload {
            kind: "not_found".to_string(),
            message: "conversation missing".to_string(),
        })
        .to_frame();

        assert_eq!(frame.event, "error");
        assert_eq!(frame.data["error"]["kind"], "not_found");
    }

    #[test]
    fn test_frame_text_round_trip() {
        let frame = ServerEvent::UnreadCount {
            conversation_id: Uuid::new_v4(),
            unread_count: 3,
        }
        .to_frame();
        let parsed = OutboundFrame::parse(&frame.to_text().unwrap()).unwrap();
        assert_eq!(parsed, frame);
    }
}
