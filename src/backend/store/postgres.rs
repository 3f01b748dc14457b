//! PostgreSQL implementation of the persistent store
//!
//! Unique-violation and not-found errors are mapped into the backend
//! taxonomy by `From<sqlx::Error>`, so `?` is enough at every call site.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::backend::error::{BackendError, BackendResult};
use crate::backend::store::PersistentStore;
use crate::shared::messaging::{
    participant_pair, Attachment, Contact, Conversation, Message, MessageStatus, NewMessage, User,
    UserStatus,
};

/// Persistent store backed by a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn user_from_row(row: &PgRow) -> BackendResult<User> {
    Ok(User {
        id: row.get("id"),
        login: row.get("login"),
        status: row.get::<String, _>("status").parse::<UserStatus>()?,
    })
}

fn conversation_from_row(row: &PgRow) -> Conversation {
    Conversation {
        id: row.get("id"),
        participants: [row.get("participant_low"), row.get("participant_high")],
        last_message_id: row.get("last_message_id"),
        created_at: row.get("created_at"),
    }
}

fn contact_from_row(row: &PgRow) -> Contact {
    Contact {
        id: row.get("id"),
        user_id: row.get("user_id"),
        contact_id: row.get("contact_id"),
        conversation_id: row.get("conversation_id"),
    }
}

fn message_from_row(row: &PgRow) -> BackendResult<Message> {
    let attachments: Vec<Attachment> = serde_json::from_str(row.get::<&str, _>("attachments"))?;
    Ok(Message {
        id: row.get("id"),
        conversation_id: row.get("conversation_id"),
        sender_id: row.get("sender_id"),
        content: row.get("content"),
        attachments,
        created_at: row.get("created_at"),
        status: row.get::<String, _>("status").parse::<MessageStatus>()?,
    })
}

#[async_trait]
impl PersistentStore for PostgresStore {
    async fn create_user(&self, login: &str) -> BackendResult<User> {
        let id = Uuid::new_v4();
        let status = UserStatus::Offline;

        sqlx::query(
            r#"
            INSERT INTO users (id, login, status, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(id)
        .bind(login)
        .bind(status.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(User {
            id,
            login: login.to_string(),
            status,
        })
    }

    async fn find_user(&self, id: Uuid) -> BackendResult<Option<User>> {
        let row = sqlx::query("SELECT id, login, status FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(user_from_row).transpose()
    }

    async fn update_user_status(&self, id: Uuid, status: UserStatus) -> BackendResult<()> {
        let result = sqlx::query("UPDATE users SET status = $1 WHERE id = $2")
            .bind(status.to_string())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(BackendError::not_found(format!("user {} does not exist", id)));
        }
        Ok(())
    }

    async fn find_conversation(&self, id: Uuid) -> BackendResult<Option<Conversation>> {
        let row = sqlx::query(
            r#"
            SELECT id, participant_low, participant_high, last_message_id, created_at
            FROM conversations
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(conversation_from_row))
    }

    async fn find_conversation_between(&self, a: Uuid, b: Uuid) -> BackendResult<Option<Conversation>> {
        let [low, high] = participant_pair(a, b);
        let row = sqlx::query(
            r#"
            SELECT id, participant_low, participant_high, last_message_id, created_at
            FROM conversations
            WHERE participant_low = $1 AND participant_high = $2
            "#,
        )
        .bind(low)
        .bind(high)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(conversation_from_row))
    }

    async fn create_conversation(&self, a: Uuid, b: Uuid) -> BackendResult<Conversation> {
        let conversation = Conversation::new_direct(a, b);
        let [low, high] = conversation.participants;

        sqlx::query(
            r#"
            INSERT INTO conversations (id, participant_low, participant_high, last_message_id, created_at)
            VALUES ($1, $2, $3, NULL, $4)
            "#,
        )
        .bind(conversation.id)
        .bind(low)
        .bind(high)
        .bind(conversation.created_at)
        .execute(&self.pool)
        .await?;

        Ok(conversation)
    }

    async fn conversation_ids_for_user(&self, user_id: Uuid) -> BackendResult<Vec<Uuid>> {
        let rows = sqlx::query(
            r#"
            SELECT id FROM conversations
            WHERE participant_low = $1 OR participant_high = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|row| row.get("id")).collect())
    }

    async fn set_last_message(&self, conversation_id: Uuid, message_id: Uuid) -> BackendResult<()> {
        let result = sqlx::query("UPDATE conversations SET last_message_id = $1 WHERE id = $2")
            .bind(message_id)
            .bind(conversation_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(BackendError::not_found(format!(
                "conversation {} does not exist",
                conversation_id
            )));
        }
        Ok(())
    }

    async fn create_contact(&self, user_id: Uuid, contact_id: Uuid) -> BackendResult<Contact> {
        let contact = Contact::new(user_id, contact_id);

        sqlx::query(
            r#"
            INSERT INTO contacts (id, user_id, contact_id, conversation_id, created_at)
            VALUES ($1, $2, $3, NULL, $4)
            "#,
        )
        .bind(contact.id)
        .bind(user_id)
        .bind(contact_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(contact)
    }

    async fn find_contact(&self, user_id: Uuid, contact_id: Uuid) -> BackendResult<Option<Contact>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, contact_id, conversation_id
            FROM contacts
            WHERE user_id = $1 AND contact_id = $2
            "#,
        )
        .bind(user_id)
        .bind(contact_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(contact_from_row))
    }

    async fn set_contact_conversation(&self, contact_id: Uuid, conversation_id: Uuid) -> BackendResult<()> {
        let result = sqlx::query("UPDATE contacts SET conversation_id = $1 WHERE id = $2")
            .bind(conversation_id)
            .bind(contact_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(BackendError::not_found(format!("contact {} does not exist", contact_id)));
        }
        Ok(())
    }

    async fn create_message(&self, message: NewMessage, status: MessageStatus) -> BackendResult<Message> {
        let attachments = serde_json::to_string(&message.attachments)?;

        sqlx::query(
            r#"
            INSERT INTO messages (id, conversation_id, sender_id, content, attachments, created_at, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(message.id)
        .bind(message.conversation_id)
        .bind(message.sender_id)
        .bind(&message.content)
        .bind(attachments)
        .bind(message.created_at)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(message.into_message(status))
    }

    async fn find_message(&self, id: Uuid) -> BackendResult<Option<Message>> {
        let row = sqlx::query(
            r#"
            SELECT id, conversation_id, sender_id, content, attachments, created_at, status
            FROM messages
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(message_from_row).transpose()
    }

    async fn mark_messages_read(&self, ids: &[Uuid], conversation_id: Uuid) -> BackendResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        // `read` is the last status, so the filter alone keeps the update monotonic
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET status = 'read'
            WHERE id = ANY($1) AND conversation_id = $2 AND status <> 'read'
            "#,
        )
        .bind(ids.to_vec())
        .bind(conversation_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
