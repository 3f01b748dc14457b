/**
 * Gateway Session
 *
 * One realtime connection's view of the core: who it belongs to, which
 * connection id it holds in the hub, and how each client event maps onto
 * the presence and messaging services.
 *
 * `handle_frame` is the error boundary. Whatever fails while handling a
 * frame is reported to this connection as a single `error` event; the
 * connection stays open.
 */

use uuid::Uuid;

use crate::backend::error::{BackendError, BackendResult};
use crate::backend::realtime::{ConnectionId, ConnectionSender, Topic};
use crate::backend::server::state::AppState;
use crate::shared::event::{ClientEvent, ServerEvent};

/// What a connection is allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKind {
    /// A user session: counted for presence, joined to the user's rooms
    User(Uuid),
    /// A watch-only connection: presence subscriptions, nothing else
    Watcher,
}

pub struct Session {
    state: AppState,
    connection: ConnectionId,
    kind: SessionKind,
    /// Whether presence counted this session
    counted: bool,
}

impl Session {
    /// Register the connection and run the connect sequence:
    /// join the user room, join every conversation room, send
    /// `conversations`, then count the session for presence.
    pub async fn open(state: AppState, sender: ConnectionSender, kind: SessionKind) -> BackendResult<Self> {
        let connection = state.hub.register(sender);
        let mut session = Self {
            state,
            connection,
            kind,
            counted: false,
        };

        let SessionKind::User(user_id) = kind else {
            return Ok(session);
        };

        session.state.hub.join(connection, Topic::User(user_id));
        let conversation_ids = match session.state.store.conversation_ids_for_user(user_id).await {
            Ok(ids) => ids,
            Err(e) => {
                session.state.hub.unregister(connection);
                return Err(e);
            }
        };
        for conversation_id in &conversation_ids {
            session
                .state
                .hub
                .join(connection, Topic::Conversation(*conversation_id));
        }
        session.state.hub.send_to(
            connection,
            &ServerEvent::Conversations {
                ids: conversation_ids,
            },
        );

        match session.state.presence.on_connect(user_id).await {
            Ok(_) => session.counted = true,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "[Gateway] Session not counted for presence");
            }
        }

        tracing::info!(user_id = %user_id, connection_id = %connection, "[Gateway] Session opened");
        Ok(session)
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    /// Decode and handle one text frame, reporting failures as an `error` event
    pub async fn handle_frame(&self, text: &str) -> BackendResult<()> {
        let result = match ClientEvent::decode(text) {
            Ok(event) => {
                let name = event.name();
                self.dispatch(event).await.map_err(|e| {
                    tracing::debug!(event = name, error = %e, "[Gateway] Event failed");
                    e
                })
            }
            Err(e) => Err(BackendError::from(e)),
        };

        if let Err(e) = &result {
            tracing::warn!(
                connection_id = %self.connection,
                kind = e.kind(),
                error = %e,
                "[Gateway] Reporting error to client"
            );
            self.state
                .hub
                .send_to(self.connection, &ServerEvent::Error(e.to_payload()));
        }
        result
    }

    async fn dispatch(&self, event: ClientEvent) -> BackendResult<()> {
        match event {
            ClientEvent::GetStatus(request) => {
                self.state.hub.join(self.connection, Topic::Status(request.id));
                let status = self.state.presence.get_status(request.id).await?;
                self.state.hub.send_to(
                    self.connection,
                    &ServerEvent::Status {
                        user_id: request.id,
                        status,
                    },
                );
                Ok(())
            }
            ClientEvent::GetStatusOff(request) => {
                self.state.hub.leave(self.connection, Topic::Status(request.id));
                Ok(())
            }
            ClientEvent::Typing(payload) => {
                let user_id = self.acting_as(payload.user_id)?;
                self.state.messaging.typing(payload.conversation_id, user_id);
                Ok(())
            }
            ClientEvent::SendMessage(payload) => {
                self.acting_as(payload.sender_id)?;
                let (resolution, message) = self.state.messaging.send_message(payload).await?;
                tracing::debug!(
                    conversation_id = %resolution.conversation.id,
                    message_id = %message.id,
                    created = resolution.created,
                    "[Gateway] Message accepted"
                );
                Ok(())
            }
            ClientEvent::MessagesRead(payload) => {
                let reader = self.user_id()?;
                self.state
                    .messaging
                    .messages_read(&payload.ids, payload.conversation_id, reader)
                    .await?;
                Ok(())
            }
            ClientEvent::RequestUnreadCount(request) => {
                let user_id = self.user_id()?;
                self.state
                    .messaging
                    .request_unread_count(request.conversation_id, user_id)
                    .await?;
                Ok(())
            }
        }
    }

    fn user_id(&self) -> BackendResult<Uuid> {
        match self.kind {
            SessionKind::User(id) => Ok(id),
            SessionKind::Watcher => Err(BackendError::unauthorized(
                "watch-only connections can only subscribe to statuses",
            )),
        }
    }

    /// The session user, provided the payload claims to be them
    fn acting_as(&self, claimed: Uuid) -> BackendResult<Uuid> {
        let user_id = self.user_id()?;
        if claimed != user_id {
            return Err(BackendError::unauthorized(format!(
                "session of {} cannot act as {}",
                user_id, claimed
            )));
        }
        Ok(user_id)
    }

    /// Leave every room, then let presence arm the offline flip if this was
    /// the user's last session. No events are accepted afterwards.
    pub async fn close(self) {
        self.state.hub.unregister(self.connection);

        if let (SessionKind::User(user_id), true) = (self.kind, self.counted) {
            if let Err(e) = self.state.presence.on_disconnect(user_id).await {
                tracing::error!(user_id = %user_id, error = %e, "[Gateway] Failed to record disconnect");
            }
            tracing::info!(user_id = %user_id, connection_id = %self.connection, "[Gateway] Session closed");
        }
    }
}
