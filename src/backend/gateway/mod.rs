//! Realtime Gateway
//!
//! WebSocket entry points. `/api/messages` carries a user session;
//! `/api/statuses` is watch-only and accepts presence subscriptions.
//!
//! Frames are JSON text: `{"event": <name>, "data": <payload>}` in both
//! directions.

pub mod actor;
pub mod handler;
pub mod session;

pub use handler::{messages_socket, statuses_socket};
pub use session::{Session, SessionKind};
