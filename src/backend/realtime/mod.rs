//! Real-time Delivery Module
//!
//! Rooms, connections, and fan-out of server events.
//!
//! # Module Structure
//!
//! ```text
//! realtime/
//! ├── mod.rs   - Module exports and documentation
//! ├── hub.rs   - Connection registry and topic membership
//! └── relay.rs - Redis pub/sub relay between server instances
//! ```
//!
//! # Topics
//!
//! - `User(id)` - every live session of a user; receives `unread_count_*`,
//!   `new_conversation` and `new_conversation_opened`
//! - `Conversation(id)` - sessions of both participants; receives
//!   `new_message_*`, `typing_*` and `messages_read_*`
//! - `Status(id)` - opt-in presence watchers; receives `status_*`

pub mod hub;
pub mod relay;

pub use hub::{ConnectionId, ConnectionSender, RoomHub, Topic};
pub use relay::{FanoutRelay, RelayAction, RelayEnvelope};
