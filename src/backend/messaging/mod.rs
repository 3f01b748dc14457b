//! Messaging Module
//!
//! Conversation resolution, message ingestion with fan-out, and unread
//! tracking.
//!
//! # Module Structure
//!
//! ```text
//! messaging/
//! ├── mod.rs      - Module exports
//! ├── resolver.rs - Idempotent find-or-create of one-to-one conversations
//! ├── ingest.rs   - Persist, move the last-message pointer, fan out
//! ├── unread.rs   - Per-recipient unread markers and counts
//! └── service.rs  - Facade used by the gateway
//! ```

pub mod ingest;
pub mod resolver;
pub mod service;
pub mod unread;

pub use ingest::MessageIngestor;
pub use resolver::{ConversationResolver, Resolution};
pub use service::MessagingService;
pub use unread::UnreadCounter;
