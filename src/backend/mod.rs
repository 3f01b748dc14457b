//! Backend Module
//!
//! Server-side code for pulsechat: the storage adapters, the realtime core
//! and the Axum WebSocket gateway.
//!
//! This module is only compiled when the `ssr` feature is enabled.
//!
//! # Architecture
//!
//! - **`store`** - Persistent store (users, conversations, contacts, messages)
//! - **`coordination`** - Shared ephemeral state (session counters, status
//!   cache, deferred offline entries, unread markers)
//! - **`realtime`** - Room hub and cross-instance fan-out relay
//! - **`presence`** - Session counting and debounced offline flips
//! - **`messaging`** - Conversation resolution, ingestion, unread tracking
//! - **`gateway`** - WebSocket endpoints and per-connection sessions
//! - **`server`** - State, backing service connections, initialization
//! - **`routes`** - Router assembly
//! - **`error`** - Backend error taxonomy
//!
//! # Module Structure
//!
//! ```text
//! backend/
//! ├── mod.rs          - Module exports and documentation
//! ├── main.rs         - Server binary
//! ├── server/         - Server initialization and state
//! ├── routes/         - Route configuration
//! ├── gateway/        - WebSocket sessions
//! ├── presence/       - Presence tracker and clock
//! ├── messaging/      - Resolver, ingestor, unread counter
//! ├── realtime/       - Rooms and relay
//! ├── store/          - PostgreSQL / in-memory store
//! ├── coordination/   - Redis / in-memory coordination
//! └── error/          - Error types
//! ```
//!
//! # Single vs. multi instance
//!
//! With `DATABASE_URL` and `REDIS_URL` configured, any number of instances
//! can serve the same users: presence state lives in Redis and room fan-out
//! is relayed over Redis pub/sub. Without them the in-memory adapters are
//! used and the server is a single instance.

/// Backend error types
pub mod error;

/// Persistent store adapters
pub mod store;

/// Coordination store adapters
pub mod coordination;

/// Rooms and cross-instance fan-out
pub mod realtime;

/// Presence and session tracking
pub mod presence;

/// Conversations, messages and unread counts
pub mod messaging;

/// WebSocket gateway
pub mod gateway;

/// Server setup and configuration
pub mod server;

/// Route configuration
pub mod routes;

pub use error::BackendError;
pub use server::{create_app, App, AppState};
