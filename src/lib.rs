//! Pulsechat - Main Library
//!
//! Pulsechat is a realtime chat backend. Its core is presence and session
//! tracking across many connections per user and many server instances,
//! idempotent one-to-one conversation resolution, message ingestion with
//! room fan-out, and per-recipient unread tracking.
//!
//! # Module Structure
//!
//! - **`shared`** - Types usable by the server and by any client
//!   - Users, conversations, messages, contact edges
//!   - Realtime client/server events
//!   - Configuration and validation errors
//!
//! - **`backend`** - Server-side code (only compiled with `ssr` feature)
//!   - Persistent store (PostgreSQL / in-memory)
//!   - Coordination store (Redis / in-memory)
//!   - Presence tracker, conversation resolver, message ingestion, unread counter
//!   - Axum WebSocket gateway and room fan-out
//!
//! # Feature Flags
//!
//! - **`ssr`** (default) - enables the backend and the server binary
//!
//! # Usage
//!
//! ```rust,no_run
//! use pulsechat::backend::server::init::create_app;
//! use pulsechat::shared::AppConfig;
//!
//! # async fn example() {
//! let config = AppConfig::load().unwrap();
//! let app = create_app(&config).await;
//! // Serve `app.router` with axum
//! # }
//! ```

/// Shared types and data structures
pub mod shared;

/// Backend server-side code
#[cfg(feature = "ssr")]
pub mod backend;
