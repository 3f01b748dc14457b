//! Route Configuration Module
//!
//! ```text
//! routes/
//! ├── mod.rs            - Module exports
//! ├── router.rs         - Router assembly, health check, tracing layer
//! └── gateway_routes.rs - WebSocket endpoints
//! ```
//!
//! # Routes
//!
//! - `GET /health` - liveness, `{"status":"ok"}`
//! - `GET /api/messages?userId=<id>` - user session socket
//! - `GET /api/statuses` - watch-only presence socket

/// Main router creation
pub mod router;

/// WebSocket endpoints
pub mod gateway_routes;

pub use router::create_router;
