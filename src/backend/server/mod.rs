//! Server Module
//!
//! Initialization and wiring of the Axum server.
//!
//! # Module Structure
//!
//! ```text
//! server/
//! ├── mod.rs          - Module exports and documentation
//! ├── state.rs        - AppState and FromRef implementations
//! ├── config.rs       - Connecting PostgreSQL and Redis
//! └── init.rs         - App assembly and background tasks
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use pulsechat::backend::server::create_app;
//! use pulsechat::shared::AppConfig;
//!
//! # async fn example() {
//! let config = AppConfig::default();
//! let app = create_app(&config).await;
//! let listener = tokio::net::TcpListener::bind(config.listen_addr()).await.unwrap();
//! axum::serve(listener, app.router).await.unwrap();
//! # }
//! ```

/// Application state management
pub mod state;

/// Backing service connections
pub mod config;

/// Server initialization
pub mod init;

pub use init::{create_app, App};
pub use state::AppState;
