//! Shared Module
//!
//! This module contains types and data structures that are shared between
//! the server and any client of the realtime protocol. These types are used
//! for serialization over the WebSocket gateway and for persistence.
//!
//! # Overview
//!
//! The shared module provides platform-agnostic types that can be used
//! in both server and client code:
//!
//! - **`messaging`** - Users, conversations, messages, contact edges, statuses
//! - **`event`** - Client and server realtime events
//! - **`error`** - Validation errors for wire values
//! - **`config`** - Application configuration and its builder

/// Realtime event protocol
pub mod event;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

/// Messaging data model
pub mod messaging;

/// Re-export commonly used types for convenience
pub use event::{ClientEvent, OutboundFrame, ServerEvent};
pub use error::SharedError;
pub use config::{AppConfig, AppConfigBuilder, ConfigError};
