//! Backend Error Module
//!
//! This module defines the error taxonomy of the realtime core. The same
//! type is returned by the stores, the presence tracker and the messaging
//! services, turned into an `error` event at the gateway boundary, and
//! into an HTTP response on the plain HTTP surface.
//!
//! # Module Structure
//!
//! ```text
//! error/
//! ├── mod.rs        - Module exports and documentation
//! ├── types.rs      - Error type definitions
//! └── conversion.rs - From impls for store errors, IntoResponse
//! ```

/// Error type definitions
pub mod types;

/// Error conversion implementations
pub mod conversion;

// Re-export commonly used types
pub use types::BackendError;

/// Result alias used across the backend
pub type BackendResult<T> = Result<T, BackendError>;
