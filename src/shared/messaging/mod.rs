//! Messaging Module
//!
//! This module contains all the data structures for the messaging system:
//!
//! - `User` / `UserStatus` - A user and their presence status
//! - `Contact` - A directional contact edge with its cached conversation
//! - `Message` - A message in a conversation
//! - `Conversation` - A one-to-one conversation between two users
//!
//! # Usage
//!
//! ```rust
//! use pulsechat::shared::messaging::{Contact, Conversation, Message, UserStatus};
//! ```

pub mod contact;
pub mod conversation;
pub mod message;
pub mod user;

// Re-export all types
pub use contact::Contact;
pub use conversation::{participant_pair, Conversation};
pub use message::{date_group, Attachment, Message, MessageStatus, NewMessage};
pub use user::{User, UserStatus};
