//! Presence Module
//!
//! Session counting, debounced online/offline transitions, and the
//! periodic sweep that promotes due offline flips.

pub mod clock;
pub mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use tracker::{PresenceSettings, PresenceTracker, SweepReport};
