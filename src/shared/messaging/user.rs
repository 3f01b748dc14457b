//! User Data Structure
//!
//! Represents a user and the presence status shadowed in the coordination store.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::shared::error::SharedError;

const LAST_ACTIVE_PREFIX: &str = "lastActive:";

/// Presence status of a user.
///
/// The text form is what the persistent store, the status cache and the
/// wire all carry: `online`, `offline` or `lastActive:<unix-millis>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserStatus {
    Online,
    Offline,
    /// Offline since the given instant
    LastActive(DateTime<Utc>),
}

impl UserStatus {
    /// Offline marker carrying the time the user was last seen.
    pub fn last_active(at: DateTime<Utc>) -> Self {
        Self::LastActive(at)
    }

    pub fn is_online(&self) -> bool {
        matches!(self, Self::Online)
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => f.write_str("online"),
            Self::Offline => f.write_str("offline"),
            Self::LastActive(at) => write!(f, "{}{}", LAST_ACTIVE_PREFIX, at.timestamp_millis()),
        }
    }
}

impl FromStr for UserStatus {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            other => {
                let millis = other
                    .strip_prefix(LAST_ACTIVE_PREFIX)
                    .and_then(|raw| raw.parse::<i64>().ok())
                    .ok_or_else(|| {
                        SharedError::validation("status", format!("unknown status `{}`", other))
                    })?;
                Utc.timestamp_millis_opt(millis)
                    .single()
                    .map(Self::LastActive)
                    .ok_or_else(|| {
                        SharedError::validation("status", format!("timestamp out of range: {}", millis))
                    })
            }
        }
    }
}

impl Serialize for UserStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for UserStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A registered user as seen by the realtime core
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Unique user ID
    pub id: Uuid,
    /// Display login
    pub login: String,
    /// Authoritative presence status
    pub status: UserStatus,
}
