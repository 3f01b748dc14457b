/**
 * Presence Tracker
 *
 * Tracks live sessions per user and the user's online/offline status.
 *
 * # State
 *
 * All presence state lives in the coordination store so any instance can
 * serve any user:
 *
 * - `active_sessions:<userId>` - live session counter (never negative)
 * - `user_status:<userId>` - cached status, shadowing the user row
 * - `disconnect_timers` - sorted set of users awaiting their offline flip,
 *   scored by due time
 *
 * # Debounce
 *
 * Closing the last session does not flip the user offline. It arms a
 * deferred entry due after the grace period; a reconnect before then
 * removes the entry. A periodic sweep flips whatever is due. Removing the
 * entry is the commit point: only the sweeper whose `ZREM` succeeds
 * broadcasts, so sweeps on several instances never double-broadcast.
 */

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::backend::coordination::{keys, SharedCoordination};
use crate::backend::error::{BackendError, BackendResult};
use crate::backend::presence::clock::Clock;
use crate::backend::realtime::{RoomHub, Topic};
use crate::backend::store::SharedStore;
use crate::shared::config::AppConfig;
use crate::shared::event::ServerEvent;
use crate::shared::messaging::UserStatus;

/// Timing knobs of the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceSettings {
    /// Quiet period between the last session closing and the offline flip
    pub offline_grace: Duration,
    /// TTL of cached status entries
    pub status_ttl: Duration,
    /// How often the sweeper runs
    pub sweep_interval: Duration,
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            offline_grace: Duration::from_secs(30),
            status_ttl: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(10),
        }
    }
}

impl From<&AppConfig> for PresenceSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            offline_grace: config.offline_grace(),
            status_ttl: config.status_ttl(),
            sweep_interval: config.sweep_interval(),
        }
    }
}

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Users flipped offline and broadcast
    pub flipped: usize,
    /// Entries another sweeper or a reconnect got to first
    pub skipped: usize,
    /// Users whose flip failed; re-armed for the next sweep
    pub failed: usize,
}

pub struct PresenceTracker {
    store: SharedStore,
    coordination: SharedCoordination,
    hub: Arc<RoomHub>,
    clock: Arc<dyn Clock>,
    settings: PresenceSettings,
}

impl PresenceTracker {
    pub fn new(
        store: SharedStore,
        coordination: SharedCoordination,
        hub: Arc<RoomHub>,
        clock: Arc<dyn Clock>,
        settings: PresenceSettings,
    ) -> Self {
        Self {
            store,
            coordination,
            hub,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> PresenceSettings {
        self.settings
    }

    /// A session opened. Returns `true` when the user was flipped online.
    ///
    /// The status is read after the session is counted. A sweep that flips
    /// the user concurrently either sees the count and skips, or writes its
    /// flip first and is then overridden here, or writes it last and
    /// restores `online` itself after re-reading the count.
    ///
    /// `Err` means the session was not counted and must not be paired with
    /// `on_disconnect`. Once counted, later failures are logged instead.
    pub async fn on_connect(&self, user_id: Uuid) -> BackendResult<bool> {
        let sessions = self
            .coordination
            .incr(&keys::active_sessions(user_id))
            .await?;

        match self.settle_online(user_id).await {
            Ok(flipped) => {
                if flipped {
                    tracing::info!(user_id = %user_id, sessions, "[Presence] User online");
                }
                Ok(flipped)
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "[Presence] Session counted but status not settled");
                Ok(false)
            }
        }
    }

    async fn settle_online(&self, user_id: Uuid) -> BackendResult<bool> {
        // Cancel any pending flip, even when the user never left `online`
        let cancelled = self
            .coordination
            .zrem(keys::DISCONNECT_TIMERS, &user_id.to_string())
            .await?;
        if cancelled {
            tracing::debug!(user_id = %user_id, "[Presence] Reconnect within grace period");
        }

        if self.get_status(user_id).await?.is_online() {
            return Ok(false);
        }

        self.apply_status(user_id, UserStatus::Online).await?;
        Ok(true)
    }

    /// A session closed. Returns the due time of the armed offline flip when
    /// this was the user's last session.
    pub async fn on_disconnect(&self, user_id: Uuid) -> BackendResult<Option<DateTime<Utc>>> {
        let remaining = self
            .coordination
            .decr_clamped(&keys::active_sessions(user_id))
            .await?;
        if remaining > 0 {
            return Ok(None);
        }

        let due = self.clock.now() + self.grace();
        self.coordination
            .zadd(
                keys::DISCONNECT_TIMERS,
                &user_id.to_string(),
                due.timestamp_millis(),
            )
            .await?;
        tracing::debug!(user_id = %user_id, due = %due, "[Presence] Offline flip armed");
        Ok(Some(due))
    }

    /// Current status: cache first, then the user row (which seeds the cache)
    pub async fn get_status(&self, user_id: Uuid) -> BackendResult<UserStatus> {
        if let Some(raw) = self.coordination.get(&keys::user_status(user_id)).await? {
            match raw.parse::<UserStatus>() {
                Ok(status) => return Ok(status),
                Err(e) => {
                    tracing::warn!(user_id = %user_id, error = %e, "[Presence] Ignoring unreadable cached status");
                }
            }
        }

        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| BackendError::not_found(format!("user {} does not exist", user_id)))?;
        self.cache_status(user_id, user.status).await?;
        Ok(user.status)
    }

    /// Live session count of a user
    pub async fn session_count(&self, user_id: Uuid) -> BackendResult<i64> {
        match self.coordination.get(&keys::active_sessions(user_id)).await? {
            Some(raw) => raw.parse().map_err(|_| {
                BackendError::internal(format!("session counter of {} is not an integer", user_id))
            }),
            None => Ok(0),
        }
    }

    /// Flip every user whose deferred entry is due
    pub async fn sweep(&self) -> BackendResult<SweepReport> {
        let now = self.clock.now();
        let due = self
            .coordination
            .zrange_by_score(keys::DISCONNECT_TIMERS, now.timestamp_millis())
            .await?;

        let mut report = SweepReport::default();
        for (member, due_at) in due {
            match self.sweep_one(&member, due_at, now).await {
                Ok(true) => report.flipped += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(member = %member, error = %e, "[Presence] Offline flip failed, will retry");
                }
            }
        }

        if report.flipped > 0 || report.failed > 0 {
            tracing::info!(
                flipped = report.flipped,
                skipped = report.skipped,
                failed = report.failed,
                "[Presence] Sweep finished"
            );
        }
        Ok(report)
    }

    async fn sweep_one(&self, member: &str, due_at: i64, now: DateTime<Utc>) -> BackendResult<bool> {
        let user_id = match Uuid::parse_str(member) {
            Ok(id) => id,
            Err(_) => {
                tracing::warn!(member = %member, "[Presence] Dropping malformed deferred entry");
                self.coordination.zrem(keys::DISCONNECT_TIMERS, member).await?;
                return Ok(false);
            }
        };

        // Commit point: whoever removes the entry owns the flip
        if !self.coordination.zrem(keys::DISCONNECT_TIMERS, member).await? {
            return Ok(false);
        }

        if self.session_count(user_id).await? > 0 {
            return Ok(false);
        }

        if let Err(e) = self.apply_status(user_id, UserStatus::last_active(now)).await {
            if let Err(rearm) = self
                .coordination
                .zadd(keys::DISCONNECT_TIMERS, member, due_at)
                .await
            {
                tracing::error!(user_id = %user_id, error = %rearm, "[Presence] Failed to re-arm offline flip");
            }
            return Err(e);
        }
        tracing::info!(user_id = %user_id, "[Presence] User offline");

        // A session may have opened while the flip was being written
        if self.session_count(user_id).await? > 0 {
            self.apply_status(user_id, UserStatus::Online).await?;
            tracing::debug!(user_id = %user_id, "[Presence] Reconnected during flip, restored online");
        }
        Ok(true)
    }

    /// Run `sweep` every `sweep_interval` until the task is aborted
    pub fn spawn_sweeper(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.settings.sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep().await {
                    tracing::warn!(error = %e, "[Presence] Sweep aborted");
                }
            }
        })
    }

    /// Write-through: user row, then cache, then broadcast to watchers
    async fn apply_status(&self, user_id: Uuid, status: UserStatus) -> BackendResult<()> {
        self.store.update_user_status(user_id, status).await?;
        self.cache_status(user_id, status).await?;
        self.hub
            .emit(Topic::Status(user_id), &ServerEvent::Status { user_id, status });
        Ok(())
    }

    async fn cache_status(&self, user_id: Uuid, status: UserStatus) -> BackendResult<()> {
        self.coordination
            .set_ex(
                &keys::user_status(user_id),
                &status.to_string(),
                self.settings.status_ttl,
            )
            .await
    }

    fn grace(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.settings.offline_grace)
            .unwrap_or_else(|_| chrono::Duration::seconds(30))
    }
}
