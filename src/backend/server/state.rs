/**
 * Application State
 *
 * `AppState` is the central container handed to every Axum handler. It
 * holds the two storage adapters, the room hub and the services built on
 * top of them. All fields are `Arc`s, so cloning the state is cheap and
 * every clone sees the same hub and the same stores.
 *
 * The `FromRef` implementations let handlers extract a single part of the
 * state, e.g. `State(hub): State<Arc<RoomHub>>`.
 */

use axum::extract::FromRef;
use std::sync::Arc;

use crate::backend::coordination::{MemoryCoordination, SharedCoordination};
use crate::backend::messaging::MessagingService;
use crate::backend::presence::{Clock, PresenceSettings, PresenceTracker, SystemClock};
use crate::backend::realtime::RoomHub;
use crate::backend::store::{MemoryStore, SharedStore};

#[derive(Clone)]
pub struct AppState {
    /// Users, conversations, contacts and messages
    pub store: SharedStore,

    /// Session counters, status cache, deferred offline entries and
    /// unread markers
    pub coordination: SharedCoordination,

    /// Live connections of this instance and their rooms
    pub hub: Arc<RoomHub>,

    pub presence: Arc<PresenceTracker>,
    pub messaging: Arc<MessagingService>,
}

impl AppState {
    /// Build the services over the given adapters
    pub fn new(
        store: SharedStore,
        coordination: SharedCoordination,
        hub: Arc<RoomHub>,
        clock: Arc<dyn Clock>,
        settings: PresenceSettings,
    ) -> Self {
        let presence = Arc::new(PresenceTracker::new(
            Arc::clone(&store),
            Arc::clone(&coordination),
            Arc::clone(&hub),
            clock,
            settings,
        ));
        let messaging = Arc::new(MessagingService::new(
            Arc::clone(&store),
            Arc::clone(&coordination),
            Arc::clone(&hub),
        ));

        Self {
            store,
            coordination,
            hub,
            presence,
            messaging,
        }
    }

    /// Single-instance state over the in-memory adapters
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryCoordination::new()),
            Arc::new(RoomHub::new()),
            Arc::new(SystemClock),
            PresenceSettings::default(),
        )
    }
}

impl FromRef<AppState> for SharedStore {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.store.clone()
    }
}

impl FromRef<AppState> for Arc<RoomHub> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.hub.clone()
    }
}

impl FromRef<AppState> for Arc<PresenceTracker> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.presence.clone()
    }
}
