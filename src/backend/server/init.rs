/**
 * Server Initialization
 *
 * Builds the adapters, the services and the router, and starts the
 * background tasks the server needs:
 *
 * 1. Connect PostgreSQL, or fall back to the in-memory store
 * 2. Connect Redis, or fall back to in-memory coordination
 * 3. Attach the cross-instance relay when Redis is available
 * 4. Start the presence sweeper
 * 5. Create the router
 */

use axum::Router;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::backend::coordination::{MemoryCoordination, SharedCoordination};
use crate::backend::presence::{PresenceSettings, SystemClock};
use crate::backend::realtime::{FanoutRelay, RoomHub};
use crate::backend::routes::router::create_router;
use crate::backend::server::config::{load_coordination, load_database};
use crate::backend::server::state::AppState;
use crate::backend::store::{MemoryStore, PostgresStore, SharedStore};
use crate::shared::config::AppConfig;

/// A configured application: the router plus its background tasks
pub struct App {
    pub router: Router<()>,
    pub state: AppState,
    sweeper: JoinHandle<()>,
    relay: Option<FanoutRelay>,
}

impl App {
    /// Wire the router and start the sweeper over an existing state
    pub fn assemble(state: AppState, relay: Option<FanoutRelay>) -> Self {
        let sweeper = Arc::clone(&state.presence).spawn_sweeper();
        tracing::info!(
            interval_secs = state.presence.settings().sweep_interval.as_secs(),
            "[Server] Presence sweeper started"
        );

        Self {
            router: create_router(state.clone()),
            state,
            sweeper,
            relay,
        }
    }

    /// Stop the background tasks
    pub fn shutdown(self) {
        self.sweeper.abort();
        if let Some(relay) = self.relay {
            relay.shutdown();
        }
    }
}

pub async fn create_app(config: &AppConfig) -> App {
    tracing::info!("Initializing pulsechat server");

    let store: SharedStore = match load_database(config).await {
        Some(pool) => Arc::new(PostgresStore::new(pool)),
        None => Arc::new(MemoryStore::new()),
    };

    let hub = Arc::new(RoomHub::new());
    let redis = load_coordination(config).await;

    let relay = match &redis {
        Some(redis) => match FanoutRelay::start(redis.client().clone(), Arc::clone(&hub)).await {
            Ok(relay) => Some(relay),
            Err(e) => {
                tracing::error!("Failed to start fan-out relay: {}", e);
                None
            }
        },
        None => None,
    };

    let coordination: SharedCoordination = match redis {
        Some(redis) => Arc::new(redis),
        None => Arc::new(MemoryCoordination::new()),
    };

    let state = AppState::new(
        store,
        coordination,
        hub,
        Arc::new(SystemClock),
        PresenceSettings::from(config),
    );

    let app = App::assemble(state, relay);
    tracing::info!("Router configured");
    app
}
