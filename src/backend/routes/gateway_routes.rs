/**
 * Gateway Routes
 *
 * - `GET /api/messages?userId=<id>` - user session socket
 * - `GET /api/statuses` - watch-only presence socket
 */

use axum::routing::get;
use axum::Router;

use crate::backend::gateway::{messages_socket, statuses_socket};
use crate::backend::server::state::AppState;

pub fn configure_gateway_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/messages", get(messages_socket))
        .route("/api/statuses", get(statuses_socket))
}
