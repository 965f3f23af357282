//! Realtime socket endpoint. Connections are logged and greeted; chat
//! delivery itself goes through the REST API.

pub mod connection;

use axum::Router;
use axum::extract::WebSocketUpgrade;
use axum::response::Response;
use axum::routing::get;

/// `GET /socket`, mountable into any router state.
pub fn routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/socket", get(upgrade))
}

async fn upgrade(ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(connection::handle_connection)
}
