use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use sociofeed_types::events::{GatewayCommand, GatewayEvent};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);
const MAX_MISSED_PONGS: u8 = 2;

/// Longest slice of an unparseable frame echoed into the log.
const RAW_PREVIEW_CHARS: usize = 200;

/// Drives one socket: greet, log commands, keep the peer alive, log the end.
pub async fn handle_connection(socket: WebSocket) {
    let connection_id = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();

    info!("Socket {} connected", connection_id);

    let hello = match serde_json::to_string(&GatewayEvent::Connected { connection_id }) {
        Ok(json) => json,
        Err(e) => {
            warn!("Socket {}: failed to encode greeting: {}", connection_id, e);
            return;
        }
    };
    if sender.send(Message::Text(hello.into())).await.is_err() {
        info!("Socket {} disconnected before greeting", connection_id);
        return;
    }

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let mut pong_received = true;
    let mut missed_pongs: u8 = 0;

    let reason = loop {
        tokio::select! {
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_text(connection_id, &text),
                Some(Ok(Message::Pong(_))) => pong_received = true,
                Some(Ok(Message::Close(_))) | None => break "closed by client",
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!("Socket {} read error: {}", connection_id, e);
                    break "read error";
                }
            },
            _ = heartbeat.tick() => {
                if std::mem::replace(&mut pong_received, false) {
                    missed_pongs = 0;
                } else {
                    missed_pongs += 1;
                    if missed_pongs >= MAX_MISSED_PONGS {
                        break "heartbeat timeout";
                    }
                }
                if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break "write error";
                }
            }
        }
    };

    info!("Socket {} disconnected ({})", connection_id, reason);
}

fn handle_text(connection_id: Uuid, text: &str) {
    match serde_json::from_str::<GatewayCommand>(text) {
        Ok(GatewayCommand::UserConnected { user_id }) => {
            info!("User {} attached to socket {}", user_id, connection_id);
        }
        Err(e) => {
            let preview: String = text.chars().take(RAW_PREVIEW_CHARS).collect();
            warn!(
                "Socket {} bad command: {} -- raw: {}",
                connection_id, e, preview
            );
        }
    }
}
