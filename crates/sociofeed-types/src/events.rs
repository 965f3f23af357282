use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events sent from the server over the realtime socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// Sent once, right after the socket is accepted.
    Connected {
        #[serde(rename = "connectionId")]
        connection_id: Uuid,
    },
}

/// Commands sent from a client over the realtime socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayCommand {
    /// Client announces which user owns this connection. Logged only.
    UserConnected {
        #[serde(rename = "userId")]
        user_id: Uuid,
    },
}
