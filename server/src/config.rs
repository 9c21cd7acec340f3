use chess_shared::{DEFAULT_MAX_FRAME_LEN, DEFAULT_PORT};
use std::time::Duration;

/// Runtime settings for the game server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to, `host:port`.
    pub bind_addr: String,
    /// Connections beyond this are told the server is full and dropped.
    pub max_clients: usize,
    /// A client silent for this long is treated as disconnected.
    pub idle_timeout: Duration,
    pub max_frame_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            max_clients: 64,
            idle_timeout: Duration::from_secs(30),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}
