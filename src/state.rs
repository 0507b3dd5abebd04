use std::sync::Arc;

use crate::lobby::GameServer;
use crate::ws::WsHub;

/// Application state shared by every connection.
#[derive(Clone)]
pub struct AppState {
    pub server: GameServer,
    pub hub: Arc<WsHub>,
}

impl AppState {
    pub fn new() -> Self {
        let hub = Arc::new(WsHub::new());
        let sink: Arc<dyn crate::protocol::EventSink> = hub.clone();
        Self {
            server: GameServer::new(sink),
            hub,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
