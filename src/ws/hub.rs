//! Connection fan-out: maps connection ids to live websocket actors.

use std::sync::atomic::{AtomicUsize, Ordering};

use actix::prelude::*;
use dashmap::DashMap;
use tracing::{info, warn};

use crate::domain::ConnId;
use crate::protocol::{EventSink, ServerMsg};

/// One outbound event addressed to a single websocket actor.
#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct OutboundFrame(pub ServerMsg);

#[derive(Default)]
pub struct WsHub {
    sessions: DashMap<ConnId, Recipient<OutboundFrame>>,
    active_connections: AtomicUsize,
}

impl WsHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, conn: ConnId, recipient: Recipient<OutboundFrame>) {
        self.sessions.insert(conn, recipient);
        let active = self.active_connections.fetch_add(1, Ordering::Relaxed) + 1;
        info!(conn_id = %conn, active_connections = active, "websocket registered");
    }

    pub fn unregister(&self, conn: ConnId) {
        if self.sessions.remove(&conn).is_some() {
            let previous = self.active_connections.load(Ordering::Relaxed);
            if previous > 0 {
                self.active_connections.fetch_sub(1, Ordering::Relaxed);
            }
            info!(
                conn_id = %conn,
                active_connections = previous.saturating_sub(1),
                "websocket unregistered"
            );
        } else {
            warn!(conn_id = %conn, "unregister for unknown websocket");
        }
    }

    pub fn contains(&self, conn: ConnId) -> bool {
        self.sessions.contains_key(&conn)
    }

    pub fn active_connections_count(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }
}

impl EventSink for WsHub {
    fn send(&self, conn: ConnId, event: ServerMsg) {
        if let Some(recipient) = self.sessions.get(&conn) {
            recipient.do_send(OutboundFrame(event));
        }
    }
}
