//! Websocket transport adapter.

pub mod connection;
pub mod hub;

pub use connection::WsConnection;
pub use hub::{OutboundFrame, WsHub};
