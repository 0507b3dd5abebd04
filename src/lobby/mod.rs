//! Lobby registry and matching layer.

pub mod code;
pub mod lobby;
pub mod reconnect;
pub mod registry;

pub use lobby::Lobby;
pub use reconnect::{ReconnectRecord, ReconnectTracker};
pub use registry::{GameServer, LobbyRegistry, RegistryHandle, SharedRegistry};
