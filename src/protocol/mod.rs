//! Typed wire protocol shared by the transport adapter and the core.

pub mod events;

pub use events::{
    ClientMsg, CreateLobbyPayload, EventSink, JoinLobbyPayload, ReconnectPayload, ServerMsg,
    SwapPayload,
};
