//! Authoritative server for a six-round rock/paper/scissors card duel.
//!
//! Each lobby seats two players who pre-commit a permutation of a dealt
//! six-card hand and play it out over six timed rounds, with a bounded
//! budget of adjacent swaps. The interesting machinery is the session
//! lifecycle: phased timers, pause/resume on disconnect, reconnection
//! windows, and clean teardown on forfeit or timeout.

pub mod config;
pub mod domain;
pub mod health;
pub mod lobby;
pub mod protocol;
pub mod routes;
pub mod session;
pub mod state;
pub mod telemetry;
pub mod validation;
pub mod ws;

pub use lobby::GameServer;
pub use state::AppState;
