//! Game constants and server configuration.

use std::time::Duration;

/// Rounds played per game.
pub const TOTAL_ROUNDS: usize = 6;

/// Cards dealt to each player.
pub const CARDS_PER_PLAYER: usize = 6;

/// Size of the full deck a hand is drawn from.
pub const FULL_DECK_SIZE: usize = 9;

/// Copies of each card kind in the full deck.
pub const CARDS_PER_KIND: usize = 3;

/// Swap budget per player per game.
pub const MAX_SWAPS_PER_GAME: u8 = 3;

/// Swaps allowed per player per round.
pub const MAX_SWAPS_PER_ROUND: u8 = 1;

/// Seconds both hands are shown face-up before sequencing.
pub const PREVIEW_SECS: u64 = 30;

/// Seconds to commit a sequence.
pub const SEQUENCE_SECS: u64 = 60;

/// Seconds per round to swap or skip.
pub const SWAP_SECS: u64 = 20;

/// Seconds to confirm a round result before the next round starts.
pub const CONTINUE_SECS: u64 = 5;

/// How long a disconnected player may be absent before forfeiting.
pub const RECONNECT_WINDOW: Duration = Duration::from_secs(120);

/// Grace period before the opponent is told about a disconnect, so
/// transient drops do not flash an overlay.
pub const DISCONNECT_NOTIFY_GRACE: Duration = Duration::from_secs(2);

/// Yield between a resume notification and the deferred round start.
pub const RESUME_ROUND_YIELD: Duration = Duration::from_millis(100);

/// Default listen port when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 3000;

/// Directory served as static assets.
pub const PUBLIC_DIR: &str = "public";

/// Resolve the listen port from the environment.
pub fn server_port() -> u16 {
    std::env::var("PORT")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}
