//! Per-viewer views of session state.

use serde::{Deserialize, Serialize};

use crate::domain::{Card, PlayerId};
use crate::session::machine::Phase;

/// Canonical record of one resolved round, in player-index order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResult {
    /// 1-based on the wire.
    pub round: usize,
    /// Revealed cards by player index.
    pub cards: [Card; 2],
    /// Winner identity, `None` on a draw.
    pub winner: Option<PlayerId>,
    pub explanation: String,
    /// Both scores after the round, by player index.
    pub scores: [u8; 2],
}

/// Everything a returning client needs to rebuild its view mid-game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectSnapshot {
    /// The actual phase, ignoring the pause overlay.
    pub phase: Phase,
    pub current_round: usize,
    pub your_id: PlayerId,
    pub your_name: String,
    pub your_score: u8,
    pub your_swaps_left: u8,
    pub opponent_id: PlayerId,
    pub opponent_name: String,
    pub opponent_score: u8,
    pub opponent_swaps_left: u8,
    pub history: Vec<RoundResult>,
    /// Remaining seconds on the current timer, 0 when none.
    pub timer_remaining: u64,
    /// The requester's not-yet-revealed cards, next to play first.
    pub your_upcoming: Vec<Card>,
    pub your_hand: Vec<Card>,
    /// Phase-appropriate readiness: preview readiness in preview, swap
    /// readiness in swap, continue readiness in reveal.
    pub you_ready: bool,
    pub opponent_ready: bool,
    /// Present only while both hands are face-up in preview.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opponent_hand: Option<Vec<Card>>,
}
