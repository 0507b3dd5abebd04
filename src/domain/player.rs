//! Per-participant mutable state.

use std::collections::HashSet;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::{CARDS_PER_PLAYER, MAX_SWAPS_PER_GAME, MAX_SWAPS_PER_ROUND};
use crate::domain::errors::DomainError;
use crate::domain::Card;

/// Client-supplied (validated) or server-minted identity string.
pub type PlayerId = String;

/// Transport connection identity.
pub type ConnId = Uuid;

/// A seated participant. Owned by the Session once one exists; never
/// outlives it.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Live connection, if any. A player is either bound to exactly one
    /// live connection or `disconnected` with a reconnect record.
    pub conn: Option<ConnId>,
    hand: Vec<Card>,
    sequence: Vec<Card>,
    sequence_set: bool,
    swaps_used: u8,
    swaps_this_round: u8,
    pub score: u8,
    /// Swap-phase readiness (swapped or skipped). Cleared at round start.
    pub ready: bool,
    pub disconnected: bool,
    pub disconnected_at: Option<OffsetDateTime>,
}

impl Player {
    pub fn new(id: PlayerId, name: String, conn: ConnId) -> Self {
        Self {
            id,
            name,
            conn: Some(conn),
            hand: Vec::new(),
            sequence: Vec::new(),
            sequence_set: false,
            swaps_used: 0,
            swaps_this_round: 0,
            score: 0,
            ready: false,
            disconnected: false,
            disconnected_at: None,
        }
    }

    pub fn hand(&self) -> &[Card] {
        &self.hand
    }

    pub fn sequence(&self) -> &[Card] {
        &self.sequence
    }

    pub fn sequence_set(&self) -> bool {
        self.sequence_set
    }

    pub fn swaps_used(&self) -> u8 {
        self.swaps_used
    }

    pub fn swaps_left(&self) -> u8 {
        MAX_SWAPS_PER_GAME - self.swaps_used
    }

    /// The dealt hand is set exactly once per session.
    pub fn set_hand(&mut self, cards: Vec<Card>) -> Result<(), DomainError> {
        if !self.hand.is_empty() {
            return Err(DomainError::invariant(format!(
                "hand already dealt for player {}",
                self.id
            )));
        }
        self.hand = cards;
        Ok(())
    }

    /// Commit the played ordering. Accepted once, and only if `seq` is a
    /// permutation of the hand by card identity.
    pub fn set_sequence(&mut self, seq: Vec<Card>) -> Result<(), DomainError> {
        if self.sequence_set {
            return Err(DomainError::rule("sequence already committed"));
        }
        if seq.len() != self.hand.len() {
            return Err(DomainError::rule(format!(
                "sequence must contain {} cards",
                self.hand.len()
            )));
        }
        let hand_ids: HashSet<u8> = self.hand.iter().map(|c| c.id).collect();
        let seq_ids: HashSet<u8> = seq.iter().map(|c| c.id).collect();
        if seq_ids.len() != seq.len() || seq_ids != hand_ids {
            return Err(DomainError::rule("sequence is not a permutation of your hand"));
        }
        self.sequence = seq;
        self.sequence_set = true;
        Ok(())
    }

    pub fn can_swap(&self) -> bool {
        self.swaps_used < MAX_SWAPS_PER_GAME && self.swaps_this_round < MAX_SWAPS_PER_ROUND
    }

    /// Exchange two adjacent positions of the committed sequence.
    /// Positions are absolute indices into the sequence.
    pub fn swap_cards(&mut self, i: usize, j: usize) -> Result<(), DomainError> {
        if self.swaps_used >= MAX_SWAPS_PER_GAME {
            return Err(DomainError::rule("no swaps left for this game"));
        }
        if self.swaps_this_round >= MAX_SWAPS_PER_ROUND {
            return Err(DomainError::rule("already swapped this round"));
        }
        if i >= CARDS_PER_PLAYER || j >= CARDS_PER_PLAYER {
            return Err(DomainError::rule("swap positions out of range"));
        }
        if i.abs_diff(j) != 1 {
            return Err(DomainError::rule("only adjacent cards can be swapped"));
        }
        self.sequence.swap(i, j);
        self.swaps_used += 1;
        self.swaps_this_round += 1;
        Ok(())
    }

    /// Cards not yet revealed, position 0 being the next to play.
    pub fn upcoming(&self, current_round: usize) -> &[Card] {
        let start = current_round.min(self.sequence.len());
        &self.sequence[start..]
    }

    pub fn record_win(&mut self) {
        self.score += 1;
    }

    /// Round boundary: clear the per-round state.
    pub fn reset_round(&mut self) {
        self.swaps_this_round = 0;
        self.ready = false;
    }

    pub fn mark_disconnected(&mut self) {
        self.conn = None;
        self.disconnected = true;
        self.disconnected_at = Some(OffsetDateTime::now_utc());
    }

    pub fn mark_connected(&mut self, conn: ConnId) {
        self.conn = Some(conn);
        self.disconnected = false;
        self.disconnected_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::deck::deal_hand_seeded;
    use crate::domain::Kind;

    fn seated() -> Player {
        let mut p = Player::new("p1".into(), "Alice".into(), Uuid::new_v4());
        p.set_hand(deal_hand_seeded(1)).unwrap();
        p
    }

    fn committed() -> Player {
        let mut p = seated();
        let seq = p.hand().to_vec();
        p.set_sequence(seq).unwrap();
        p
    }

    #[test]
    fn hand_is_set_exactly_once() {
        let mut p = seated();
        assert!(matches!(
            p.set_hand(deal_hand_seeded(2)),
            Err(DomainError::Invariant(_))
        ));
    }

    #[test]
    fn sequence_must_be_a_permutation() {
        let mut p = seated();
        let mut seq = p.hand().to_vec();
        seq[0] = Card {
            id: 200,
            kind: Kind::Rock,
        };
        assert!(p.set_sequence(seq).is_err());
        assert!(!p.sequence_set());

        let mut short = p.hand().to_vec();
        short.pop();
        assert!(p.set_sequence(short).is_err());

        let mut reversed = p.hand().to_vec();
        reversed.reverse();
        p.set_sequence(reversed.clone()).unwrap();
        assert_eq!(p.sequence(), &reversed[..]);
        assert!(p.set_sequence(reversed).is_err());
    }

    #[test]
    fn sequence_rejects_duplicated_identity() {
        let mut p = seated();
        let mut seq = p.hand().to_vec();
        seq[1] = seq[0];
        assert!(p.set_sequence(seq).is_err());
    }

    #[test]
    fn swap_budget_and_adjacency() {
        let mut p = committed();

        assert!(p.swap_cards(0, 2).is_err());
        assert!(p.swap_cards(5, 6).is_err());
        assert_eq!(p.swaps_used(), 0);

        let before = p.sequence().to_vec();
        p.swap_cards(0, 1).unwrap();
        assert_eq!(p.sequence()[0], before[1]);
        assert_eq!(p.sequence()[1], before[0]);
        assert_eq!(p.swaps_used(), 1);

        // One per round.
        assert!(p.swap_cards(2, 3).is_err());
        p.reset_round();
        p.swap_cards(2, 3).unwrap();
        p.reset_round();
        p.swap_cards(4, 5).unwrap();
        p.reset_round();

        // Budget of three for the game.
        assert!(!p.can_swap());
        let err = p.swap_cards(0, 1).unwrap_err();
        assert!(matches!(err, DomainError::Rule(_)));
        assert_eq!(p.swaps_used(), 3);
    }

    #[test]
    fn upcoming_tracks_current_round() {
        let p = committed();
        assert_eq!(p.upcoming(0).len(), 6);
        assert_eq!(p.upcoming(4).len(), 2);
        assert_eq!(p.upcoming(4)[0], p.sequence()[4]);
        assert!(p.upcoming(6).is_empty());
    }

    #[test]
    fn liveness_toggles() {
        let mut p = seated();
        assert!(!p.disconnected);
        p.mark_disconnected();
        assert!(p.disconnected);
        assert!(p.conn.is_none());
        assert!(p.disconnected_at.is_some());
        let conn = Uuid::new_v4();
        p.mark_connected(conn);
        assert!(!p.disconnected);
        assert_eq!(p.conn, Some(conn));
        assert!(p.disconnected_at.is_none());
    }
}
