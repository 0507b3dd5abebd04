//! Deck construction and dealing.

use rand::prelude::*;

use crate::config::{CARDS_PER_KIND, CARDS_PER_PLAYER, FULL_DECK_SIZE};
use crate::domain::{Card, Kind};

/// Generate the canonical nine-card deck: three of each kind, ids 0..9.
pub fn full_deck() -> Vec<Card> {
    let kinds = [Kind::Rock, Kind::Paper, Kind::Scissors];
    let mut deck = Vec::with_capacity(FULL_DECK_SIZE);
    let mut id = 0u8;
    for kind in kinds {
        for _ in 0..CARDS_PER_KIND {
            deck.push(Card { id, kind });
            id += 1;
        }
    }
    deck
}

/// Deal one six-card hand: uniform Fisher-Yates shuffle over the full
/// deck, take the first six.
pub fn deal_hand<R: Rng + ?Sized>(rng: &mut R) -> Vec<Card> {
    let mut deck = full_deck();
    deck.shuffle(rng);
    deck.truncate(CARDS_PER_PLAYER);
    deck
}

/// Deterministic deal for tests and reproduction.
pub fn deal_hand_seeded(seed: u64) -> Vec<Card> {
    let mut rng = StdRng::seed_from_u64(seed);
    deal_hand(&mut rng)
}

/// Uniformly shuffle an arbitrary card sequence in place.
pub fn shuffle_cards<R: Rng + ?Sized>(cards: &mut [Card], rng: &mut R) {
    cards.shuffle(rng);
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn full_deck_has_three_of_each_kind() {
        let deck = full_deck();
        assert_eq!(deck.len(), FULL_DECK_SIZE);
        for kind in [Kind::Rock, Kind::Paper, Kind::Scissors] {
            assert_eq!(deck.iter().filter(|c| c.kind == kind).count(), CARDS_PER_KIND);
        }
        let ids: HashSet<u8> = deck.iter().map(|c| c.id).collect();
        assert_eq!(ids.len(), FULL_DECK_SIZE);
    }

    #[test]
    fn deal_is_deterministic_per_seed() {
        assert_eq!(deal_hand_seeded(42), deal_hand_seeded(42));
        assert_ne!(deal_hand_seeded(42), deal_hand_seeded(43));
    }

    #[test]
    fn dealt_hand_has_six_distinct_deck_cards() {
        let deck: HashSet<Card> = full_deck().into_iter().collect();
        let hand = deal_hand_seeded(7);
        assert_eq!(hand.len(), CARDS_PER_PLAYER);
        let ids: HashSet<u8> = hand.iter().map(|c| c.id).collect();
        assert_eq!(ids.len(), CARDS_PER_PLAYER);
        assert!(hand.iter().all(|c| deck.contains(c)));
    }
}
