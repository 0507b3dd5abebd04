//! The win relation and round outcome computation.

use crate::domain::{Card, Kind};

/// True iff `a` beats `b`: rock beats scissors, scissors beats paper,
/// paper beats rock.
pub fn beats(a: Kind, b: Kind) -> bool {
    matches!(
        (a, b),
        (Kind::Rock, Kind::Scissors) | (Kind::Scissors, Kind::Paper) | (Kind::Paper, Kind::Rock)
    )
}

/// Outcome of pitting two revealed cards against each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Index (0 or 1) of the winning player.
    Winner(usize),
    Draw,
}

/// Resolve a round from the two revealed cards, in player order.
pub fn resolve(first: Card, second: Card) -> RoundOutcome {
    if beats(first.kind, second.kind) {
        RoundOutcome::Winner(0)
    } else if beats(second.kind, first.kind) {
        RoundOutcome::Winner(1)
    } else {
        RoundOutcome::Draw
    }
}

/// Human-readable explanation for a resolved round.
pub fn explain(first: Card, second: Card) -> String {
    let (winner, loser) = if beats(first.kind, second.kind) {
        (first.kind, second.kind)
    } else if beats(second.kind, first.kind) {
        (second.kind, first.kind)
    } else {
        return format!("Draw: {} ties {}", first.kind.as_str(), second.kind.as_str());
    };
    let verb = match winner {
        Kind::Rock => "crushes",
        Kind::Paper => "covers",
        Kind::Scissors => "cut",
    };
    format!(
        "{} {} {}",
        capitalize(winner.as_str()),
        verb,
        loser.as_str()
    )
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
