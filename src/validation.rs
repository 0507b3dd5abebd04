//! Pure input-shape validation for everything that crosses the wire.
//!
//! Nothing in here touches game state; callers get either a normalized
//! value or a `DomainError::Validation` to turn into an outbound error.

use std::sync::LazyLock;

use regex::Regex;

use crate::config::CARDS_PER_PLAYER;
use crate::domain::{Card, DomainError};
use crate::lobby::code::{LOBBY_CODE_ALPHABET, LOBBY_CODE_LEN};

const MAX_NAME_LEN: usize = 20;
const MAX_PLAYER_ID_LEN: usize = 100;
const DEFAULT_NAME: &str = "Player";

/// UUID-shaped ids (36 chars with hyphen groups).
fn uuid_shaped() -> &'static Regex {
    static RE: LazyLock<Regex> = LazyLock::new(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
            .unwrap()
    });
    &RE
}

/// Legacy client-minted ids: `player_<token>_<token>`.
fn legacy_player_id() -> &'static Regex {
    static RE: LazyLock<Regex> = LazyLock::new(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"^player_[a-z0-9]+_[a-z0-9]+$").unwrap()
    });
    &RE
}

/// Catch-all id shape: alphanumeric, underscore, hyphen.
fn generic_id() -> &'static Regex {
    static RE: LazyLock<Regex> = LazyLock::new(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"^[A-Za-z0-9_-]+$").unwrap()
    });
    &RE
}

/// Trim, cap at 20 characters, strip markup-dangerous characters, and fall
/// back to a default when nothing is left.
pub fn sanitize_player_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let capped: String = trimmed.chars().take(MAX_NAME_LEN).collect();
    let cleaned: String = capped
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '"' | '\'' | '&'))
        .collect();
    let cleaned = cleaned.trim().to_string();
    if cleaned.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        cleaned
    }
}

/// Uppercase and verify a six-character lobby code over the closed
/// alphabet.
pub fn normalize_lobby_code(raw: &str) -> Result<String, DomainError> {
    let code = raw.trim().to_uppercase();
    if code.len() != LOBBY_CODE_LEN {
        return Err(DomainError::validation("lobby code must be 6 characters"));
    }
    if !code.bytes().all(|b| LOBBY_CODE_ALPHABET.contains(&b)) {
        return Err(DomainError::validation("lobby code has invalid characters"));
    }
    Ok(code)
}

/// Accept a caller-supplied player id in one of the known shapes.
pub fn validate_player_id(raw: &str) -> Result<String, DomainError> {
    if raw.is_empty() || raw.len() > MAX_PLAYER_ID_LEN {
        return Err(DomainError::validation("player id has invalid length"));
    }
    if uuid_shaped().is_match(raw) || legacy_player_id().is_match(raw) || generic_id().is_match(raw)
    {
        return Ok(raw.to_string());
    }
    Err(DomainError::validation("player id has invalid shape"))
}

/// A committed sequence must be an ordered list the same length as the
/// hand and a permutation of the hand by card identity.
pub fn validate_sequence(seq: &[Card], hand: &[Card]) -> Result<(), DomainError> {
    if seq.len() != hand.len() {
        return Err(DomainError::validation(format!(
            "sequence must contain {} cards",
            hand.len()
        )));
    }
    let mut seq_ids: Vec<u8> = seq.iter().map(|c| c.id).collect();
    let mut hand_ids: Vec<u8> = hand.iter().map(|c| c.id).collect();
    seq_ids.sort_unstable();
    hand_ids.sort_unstable();
    if seq_ids.windows(2).any(|w| w[0] == w[1]) || seq_ids != hand_ids {
        return Err(DomainError::validation(
            "sequence is not a permutation of the hand",
        ));
    }
    Ok(())
}

/// Swap positions arrive in the remaining-cards frame: both non-negative,
/// strictly below the number of cards still in play, adjacent.
pub fn validate_swap_positions(
    pos1: i64,
    pos2: i64,
    current_round: usize,
) -> Result<(usize, usize), DomainError> {
    let remaining = CARDS_PER_PLAYER - current_round;
    if pos1 < 0 || pos2 < 0 {
        return Err(DomainError::validation("swap positions must be non-negative"));
    }
    let (a, b) = (pos1 as usize, pos2 as usize);
    if a >= remaining || b >= remaining {
        return Err(DomainError::validation(format!(
            "swap positions must be below {remaining}"
        )));
    }
    if a.abs_diff(b) != 1 {
        return Err(DomainError::validation("swap positions must be adjacent"));
    }
    Ok((a, b))
}
