//! Lobby code generation.
//!
//! Codes are 6-character strings over an ambiguity-free alphabet
//! (no 0/O/1/I/L), drawn uniformly from the OS RNG.

use rand::distributions::Uniform;
use rand::prelude::*;
use rand::rngs::OsRng;

pub const LOBBY_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const LOBBY_CODE_LEN: usize = 6;

/// Generate one candidate lobby code. Uniqueness against live lobbies is
/// the registry's job (it resamples on collision).
pub fn generate_lobby_code() -> String {
    let mut rng = OsRng;
    let dist = Uniform::from(0..LOBBY_CODE_ALPHABET.len());

    let mut code = String::with_capacity(LOBBY_CODE_LEN);
    for _ in 0..LOBBY_CODE_LEN {
        code.push(LOBBY_CODE_ALPHABET[dist.sample(&mut rng)] as char);
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_have_correct_length_and_alphabet() {
        for _ in 0..100 {
            let code = generate_lobby_code();
            assert_eq!(code.len(), LOBBY_CODE_LEN);
            assert!(code.bytes().all(|b| LOBBY_CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn codes_differ() {
        assert_ne!(generate_lobby_code(), generate_lobby_code());
    }
}
