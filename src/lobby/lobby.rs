//! A lobby: a code, up to two seats, and at most one session.

use std::collections::HashSet;

use time::OffsetDateTime;

use crate::domain::{ConnId, Player, PlayerId};
use crate::session::Session;

pub struct Lobby {
    pub id: String,
    /// Seated players while waiting. Drained into the session on start.
    pub roster: Vec<Player>,
    pub session: Option<Session>,
    /// Every identity that ever held a seat; the admission whitelist once
    /// a session exists.
    pub allowed_player_ids: HashSet<PlayerId>,
    pub created_at: OffsetDateTime,
}

impl Lobby {
    pub fn new(id: String, creator: Player) -> Self {
        let mut allowed_player_ids = HashSet::new();
        allowed_player_ids.insert(creator.id.clone());
        Self {
            id,
            roster: vec![creator],
            session: None,
            allowed_player_ids,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty() && self.session.is_none()
    }

    /// Seat a new player in the waiting roster.
    pub fn seat(&mut self, player: Player) {
        self.allowed_player_ids.insert(player.id.clone());
        self.roster.push(player);
    }

    /// All current members, seated or in-session.
    pub fn members(&self) -> Vec<&Player> {
        match &self.session {
            Some(session) => session.players().iter().collect(),
            None => self.roster.iter().collect(),
        }
    }

    pub fn member_names(&self) -> Vec<String> {
        self.members().iter().map(|p| p.name.clone()).collect()
    }

    pub fn has_player(&self, id: &str) -> bool {
        self.members().iter().any(|p| p.id == id)
    }

    pub fn find_by_conn(&self, conn: ConnId) -> Option<&Player> {
        self.members().into_iter().find(|p| p.conn == Some(conn))
    }
}
