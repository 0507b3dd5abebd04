//! Absence records for disconnected players.
//!
//! Each record owns its expiry task and the optional delayed-notify task;
//! dropping a record aborts both, so removal doubles as cancellation.

use std::collections::HashMap;

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::domain::PlayerId;

pub struct ReconnectRecord {
    pub lobby_id: String,
    pub disconnected_at: OffsetDateTime,
    /// When the reconnection window closes.
    pub deadline: Instant,
    /// Distinguishes this record from a later one for the same player, so
    /// a task that outlived its record cannot act.
    pub token: Uuid,
    pub expiry_task: JoinHandle<()>,
    pub notify_task: Option<JoinHandle<()>>,
}

impl ReconnectRecord {
    /// Whole seconds left in the reconnection window.
    pub fn remaining_secs(&self) -> u64 {
        let left = self.deadline.saturating_duration_since(Instant::now());
        let whole = left.as_secs();
        if left.subsec_nanos() > 0 {
            whole + 1
        } else {
            whole
        }
    }
}

impl Drop for ReconnectRecord {
    fn drop(&mut self) {
        self.expiry_task.abort();
        if let Some(task) = &self.notify_task {
            task.abort();
        }
    }
}

#[derive(Default)]
pub struct ReconnectTracker {
    records: HashMap<PlayerId, ReconnectRecord>,
}

impl ReconnectTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track an absence. A previous record for the same player is
    /// replaced and its timers cancelled.
    pub fn insert(&mut self, player_id: PlayerId, record: ReconnectRecord) {
        self.records.insert(player_id, record);
    }

    pub fn get(&self, player_id: &str) -> Option<&ReconnectRecord> {
        self.records.get(player_id)
    }

    /// Remove (and thereby cancel) a record.
    pub fn remove(&mut self, player_id: &str) -> Option<ReconnectRecord> {
        self.records.remove(player_id)
    }

    /// True iff a record exists for this player in this lobby with this
    /// token. Tasks call this under the registry lock before acting.
    pub fn is_current(&self, player_id: &str, token: Uuid) -> bool {
        self.records
            .get(player_id)
            .is_some_and(|r| r.token == token)
    }

    /// Drop every record attached to a lobby.
    pub fn clear_lobby(&mut self, lobby_id: &str) {
        self.records.retain(|_, r| r.lobby_id != lobby_id);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
