//! The lobby registry: owns every lobby, session, and absence record,
//! resolves transport identities, validates inbound events, and routes
//! them to the right session.
//!
//! All mutation is serialized behind one mutex. Timer and reconnect
//! callbacks run on spawned tasks holding a `Weak` handle and re-validate
//! their epoch/token under the lock, so a cancelled timer can never act
//! on state that has moved on.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{DISCONNECT_NOTIFY_GRACE, RECONNECT_WINDOW, RESUME_ROUND_YIELD};
use crate::domain::{Card, ConnId, DomainError, Player, PlayerId};
use crate::lobby::code::generate_lobby_code;
use crate::lobby::lobby::Lobby;
use crate::lobby::reconnect::{ReconnectRecord, ReconnectTracker};
use crate::protocol::{ClientMsg, EventSink, JoinLobbyPayload, ReconnectPayload, ServerMsg, SwapPayload};
use crate::session::machine::PendingAction;
use crate::session::{Phase, Session, TimerKind};
use crate::validation::{
    normalize_lobby_code, sanitize_player_name, validate_player_id, validate_sequence,
    validate_swap_positions,
};

pub type SharedRegistry = Arc<Mutex<LobbyRegistry>>;
pub type RegistryHandle = Weak<Mutex<LobbyRegistry>>;

const ERR_INVALID_RECONNECT: &str = "Invalid reconnection attempt";
const ERR_SESSION_ENDED: &str = "Game session has ended. Please return to the lobby.";

fn lock_registry(inner: &SharedRegistry) -> MutexGuard<'_, LobbyRegistry> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared front door for the transport layer and tests.
#[derive(Clone)]
pub struct GameServer {
    inner: SharedRegistry,
}

impl GameServer {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        let inner = Arc::new_cyclic(|weak: &RegistryHandle| {
            Mutex::new(LobbyRegistry {
                lobbies: HashMap::new(),
                conn_lobby: HashMap::new(),
                reconnect: ReconnectTracker::new(),
                sink,
                handle: weak.clone(),
            })
        });
        Self { inner }
    }

    /// Route one inbound event. `Err` is returned only for programmer
    /// errors; the transport should log and close the connection.
    pub fn handle_message(&self, conn: ConnId, msg: ClientMsg) -> Result<(), DomainError> {
        lock_registry(&self.inner).dispatch(conn, msg)
    }

    /// The transport saw a connection drop.
    pub fn handle_disconnect(&self, conn: ConnId) {
        lock_registry(&self.inner).handle_disconnect(conn);
    }

    /// Read-only access for assertions and introspection.
    pub fn inspect<R>(&self, f: impl FnOnce(&LobbyRegistry) -> R) -> R {
        f(&lock_registry(&self.inner))
    }
}

pub struct LobbyRegistry {
    lobbies: HashMap<String, Lobby>,
    conn_lobby: HashMap<ConnId, String>,
    reconnect: ReconnectTracker,
    sink: Arc<dyn EventSink>,
    handle: RegistryHandle,
}

/// Work computed under a lobby borrow, applied afterwards.
enum AfterDisconnect {
    Nothing,
    Cleanup,
    Track { player_id: PlayerId, notify: bool },
}

impl LobbyRegistry {
    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn lobby(&self, id: &str) -> Option<&Lobby> {
        self.lobbies.get(id)
    }

    pub fn lobby_count(&self) -> usize {
        self.lobbies.len()
    }

    pub fn lobby_id_for_conn(&self, conn: ConnId) -> Option<&String> {
        self.conn_lobby.get(&conn)
    }

    pub fn reconnect_tracker(&self) -> &ReconnectTracker {
        &self.reconnect
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    pub fn dispatch(&mut self, conn: ConnId, msg: ClientMsg) -> Result<(), DomainError> {
        match msg {
            ClientMsg::CreateLobby(payload) => {
                let (name, player_id) = payload.into_parts();
                self.create_lobby(conn, &name, player_id.as_deref());
                Ok(())
            }
            ClientMsg::JoinLobby(payload) => {
                self.join_lobby(conn, payload);
                Ok(())
            }
            ClientMsg::Reconnect(payload) => {
                self.reconnect_player(conn, payload);
                Ok(())
            }
            ClientMsg::PreviewReady => self.with_session(conn, |s, idx| s.preview_ready(idx)),
            ClientMsg::SetSequence(cards) => self.set_sequence(conn, cards),
            ClientMsg::SwapCards(payload) => self.swap_cards(conn, payload),
            ClientMsg::SkipSwap => self.with_session(conn, |s, idx| s.skip_swap(idx)),
            ClientMsg::ContinueRound => self.with_session(conn, |s, idx| s.continue_round(idx)),
            ClientMsg::LeaveLobby | ClientMsg::PlayAgain => {
                self.leave(conn);
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Lobby lifecycle
    // ------------------------------------------------------------------

    fn create_lobby(&mut self, conn: ConnId, raw_name: &str, raw_id: Option<&str>) {
        if self.conn_lobby.contains_key(&conn) {
            self.sink.send(
                conn,
                ServerMsg::Error {
                    message: "Already in a lobby".into(),
                },
            );
            return;
        }
        let name = sanitize_player_name(raw_name);
        let player_id = match raw_id {
            Some(raw) => match validate_player_id(raw) {
                Ok(id) => id,
                Err(_) => {
                    self.sink.send(
                        conn,
                        ServerMsg::Error {
                            message: "Invalid player id".into(),
                        },
                    );
                    return;
                }
            },
            None => Uuid::new_v4().to_string(),
        };

        let code = self.mint_code();
        let player = Player::new(player_id.clone(), name.clone(), conn);
        self.lobbies.insert(code.clone(), Lobby::new(code.clone(), player));
        self.conn_lobby.insert(conn, code.clone());
        info!(lobby_id = %code, player_id = %player_id, "lobby created");
        self.sink.send(
            conn,
            ServerMsg::LobbyCreated {
                lobby_id: code,
                player_id,
                name,
            },
        );
    }

    /// Mint an unused code by rejection sampling.
    fn mint_code(&self) -> String {
        loop {
            let code = generate_lobby_code();
            if !self.lobbies.contains_key(&code) {
                return code;
            }
        }
    }

    fn join_lobby(&mut self, conn: ConnId, payload: JoinLobbyPayload) {
        let code = match normalize_lobby_code(&payload.lobby_id) {
            Ok(code) => code,
            Err(_) => {
                self.sink.send(
                    conn,
                    ServerMsg::Error {
                        message: "Invalid lobby code".into(),
                    },
                );
                return;
            }
        };
        let name = sanitize_player_name(&payload.player_name);
        let player_id = match payload.player_id.as_deref() {
            Some(raw) => match validate_player_id(raw) {
                Ok(id) => id,
                Err(_) => {
                    self.sink.send(
                        conn,
                        ServerMsg::Error {
                            message: "Invalid player id".into(),
                        },
                    );
                    return;
                }
            },
            None => Uuid::new_v4().to_string(),
        };

        let Some(lobby) = self.lobbies.get(&code) else {
            self.sink.send(
                conn,
                ServerMsg::Error {
                    message: "Lobby not found".into(),
                },
            );
            return;
        };

        // A known identity on the roster is a rejoin, not an admission.
        if lobby.has_player(&player_id) {
            self.rejoin(conn, &code, &player_id);
            return;
        }

        if lobby.session.is_some() {
            // Admission whitelist: the session started without this id.
            self.sink.send(
                conn,
                ServerMsg::Error {
                    message: "Game already in progress".into(),
                },
            );
            return;
        }

        // Evict waiting members whose connection died.
        let evicted: Vec<PlayerId>;
        let alone;
        {
            let Some(lobby) = self.lobbies.get_mut(&code) else {
                return;
            };
            evicted = lobby
                .roster
                .iter()
                .filter(|p| p.conn.is_none())
                .map(|p| p.id.clone())
                .collect();
            lobby.roster.retain(|p| p.conn.is_some());

            if lobby.roster.len() >= 2 {
                self.sink.send(
                    conn,
                    ServerMsg::Error {
                        message: "Lobby is full".into(),
                    },
                );
                return;
            }
            alone = lobby.roster.is_empty();
            lobby.seat(Player::new(player_id.clone(), name.clone(), conn));
        }
        for id in &evicted {
            self.reconnect.remove(id);
        }
        self.conn_lobby.insert(conn, code.clone());
        info!(lobby_id = %code, player_id = %player_id, rejoin = false, "player joined");

        if alone {
            // The previous occupant was evicted: the caller is now the
            // founding member.
            self.sink.send(
                conn,
                ServerMsg::LobbyCreated {
                    lobby_id: code,
                    player_id,
                    name,
                },
            );
            return;
        }

        let (names, other_conn) = {
            let Some(lobby) = self.lobbies.get(&code) else {
                return;
            };
            let other_conn = lobby
                .roster
                .iter()
                .find(|p| p.id != player_id)
                .and_then(|p| p.conn);
            (lobby.member_names(), other_conn)
        };
        self.sink.send(
            conn,
            ServerMsg::LobbyJoined {
                lobby_id: code.clone(),
                player_id: player_id.clone(),
                name: name.clone(),
                players: names,
            },
        );
        if let Some(other) = other_conn {
            self.sink.send(other, ServerMsg::PlayerJoined { player_id, name });
        }

        self.try_start(&code);
    }

    /// Begin a session iff both seats hold live connections; otherwise
    /// evict the dead seats and tell the survivor.
    fn try_start(&mut self, code: &str) {
        let evicted: Vec<PlayerId>;
        {
            let Some(lobby) = self.lobbies.get_mut(code) else {
                return;
            };
            if lobby.session.is_some() || lobby.roster.len() < 2 {
                return;
            }
            if lobby.roster.iter().all(|p| p.conn.is_some()) {
                let mut drained = lobby.roster.drain(..);
                let (Some(first), Some(second)) = (drained.next(), drained.next()) else {
                    return;
                };
                drop(drained);
                let mut session = Session::new(
                    code.to_string(),
                    [first, second],
                    Arc::clone(&self.sink),
                    self.handle.clone(),
                );
                if let Err(err) = session.start() {
                    error!(lobby_id = %code, error = %err, "failed to start session");
                    return;
                }
                lobby.session = Some(session);
                return;
            }
            evicted = lobby
                .roster
                .iter()
                .filter(|p| p.conn.is_none())
                .map(|p| p.id.clone())
                .collect();
            lobby.roster.retain(|p| p.conn.is_some());
            let survivor = lobby.roster.first().and_then(|p| p.conn);
            if let Some(survivor) = survivor {
                self.sink.send(survivor, ServerMsg::OpponentLeft);
            }
        }
        for id in &evicted {
            self.reconnect.remove(id);
        }
    }

    // ------------------------------------------------------------------
    // Rejoin / reconnect
    // ------------------------------------------------------------------

    /// Reattach a known identity: bind the connection, re-acknowledge,
    /// and bring a mid-game returner back up to speed.
    fn rejoin(&mut self, conn: ConnId, code: &str, player_id: &str) {
        // A fresh binding always supersedes the absence record.
        self.reconnect.remove(player_id);

        let completed = self
            .lobbies
            .get(code)
            .and_then(|l| l.session.as_ref())
            .is_some_and(Session::is_completed);
        if completed {
            self.sink.send(
                conn,
                ServerMsg::Error {
                    message: ERR_SESSION_ENDED.into(),
                },
            );
            self.cleanup_lobby(code);
            return;
        }

        enum Followup {
            None,
            DeferredStart,
        }
        let mut followup = Followup::None;
        let mut stale_conn = None;

        {
            let Some(lobby) = self.lobbies.get_mut(code) else {
                return;
            };
            match &mut lobby.session {
                None => {
                    let Some(player) = lobby.roster.iter_mut().find(|p| p.id == player_id) else {
                        return;
                    };
                    stale_conn = player.conn;
                    player.mark_connected(conn);
                    let (player_id, name) = (player.id.clone(), player.name.clone());
                    let names = lobby.member_names();
                    self.sink.send(
                        conn,
                        ServerMsg::LobbyJoined {
                            lobby_id: code.to_string(),
                            player_id,
                            name,
                            players: names,
                        },
                    );
                }
                Some(session) => {
                    let Some(idx) = session.player_index_by_id(player_id) else {
                        return;
                    };
                    stale_conn = session.players()[idx].conn;
                    session.players_mut()[idx].mark_connected(conn);

                    let me = &session.players()[idx];
                    self.sink.send(
                        conn,
                        ServerMsg::LobbyJoined {
                            lobby_id: code.to_string(),
                            player_id: me.id.clone(),
                            name: me.name.clone(),
                            players: session.players().iter().map(|p| p.name.clone()).collect(),
                        },
                    );
                    self.sink.send(
                        conn,
                        ServerMsg::Reconnected {
                            snapshot: session.snapshot_for(idx),
                        },
                    );

                    let opponent = &session.players()[1 - idx];
                    let opponent_conn = opponent.conn;
                    let opponent_disconnected = opponent.disconnected;
                    let opponent_id = opponent.id.clone();
                    if let Some(opponent_conn) = opponent_conn {
                        self.sink.send(opponent_conn, ServerMsg::OpponentReconnected);
                    }
                    if opponent_disconnected {
                        // Not resumed: the returner waits out the
                        // opponent's own window.
                        let remaining = self
                            .reconnect
                            .get(&opponent_id)
                            .map_or(0, ReconnectRecord::remaining_secs);
                        self.sink.send(
                            conn,
                            ServerMsg::OpponentDisconnected {
                                reconnect_timeout: remaining,
                            },
                        );
                    } else if session.resume_play() == Some(PendingAction::StartRound) {
                        followup = Followup::DeferredStart;
                    }
                }
            }
        }

        if let Some(stale) = stale_conn {
            self.conn_lobby.remove(&stale);
        }
        self.conn_lobby.insert(conn, code.to_string());
        info!(lobby_id = %code, player_id, "player reattached");

        if matches!(followup, Followup::DeferredStart) {
            schedule_deferred_round_start(self.handle.clone(), code.to_string());
        }
    }

    /// The explicit reconnect path: only valid against a live absence
    /// record for exactly this (identity, lobby) pair.
    fn reconnect_player(&mut self, conn: ConnId, payload: ReconnectPayload) {
        let parsed = (
            normalize_lobby_code(&payload.lobby_id),
            validate_player_id(&payload.player_id),
        );
        let (Ok(code), Ok(player_id)) = parsed else {
            self.send_invalid_reconnect(conn);
            return;
        };
        let valid = self
            .reconnect
            .get(&player_id)
            .is_some_and(|r| r.lobby_id == code);
        if !valid {
            warn!(lobby_id = %code, player_id = %player_id, "reconnect without a record");
            self.send_invalid_reconnect(conn);
            return;
        }
        if !self.lobbies.contains_key(&code) {
            // The lobby died while the record lingered.
            self.reconnect.remove(&player_id);
            self.send_invalid_reconnect(conn);
            return;
        }
        self.rejoin(conn, &code, &player_id);
    }

    fn send_invalid_reconnect(&self, conn: ConnId) {
        self.sink.send(
            conn,
            ServerMsg::Error {
                message: ERR_INVALID_RECONNECT.into(),
            },
        );
    }

    // ------------------------------------------------------------------
    // Disconnect handling
    // ------------------------------------------------------------------

    pub fn handle_disconnect(&mut self, conn: ConnId) {
        let Some(lobby_id) = self.conn_lobby.remove(&conn) else {
            return;
        };
        let after = {
            let Some(lobby) = self.lobbies.get_mut(&lobby_id) else {
                return;
            };
            match &mut lobby.session {
                None => {
                    if let Some(player) =
                        lobby.roster.iter_mut().find(|p| p.conn == Some(conn))
                    {
                        player.mark_disconnected();
                    }
                    AfterDisconnect::Nothing
                }
                Some(session) => {
                    if session.is_completed() {
                        AfterDisconnect::Nothing
                    } else if let Some(idx) = session.player_index_by_conn(conn) {
                        session.players_mut()[idx].mark_disconnected();
                        let player_id = session.players()[idx].id.clone();
                        if session.all_disconnected() {
                            // Nobody left to wait for: terminal, no winner.
                            session.complete_silently();
                            AfterDisconnect::Cleanup
                        } else {
                            // Reveal keeps playing out; everything else
                            // pauses until the player is back.
                            let in_reveal = session.phase() == Phase::Reveal;
                            if !in_reveal {
                                session.pause_for_disconnect();
                            }
                            AfterDisconnect::Track {
                                player_id,
                                notify: !in_reveal,
                            }
                        }
                    } else {
                        AfterDisconnect::Nothing
                    }
                }
            }
        };
        match after {
            AfterDisconnect::Nothing => {}
            AfterDisconnect::Cleanup => {
                info!(lobby_id = %lobby_id, "both players gone, closing lobby");
                self.cleanup_lobby(&lobby_id);
            }
            AfterDisconnect::Track { player_id, notify } => {
                info!(lobby_id = %lobby_id, player_id = %player_id, notify, "tracking disconnect");
                self.track_disconnect(lobby_id, player_id, notify);
            }
        }
    }

    fn track_disconnect(&mut self, lobby_id: String, player_id: PlayerId, notify: bool) {
        let token = Uuid::new_v4();
        let expiry_task = spawn_reconnect_expiry(self.handle.clone(), player_id.clone(), token);
        let notify_task =
            notify.then(|| spawn_disconnect_notify(self.handle.clone(), player_id.clone(), token));
        self.reconnect.insert(
            player_id,
            ReconnectRecord {
                lobby_id,
                disconnected_at: OffsetDateTime::now_utc(),
                deadline: Instant::now() + RECONNECT_WINDOW,
                token,
                expiry_task,
                notify_task,
            },
        );
    }

    /// The reconnection window closed with the player still absent.
    fn on_reconnect_expired(&mut self, player_id: &str, token: Uuid) {
        if !self.reconnect.is_current(player_id, token) {
            return;
        }
        let Some(record) = self.reconnect.remove(player_id) else {
            return;
        };
        let lobby_id = record.lobby_id.clone();
        let ended = {
            let Some(lobby) = self.lobbies.get_mut(&lobby_id) else {
                return;
            };
            match &mut lobby.session {
                Some(session) if !session.is_completed() => {
                    match session.player_index_by_id(player_id) {
                        Some(idx) => {
                            session.end_game_by_disconnect(1 - idx);
                            true
                        }
                        None => false,
                    }
                }
                _ => false,
            }
        };
        if ended {
            info!(lobby_id = %lobby_id, player_id, "reconnect window expired");
            self.cleanup_lobby(&lobby_id);
        }
    }

    /// Grace delay elapsed: tell the opponent, with the remaining budget.
    fn on_notify_due(&mut self, player_id: &str, token: Uuid) {
        if !self.reconnect.is_current(player_id, token) {
            return;
        }
        let Some(record) = self.reconnect.get(player_id) else {
            return;
        };
        let remaining = record.remaining_secs();
        let Some(lobby) = self.lobbies.get(&record.lobby_id) else {
            return;
        };
        let Some(session) = &lobby.session else {
            return;
        };
        if session.is_completed() {
            return;
        }
        let Some(idx) = session.player_index_by_id(player_id) else {
            return;
        };
        if let Some(opponent_conn) = session.players()[1 - idx].conn {
            self.sink.send(
                opponent_conn,
                ServerMsg::OpponentDisconnected {
                    reconnect_timeout: remaining,
                },
            );
        }
    }

    // ------------------------------------------------------------------
    // Leave / forfeit
    // ------------------------------------------------------------------

    /// Voluntary forfeit; `playAgain` lands here too.
    fn leave(&mut self, conn: ConnId) {
        let Some(lobby_id) = self.conn_lobby.get(&conn).cloned() else {
            return;
        };
        if !self.lobbies.contains_key(&lobby_id) {
            self.conn_lobby.remove(&conn);
            return;
        }

        let mut leaver_id: Option<PlayerId> = None;
        let mut cleanup = false;
        {
            let Some(lobby) = self.lobbies.get_mut(&lobby_id) else {
                return;
            };
            match &mut lobby.session {
                Some(session) if !session.is_completed() => {
                    let Some(idx) = session.player_index_by_conn(conn) else {
                        return;
                    };
                    leaver_id = Some(session.players()[idx].id.clone());
                    let opponent = &session.players()[1 - idx];
                    let opponent_conn = opponent.conn;
                    let opponent_disconnected = opponent.disconnected;
                    if let Some(opponent_conn) = opponent_conn {
                        self.sink.send(opponent_conn, ServerMsg::OpponentLeft);
                    }
                    if opponent_disconnected {
                        session.complete_silently();
                    } else {
                        session.end_game_by_disconnect(1 - idx);
                    }
                    cleanup = true;
                }
                Some(_) => {
                    // Stale, already-finished session.
                    cleanup = true;
                }
                None => {
                    if let Some(player) = lobby.roster.iter().find(|p| p.conn == Some(conn)) {
                        leaver_id = Some(player.id.clone());
                    }
                    lobby.roster.retain(|p| p.conn != Some(conn));
                    if lobby.is_empty() {
                        cleanup = true;
                    } else if let Some(remaining_conn) =
                        lobby.roster.first().and_then(|p| p.conn)
                    {
                        self.sink.send(remaining_conn, ServerMsg::OpponentLeft);
                    }
                }
            }
        }

        self.conn_lobby.remove(&conn);
        if let Some(id) = &leaver_id {
            self.reconnect.remove(id);
            info!(lobby_id = %lobby_id, player_id = %id, "player left");
        }
        if cleanup {
            self.cleanup_lobby(&lobby_id);
        }
    }

    /// Tear a lobby down: cancel its timers and absence records, unmap
    /// every member connection, and forget it. Idempotent.
    pub fn cleanup_lobby(&mut self, lobby_id: &str) {
        let Some(mut lobby) = self.lobbies.remove(lobby_id) else {
            return;
        };
        if let Some(session) = &mut lobby.session {
            session.complete_silently();
        }
        for player in lobby.members() {
            if let Some(conn) = player.conn {
                self.conn_lobby.remove(&conn);
            }
        }
        self.reconnect.clear_lobby(lobby_id);
        info!(lobby_id, "lobby cleaned up");
    }

    // ------------------------------------------------------------------
    // Game-event plumbing
    // ------------------------------------------------------------------

    /// Context validation shared by every in-game event: resolve the
    /// connection to a lobby and the caller to a seat; clean up stale
    /// lobbies on the way.
    fn session_ctx(&mut self, conn: ConnId) -> Option<(String, usize)> {
        let lobby_id = self.conn_lobby.get(&conn)?.clone();
        let (known, empty, completed, idx) = match self.lobbies.get(&lobby_id) {
            None => (false, false, false, None),
            Some(lobby) => (
                true,
                lobby.is_empty(),
                lobby
                    .session
                    .as_ref()
                    .is_some_and(Session::is_completed),
                lobby
                    .session
                    .as_ref()
                    .and_then(|s| s.player_index_by_conn(conn)),
            ),
        };
        if !known {
            self.conn_lobby.remove(&conn);
            return None;
        }
        if empty {
            self.cleanup_lobby(&lobby_id);
            return None;
        }
        if completed {
            self.sink.send(
                conn,
                ServerMsg::Error {
                    message: ERR_SESSION_ENDED.into(),
                },
            );
            self.cleanup_lobby(&lobby_id);
            return None;
        }
        let idx = idx?;
        Some((lobby_id, idx))
    }

    fn with_session(
        &mut self,
        conn: ConnId,
        f: impl FnOnce(&mut Session, usize) -> Result<(), DomainError>,
    ) -> Result<(), DomainError> {
        let Some((lobby_id, idx)) = self.session_ctx(conn) else {
            return Ok(());
        };
        let Some(session) = self.lobbies.get_mut(&lobby_id).and_then(|l| l.session.as_mut())
        else {
            return Ok(());
        };
        match f(session, idx) {
            Ok(()) => Ok(()),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                // Wrong-phase and rule noise on readiness signals is
                // dropped without a reply.
                debug!(lobby_id = %lobby_id, error = %err, "event dropped");
                Ok(())
            }
        }
    }

    fn set_sequence(&mut self, conn: ConnId, cards: Vec<Card>) -> Result<(), DomainError> {
        let Some((lobby_id, idx)) = self.session_ctx(conn) else {
            return Ok(());
        };
        let Some(session) = self.lobbies.get_mut(&lobby_id).and_then(|l| l.session.as_mut())
        else {
            return Ok(());
        };
        if let Err(err) = validate_sequence(&cards, session.players()[idx].hand()) {
            self.sink.send(
                conn,
                ServerMsg::Error {
                    message: err.to_string(),
                },
            );
            return Ok(());
        }
        match session.commit_sequence(idx, cards) {
            Ok(()) => Ok(()),
            Err(err) if err.is_fatal() => Err(err),
            Err(DomainError::Rule(message)) => {
                self.sink.send(conn, ServerMsg::Error { message });
                Ok(())
            }
            Err(err) => {
                debug!(lobby_id = %lobby_id, error = %err, "sequence dropped");
                Ok(())
            }
        }
    }

    fn swap_cards(&mut self, conn: ConnId, payload: SwapPayload) -> Result<(), DomainError> {
        let Some((lobby_id, idx)) = self.session_ctx(conn) else {
            return Ok(());
        };
        let Some(session) = self.lobbies.get_mut(&lobby_id).and_then(|l| l.session.as_mut())
        else {
            return Ok(());
        };
        let positions =
            validate_swap_positions(payload.pos1, payload.pos2, session.current_round());
        let (pos1, pos2) = match positions {
            Ok(positions) => positions,
            Err(err) => {
                self.sink.send(
                    conn,
                    ServerMsg::SwapError {
                        message: err.to_string(),
                    },
                );
                return Ok(());
            }
        };
        match session.swap_cards(idx, pos1, pos2) {
            Ok(()) => Ok(()),
            Err(err) if err.is_fatal() => Err(err),
            Err(DomainError::Rule(message)) => {
                self.sink.send(conn, ServerMsg::SwapError { message });
                Ok(())
            }
            Err(err) => {
                debug!(lobby_id = %lobby_id, error = %err, "swap dropped");
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Timer callbacks (validated re-entry)
    // ------------------------------------------------------------------

    fn on_timer_tick(&mut self, lobby_id: &str, epoch: u64, kind: TimerKind, remaining: u64) {
        let Some(session) = self.lobbies.get(lobby_id).and_then(|l| l.session.as_ref()) else {
            return;
        };
        if session.timer_epoch() != epoch || session.is_paused() || session.is_completed() {
            return;
        }
        session.emit_timer_tick(kind, remaining);
    }

    fn on_timer_expired(&mut self, lobby_id: &str, epoch: u64, kind: TimerKind) {
        let Some(session) = self.lobbies.get_mut(lobby_id).and_then(|l| l.session.as_mut())
        else {
            return;
        };
        if session.timer_epoch() != epoch || session.is_paused() || session.is_completed() {
            return;
        }
        if let Err(err) = session.handle_timer_expiry(kind) {
            error!(lobby_id, ?kind, error = %err, "timer expiry failed");
        }
    }

    fn run_deferred_round_start(&mut self, lobby_id: &str) {
        let Some(session) = self.lobbies.get_mut(lobby_id).and_then(|l| l.session.as_mut())
        else {
            return;
        };
        if let Err(err) = session.deferred_round_start() {
            error!(lobby_id, error = %err, "deferred round start failed");
        }
    }
}

// ----------------------------------------------------------------------
// Task spawners: every callback re-enters through the weak handle and is
// re-validated under the lock.
// ----------------------------------------------------------------------

pub(crate) fn timer_tick(
    handle: &RegistryHandle,
    lobby_id: &str,
    epoch: u64,
    kind: TimerKind,
    remaining: u64,
) {
    let Some(inner) = handle.upgrade() else {
        return;
    };
    lock_registry(&inner).on_timer_tick(lobby_id, epoch, kind, remaining);
}

pub(crate) fn timer_expired(handle: &RegistryHandle, lobby_id: &str, epoch: u64, kind: TimerKind) {
    let Some(inner) = handle.upgrade() else {
        return;
    };
    lock_registry(&inner).on_timer_expired(lobby_id, epoch, kind);
}

fn spawn_reconnect_expiry(handle: RegistryHandle, player_id: PlayerId, token: Uuid) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(RECONNECT_WINDOW).await;
        let Some(inner) = handle.upgrade() else {
            return;
        };
        lock_registry(&inner).on_reconnect_expired(&player_id, token);
    })
}

fn spawn_disconnect_notify(handle: RegistryHandle, player_id: PlayerId, token: Uuid) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(DISCONNECT_NOTIFY_GRACE).await;
        let Some(inner) = handle.upgrade() else {
            return;
        };
        lock_registry(&inner).on_notify_due(&player_id, token);
    })
}

fn schedule_deferred_round_start(handle: RegistryHandle, lobby_id: String) {
    tokio::spawn(async move {
        tokio::time::sleep(RESUME_ROUND_YIELD).await;
        let Some(inner) = handle.upgrade() else {
            return;
        };
        lock_registry(&inner).run_deferred_round_start(&lobby_id);
    });
}
