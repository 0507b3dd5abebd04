//! One running game: two players, the phase machine, the current timer,
//! and everything emitted to either side.

use std::sync::Arc;
use std::time::Duration;

use rand::thread_rng;
use tracing::info;

use crate::config::{
    CONTINUE_SECS, PREVIEW_SECS, SEQUENCE_SECS, SWAP_SECS, TOTAL_ROUNDS,
};
use crate::domain::deck::{deal_hand, shuffle_cards};
use crate::domain::rules::{explain, resolve, RoundOutcome};
use crate::domain::{Card, ConnId, DomainError, Player, PlayerId};
use crate::lobby::registry::{self, RegistryHandle};
use crate::protocol::{EventSink, ServerMsg};
use crate::session::machine::{PendingAction, Phase, SessionStateMachine};
use crate::session::snapshot::{ReconnectSnapshot, RoundResult};
use crate::session::timer::{Countdown, ExpireFn, TickFn};

/// Which countdown a timer callback belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Preview,
    Sequence,
    Swap,
    Continue,
}

pub struct Session {
    lobby_id: String,
    players: [Player; 2],
    machine: SessionStateMachine,
    timer: Option<Countdown>,
    /// Bumped on every timer replacement; callbacks re-validate it under
    /// the registry lock so a cancelled timer can never act.
    timer_epoch: u64,
    history: Vec<RoundResult>,
    /// Rounds fully resolved so far, in `[0, 6]`.
    current_round: usize,
    preview_ready: [bool; 2],
    continue_ready: [bool; 2],
    completed: bool,
    sink: Arc<dyn EventSink>,
    handle: RegistryHandle,
}

impl Session {
    pub fn new(
        lobby_id: String,
        players: [Player; 2],
        sink: Arc<dyn EventSink>,
        handle: RegistryHandle,
    ) -> Self {
        Self {
            lobby_id,
            players,
            machine: SessionStateMachine::new(),
            timer: None,
            timer_epoch: 0,
            history: Vec::with_capacity(TOTAL_ROUNDS),
            current_round: 0,
            preview_ready: [false; 2],
            continue_ready: [false; 2],
            completed: false,
            sink,
            handle,
        }
    }

    // ------------------------------------------------------------------
    // Accessors used by the lobby registry
    // ------------------------------------------------------------------

    pub fn phase(&self) -> Phase {
        self.machine.phase()
    }

    pub fn is_paused(&self) -> bool {
        self.machine.is_paused()
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn current_round(&self) -> usize {
        self.current_round
    }

    pub fn history(&self) -> &[RoundResult] {
        &self.history
    }

    pub fn players(&self) -> &[Player; 2] {
        &self.players
    }

    pub fn players_mut(&mut self) -> &mut [Player; 2] {
        &mut self.players
    }

    pub fn player_index_by_id(&self, id: &str) -> Option<usize> {
        self.players.iter().position(|p| p.id == id)
    }

    pub fn player_index_by_conn(&self, conn: ConnId) -> Option<usize> {
        self.players.iter().position(|p| p.conn == Some(conn))
    }

    pub fn any_disconnected(&self) -> bool {
        self.players.iter().any(|p| p.disconnected)
    }

    pub fn all_disconnected(&self) -> bool {
        self.players.iter().all(|p| p.disconnected)
    }

    pub(crate) fn timer_epoch(&self) -> u64 {
        self.timer_epoch
    }

    pub fn timer_remaining(&self) -> u64 {
        self.timer.as_ref().map_or(0, Countdown::remaining_secs)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Deal both hands, show the preview, start the preview countdown.
    pub fn start(&mut self) -> Result<(), DomainError> {
        let mut rng = thread_rng();
        for player in &mut self.players {
            player.set_hand(deal_hand(&mut rng))?;
        }
        self.machine.transition(Phase::Preview)?;
        info!(lobby_id = %self.lobby_id, "session started");

        for idx in 0..2 {
            self.emit_to(
                idx,
                ServerMsg::CardsPreview {
                    your_cards: self.players[idx].hand().to_vec(),
                    opponent_cards: self.players[1 - idx].hand().to_vec(),
                    time_limit: PREVIEW_SECS,
                },
            );
        }
        self.arm_timer(TimerKind::Preview, PREVIEW_SECS);
        Ok(())
    }

    /// A player signals they are done looking at the face-up hands.
    pub fn preview_ready(&mut self, idx: usize) -> Result<(), DomainError> {
        self.guard_phase(Phase::Preview)?;
        if self.preview_ready[idx] {
            return Ok(());
        }
        self.preview_ready[idx] = true;
        self.emit_to(1 - idx, ServerMsg::OpponentPreviewReady);
        if self.preview_ready.iter().all(|&r| r) {
            self.begin_sequence_phase()?;
        }
        Ok(())
    }

    fn begin_sequence_phase(&mut self) -> Result<(), DomainError> {
        self.machine.transition(Phase::Sequence)?;
        self.preview_ready = [false; 2];
        self.emit_both(ServerMsg::GameStart {
            time_limit: SEQUENCE_SECS,
        });
        self.arm_timer(TimerKind::Sequence, SEQUENCE_SECS);
        Ok(())
    }

    /// Commit a player's ordering. The ordering was already shape-checked
    /// against their hand at the edge.
    pub fn commit_sequence(&mut self, idx: usize, cards: Vec<Card>) -> Result<(), DomainError> {
        self.guard_phase(Phase::Sequence)?;
        self.players[idx].set_sequence(cards)?;
        self.emit_to(idx, ServerMsg::SequenceConfirmed);
        if self.players.iter().all(Player::sequence_set) {
            self.start_round()?;
        }
        Ok(())
    }

    /// Sequence countdown ran out: auto-commit a random shuffle for
    /// anyone who never did, then enter the round loop.
    pub(crate) fn handle_sequence_timeout(&mut self) -> Result<(), DomainError> {
        let mut rng = thread_rng();
        for player in &mut self.players {
            if !player.sequence_set() {
                let mut cards = player.hand().to_vec();
                shuffle_cards(&mut cards, &mut rng);
                player.set_sequence(cards)?;
            }
        }
        self.start_round()
    }

    /// Enter the next round, or defer it if someone is absent.
    pub(crate) fn start_round(&mut self) -> Result<(), DomainError> {
        if self.completed || self.machine.is_terminal() {
            return Ok(());
        }
        if self.machine.phase() != Phase::RoundStart {
            self.machine.transition(Phase::RoundStart)?;
        }
        if self.any_disconnected() {
            // Deferred: consumed on resume, after a brief yield. No
            // countdown runs while the round is held back.
            self.timer = None;
            self.machine.pause();
            self.machine.defer(PendingAction::StartRound);
            info!(lobby_id = %self.lobby_id, "round start deferred while a player is absent");
            return Ok(());
        }
        self.machine.transition(Phase::Swap)?;
        for player in &mut self.players {
            player.reset_round();
        }
        for idx in 0..2 {
            self.emit_to(
                idx,
                ServerMsg::RoundStart {
                    round: self.current_round + 1,
                    time_limit: SWAP_SECS,
                    your_cards: self.players[idx].upcoming(self.current_round).to_vec(),
                    swaps_left: self.players[idx].swaps_left(),
                },
            );
        }
        self.arm_timer(TimerKind::Swap, SWAP_SECS);
        Ok(())
    }

    /// The post-resume yield elapsed: run the held-back round start. If
    /// the player dropped again inside the yield, re-queue the deferral
    /// so the next resume picks it up.
    pub(crate) fn deferred_round_start(&mut self) -> Result<(), DomainError> {
        if self.completed || self.machine.is_terminal() {
            return Ok(());
        }
        if self.machine.phase() != Phase::RoundStart {
            return Ok(());
        }
        if self.machine.is_paused() {
            self.machine.defer(PendingAction::StartRound);
            return Ok(());
        }
        self.start_round()
    }

    /// Swap two adjacent cards. Positions are in the remaining-cards
    /// frame and were bounds-checked at the edge; translate them into the
    /// absolute frame so already-played cards stay untouchable.
    pub fn swap_cards(&mut self, idx: usize, pos1: usize, pos2: usize) -> Result<(), DomainError> {
        self.guard_phase(Phase::Swap)?;
        let abs1 = pos1 + self.current_round;
        let abs2 = pos2 + self.current_round;
        self.players[idx].swap_cards(abs1, abs2)?;
        self.players[idx].ready = true;
        self.emit_to(
            idx,
            ServerMsg::SwapConfirmed {
                your_cards: self.players[idx].upcoming(self.current_round).to_vec(),
                swaps_left: self.players[idx].swaps_left(),
            },
        );
        self.emit_to(1 - idx, ServerMsg::OpponentSwapped);
        self.finish_swap_phase_if_ready()
    }

    /// Decline to swap this round.
    pub fn skip_swap(&mut self, idx: usize) -> Result<(), DomainError> {
        self.guard_phase(Phase::Swap)?;
        if self.players[idx].ready {
            return Ok(());
        }
        self.players[idx].ready = true;
        self.emit_to(idx, ServerMsg::SkipConfirmed);
        self.finish_swap_phase_if_ready()
    }

    fn finish_swap_phase_if_ready(&mut self) -> Result<(), DomainError> {
        if self.players.iter().all(|p| p.ready) {
            self.reveal()?;
        }
        Ok(())
    }

    /// Resolve the current round and open the continue window.
    pub(crate) fn reveal(&mut self) -> Result<(), DomainError> {
        self.machine.transition(Phase::Reveal)?;
        let round_idx = self.current_round;
        let first = self.players[0].sequence()[round_idx];
        let second = self.players[1].sequence()[round_idx];
        let outcome = resolve(first, second);
        let winner: Option<PlayerId> = match outcome {
            RoundOutcome::Winner(w) => {
                self.players[w].record_win();
                Some(self.players[w].id.clone())
            }
            RoundOutcome::Draw => None,
        };
        self.current_round += 1;
        let explanation = explain(first, second);
        let result = RoundResult {
            round: self.current_round,
            cards: [first, second],
            winner: winner.clone(),
            explanation: explanation.clone(),
            scores: [self.players[0].score, self.players[1].score],
        };
        info!(
            lobby_id = %self.lobby_id,
            round = result.round,
            winner = winner.as_deref().unwrap_or("draw"),
            "round resolved"
        );
        self.history.push(result);
        self.continue_ready = [false; 2];

        for idx in 0..2 {
            self.emit_to(
                idx,
                ServerMsg::RoundResult {
                    round: self.current_round,
                    your_card: if idx == 0 { first } else { second },
                    opponent_card: if idx == 0 { second } else { first },
                    winner_id: winner.clone(),
                    explanation: explanation.clone(),
                    your_score: self.players[idx].score,
                    opponent_score: self.players[1 - idx].score,
                },
            );
        }
        self.arm_timer(TimerKind::Continue, CONTINUE_SECS);
        Ok(())
    }

    /// A player confirms the round result.
    pub fn continue_round(&mut self, idx: usize) -> Result<(), DomainError> {
        self.guard_phase(Phase::Reveal)?;
        if self.continue_ready[idx] {
            return Ok(());
        }
        self.continue_ready[idx] = true;
        self.emit_to(1 - idx, ServerMsg::OpponentContinued);
        if self.continue_ready.iter().all(|&r| r) {
            self.proceed_after_reveal()?;
        }
        Ok(())
    }

    pub(crate) fn proceed_after_reveal(&mut self) -> Result<(), DomainError> {
        self.continue_ready = [false; 2];
        if self.current_round >= TOTAL_ROUNDS {
            self.end_game();
            Ok(())
        } else {
            self.start_round()
        }
    }

    /// Natural completion: winner by score, tie otherwise.
    pub(crate) fn end_game(&mut self) {
        let winner_idx = match self.players[0].score.cmp(&self.players[1].score) {
            std::cmp::Ordering::Greater => Some(0),
            std::cmp::Ordering::Less => Some(1),
            std::cmp::Ordering::Equal => None,
        };
        let winner_id = winner_idx.map(|w| self.players[w].id.clone());
        self.machine.end_game();
        self.timer = None;
        info!(
            lobby_id = %self.lobby_id,
            winner = winner_id.as_deref().unwrap_or("tie"),
            "game over"
        );
        for idx in 0..2 {
            self.emit_to(
                idx,
                ServerMsg::GameEnd {
                    your_score: self.players[idx].score,
                    opponent_score: self.players[1 - idx].score,
                    winner_id: winner_id.clone(),
                    you_won: winner_idx == Some(idx),
                    by_disconnect: false,
                },
            );
        }
        self.completed = true;
    }

    /// The absent player's window expired or they forfeited: the other
    /// player wins.
    pub(crate) fn end_game_by_disconnect(&mut self, winner_idx: usize) {
        if self.completed {
            return;
        }
        let winner_id = self.players[winner_idx].id.clone();
        self.machine.end_game();
        self.timer = None;
        info!(
            lobby_id = %self.lobby_id,
            winner = %winner_id,
            "game ended by disconnect"
        );
        for idx in 0..2 {
            self.emit_to(
                idx,
                ServerMsg::GameEnd {
                    your_score: self.players[idx].score,
                    opponent_score: self.players[1 - idx].score,
                    winner_id: Some(winner_id.clone()),
                    you_won: idx == winner_idx,
                    by_disconnect: true,
                },
            );
        }
        self.completed = true;
    }

    /// Both players gone: terminal with no winner and no events.
    pub(crate) fn complete_silently(&mut self) {
        self.machine.end_game();
        self.timer = None;
        self.completed = true;
    }

    // ------------------------------------------------------------------
    // Pause / resume
    // ------------------------------------------------------------------

    /// Standard disconnect path: freeze the machine and the countdown.
    pub(crate) fn pause_for_disconnect(&mut self) {
        self.machine.pause();
        if let Some(timer) = &mut self.timer {
            timer.pause();
        }
        info!(lobby_id = %self.lobby_id, phase = ?self.machine.phase(), "session paused");
    }

    /// Lift the pause. Returns the deferred action, if one was queued,
    /// for the caller to schedule after the resume notification lands.
    pub(crate) fn resume_play(&mut self) -> Option<PendingAction> {
        if !self.machine.is_paused() {
            return None;
        }
        let pending = self.machine.resume();
        if let Some(timer) = &mut self.timer {
            timer.resume();
        }
        self.emit_both(ServerMsg::GameResumed);
        info!(lobby_id = %self.lobby_id, ?pending, "session resumed");
        pending
    }

    // ------------------------------------------------------------------
    // Snapshot
    // ------------------------------------------------------------------

    /// The reconnection view for one player.
    pub fn snapshot_for(&self, idx: usize) -> ReconnectSnapshot {
        let phase = self.machine.phase();
        let me = &self.players[idx];
        let opponent = &self.players[1 - idx];
        let (you_ready, opponent_ready) = match phase {
            Phase::Preview => (self.preview_ready[idx], self.preview_ready[1 - idx]),
            Phase::Swap => (me.ready, opponent.ready),
            Phase::Reveal => (self.continue_ready[idx], self.continue_ready[1 - idx]),
            _ => (false, false),
        };
        ReconnectSnapshot {
            phase,
            current_round: self.current_round,
            your_id: me.id.clone(),
            your_name: me.name.clone(),
            your_score: me.score,
            your_swaps_left: me.swaps_left(),
            opponent_id: opponent.id.clone(),
            opponent_name: opponent.name.clone(),
            opponent_score: opponent.score,
            opponent_swaps_left: opponent.swaps_left(),
            history: self.history.clone(),
            timer_remaining: self.timer_remaining(),
            your_upcoming: me.upcoming(self.current_round).to_vec(),
            your_hand: me.hand().to_vec(),
            you_ready,
            opponent_ready,
            opponent_hand: (phase == Phase::Preview).then(|| opponent.hand().to_vec()),
        }
    }

    // ------------------------------------------------------------------
    // Timer plumbing
    // ------------------------------------------------------------------

    fn arm_timer(&mut self, kind: TimerKind, secs: u64) {
        self.timer_epoch += 1;
        let epoch = self.timer_epoch;

        let tick: Option<TickFn> = match kind {
            // The sequence countdown has no per-second wire event.
            TimerKind::Sequence => None,
            _ => {
                let handle = self.handle.clone();
                let lobby_id = self.lobby_id.clone();
                Some(Arc::new(move |remaining| {
                    registry::timer_tick(&handle, &lobby_id, epoch, kind, remaining);
                }))
            }
        };
        let handle = self.handle.clone();
        let lobby_id = self.lobby_id.clone();
        let expire: ExpireFn = Arc::new(move || {
            registry::timer_expired(&handle, &lobby_id, epoch, kind);
        });

        // Replacing the countdown cancels the previous one.
        self.timer = Some(Countdown::start(Duration::from_secs(secs), tick, expire));
    }

    /// Forward a validated tick to both players.
    pub(crate) fn emit_timer_tick(&self, kind: TimerKind, remaining: u64) {
        let event = match kind {
            TimerKind::Preview => ServerMsg::PreviewTimerUpdate { remaining },
            TimerKind::Swap => ServerMsg::TimerUpdate { remaining },
            TimerKind::Continue => ServerMsg::ContinueCountdown { remaining },
            TimerKind::Sequence => return,
        };
        self.emit_both(event);
    }

    /// A validated expiry: advance whatever phase the countdown guarded.
    pub(crate) fn handle_timer_expiry(&mut self, kind: TimerKind) -> Result<(), DomainError> {
        match kind {
            TimerKind::Preview => self.begin_sequence_phase(),
            TimerKind::Sequence => self.handle_sequence_timeout(),
            TimerKind::Swap => self.reveal(),
            TimerKind::Continue => self.proceed_after_reveal(),
        }
    }

    // ------------------------------------------------------------------
    // Emission
    // ------------------------------------------------------------------

    fn guard_phase(&self, expected: Phase) -> Result<(), DomainError> {
        if self.completed {
            return Err(DomainError::phase("session is completed"));
        }
        if self.machine.is_paused() {
            return Err(DomainError::phase("session is paused"));
        }
        if self.machine.phase() != expected {
            return Err(DomainError::phase(format!(
                "expected {expected:?}, in {:?}",
                self.machine.phase()
            )));
        }
        Ok(())
    }

    pub(crate) fn emit_to(&self, idx: usize, event: ServerMsg) {
        if self.completed {
            return;
        }
        if let Some(conn) = self.players[idx].conn {
            self.sink.send(conn, event);
        }
    }

    pub(crate) fn emit_both(&self, event: ServerMsg) {
        self.emit_to(0, event.clone());
        self.emit_to(1, event);
    }
}
