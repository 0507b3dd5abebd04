//! Phase sequencing with pause/resume and a single deferred-action slot.

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Overall session progression phases.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Lobby filled but the game has not begun.
    Waiting,
    /// Both hands shown face-up.
    Preview,
    /// Players commit their orderings.
    Sequence,
    /// Transient: a round is being set up.
    RoundStart,
    /// Players may swap adjacent cards or skip.
    Swap,
    /// Round cards are face-up; waiting for continue.
    Reveal,
    /// Terminal.
    GameOver,
}

/// The only action that can be queued while paused.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PendingAction {
    StartRound,
}

/// Phase machine with an explicit pause overlay. While paused the actual
/// phase is saved; `transition` is a programmer error until resume.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    phase: Phase,
    saved: Option<Phase>,
    paused: bool,
    pending: Option<PendingAction>,
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self {
            phase: Phase::Waiting,
            saved: None,
            paused: false,
            pending: None,
        }
    }

    /// The live phase, ignoring the pause overlay.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_terminal(&self) -> bool {
        self.phase == Phase::GameOver
    }

    pub fn pending(&self) -> Option<PendingAction> {
        self.pending
    }

    fn allowed(from: Phase, to: Phase) -> bool {
        use Phase::*;
        matches!(
            (from, to),
            (Waiting, Preview)
                | (Preview, Sequence)
                | (Sequence, RoundStart)
                | (RoundStart, Swap)
                | (Swap, Reveal)
                | (Reveal, RoundStart)
                | (Reveal, GameOver)
        )
    }

    /// Move to `to`. Rejected while paused; rejected off the transition
    /// table; a no-op request out of a terminal phase is also rejected.
    pub fn transition(&mut self, to: Phase) -> Result<(), DomainError> {
        if self.paused {
            return Err(DomainError::invariant(format!(
                "transition to {to:?} requested while paused"
            )));
        }
        if !Self::allowed(self.phase, to) {
            return Err(DomainError::phase(format!(
                "illegal transition {:?} -> {to:?}",
                self.phase
            )));
        }
        self.phase = to;
        Ok(())
    }

    /// Engage the pause overlay. No-op when already paused or terminal.
    pub fn pause(&mut self) {
        if self.paused || self.is_terminal() {
            return;
        }
        self.saved = Some(self.phase);
        self.paused = true;
    }

    /// Lift the pause overlay, restoring the saved phase, and hand back
    /// any action that was deferred mid-pause. No-op when not paused.
    pub fn resume(&mut self) -> Option<PendingAction> {
        if !self.paused {
            return None;
        }
        if let Some(saved) = self.saved.take() {
            self.phase = saved;
        }
        self.paused = false;
        self.pending.take()
    }

    /// Queue the one deferred action. Meaningful only while paused.
    pub fn defer(&mut self, action: PendingAction) {
        self.pending = Some(action);
    }

    /// Force the terminal phase regardless of pause state.
    pub fn end_game(&mut self) {
        self.phase = Phase::GameOver;
        self.saved = None;
        self.paused = false;
        self.pending = None;
    }
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_the_happy_path() {
        let mut m = SessionStateMachine::new();
        for to in [
            Phase::Preview,
            Phase::Sequence,
            Phase::RoundStart,
            Phase::Swap,
            Phase::Reveal,
            Phase::RoundStart,
            Phase::Swap,
            Phase::Reveal,
            Phase::GameOver,
        ] {
            m.transition(to).unwrap();
        }
        assert!(m.is_terminal());
    }

    #[test]
    fn rejects_illegal_edges() {
        let mut m = SessionStateMachine::new();
        assert!(matches!(
            m.transition(Phase::Swap),
            Err(DomainError::Phase(_))
        ));
        m.transition(Phase::Preview).unwrap();
        assert!(m.transition(Phase::Reveal).is_err());
        assert_eq!(m.phase(), Phase::Preview);
    }

    #[test]
    fn no_transition_out_of_game_over() {
        let mut m = SessionStateMachine::new();
        m.end_game();
        for to in [Phase::Waiting, Phase::Preview, Phase::RoundStart] {
            assert!(m.transition(to).is_err());
        }
    }

    #[test]
    fn transition_while_paused_is_a_programmer_error() {
        let mut m = SessionStateMachine::new();
        m.transition(Phase::Preview).unwrap();
        m.pause();
        let err = m.transition(Phase::Sequence).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn pause_is_idempotent_and_resume_restores_once() {
        let mut m = SessionStateMachine::new();
        m.transition(Phase::Preview).unwrap();
        m.transition(Phase::Sequence).unwrap();
        m.pause();
        m.pause();
        assert!(m.is_paused());
        assert_eq!(m.phase(), Phase::Sequence);

        assert_eq!(m.resume(), None);
        assert!(!m.is_paused());
        assert_eq!(m.phase(), Phase::Sequence);
        // Second resume is a no-op.
        assert_eq!(m.resume(), None);
    }

    #[test]
    fn pause_on_terminal_is_a_no_op() {
        let mut m = SessionStateMachine::new();
        m.end_game();
        m.pause();
        assert!(!m.is_paused());
    }

    #[test]
    fn deferred_action_is_consumed_on_resume() {
        let mut m = SessionStateMachine::new();
        m.transition(Phase::Preview).unwrap();
        m.transition(Phase::Sequence).unwrap();
        m.transition(Phase::RoundStart).unwrap();
        m.pause();
        m.defer(PendingAction::StartRound);
        assert_eq!(m.pending(), Some(PendingAction::StartRound));
        assert_eq!(m.resume(), Some(PendingAction::StartRound));
        assert_eq!(m.pending(), None);
    }

    #[test]
    fn end_game_clears_pause_state() {
        let mut m = SessionStateMachine::new();
        m.transition(Phase::Preview).unwrap();
        m.pause();
        m.defer(PendingAction::StartRound);
        m.end_game();
        assert!(m.is_terminal());
        assert!(!m.is_paused());
        assert_eq!(m.pending(), None);
    }
}
