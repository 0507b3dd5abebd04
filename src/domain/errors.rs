//! Domain-level error type used across the session and lobby layers.
//!
//! This error type is transport-agnostic. The websocket layer decides per
//! kind whether to answer with an `error`/`swapError` event, drop the
//! input silently, or (for `Invariant`) log and close the connection.

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Missing resources in domain terms.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum NotFoundKind {
    Lobby,
    Player,
    ReconnectRecord,
}

/// Central domain error type.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Input failed shape validation (name, lobby code, player id, ...).
    Validation(String),
    /// A well-formed action that the game rules reject (bad swap, spent
    /// budget, sequence not a permutation).
    Rule(String),
    /// Action arrived in a phase that does not accept it. Dropped silently
    /// at the edge; never mutates state.
    Phase(String),
    /// Missing resource.
    NotFound(NotFoundKind, String),
    /// Lobby roster is full or the session no longer admits the caller.
    Admission(String),
    /// Programmer error: an internal contract was broken. Fatal at the
    /// transport boundary.
    Invariant(String),
}

impl Display for DomainError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DomainError::Validation(d) => write!(f, "validation error: {d}"),
            DomainError::Rule(d) => write!(f, "rule violation: {d}"),
            DomainError::Phase(d) => write!(f, "wrong phase: {d}"),
            DomainError::NotFound(kind, d) => write!(f, "not found {kind:?}: {d}"),
            DomainError::Admission(d) => write!(f, "admission refused: {d}"),
            DomainError::Invariant(d) => write!(f, "invariant violated: {d}"),
        }
    }
}

impl Error for DomainError {}

impl DomainError {
    pub fn validation(detail: impl Into<String>) -> Self {
        Self::Validation(detail.into())
    }
    pub fn rule(detail: impl Into<String>) -> Self {
        Self::Rule(detail.into())
    }
    pub fn phase(detail: impl Into<String>) -> Self {
        Self::Phase(detail.into())
    }
    pub fn not_found(kind: NotFoundKind, detail: impl Into<String>) -> Self {
        Self::NotFound(kind, detail.into())
    }
    pub fn admission(detail: impl Into<String>) -> Self {
        Self::Admission(detail.into())
    }
    pub fn invariant(detail: impl Into<String>) -> Self {
        Self::Invariant(detail.into())
    }

    /// Whether the transport layer should treat this as fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DomainError::Invariant(_))
    }
}
