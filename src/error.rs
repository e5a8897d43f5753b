use thiserror::Error;

use crate::types::GamePhase;

/// How the transport should treat a rejected action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectionKind {
    Precondition,
    Stale,
    Structural,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("action is not valid while {0:?}")]
    WrongPhase(GamePhase),
    #[error("unknown player {0}")]
    UnknownPlayer(String),
    #[error("{0} is not entitled to this action")]
    NotEntitled(String),
    #[error("precondition failed: {0}")]
    Precondition(String),
    #[error("{player} may not vote {vote}")]
    IllegalVote { player: String, vote: &'static str },
    #[error("match configuration is impossible: {0}")]
    Structural(String),
    #[error("match halted, reset required")]
    Halted,
}

impl ActionError {
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    pub fn kind(&self) -> RejectionKind {
        match self {
            Self::Precondition(_) | Self::IllegalVote { .. } => RejectionKind::Precondition,
            Self::WrongPhase(_) | Self::UnknownPlayer(_) | Self::NotEntitled(_) => {
                RejectionKind::Stale
            }
            Self::Structural(_) | Self::Halted => RejectionKind::Structural,
        }
    }
}

pub type ActionResult<T = ()> = Result<T, ActionError>;
