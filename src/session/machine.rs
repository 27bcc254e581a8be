use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Attempting,
    Retrying,
    /// One-shot clean restart: history and parameter trajectory reset,
    /// generation restarts under a new seed offset.
    FreshRegenerating,
    Succeeded,
    Exhausted,
}

impl SessionState {
    pub fn allowed_transitions(&self) -> &'static [SessionState] {
        use SessionState::*;
        match self {
            Idle => &[Attempting],
            Attempting => &[Succeeded, Retrying, FreshRegenerating, Exhausted],
            Retrying => &[Attempting],
            FreshRegenerating => &[Attempting],
            Succeeded => &[],
            Exhausted => &[],
        }
    }

    pub fn can_transition_to(&self, target: SessionState) -> bool {
        self.allowed_transitions().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Succeeded | SessionState::Exhausted)
    }

    pub fn transition_to(&mut self, target: SessionState) -> Result<()> {
        if !self.can_transition_to(target) {
            return Err(EngineError::InvalidStateTransition {
                from: self.to_string(),
                to: target.to_string(),
                allowed: self
                    .allowed_transitions()
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }
        *self = target;
        Ok(())
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "Idle",
            Self::Attempting => "Attempting",
            Self::Retrying => "Retrying",
            Self::FreshRegenerating => "FreshRegenerating",
            Self::Succeeded => "Succeeded",
            Self::Exhausted => "Exhausted",
        };
        write!(f, "{}", s)
    }
}
