use serde::{Deserialize, Serialize};

use crate::nutrition::NutritionRecord;
use crate::scan::services::LookupOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    Barcode,
    Image,
}

/// Display state of one scanning session. Exactly one of these holds at a
/// time, so "loading while showing a result" cannot be expressed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    AwaitingInput {
        mode: ScanMode,
    },
    Loading {
        mode: ScanMode,
        #[serde(skip)]
        generation: u64,
    },
    Displaying {
        mode: ScanMode,
        record: NutritionRecord,
    },
    Error {
        mode: ScanMode,
        message: String,
    },
}

impl SessionState {
    pub fn mode(&self) -> Option<ScanMode> {
        match self {
            SessionState::Idle => None,
            SessionState::AwaitingInput { mode }
            | SessionState::Loading { mode, .. }
            | SessionState::Displaying { mode, .. }
            | SessionState::Error { mode, .. } => Some(*mode),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,
    #[error("select a scan mode first")]
    NoModeSelected,
    #[error("session is in {current:?} mode, not {requested:?}")]
    WrongMode {
        current: ScanMode,
        requested: ScanMode,
    },
    #[error("a request is already in flight")]
    Busy,
}

/// Handed out when a request is dispatched; only the ticket for the current
/// generation may write its result back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
}

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Applied,
    Stale,
}

#[derive(Debug, Clone)]
pub struct ScanSession {
    state: SessionState,
    generation: u64,
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            generation: 0,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Allowed from any state. Clears any result or error and orphans a
    /// request still in flight.
    pub fn select_mode(&mut self, mode: ScanMode) {
        self.generation += 1;
        self.state = SessionState::AwaitingInput { mode };
    }

    pub fn begin(&mut self, requested: ScanMode) -> Result<Ticket, SessionError> {
        let current = match &self.state {
            SessionState::Idle => return Err(SessionError::NoModeSelected),
            SessionState::Loading { .. } => return Err(SessionError::Busy),
            other => other.mode().ok_or(SessionError::NoModeSelected)?,
        };
        if current != requested {
            return Err(SessionError::WrongMode { current, requested });
        }
        self.generation += 1;
        self.state = SessionState::Loading {
            mode: current,
            generation: self.generation,
        };
        Ok(Ticket {
            generation: self.generation,
        })
    }

    pub fn complete(&mut self, ticket: Ticket, outcome: LookupOutcome) -> Applied {
        let mode = match self.state {
            SessionState::Loading { mode, generation } if generation == ticket.generation => mode,
            _ => return Applied::Stale,
        };
        self.state = match outcome {
            LookupOutcome::Found { record } => SessionState::Displaying { mode, record },
            LookupOutcome::NotFound { message } | LookupOutcome::Failed { message } => {
                SessionState::Error { mode, message }
            }
        };
        Applied::Applied
    }
}
