use ulid::Ulid;

use crate::model::{ClientType, QuoteStatus, TimeWindow};
use crate::store::StoreError;

/// How a failure propagates to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input; returned synchronously, no retry.
    Validation,
    /// Legitimate business rejection.
    Unavailable,
    /// Missing space, config, rate or quote.
    NotFound,
    /// Invalid state transition, rejected before any side effect.
    State,
    Store,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("no rate card for config {config_id} and {client_type} clients")]
    RateNotFound {
        config_id: Ulid,
        client_type: ClientType,
    },
    #[error("no applicable rate for {duration_hours}h")]
    NoApplicableRate { duration_hours: u32 },
    #[error("quote not found: {0}")]
    QuoteNotFound(Ulid),
    #[error("quote {id} is {status}, only pending quotes can be confirmed")]
    InvalidState { id: Ulid, status: QuoteStatus },
    #[error("time {window} conflicts with existing block {block_id}")]
    Conflict { block_id: Ulid, window: TimeWindow },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::RateNotFound { .. }
            | EngineError::NoApplicableRate { .. }
            | EngineError::QuoteNotFound(_) => ErrorKind::NotFound,
            EngineError::InvalidState { .. } => ErrorKind::State,
            EngineError::Conflict { .. } => ErrorKind::Unavailable,
            EngineError::Store(StoreError::StaleQuote(_)) => ErrorKind::State,
            EngineError::Store(StoreError::BlockOverlap { .. }) => ErrorKind::Unavailable,
            EngineError::Store(StoreError::NotFound(_)) => ErrorKind::NotFound,
            EngineError::Store(_) => ErrorKind::Store,
        }
    }
}
