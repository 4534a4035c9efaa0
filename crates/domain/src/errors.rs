use thiserror::Error;

use crate::sessions::safety::BlockReason;

/// Closed set of domain errors. Callers branch on the variant, never on the
/// message text; `code()` gives the machine-readable form surfaced at the
/// service boundary.
#[derive(Error, Clone, Debug, Eq, PartialEq)]
pub enum Error {
    #[error("Entity not found: {entity}")]
    NotFound { entity: String },

    #[error("Uniqueness conflict: {field}")]
    Uniqueness { field: String },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Prescription has no items to verify")]
    NoItems,

    #[error("Items can only be added while the prescription is in draft")]
    NotDraft,

    #[error("A completed prescription cannot be cancelled")]
    CannotCancelCompleted,

    #[error("No refills remaining")]
    NoRefillsRemaining,

    #[error("Prescription cannot be dispensed")]
    NotDispensable,

    #[error("Prescription has expired")]
    PrescriptionExpired,

    #[error("Safety block: {0}")]
    SafetyBlock(BlockReason),

    #[error("Session is no longer accepting scans")]
    SessionClosed,

    #[error("Session is owned by another operator")]
    NotSessionOperator,

    #[error("Prescription already has a session in progress")]
    SessionInProgress,

    #[error("Stale stage: entry is at {actual}, caller expected {expected}")]
    StaleStage { expected: String, actual: String },

    #[error("Invalid stage transition from {from} to {to}")]
    InvalidStageTransition { from: String, to: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Persistence error: {message}")]
    Persistence { message: String },
}

impl Error {
    /// Boundary error code. Stable across message wording changes.
    pub fn code(&self) -> String {
        match self {
            Error::NotFound { .. } => "NOT_FOUND".to_string(),
            Error::Uniqueness { .. } => "CONFLICT".to_string(),
            Error::InvalidTransition { .. } => "INVALID_TRANSITION".to_string(),
            Error::NoItems => "NO_ITEMS".to_string(),
            Error::NotDraft => "NOT_DRAFT".to_string(),
            Error::CannotCancelCompleted => "CANNOT_CANCEL_COMPLETED".to_string(),
            Error::NoRefillsRemaining => "NO_REFILLS_REMAINING".to_string(),
            Error::NotDispensable => "NOT_DISPENSABLE".to_string(),
            Error::PrescriptionExpired => "PRESCRIPTION_EXPIRED".to_string(),
            Error::SafetyBlock(reason) => format!("SAFETY_BLOCK:{}", reason.code()),
            Error::SessionClosed => "SESSION_CLOSED".to_string(),
            Error::NotSessionOperator => "NOT_SESSION_OPERATOR".to_string(),
            Error::SessionInProgress => "SESSION_IN_PROGRESS".to_string(),
            Error::StaleStage { .. } => "STALE_STAGE".to_string(),
            Error::InvalidStageTransition { .. } => "INVALID_STAGE_TRANSITION".to_string(),
            Error::Validation { .. } => "VALIDATION".to_string(),
            Error::Persistence { .. } => "PERSISTENCE".to_string(),
        }
    }
}
