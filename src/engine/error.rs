use thiserror::Error;

use crate::model::BookingStatus;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0}")]
    Validation(String),
    #[error("End date must be after start date")]
    InvalidRange,
    #[error("Start date cannot be in the past")]
    PastDate,
    #[error("Space not found")]
    SpaceNotFound(String),
    #[error("Space is not available")]
    SpaceUnavailable(String),
    #[error("Space capacity exceeded. Maximum capacity is {0}")]
    CapacityExceeded(u32),
    #[error("The space is not available for the selected period")]
    Conflict,
    #[error("booking store unavailable: {0}")]
    TransientStore(String),
    #[error("Booking not found")]
    BookingNotFound(String),
    #[error("cannot move booking from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Stable machine-readable label, used in API bodies and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation_error",
            EngineError::InvalidRange => "invalid_range",
            EngineError::PastDate => "past_date",
            EngineError::SpaceNotFound(_) => "space_not_found",
            EngineError::SpaceUnavailable(_) => "space_unavailable",
            EngineError::CapacityExceeded(_) => "capacity_exceeded",
            EngineError::Conflict => "conflict",
            EngineError::TransientStore(_) => "transient_store_error",
            EngineError::BookingNotFound(_) => "booking_not_found",
            EngineError::InvalidTransition { .. } => "invalid_transition",
            EngineError::LimitExceeded(_) => "limit_exceeded",
            EngineError::Internal(_) => "internal_error",
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            // A write-time exclusion failure is indistinguishable from a
            // pre-check conflict for the caller.
            StoreError::Overlap(_) => EngineError::Conflict,
            StoreError::NotFound(id) => EngineError::BookingNotFound(id.to_string()),
            StoreError::InvalidTransition { from, to } => {
                EngineError::InvalidTransition { from, to }
            }
            StoreError::Unavailable(msg) => EngineError::TransientStore(msg),
            StoreError::DuplicateReference(r) => {
                EngineError::Internal(format!("duplicate reference {r}"))
            }
        }
    }
}
