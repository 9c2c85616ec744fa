pub mod booking;
pub mod events;
pub mod flags;
pub mod mock;
pub mod repository;

pub use booking::{Booking, BookingPatch, BookingStatus, HotelAvailability};
pub use events::DecisionRecorder;
pub use flags::{
    BooleanEvaluation, EvaluationContext, EvaluationHook, EvaluationRequest, FlagEvaluator,
    FlagType, HookedEvaluator, VariantEvaluation,
};
pub use repository::{AvailabilityRepository, BookingRepository};

/// Failures talking to the booking record / availability service.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("Upstream service error: {0}")]
    Upstream(String),
}

/// Failures talking to the flag evaluation service.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error("Flag service unreachable: {0}")]
    Unreachable(String),
    #[error("Malformed evaluation response: {0}")]
    Malformed(String),
    #[error("Flag {0} resolved to no variant")]
    NoVariant(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type EvaluationResult<T> = Result<T, EvaluationError>;
