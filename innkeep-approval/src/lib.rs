pub mod confirmation;
pub mod engine;
pub mod service;

pub use engine::{ApprovalDecision, ApprovalEngine, Trigger};
pub use service::{ApprovalError, ApprovalService, NO_ROOMS_REASON};
