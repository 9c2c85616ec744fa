pub mod models;
pub mod pii;

pub use models::events::{ApprovalDecisionEvent, DecisionOutcome, FlagEvaluatedEvent};
pub use pii::Masked;
