use innkeep_shared::models::events::ApprovalDecisionEvent;

use crate::booking::BookingStatus;

/// Sink for decision events and booking view counts. Recording is
/// fire-and-forget; it never fails the operation that produced it.
pub trait DecisionRecorder: Send + Sync {
    fn record_decision(&self, event: &ApprovalDecisionEvent);

    fn record_view(&self, status: Option<BookingStatus>, count: usize);
}
