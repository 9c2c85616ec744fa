use innkeep_core::booking::{Booking, BookingPatch, BookingStatus};
use innkeep_core::events::DecisionRecorder;
use innkeep_core::flags::{
    BooleanEvaluation, EvaluationRequest, FlagEvaluator, AUTO_APPROVAL_FLAG, WORKER_ENTITY_ID,
};
use innkeep_core::repository::{AvailabilityRepository, BookingRepository};
use innkeep_core::{EvaluationError, StoreError};
use innkeep_shared::models::events::ApprovalDecisionEvent;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::confirmation;
use crate::engine::{ApprovalEngine, Trigger};

pub const NO_ROOMS_REASON: &str = "No rooms available";
/// Reason reported for the automation switch when it could not be evaluated.
pub const EVALUATION_ERROR_REASON: &str = "evaluation_error";

#[derive(Debug, thiserror::Error)]
pub enum ApprovalError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("Auto-approval is enabled; manual decisions are disabled")]
    AutomationActive,
    #[error("Booking {booking_id} is already {status}")]
    InvalidState {
        booking_id: String,
        status: BookingStatus,
    },
    #[error("Flag evaluation failed: {0}")]
    Evaluation(#[from] EvaluationError),
    #[error("{0}")]
    Upstream(String),
}

impl From<StoreError> for ApprovalError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(subject) => ApprovalError::NotFound(subject),
            upstream @ StoreError::Upstream(_) => ApprovalError::Upstream(upstream.to_string()),
        }
    }
}

/// The approve and reject paths shared by the manual HTTP handlers and the
/// auto-approval worker. Every collaborator is injected.
pub struct ApprovalService {
    bookings: Arc<dyn BookingRepository>,
    availability: Arc<dyn AvailabilityRepository>,
    flags: Arc<dyn FlagEvaluator>,
    engine: ApprovalEngine,
    recorder: Arc<dyn DecisionRecorder>,
}

impl ApprovalService {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        availability: Arc<dyn AvailabilityRepository>,
        flags: Arc<dyn FlagEvaluator>,
        recorder: Arc<dyn DecisionRecorder>,
    ) -> Self {
        Self {
            engine: ApprovalEngine::new(flags.clone()),
            bookings,
            availability,
            flags,
            recorder,
        }
    }

    pub fn flags(&self) -> &Arc<dyn FlagEvaluator> {
        &self.flags
    }

    /// Evaluate the automation switch. Fails closed: an evaluation error
    /// reads as disabled with reason `evaluation_error`.
    pub async fn automation_status(&self) -> BooleanEvaluation {
        let request = EvaluationRequest::new(AUTO_APPROVAL_FLAG, WORKER_ENTITY_ID);
        match self.flags.evaluate_boolean(&request).await {
            Ok(evaluation) => evaluation,
            Err(e) => {
                warn!(flag = AUTO_APPROVAL_FLAG, error = %e, "Automation switch unavailable, treating as disabled");
                BooleanEvaluation {
                    enabled: false,
                    reason: EVALUATION_ERROR_REASON.to_string(),
                }
            }
        }
    }

    pub async fn automation_enabled(&self) -> bool {
        self.automation_status().await.enabled
    }

    pub async fn list_bookings(&self, status: Option<BookingStatus>) -> Result<Vec<Booking>, ApprovalError> {
        let bookings = self.bookings.list_bookings(status).await?;
        self.recorder.record_view(status, bookings.len());
        Ok(bookings)
    }

    pub async fn get_booking(&self, booking_id: &str) -> Result<Booking, ApprovalError> {
        let booking = self.bookings.get_booking(booking_id).await?;
        self.recorder.record_view(Some(booking.status), 1);
        Ok(booking)
    }

    /// Fetch a booking for a manual decision and apply the manual guards in
    /// order: existence, automation switch, pending status.
    async fn fetch_for_manual(&self, booking_id: &str) -> Result<Booking, ApprovalError> {
        let booking = self.bookings.get_booking(booking_id).await.map_err(|e| {
            warn!(booking_id, error = %e, "Booking lookup failed");
            ApprovalError::from(e)
        })?;
        if self.automation_enabled().await {
            warn!(booking_id, "Manual decision refused while auto-approval is enabled");
            return Err(ApprovalError::AutomationActive);
        }
        ensure_pending(&booking)?;
        Ok(booking)
    }

    pub async fn approve_manual(&self, booking_id: &str) -> Result<ApprovalDecisionEvent, ApprovalError> {
        let booking = self.fetch_for_manual(booking_id).await?;
        self.approve(&booking, Trigger::Manual).await
    }

    pub async fn reject_manual(&self, booking_id: &str, reason: &str) -> Result<ApprovalDecisionEvent, ApprovalError> {
        let booking = self.fetch_for_manual(booking_id).await?;
        self.reject(&booking, reason, Trigger::Manual).await
    }

    /// Confirm a pending booking: resolve its tier, mint a confirmation
    /// number, patch the store, then record the decision. Nothing is
    /// written if the tier cannot be resolved.
    pub async fn approve(&self, booking: &Booking, trigger: Trigger) -> Result<ApprovalDecisionEvent, ApprovalError> {
        ensure_pending(booking)?;

        let decision = self.engine.decide(booking, trigger).await.map_err(|e| {
            error!(booking_id = %booking.id, error = %e, "Approval tier evaluation failed");
            ApprovalError::from(e)
        })?;

        let confirmation_number = confirmation::generate(&booking.id);
        self.bookings
            .update_booking(&booking.id, &BookingPatch::confirm(confirmation_number.clone()))
            .await
            .map_err(|e| {
                error!(booking_id = %booking.id, error = %e, "Failed to confirm booking");
                ApprovalError::from(e)
            })?;

        let event = ApprovalDecisionEvent::approved(
            &booking.id,
            &booking.hotel_id,
            &decision.tier,
            &confirmation_number,
            decision.auto_approved,
        );
        self.recorder.record_decision(&event);

        info!(
            booking_id = %booking.id,
            hotel_id = %booking.hotel_id,
            tier = %decision.tier,
            auto = decision.auto_approved,
            confirmation_number = %confirmation_number,
            "Booking {}",
            if decision.auto_approved { "auto-approved" } else { "manually approved" }
        );
        Ok(event)
    }

    pub async fn reject(&self, booking: &Booking, reason: &str, trigger: Trigger) -> Result<ApprovalDecisionEvent, ApprovalError> {
        ensure_pending(booking)?;

        self.bookings
            .update_booking(&booking.id, &BookingPatch::reject())
            .await
            .map_err(|e| {
                error!(booking_id = %booking.id, error = %e, "Failed to reject booking");
                ApprovalError::from(e)
            })?;

        let event = ApprovalDecisionEvent::rejected(&booking.id, &booking.hotel_id, reason, trigger.is_auto());
        self.recorder.record_decision(&event);

        info!(
            booking_id = %booking.id,
            hotel_id = %booking.hotel_id,
            reason,
            auto = trigger.is_auto(),
            "Booking {}",
            if trigger.is_auto() { "auto-rejected" } else { "manually rejected" }
        );
        Ok(event)
    }

    /// Automatic decision for one listed booking: approve when its hotel
    /// has a free room over the stay, reject otherwise. The listed copy only
    /// drives the availability lookup. The decision is made on a fresh read,
    /// which must still be pending.
    pub async fn process_pending(&self, listed: &Booking) -> Result<ApprovalDecisionEvent, ApprovalError> {
        let availability = self
            .availability
            .get_availability(&listed.hotel_id, listed.checkin, listed.checkout, listed.guests)
            .await
            .map_err(|e| {
                error!(booking_id = %listed.id, hotel_id = %listed.hotel_id, error = %e, "Availability lookup failed");
                ApprovalError::from(e)
            })?;

        let booking = self.bookings.get_booking(&listed.id).await.map_err(|e| {
            error!(booking_id = %listed.id, error = %e, "Failed to re-read booking");
            ApprovalError::from(e)
        })?;
        ensure_pending(&booking)?;

        if availability.has_rooms() {
            info!(
                booking_id = %booking.id,
                hotel_id = %booking.hotel_id,
                available_rooms = availability.available_rooms,
                "Approving booking"
            );
            self.approve(&booking, Trigger::Automatic).await
        } else {
            info!(booking_id = %booking.id, hotel_id = %booking.hotel_id, "Rejecting booking, hotel is full");
            self.reject(&booking, NO_ROOMS_REASON, Trigger::Automatic).await
        }
    }
}

fn ensure_pending(booking: &Booking) -> Result<(), ApprovalError> {
    if booking.is_pending() {
        Ok(())
    } else {
        warn!(booking_id = %booking.id, status = %booking.status, "Booking is no longer pending");
        Err(ApprovalError::InvalidState {
            booking_id: booking.id.clone(),
            status: booking.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use innkeep_core::flags::APPROVAL_TIER_FLAG;
    use innkeep_core::mock::{pending_booking, MemoryRecorder, MockBookingStore, MockFlagEvaluator};
    use innkeep_shared::models::events::DecisionOutcome;

    struct Fixture {
        store: Arc<MockBookingStore>,
        flags: Arc<MockFlagEvaluator>,
        recorder: Arc<MemoryRecorder>,
        service: ApprovalService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MockBookingStore::new());
        let flags = Arc::new(MockFlagEvaluator::new());
        let recorder = Arc::new(MemoryRecorder::new());
        flags.set_boolean(AUTO_APPROVAL_FLAG, false);
        flags.set_variant(APPROVAL_TIER_FLAG, "standard");
        let service = ApprovalService::new(store.clone(), store.clone(), flags.clone(), recorder.clone());
        Fixture {
            store,
            flags,
            recorder,
            service,
        }
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        (buffer, tracing::subscriber::set_default(subscriber))
    }

    fn status_of(f: &Fixture, id: &str) -> BookingStatus {
        f.store.booking(id).map(|b| b.status).unwrap_or(BookingStatus::Pending)
    }

    #[tokio::test]
    async fn test_manual_approve_confirms_and_records() {
        let f = fixture();
        f.store.insert(pending_booking("BK-1", "H1", 420.0));

        let event = f.service.approve_manual("BK-1").await.unwrap();

        let stored = f.store.booking("BK-1").unwrap();
        assert_eq!(stored.status, BookingStatus::Confirmed);
        let cnf = stored.confirmation_number.unwrap();
        assert!(confirmation::is_well_formed(&cnf));
        assert_eq!(event.confirmation_number.as_deref(), Some(cnf.as_str()));

        let decisions = f.recorder.decisions();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].outcome, DecisionOutcome::Approved);
        assert_eq!(decisions[0].tier.as_deref(), Some("standard"));
        assert!(!decisions[0].auto);
    }

    #[tokio::test]
    async fn test_manual_decisions_blocked_while_automation_on() {
        let f = fixture();
        f.flags.set_boolean(AUTO_APPROVAL_FLAG, true);
        f.store.insert(pending_booking("BK-1", "H1", 420.0));

        let approve = f.service.approve_manual("BK-1").await;
        assert!(matches!(approve, Err(ApprovalError::AutomationActive)));
        let reject = f.service.reject_manual("BK-1", "duplicate").await;
        assert!(matches!(reject, Err(ApprovalError::AutomationActive)));

        assert_eq!(status_of(&f, "BK-1"), BookingStatus::Pending);
        assert!(f.store.updates().is_empty());
        assert!(f.recorder.decisions().is_empty());
    }

    #[tokio::test]
    async fn test_missing_booking_is_checked_before_switch() {
        let f = fixture();
        f.flags.set_boolean(AUTO_APPROVAL_FLAG, true);

        let result = f.service.approve_manual("BK-404").await;
        assert!(matches!(result, Err(ApprovalError::NotFound(ref s)) if s == "Booking BK-404"));
        assert!(f.flags.calls().is_empty());
    }

    #[tokio::test]
    async fn test_terminal_bookings_never_transition() {
        let f = fixture();
        for (id, status) in [("BK-C", BookingStatus::Confirmed), ("BK-R", BookingStatus::Rejected)] {
            let mut booking = pending_booking(id, "H1", 100.0);
            booking.status = status;
            f.store.insert(booking);
        }

        for id in ["BK-C", "BK-R"] {
            let approve = f.service.approve_manual(id).await;
            assert!(matches!(approve, Err(ApprovalError::InvalidState { .. })));
            let reject = f.service.reject_manual(id, "late").await;
            assert!(matches!(reject, Err(ApprovalError::InvalidState { .. })));
        }

        assert_eq!(status_of(&f, "BK-C"), BookingStatus::Confirmed);
        assert_eq!(status_of(&f, "BK-R"), BookingStatus::Rejected);
        assert!(f.store.updates().is_empty());
    }

    #[tokio::test]
    async fn test_refusals_are_logged_with_booking_id() {
        let f = fixture();
        let mut booking = pending_booking("BK-7", "H1", 100.0);
        booking.status = BookingStatus::Rejected;
        f.store.insert(booking);
        let (logs, _guard) = capture_logs();

        assert!(f.service.approve_manual("BK-7").await.is_err());
        assert!(f.service.approve_manual("BK-404").await.is_err());

        let logs = logs.contents();
        assert!(logs.contains("Booking is no longer pending"));
        assert!(logs.contains("booking_id=BK-7"));
        assert!(logs.contains("status=rejected"));
        assert!(logs.contains("Booking lookup failed"));
        assert!(logs.contains("booking_id=\"BK-404\"") || logs.contains("booking_id=BK-404"));
    }

    #[tokio::test]
    async fn test_invalid_state_message_names_status() {
        let f = fixture();
        let mut booking = pending_booking("BK-9", "H1", 100.0);
        booking.status = BookingStatus::Confirmed;
        f.store.insert(booking);

        let err = f.service.reject_manual("BK-9", "x").await.unwrap_err();
        assert_eq!(err.to_string(), "Booking BK-9 is already confirmed");
    }

    #[tokio::test]
    async fn test_unreachable_flags_fail_open_guard_but_abort_approval() {
        let f = fixture();
        f.flags.set_unreachable(true);
        f.store.insert(pending_booking("BK-1", "H1", 420.0));

        let result = f.service.approve_manual("BK-1").await;
        assert!(matches!(
            result,
            Err(ApprovalError::Evaluation(EvaluationError::Unreachable(_)))
        ));
        assert_eq!(status_of(&f, "BK-1"), BookingStatus::Pending);
        assert!(f.recorder.decisions().is_empty());
        // Switch evaluated, then tier evaluated.
        assert_eq!(f.flags.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_manual_reject_skips_tier_evaluation() {
        let f = fixture();
        f.store.insert(pending_booking("BK-2", "H1", 80.0));

        let event = f.service.reject_manual("BK-2", "Guest cancelled").await.unwrap();
        assert_eq!(event.reason.as_deref(), Some("Guest cancelled"));
        assert_eq!(status_of(&f, "BK-2"), BookingStatus::Rejected);
        assert!(f.store.booking("BK-2").unwrap().confirmation_number.is_none());
        assert!(f
            .flags
            .calls()
            .iter()
            .all(|c| c.flag_key == AUTO_APPROVAL_FLAG));
    }

    #[tokio::test]
    async fn test_process_pending_rejects_full_hotel() {
        let f = fixture();
        f.store.set_rooms("H2", 0);
        let booking = pending_booking("BK-2", "H2", 250.0);
        f.store.insert(booking.clone());

        let event = f.service.process_pending(&booking).await.unwrap();
        assert_eq!(event.outcome, DecisionOutcome::Rejected);
        assert_eq!(event.reason.as_deref(), Some(NO_ROOMS_REASON));
        assert!(event.auto);
        assert_eq!(status_of(&f, "BK-2"), BookingStatus::Rejected);
    }

    #[tokio::test]
    async fn test_process_pending_approves_when_rooms_free() {
        let f = fixture();
        f.store.set_rooms("H1", 3);
        let booking = pending_booking("BK-1", "H1", 420.0);
        f.store.insert(booking.clone());

        let event = f.service.process_pending(&booking).await.unwrap();
        assert_eq!(event.outcome, DecisionOutcome::Approved);
        assert!(event.auto);
        assert_eq!(status_of(&f, "BK-1"), BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_process_pending_rereads_before_deciding() {
        let f = fixture();
        f.store.set_rooms("H1", 0);
        let listed = pending_booking("BK-1", "H1", 420.0);
        let mut stored = listed.clone();
        stored.status = BookingStatus::Confirmed;
        stored.confirmation_number = Some("CNF-0BK1-AAAAAAAA".to_string());
        f.store.insert(stored);

        let result = f.service.process_pending(&listed).await;
        assert!(matches!(
            result,
            Err(ApprovalError::InvalidState { status: BookingStatus::Confirmed, .. })
        ));

        let stored = f.store.booking("BK-1").unwrap();
        assert_eq!(stored.status, BookingStatus::Confirmed);
        assert_eq!(stored.confirmation_number.as_deref(), Some("CNF-0BK1-AAAAAAAA"));
        assert!(f.store.updates().is_empty());
        assert!(f.recorder.decisions().is_empty());
        // Availability lookup, then the re-read.
        assert_eq!(f.store.read_count(), 2);
    }

    #[tokio::test]
    async fn test_process_pending_skips_booking_deleted_mid_tick() {
        let f = fixture();
        f.store.set_rooms("H1", 2);
        let listed = pending_booking("BK-GONE", "H1", 100.0);

        let result = f.service.process_pending(&listed).await;
        assert!(matches!(result, Err(ApprovalError::NotFound(_))));
        assert!(f.store.updates().is_empty());
    }

    #[tokio::test]
    async fn test_automatic_path_ignores_switch_guard() {
        let f = fixture();
        f.flags.set_boolean(AUTO_APPROVAL_FLAG, true);
        f.store.set_rooms("H1", 1);
        let booking = pending_booking("BK-1", "H1", 420.0);
        f.store.insert(booking.clone());

        f.service.process_pending(&booking).await.unwrap();
        assert_eq!(status_of(&f, "BK-1"), BookingStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_failed_patch_records_nothing() {
        let f = fixture();
        f.store.insert(pending_booking("BK-1", "H1", 420.0));
        f.store.fail_updates_for("BK-1");

        let result = f.service.approve_manual("BK-1").await;
        assert!(matches!(result, Err(ApprovalError::Upstream(_))));
        assert!(f.recorder.decisions().is_empty());
    }

    #[tokio::test]
    async fn test_stale_copy_race_is_not_prevented() {
        // Two deciders holding the same pending copy both patch.
        let f = fixture();
        let booking = pending_booking("BK-1", "H1", 420.0);
        f.store.insert(booking.clone());

        f.service.approve(&booking, Trigger::Manual).await.unwrap();
        f.service.approve(&booking, Trigger::Automatic).await.unwrap();

        assert_eq!(f.store.updates().len(), 2);
        assert_eq!(f.recorder.decisions().len(), 2);
    }

    #[tokio::test]
    async fn test_views_are_recorded() {
        let f = fixture();
        f.store.insert(pending_booking("BK-1", "H1", 420.0));
        f.store.insert(pending_booking("BK-2", "H1", 420.0));

        f.service.list_bookings(Some(BookingStatus::Pending)).await.unwrap();
        f.service.get_booking("BK-1").await.unwrap();

        assert_eq!(
            f.recorder.views(),
            vec![(Some(BookingStatus::Pending), 2), (Some(BookingStatus::Pending), 1)]
        );
    }

    #[tokio::test]
    async fn test_switch_status_fails_closed() {
        let f = fixture();
        f.flags.fail_flag(AUTO_APPROVAL_FLAG);

        let status = f.service.automation_status().await;
        assert!(!status.enabled);
        assert_eq!(status.reason, EVALUATION_ERROR_REASON);
        assert_eq!(f.flags.calls()[0].entity_id, WORKER_ENTITY_ID);
        assert!(f.flags.calls()[0].context.is_empty());
    }
}
