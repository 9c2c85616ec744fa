//! In-memory stand-ins for the booking store, the flag service and the
//! telemetry sink. Used by the test suites of every crate in the workspace
//! and handy for running the admin service without its collaborators.

use async_trait::async_trait;
use chrono::NaiveDate;
use innkeep_shared::models::events::ApprovalDecisionEvent;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::booking::{Booking, BookingPatch, BookingStatus, HotelAvailability};
use crate::events::DecisionRecorder;
use crate::flags::{BooleanEvaluation, EvaluationRequest, FlagEvaluator, VariantEvaluation};
use crate::repository::{AvailabilityRepository, BookingRepository};
use crate::{EvaluationError, EvaluationResult, StoreError, StoreResult};

pub const MATCH_REASON: &str = "MATCH_EVALUATION_REASON";
pub const DEFAULT_REASON: &str = "DEFAULT_EVALUATION_REASON";

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Booking store and availability service held in memory. Like the real
/// store it applies any patch it is given without checking transitions.
#[derive(Default)]
pub struct MockBookingStore {
    bookings: Mutex<BTreeMap<String, Booking>>,
    rooms: Mutex<HashMap<String, i32>>,
    failing_updates: Mutex<HashSet<String>>,
    failing_hotels: Mutex<HashSet<String>>,
    failing_lists: AtomicBool,
    latency: Mutex<Option<Duration>>,
    updates: Mutex<Vec<(String, BookingPatch)>>,
    reads: AtomicUsize,
}

impl MockBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, booking: Booking) {
        guard(&self.bookings).insert(booking.id.clone(), booking);
    }

    pub fn set_rooms(&self, hotel_id: &str, available_rooms: i32) {
        guard(&self.rooms).insert(hotel_id.to_string(), available_rooms);
    }

    pub fn fail_updates_for(&self, booking_id: &str) {
        guard(&self.failing_updates).insert(booking_id.to_string());
    }

    pub fn fail_availability_for(&self, hotel_id: &str) {
        guard(&self.failing_hotels).insert(hotel_id.to_string());
    }

    pub fn fail_listing(&self, fail: bool) {
        self.failing_lists.store(fail, Ordering::SeqCst);
    }

    /// Delay every call, to exercise cancellation and shutdown paths.
    pub fn set_latency(&self, latency: Duration) {
        *guard(&self.latency) = Some(latency);
    }

    pub fn booking(&self, booking_id: &str) -> Option<Booking> {
        guard(&self.bookings).get(booking_id).cloned()
    }

    pub fn updates(&self) -> Vec<(String, BookingPatch)> {
        guard(&self.updates).clone()
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        let latency = *guard(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl BookingRepository for MockBookingStore {
    async fn list_bookings(&self, status: Option<BookingStatus>) -> StoreResult<Vec<Booking>> {
        self.simulate_latency().await;
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.failing_lists.load(Ordering::SeqCst) {
            return Err(StoreError::Upstream("booking listing unavailable".to_string()));
        }
        Ok(guard(&self.bookings)
            .values()
            .filter(|b| status.map_or(true, |s| b.status == s))
            .cloned()
            .collect())
    }

    async fn get_booking(&self, booking_id: &str) -> StoreResult<Booking> {
        self.simulate_latency().await;
        self.reads.fetch_add(1, Ordering::SeqCst);
        guard(&self.bookings)
            .get(booking_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Booking {}", booking_id)))
    }

    async fn update_booking(&self, booking_id: &str, patch: &BookingPatch) -> StoreResult<()> {
        self.simulate_latency().await;
        if guard(&self.failing_updates).contains(booking_id) {
            return Err(StoreError::Upstream(format!(
                "unexpected status code: 500 updating {}",
                booking_id
            )));
        }
        let mut bookings = guard(&self.bookings);
        let booking = bookings
            .get_mut(booking_id)
            .ok_or_else(|| StoreError::Upstream(format!("unexpected status code: 404 updating {}", booking_id)))?;
        booking.apply(patch);
        guard(&self.updates).push((booking_id.to_string(), patch.clone()));
        Ok(())
    }
}

#[async_trait]
impl AvailabilityRepository for MockBookingStore {
    async fn get_availability(
        &self,
        hotel_id: &str,
        _checkin: NaiveDate,
        _checkout: NaiveDate,
        _guests: u32,
    ) -> StoreResult<HotelAvailability> {
        self.simulate_latency().await;
        self.reads.fetch_add(1, Ordering::SeqCst);
        if guard(&self.failing_hotels).contains(hotel_id) {
            return Err(StoreError::Upstream(format!("availability lookup failed for {}", hotel_id)));
        }
        let available_rooms = *guard(&self.rooms)
            .get(hotel_id)
            .ok_or_else(|| StoreError::NotFound(format!("Hotel {}", hotel_id)))?;
        Ok(HotelAvailability {
            hotel_id: hotel_id.to_string(),
            available_rooms,
        })
    }
}

struct VariantRule {
    flag_key: String,
    when: Option<(String, String)>,
    variant_key: String,
}

/// Flag service double with static answers. Variant rules are checked in
/// insertion order; conditional rules match on one context key.
#[derive(Default)]
pub struct MockFlagEvaluator {
    booleans: Mutex<HashMap<String, bool>>,
    variants: Mutex<Vec<VariantRule>>,
    failing_flags: Mutex<HashSet<String>>,
    unreachable: AtomicBool,
    calls: Mutex<Vec<EvaluationRequest>>,
}

impl MockFlagEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_boolean(&self, flag_key: &str, enabled: bool) {
        guard(&self.booleans).insert(flag_key.to_string(), enabled);
    }

    pub fn set_variant(&self, flag_key: &str, variant_key: &str) {
        guard(&self.variants).push(VariantRule {
            flag_key: flag_key.to_string(),
            when: None,
            variant_key: variant_key.to_string(),
        });
    }

    pub fn set_variant_when(&self, flag_key: &str, context_key: &str, context_value: &str, variant_key: &str) {
        guard(&self.variants).push(VariantRule {
            flag_key: flag_key.to_string(),
            when: Some((context_key.to_string(), context_value.to_string())),
            variant_key: variant_key.to_string(),
        });
    }

    /// Make every evaluation of one flag fail as if the service were down.
    pub fn fail_flag(&self, flag_key: &str) {
        guard(&self.failing_flags).insert(flag_key.to_string());
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<EvaluationRequest> {
        guard(&self.calls).clone()
    }

    fn check_reachable(&self, request: &EvaluationRequest) -> EvaluationResult<()> {
        guard(&self.calls).push(request.clone());
        if self.unreachable.load(Ordering::SeqCst) || guard(&self.failing_flags).contains(&request.flag_key) {
            return Err(EvaluationError::Unreachable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl FlagEvaluator for MockFlagEvaluator {
    async fn evaluate_boolean(&self, request: &EvaluationRequest) -> EvaluationResult<BooleanEvaluation> {
        self.check_reachable(request)?;
        Ok(match guard(&self.booleans).get(&request.flag_key) {
            Some(enabled) => BooleanEvaluation {
                enabled: *enabled,
                reason: MATCH_REASON.to_string(),
            },
            None => BooleanEvaluation {
                enabled: false,
                reason: DEFAULT_REASON.to_string(),
            },
        })
    }

    async fn evaluate_variant(&self, request: &EvaluationRequest) -> EvaluationResult<VariantEvaluation> {
        self.check_reachable(request)?;
        let rules = guard(&self.variants);
        let candidates = rules.iter().filter(|r| r.flag_key == request.flag_key);

        let mut fallback = None;
        for rule in candidates {
            match &rule.when {
                Some((key, value)) if request.context.get(key) == Some(value) => {
                    return Ok(VariantEvaluation {
                        variant_key: rule.variant_key.clone(),
                        reason: MATCH_REASON.to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    fallback.get_or_insert(rule.variant_key.clone());
                }
            }
        }

        Ok(VariantEvaluation {
            variant_key: fallback.unwrap_or_default(),
            reason: DEFAULT_REASON.to_string(),
        })
    }
}

/// Keeps every decision event and view count in memory.
#[derive(Default)]
pub struct MemoryRecorder {
    decisions: Mutex<Vec<ApprovalDecisionEvent>>,
    views: Mutex<Vec<(Option<BookingStatus>, usize)>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decisions(&self) -> Vec<ApprovalDecisionEvent> {
        guard(&self.decisions).clone()
    }

    pub fn views(&self) -> Vec<(Option<BookingStatus>, usize)> {
        guard(&self.views).clone()
    }
}

impl DecisionRecorder for MemoryRecorder {
    fn record_decision(&self, event: &ApprovalDecisionEvent) {
        guard(&self.decisions).push(event.clone());
    }

    fn record_view(&self, status: Option<BookingStatus>, count: usize) {
        guard(&self.views).push((status, count));
    }
}

/// A pending booking with sensible defaults, for tests and local runs.
pub fn pending_booking(id: &str, hotel_id: &str, total_price: f64) -> Booking {
    Booking {
        id: id.to_string(),
        hotel_id: hotel_id.to_string(),
        status: BookingStatus::Pending,
        confirmation_number: None,
        total_price,
        guest_name: "Test Guest".to_string(),
        guest_email: format!("{}@guests.example.com", id.to_lowercase()).into(),
        checkin: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap_or_default(),
        checkout: NaiveDate::from_ymd_opt(2025, 6, 4).unwrap_or_default(),
        guests: 2,
        created_at: None,
        updated_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_filters_by_status() {
        let store = MockBookingStore::new();
        store.insert(pending_booking("BK-1", "H1", 100.0));
        let mut confirmed = pending_booking("BK-2", "H1", 200.0);
        confirmed.status = BookingStatus::Confirmed;
        store.insert(confirmed);

        let pending = store.list_bookings(Some(BookingStatus::Pending)).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "BK-1");
        assert_eq!(store.list_bookings(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_store_missing_booking_is_not_found() {
        let store = MockBookingStore::new();
        let err = store.get_booking("BK-404").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_conditional_variant_rules() {
        let flags = MockFlagEvaluator::new();
        flags.set_variant("approval-tier", "standard");
        flags.set_variant_when("approval-tier", "hotel_id", "H9", "vip");

        let vip = flags
            .evaluate_variant(&EvaluationRequest::new("approval-tier", "a@b.c").with_context("hotel_id", "H9"))
            .await
            .unwrap();
        assert_eq!(vip.variant_key, "vip");
        assert_eq!(vip.reason, MATCH_REASON);

        let standard = flags
            .evaluate_variant(&EvaluationRequest::new("approval-tier", "a@b.c").with_context("hotel_id", "H1"))
            .await
            .unwrap();
        assert_eq!(standard.variant_key, "standard");
        assert_eq!(standard.reason, DEFAULT_REASON);
    }
}
