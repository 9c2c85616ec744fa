use innkeep_core::booking::BookingStatus;
use innkeep_core::events::DecisionRecorder;
use innkeep_core::flags::{EvaluationHook, EvaluationRequest, FlagType};
use innkeep_shared::models::events::{ApprovalDecisionEvent, FlagEvaluatedEvent};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use tracing::info;

/// Prometheus counters for booking views, approval decisions and flag
/// evaluations. Also serves as the flag analytics hook and the decision
/// event sink.
#[derive(Clone)]
pub struct Telemetry {
    registry: Registry,
    environment: String,
    namespace: String,
    booking_views: IntCounterVec,
    booking_decisions: IntCounterVec,
    flag_requests: IntCounterVec,
    flag_results: IntCounterVec,
}

fn counter(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> prometheus::Result<IntCounterVec> {
    let counter = IntCounterVec::new(Opts::new(name, help), labels)?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

impl Telemetry {
    pub fn new(environment: &str, namespace: &str) -> prometheus::Result<Self> {
        let registry = Registry::new();
        let booking_views = counter(
            &registry,
            "admin_booking_views_total",
            "Bookings returned by admin listing and lookup",
            &["status"],
        )?;
        let booking_decisions = counter(
            &registry,
            "admin_booking_decisions_total",
            "Approval decisions applied to bookings",
            &["outcome", "tier", "auto"],
        )?;
        let flag_requests = counter(
            &registry,
            "flag_evaluation_requests_total",
            "Flag evaluations requested",
            &["flag", "environment", "namespace"],
        )?;
        let flag_results = counter(
            &registry,
            "flag_evaluation_results_total",
            "Flag evaluations completed, by resolved value",
            &["flag", "environment", "namespace", "value", "reason", "flag_type"],
        )?;

        Ok(Self {
            registry,
            environment: environment.to_string(),
            namespace: namespace.to_string(),
            booking_views,
            booking_decisions,
            flag_requests,
            flag_results,
        })
    }

    /// Renders every registered metric in the Prometheus text format.
    pub fn encode(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| format!("Failed to encode metrics: {}", e))?;
        String::from_utf8(buffer).map_err(|e| format!("Failed to convert metrics: {}", e))
    }
}

impl DecisionRecorder for Telemetry {
    fn record_decision(&self, event: &ApprovalDecisionEvent) {
        let tier = event.tier.as_deref().unwrap_or("none");
        let auto = if event.auto { "true" } else { "false" };
        self.booking_decisions
            .with_label_values(&[event.outcome.as_str(), tier, auto])
            .inc();

        info!(
            event_id = %event.event_id,
            booking_id = %event.booking_id,
            hotel_id = %event.hotel_id,
            outcome = event.outcome.as_str(),
            tier,
            auto = event.auto,
            confirmation_number = event.confirmation_number.as_deref().unwrap_or(""),
            reason = event.reason.as_deref().unwrap_or(""),
            "Booking decision recorded"
        );
    }

    fn record_view(&self, status: Option<BookingStatus>, count: usize) {
        let status = status.map(|s| s.as_str()).unwrap_or("all");
        self.booking_views
            .with_label_values(&[status])
            .inc_by(count as u64);
    }
}

impl EvaluationHook for Telemetry {
    fn before(&self, request: &EvaluationRequest, _flag_type: FlagType) {
        self.flag_requests
            .with_label_values(&[
                request.flag_key.as_str(),
                self.environment.as_str(),
                self.namespace.as_str(),
            ])
            .inc();
    }

    fn after(&self, request: &EvaluationRequest, result: &FlagEvaluatedEvent) {
        self.flag_results
            .with_label_values(&[
                request.flag_key.as_str(),
                self.environment.as_str(),
                self.namespace.as_str(),
                result.value.as_str(),
                result.reason.as_str(),
                result.flag_type.as_str(),
            ])
            .inc();
    }
}
