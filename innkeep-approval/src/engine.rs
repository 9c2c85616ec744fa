use innkeep_core::booking::Booking;
use innkeep_core::flags::{EvaluationRequest, FlagEvaluator, APPROVAL_TIER_FLAG};
use innkeep_core::{EvaluationError, EvaluationResult};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// What set a decision in motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Manual,
    Automatic,
}

impl Trigger {
    pub fn is_auto(&self) -> bool {
        matches!(self, Trigger::Automatic)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::Manual => "manual",
            Trigger::Automatic => "automatic",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApprovalDecision {
    /// Opaque approval track, as named by the flag configuration.
    pub tier: String,
    pub reason: String,
    pub auto_approved: bool,
}

/// Resolves the approval tier of a booking from the `approval-tier` flag.
/// Holds no state of its own, so the same booking under the same flag
/// configuration always lands in the same tier.
pub struct ApprovalEngine {
    flags: Arc<dyn FlagEvaluator>,
}

impl ApprovalEngine {
    pub fn new(flags: Arc<dyn FlagEvaluator>) -> Self {
        Self { flags }
    }

    pub fn tier_request(booking: &Booking) -> EvaluationRequest {
        EvaluationRequest::new(APPROVAL_TIER_FLAG, booking.entity_id())
            .with_context("hotel_id", booking.hotel_id.as_str())
            .with_context("total_price", format!("{:.2}", booking.total_price))
            .with_context("guests", booking.guests.to_string())
    }

    pub async fn decide(&self, booking: &Booking, trigger: Trigger) -> EvaluationResult<ApprovalDecision> {
        let request = Self::tier_request(booking);
        let evaluation = self.flags.evaluate_variant(&request).await?;

        if evaluation.variant_key.is_empty() {
            return Err(EvaluationError::NoVariant(APPROVAL_TIER_FLAG.to_string()));
        }

        debug!(
            booking_id = %booking.id,
            tier = %evaluation.variant_key,
            reason = %evaluation.reason,
            trigger = trigger.as_str(),
            "Approval tier resolved"
        );

        Ok(ApprovalDecision {
            tier: evaluation.variant_key,
            reason: evaluation.reason,
            auto_approved: trigger.is_auto(),
        })
    }
}
