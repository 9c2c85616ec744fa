use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DecisionOutcome {
    Approved,
    Rejected,
}

impl DecisionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionOutcome::Approved => "approved",
            DecisionOutcome::Rejected => "rejected",
        }
    }
}

/// Emitted once a booking has been moved to a terminal state on the
/// booking store. Under a concurrent manual/automatic race the same
/// booking may produce two of these.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ApprovalDecisionEvent {
    pub event_id: Uuid,
    pub booking_id: String,
    pub hotel_id: String,
    pub outcome: DecisionOutcome,
    pub tier: Option<String>,
    pub reason: Option<String>,
    pub confirmation_number: Option<String>,
    pub auto: bool,
    pub timestamp: DateTime<Utc>,
}

impl ApprovalDecisionEvent {
    pub fn approved(
        booking_id: &str,
        hotel_id: &str,
        tier: &str,
        confirmation_number: &str,
        auto: bool,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            booking_id: booking_id.to_string(),
            hotel_id: hotel_id.to_string(),
            outcome: DecisionOutcome::Approved,
            tier: Some(tier.to_string()),
            reason: None,
            confirmation_number: Some(confirmation_number.to_string()),
            auto,
            timestamp: Utc::now(),
        }
    }

    pub fn rejected(booking_id: &str, hotel_id: &str, reason: &str, auto: bool) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            booking_id: booking_id.to_string(),
            hotel_id: hotel_id.to_string(),
            outcome: DecisionOutcome::Rejected,
            tier: None,
            reason: Some(reason.to_string()),
            confirmation_number: None,
            auto,
            timestamp: Utc::now(),
        }
    }
}

/// Analytics payload for a single flag evaluation (the "after" side of the
/// evaluation hook).
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct FlagEvaluatedEvent {
    pub flag_key: String,
    pub flag_type: String,
    pub value: String,
    pub reason: String,
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serializes_lowercase() {
        let event = ApprovalDecisionEvent::rejected("BK-2", "H1", "No rooms available", true);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["outcome"], "rejected");
        assert_eq!(json["auto"], true);
        assert!(json["tier"].is_null());
    }
}
