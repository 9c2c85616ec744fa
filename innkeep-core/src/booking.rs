use chrono::{NaiveDate, NaiveDateTime};
use innkeep_shared::pii::Masked;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Booking lifecycle as seen by the admin service. Bookings are created
/// `Pending` elsewhere; this service only ever moves them to one of the
/// two terminal states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, BookingStatus::Pending)
    }

    /// Only `pending -> confirmed` and `pending -> rejected` are legal.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        *self == BookingStatus::Pending && next.is_terminal()
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown booking status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for BookingStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "rejected" => Ok(BookingStatus::Rejected),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// The canonical booking record, shared by the engine, the manual handlers
/// and the worker. It is always a transient copy of what the booking store
/// holds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    #[serde(rename = "booking_id")]
    pub id: String,
    pub hotel_id: String,
    pub status: BookingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_number: Option<String>,
    pub total_price: f64,
    #[serde(default)]
    pub guest_name: String,
    #[serde(default)]
    pub guest_email: Masked<String>,
    pub checkin: NaiveDate,
    pub checkout: NaiveDate,
    pub guests: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<NaiveDateTime>,
}

impl Booking {
    pub fn is_pending(&self) -> bool {
        self.status == BookingStatus::Pending
    }

    /// Entity identity used to bucket flag evaluations for this booking.
    pub fn entity_id(&self) -> &str {
        if self.guest_email.is_empty() {
            &self.id
        } else {
            self.guest_email.expose()
        }
    }

    /// Apply a patch the way the booking store does: present fields
    /// overwrite, absent fields are left alone.
    pub fn apply(&mut self, patch: &BookingPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(cnf) = &patch.confirmation_number {
            self.confirmation_number = Some(cnf.clone());
        }
        self.updated_at = Some(chrono::Utc::now().naive_utc());
    }
}

/// Body of `PATCH /bookings/{id}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookingPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<BookingStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_number: Option<String>,
}

impl BookingPatch {
    pub fn confirm(confirmation_number: String) -> Self {
        Self {
            status: Some(BookingStatus::Confirmed),
            confirmation_number: Some(confirmation_number),
        }
    }

    pub fn reject() -> Self {
        Self {
            status: Some(BookingStatus::Rejected),
            confirmation_number: None,
        }
    }
}

/// Live room availability for a hotel over a date range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HotelAvailability {
    #[serde(default, alias = "id")]
    pub hotel_id: String,
    pub available_rooms: i32,
}

impl HotelAvailability {
    pub fn has_rooms(&self) -> bool {
        self.available_rooms > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> serde_json::Value {
        serde_json::json!({
            "booking_id": "BK-1",
            "hotel_id": "H1",
            "status": "pending",
            "total_price": 420.0,
            "guest_name": "Ada Lovelace",
            "guest_email": "ada@example.com",
            "checkin": "2025-06-01",
            "checkout": "2025-06-04",
            "guests": 2,
            "created_at": "2025-05-20T10:15:00.123456"
        })
    }

    #[test]
    fn test_booking_from_store_payload() {
        let booking: Booking = serde_json::from_value(sample_json()).unwrap();
        assert_eq!(booking.id, "BK-1");
        assert!(booking.is_pending());
        assert_eq!(booking.confirmation_number, None);
        assert_eq!(booking.entity_id(), "ada@example.com");
        assert!(booking.created_at.is_some());
        assert!(!format!("{:?}", booking).contains("ada@example.com"));
    }

    #[test]
    fn test_entity_id_falls_back_to_booking_id() {
        let mut json = sample_json();
        json.as_object_mut().unwrap().remove("guest_email");
        let booking: Booking = serde_json::from_value(json).unwrap();
        assert_eq!(booking.entity_id(), "BK-1");
    }

    #[test]
    fn test_status_transitions() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Rejected));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Confirmed.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Confirmed));
        assert!(!Confirmed.can_transition_to(Pending));
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("PENDING".parse::<BookingStatus>(), Ok(BookingStatus::Pending));
        assert!("cancelled".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn test_patch_body_omits_absent_fields() {
        let body = serde_json::to_value(BookingPatch::reject()).unwrap();
        assert_eq!(body, serde_json::json!({ "status": "rejected" }));

        let body = serde_json::to_value(BookingPatch::confirm("CNF-0BK1-00AA11FF".into())).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "status": "confirmed", "confirmation_number": "CNF-0BK1-00AA11FF" })
        );
    }

    #[test]
    fn test_apply_patch() {
        let mut booking: Booking = serde_json::from_value(sample_json()).unwrap();
        booking.apply(&BookingPatch::confirm("CNF-X".into()));
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.confirmation_number.as_deref(), Some("CNF-X"));
    }
}
