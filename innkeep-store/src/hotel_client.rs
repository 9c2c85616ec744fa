use async_trait::async_trait;
use chrono::NaiveDate;
use innkeep_core::booking::{Booking, BookingPatch, BookingStatus, HotelAvailability};
use innkeep_core::repository::{AvailabilityRepository, BookingRepository};
use innkeep_core::{StoreError, StoreResult};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::app_config::HotelServiceConfig;
use crate::retry::{AttemptFailure, RetryPolicy};

/// Records are kept raw so one malformed entry does not sink the listing.
#[derive(Debug, Deserialize)]
struct BookingsResponse {
    bookings: Vec<Value>,
    #[serde(default)]
    #[allow(dead_code)]
    total: usize,
}

/// HTTP client for the hotel service, which owns both the booking records
/// and live room availability.
#[derive(Clone)]
pub struct HotelServiceClient {
    base_url: String,
    http: Client,
    retry: RetryPolicy,
}

impl HotelServiceClient {
    pub fn new(config: &HotelServiceConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(config.timeout()).build()?;
        let retry = RetryPolicy::new(
            config.read_attempts,
            Duration::from_millis(config.retry_backoff_ms),
        );
        Ok(Self::with_client(&config.url, http, retry))
    }

    pub fn with_client(base_url: &str, http: Client, retry: RetryPolicy) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            retry,
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| StoreError::Upstream(format!("invalid hotel service url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Upstream("hotel service url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET with the read retry policy. `subject` names what a 404 means.
    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        url: Url,
        query: &[(&str, String)],
        subject: &str,
    ) -> StoreResult<T> {
        let http = &self.http;
        let url = &url;
        self.retry
            .run(operation, move || async move {
                debug!("{} -> GET {}", operation, url);
                let response = http
                    .get(url.clone())
                    .query(query)
                    .send()
                    .await
                    .map_err(|e| {
                        AttemptFailure::retryable(StoreError::Upstream(format!(
                            "failed to execute request: {}",
                            e
                        )))
                    })?;

                let status = response.status();
                if status != StatusCode::OK {
                    return Err(classify(status, subject));
                }

                response.json::<T>().await.map_err(|e| {
                    AttemptFailure::fatal(StoreError::Upstream(format!(
                        "failed to decode response: {}",
                        e
                    )))
                })
            })
            .await
    }
}

fn classify(status: StatusCode, subject: &str) -> AttemptFailure {
    if status == StatusCode::NOT_FOUND {
        return AttemptFailure::fatal(StoreError::NotFound(subject.to_string()));
    }
    let error = StoreError::Upstream(format!("unexpected status code: {}", status.as_u16()));
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        AttemptFailure::retryable(error)
    } else {
        AttemptFailure::fatal(error)
    }
}

fn decode_listed(raw: Value) -> Option<Booking> {
    let booking_id = raw
        .get("booking_id")
        .and_then(Value::as_str)
        .unwrap_or("<unknown>")
        .to_string();
    match serde_json::from_value::<Booking>(raw) {
        Ok(booking) => Some(booking),
        Err(e) => {
            warn!(booking_id = %booking_id, error = %e, "Skipping undecodable booking record");
            None
        }
    }
}

#[async_trait]
impl BookingRepository for HotelServiceClient {
    async fn list_bookings(&self, status: Option<BookingStatus>) -> StoreResult<Vec<Booking>> {
        let url = self.endpoint(&["bookings"])?;
        let query: Vec<(&str, String)> = status
            .map(|s| vec![("status", s.as_str().to_string())])
            .unwrap_or_default();

        let response: BookingsResponse = self
            .get_json("list bookings", url, &query, "Bookings")
            .await?;
        Ok(response.bookings.into_iter().filter_map(decode_listed).collect())
    }

    async fn get_booking(&self, booking_id: &str) -> StoreResult<Booking> {
        let url = self.endpoint(&["bookings", booking_id])?;
        self.get_json("get booking", url, &[], &format!("Booking {}", booking_id))
            .await
    }

    async fn update_booking(&self, booking_id: &str, patch: &BookingPatch) -> StoreResult<()> {
        let url = self.endpoint(&["bookings", booking_id])?;
        debug!("update booking -> PATCH {}", url);

        // Never retried: a duplicate PATCH could mint a second confirmation.
        let response = self
            .http
            .patch(url)
            .json(patch)
            .send()
            .await
            .map_err(|e| StoreError::Upstream(format!("failed to execute request: {}", e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            error!(booking_id, status = status.as_u16(), "Booking update rejected by hotel service");
            return Err(StoreError::Upstream(format!(
                "unexpected status code: {}",
                status.as_u16()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl AvailabilityRepository for HotelServiceClient {
    async fn get_availability(
        &self,
        hotel_id: &str,
        checkin: NaiveDate,
        checkout: NaiveDate,
        guests: u32,
    ) -> StoreResult<HotelAvailability> {
        let url = self.endpoint(&["hotels", hotel_id, "availability"])?;
        let query = [
            ("guests", guests.to_string()),
            ("checkin", checkin.to_string()),
            ("checkout", checkout.to_string()),
        ];
        let mut availability: HotelAvailability = self
            .get_json("hotel availability", url, &query, &format!("Hotel {}", hotel_id))
            .await?;
        if availability.hotel_id.is_empty() {
            availability.hotel_id = hotel_id.to_string();
        }
        Ok(availability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_and_escapes_segments() {
        let client = HotelServiceClient::with_client(
            "http://hotel-service:8000/api/",
            Client::new(),
            RetryPolicy::no_retry(),
        );
        let url = client.endpoint(&["bookings", "BK 1"]).unwrap();
        assert_eq!(url.as_str(), "http://hotel-service:8000/api/bookings/BK%201");
    }

    #[test]
    fn test_decode_listed_skips_bad_records() {
        let good = serde_json::json!({
            "booking_id": "BK-1",
            "hotel_id": "H1",
            "status": "pending",
            "total_price": 420.0,
            "checkin": "2025-06-01",
            "checkout": "2025-06-04",
            "guests": 2
        });
        let mut missing_guests = good.clone();
        missing_guests["booking_id"] = "BK-2".into();
        missing_guests.as_object_mut().unwrap().remove("guests");
        let mut unknown_status = good.clone();
        unknown_status["status"] = "archived".into();

        assert_eq!(decode_listed(good).map(|b| b.id), Some("BK-1".to_string()));
        assert!(decode_listed(missing_guests).is_none());
        assert!(decode_listed(unknown_status).is_none());
        assert!(decode_listed(serde_json::json!("not a booking")).is_none());
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify(StatusCode::NOT_FOUND, "Booking BK-1").error,
            StoreError::NotFound(_)
        ));
        assert!(classify(StatusCode::BAD_GATEWAY, "x").retryable);
        assert!(classify(StatusCode::TOO_MANY_REQUESTS, "x").retryable);
        assert!(!classify(StatusCode::BAD_REQUEST, "x").retryable);
    }
}
