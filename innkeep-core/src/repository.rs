use async_trait::async_trait;
use chrono::NaiveDate;

use crate::booking::{Booking, BookingPatch, BookingStatus, HotelAvailability};
use crate::StoreResult;

/// Access to the remote booking record store. The store offers no
/// transactions: callers must check the current status right before
/// patching.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn list_bookings(&self, status: Option<BookingStatus>) -> StoreResult<Vec<Booking>>;

    /// Fails with `StoreError::NotFound` when the booking does not exist.
    async fn get_booking(&self, booking_id: &str) -> StoreResult<Booking>;

    async fn update_booking(&self, booking_id: &str, patch: &BookingPatch) -> StoreResult<()>;
}

/// Live room availability lookups.
#[async_trait]
pub trait AvailabilityRepository: Send + Sync {
    /// Fails with `StoreError::NotFound` when the hotel is unknown.
    async fn get_availability(
        &self,
        hotel_id: &str,
        checkin: NaiveDate,
        checkout: NaiveDate,
        guests: u32,
    ) -> StoreResult<HotelAvailability>;
}
