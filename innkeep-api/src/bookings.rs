use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    routing::{get, post},
    Json, Router,
};
use innkeep_core::booking::{Booking, BookingStatus};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListBookingsQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookingListResponse {
    pub bookings: Vec<Booking>,
    pub total: usize,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct ApproveResponse {
    pub booking_id: String,
    pub status: BookingStatus,
    pub confirmation_number: String,
    pub tier: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RejectResponse {
    pub booking_id: String,
    pub status: BookingStatus,
    pub reason: String,
    pub message: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bookings", get(list_bookings))
        .route("/bookings/{booking_id}", get(get_booking))
        .route("/bookings/{booking_id}/approve", post(approve_booking))
        .route("/bookings/{booking_id}/reject", post(reject_booking))
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_bookings(
    State(state): State<AppState>,
    query: Result<Query<ListBookingsQuery>, QueryRejection>,
) -> Result<Json<BookingListResponse>, AppError> {
    let Query(query) = query?;
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            raw.parse::<BookingStatus>()
                .map_err(|e| AppError::ValidationError(e.to_string()))?,
        ),
    };

    let bookings = state.approvals.list_bookings(status).await?;
    info!(count = bookings.len(), status = status.map(|s| s.as_str()).unwrap_or(""), "Retrieved bookings");

    Ok(Json(BookingListResponse {
        total: bookings.len(),
        status: status.map(|s| s.to_string()).unwrap_or_default(),
        bookings,
    }))
}

async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.approvals.get_booking(&booking_id).await?;
    Ok(Json(booking))
}

async fn approve_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
) -> Result<Json<ApproveResponse>, AppError> {
    let event = state.approvals.approve_manual(&booking_id).await?;

    Ok(Json(ApproveResponse {
        booking_id: event.booking_id,
        status: BookingStatus::Confirmed,
        confirmation_number: event.confirmation_number.unwrap_or_default(),
        tier: event.tier.unwrap_or_default(),
        message: "Booking approved and confirmed successfully".to_string(),
    }))
}

async fn reject_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
    body: Result<Json<RejectRequest>, JsonRejection>,
) -> Result<Json<RejectResponse>, AppError> {
    let Json(req) = body?;
    let event = state.approvals.reject_manual(&booking_id, &req.reason).await?;

    Ok(Json(RejectResponse {
        booking_id: event.booking_id,
        status: BookingStatus::Rejected,
        reason: req.reason,
        message: "Booking rejected successfully".to_string(),
    }))
}
