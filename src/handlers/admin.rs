use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::identity::check_admin;
use crate::models::{Booking, BookingStatus};
use crate::services::{booking, lifecycle};
use crate::state::AppState;

fn list_limit(requested: Option<i64>, config: &AppConfig) -> i64 {
    requested
        .filter(|l| *l > 0)
        .unwrap_or(config.default_list_limit)
        .min(config.max_list_limit)
}

fn parse_status(raw: &str) -> Result<BookingStatus, AppError> {
    BookingStatus::parse(raw)
        .ok_or_else(|| AppError::Validation(format!("unknown booking status: {raw}")))
}

// GET /api/admin/status
#[derive(Serialize)]
pub struct StatusResponse {
    bookings_by_status: BTreeMap<&'static str, i64>,
    total_bookings: i64,
    completed_revenue: i64,
}

pub async fn get_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, AppError> {
    check_admin(&headers, &state.config.admin_token)?;

    let stats = {
        let db = state.db.lock().unwrap();
        queries::get_booking_stats(&db)?
    };

    let bookings_by_status: BTreeMap<_, _> = stats
        .counts
        .iter()
        .map(|(status, count)| (status.as_str(), *count))
        .collect();

    Ok(Json(StatusResponse {
        total_bookings: bookings_by_status.values().sum(),
        bookings_by_status,
        completed_revenue: stats.completed_revenue,
    }))
}

// GET /api/admin/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    check_admin(&headers, &state.config.admin_token)?;

    let limit = list_limit(query.limit, &state.config);
    let status_filter = query.status.as_deref().map(parse_status).transpose()?;

    let bookings = {
        let db = state.db.lock().unwrap();
        queries::list_bookings(&db, status_filter, limit)?
    };

    Ok(Json(bookings))
}

// GET /api/admin/bookings/:id
#[derive(Serialize)]
pub struct AdminBookingResponse {
    #[serde(flatten)]
    booking: Booking,
    allowed_transitions: &'static [BookingStatus],
}

pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<AdminBookingResponse>, AppError> {
    check_admin(&headers, &state.config.admin_token)?;

    let booking = {
        let db = state.db.lock().unwrap();
        queries::get_booking_by_id(&db, &id)?
    }
    .ok_or_else(|| AppError::NotFound(format!("booking {id}")))?;

    Ok(Json(AdminBookingResponse {
        allowed_transitions: lifecycle::allowed_transitions(booking.status),
        booking,
    }))
}

// POST /api/admin/bookings/:id/status
#[derive(Deserialize)]
pub struct TransitionRequest {
    pub requested_status: String,
    pub actor_id: String,
    pub note: Option<String>,
}

#[derive(Serialize)]
pub struct TransitionResponse {
    success: bool,
    new_status: BookingStatus,
}

pub async fn transition_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<TransitionRequest>,
) -> Result<Json<TransitionResponse>, AppError> {
    check_admin(&headers, &state.config.admin_token)?;

    let requested = parse_status(&body.requested_status)?;
    if body.actor_id.trim().is_empty() {
        return Err(AppError::Validation("actor_id is required".to_string()));
    }
    let now = Utc::now().naive_utc();

    let updated = {
        let mut db = state.db.lock().unwrap();
        booking::transition_booking(&mut db, &id, requested, body.actor_id.trim(), body.note, now)?
    };

    Ok(Json(TransitionResponse {
        success: true,
        new_status: updated.status,
    }))
}
