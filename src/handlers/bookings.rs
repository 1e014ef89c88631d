use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Actor, Booking, BookingDraft};
use crate::services::booking::{self, BookingCreated, PriceQuote};
use crate::state::AppState;

// POST /api/bookings/quote
pub async fn quote_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(draft): Json<BookingDraft>,
) -> Result<Json<PriceQuote>, AppError> {
    let now = Utc::now().naive_utc();
    let quote = {
        let db = state.db.lock().unwrap();
        booking::quote(&db, &draft, &actor, now)?
    };
    Ok(Json(quote))
}

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Json(draft): Json<BookingDraft>,
) -> Result<(StatusCode, Json<BookingCreated>), AppError> {
    let now = Utc::now().naive_utc();
    let created = {
        let mut db = state.db.lock().unwrap();
        booking::create_booking(
            &mut db,
            &draft,
            &actor,
            now,
            state.config.booking_number_attempts,
        )?
    };
    Ok((StatusCode::CREATED, Json(created)))
}

// GET /api/bookings
pub async fn list_my_bookings(
    State(state): State<Arc<AppState>>,
    actor: Actor,
) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = {
        let db = state.db.lock().unwrap();
        queries::list_bookings_for_user(&db, &actor.user_id)?
    };
    Ok(Json(bookings))
}

// GET /api/bookings/:number
pub async fn get_my_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(booking_number): Path<String>,
) -> Result<Json<Booking>, AppError> {
    let booking = {
        let db = state.db.lock().unwrap();
        booking::get_booking_for_user(&db, &booking_number, &actor)?
    };
    Ok(Json(booking))
}

// POST /api/bookings/:number/cancel
#[derive(Deserialize)]
pub struct CancelRequest {
    pub note: Option<String>,
}

pub async fn cancel_my_booking(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    Path(booking_number): Path<String>,
    body: Option<Json<CancelRequest>>,
) -> Result<Json<Booking>, AppError> {
    let note = body.and_then(|Json(b)| b.note);
    let now = Utc::now().naive_utc();

    let booking = {
        let mut db = state.db.lock().unwrap();
        booking::cancel_booking_for_user(&mut db, &booking_number, &actor, note, now)?
    };
    Ok(Json(booking))
}
