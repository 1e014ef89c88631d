pub mod admin;
pub mod bookings;
pub mod catalog;
pub mod health;
pub mod identity;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/hospitals/:id/procedures",
            get(catalog::list_procedures),
        )
        .route("/api/services", get(catalog::list_services))
        .route("/api/bookings/quote", post(bookings::quote_booking))
        .route(
            "/api/bookings",
            get(bookings::list_my_bookings).post(bookings::create_booking),
        )
        .route("/api/bookings/:number", get(bookings::get_my_booking))
        .route(
            "/api/bookings/:number/cancel",
            post(bookings::cancel_my_booking),
        )
        .route("/api/admin/status", get(admin::get_status))
        .route("/api/admin/bookings", get(admin::get_bookings))
        .route("/api/admin/bookings/:id", get(admin::get_booking))
        .route(
            "/api/admin/bookings/:id/status",
            post(admin::transition_booking),
        )
        .with_state(state)
}
