use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::identity::actor_from_headers;
use crate::models::{AdditionalService, LocalizedText};
use crate::services::pricing;
use crate::state::AppState;

// GET /api/hospitals/:id/procedures
#[derive(Serialize)]
pub struct ProcedureResponse {
    id: String,
    name: LocalizedText,
    description: LocalizedText,
    original_price: i64,
    discounted_price: Option<i64>,
    beberia_price: Option<i64>,
    /// What this caller would pay per unit.
    price: i64,
    duration_minutes: Option<i32>,
    recovery_days: Option<i32>,
    is_popular: bool,
}

pub async fn list_procedures(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(hospital_id): Path<String>,
) -> Result<Json<Vec<ProcedureResponse>>, AppError> {
    let is_member = actor_from_headers(&headers)
        .map(|a| a.is_beberia_member)
        .unwrap_or(false);

    let procedures = {
        let db = state.db.lock().unwrap();
        let hospital = queries::find_hospital_by_id(&db, &hospital_id)?
            .filter(|h| h.is_active)
            .ok_or_else(|| AppError::NotFound(format!("hospital {hospital_id}")))?;
        queries::list_procedures_for_hospital(&db, &hospital.id)?
    };

    let response = procedures
        .into_iter()
        .map(|p| ProcedureResponse {
            price: pricing::compute_effective_price(&p, is_member),
            id: p.id,
            name: p.name,
            description: p.description,
            original_price: p.original_price,
            discounted_price: p.discounted_price,
            beberia_price: p.beberia_price,
            duration_minutes: p.duration_minutes,
            recovery_days: p.recovery_days,
            is_popular: p.is_popular,
        })
        .collect();

    Ok(Json(response))
}

// GET /api/services
pub async fn list_services(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<AdditionalService>>, AppError> {
    let services = {
        let db = state.db.lock().unwrap();
        queries::list_active_services(&db)?
    };
    Ok(Json(services))
}
