use chrono::NaiveDateTime;
use rusqlite::{Connection, Transaction};
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    Actor, AdditionalService, Booking, BookingDraft, BookingItem, BookingService, BookingStatus,
    Procedure,
};
use crate::services::booking_number::generate_booking_number;
use crate::services::lifecycle;
use crate::services::pricing::{self, PromotionOutcome, PromotionRejection};

/// What the customer is told about the code they entered.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PromotionFeedback {
    pub code: String,
    pub applied: bool,
    pub discount_amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<PromotionRejection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PromotionFeedback {
    fn from_outcome(code: &str, outcome: PromotionOutcome) -> Self {
        Self {
            code: code.to_string(),
            applied: outcome.applied,
            discount_amount: outcome.discount_amount,
            reason: outcome.rejection,
            message: outcome.rejection.map(|r| r.message().to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceQuote {
    pub items: Vec<BookingItem>,
    pub services: Vec<BookingService>,
    pub subtotal: i64,
    pub discount_amount: i64,
    pub total_amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion: Option<PromotionFeedback>,
    #[serde(skip)]
    applied_promotion_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingCreated {
    pub booking_id: String,
    pub booking_number: String,
    pub status: BookingStatus,
    pub subtotal: i64,
    pub discount_amount: i64,
    pub total_amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion: Option<PromotionFeedback>,
}

/// Upper bound on the quantity of a single procedure line.
pub const MAX_QUANTITY: i32 = 100;

fn order_too_large() -> AppError {
    AppError::Validation("order total is too large".to_string())
}

fn validate_selection(draft: &BookingDraft) -> Result<(), AppError> {
    if draft.hospital_id.trim().is_empty() {
        return Err(AppError::Validation("hospital is required".to_string()));
    }
    if draft.procedures.is_empty() {
        return Err(AppError::Validation(
            "select at least one procedure".to_string(),
        ));
    }
    if let Some(p) = draft
        .procedures
        .iter()
        .find(|p| !(1..=MAX_QUANTITY).contains(&p.quantity))
    {
        return Err(AppError::Validation(format!(
            "quantity for procedure {} must be between 1 and {MAX_QUANTITY}",
            p.procedure_id
        )));
    }
    Ok(())
}

fn validate_contact(draft: &BookingDraft) -> Result<(), AppError> {
    if draft.passport_name.trim().is_empty() {
        return Err(AppError::Validation("passport name is required".to_string()));
    }
    if draft.phone.trim().is_empty() {
        return Err(AppError::Validation("phone is required".to_string()));
    }
    if let (Some(arrival), Some(departure)) = (draft.arrival_date, draft.departure_date) {
        if arrival > departure {
            return Err(AppError::Validation(
                "arrival date must not be after departure date".to_string(),
            ));
        }
    }
    Ok(())
}

fn load_procedures(
    conn: &Connection,
    draft: &BookingDraft,
) -> Result<Vec<(Procedure, i32)>, AppError> {
    let mut selected = Vec::with_capacity(draft.procedures.len());
    for line in &draft.procedures {
        let procedure = queries::find_procedure_by_id(conn, &line.procedure_id)?
            .filter(|p| p.is_active && p.hospital_id == draft.hospital_id)
            .ok_or_else(|| {
                AppError::Validation(format!("unknown procedure: {}", line.procedure_id))
            })?;
        selected.push((procedure, line.quantity));
    }
    Ok(selected)
}

fn load_services(
    conn: &Connection,
    draft: &BookingDraft,
) -> Result<Vec<AdditionalService>, AppError> {
    let mut selected = Vec::with_capacity(draft.service_ids.len());
    for id in &draft.service_ids {
        let service = queries::find_service_by_id(conn, id)?
            .filter(|s| s.is_active)
            .ok_or_else(|| AppError::Validation(format!("unknown service: {id}")))?;
        selected.push(service);
    }
    Ok(selected)
}

/// Prices a draft against the live catalog. Nothing is written.
fn price_draft(
    conn: &Connection,
    draft: &BookingDraft,
    actor: &Actor,
    now: NaiveDateTime,
) -> Result<PriceQuote, AppError> {
    validate_selection(draft)?;

    let hospital = queries::find_hospital_by_id(conn, &draft.hospital_id)?
        .ok_or_else(|| AppError::Validation(format!("unknown hospital: {}", draft.hospital_id)))?;
    if !hospital.is_active {
        return Err(AppError::Validation(
            "hospital is not accepting bookings".to_string(),
        ));
    }

    if let Some(doctor_id) = draft.doctor_id.as_deref() {
        let doctor_ok = queries::find_doctor_by_id(conn, doctor_id)?
            .map(|d| d.is_active && d.hospital_id == hospital.id)
            .unwrap_or(false);
        if !doctor_ok {
            return Err(AppError::Validation(format!("unknown doctor: {doctor_id}")));
        }
    }

    let procedures = load_procedures(conn, draft)?;
    let services = load_services(conn, draft)?;
    let is_member = actor.is_beberia_member;

    let selection: Vec<(&Procedure, i32)> = procedures.iter().map(|(p, q)| (p, *q)).collect();
    let service_refs: Vec<&AdditionalService> = services.iter().collect();
    let subtotal = pricing::compute_subtotal(&selection, &service_refs, is_member)
        .ok_or_else(order_too_large)?;

    let items = procedures
        .iter()
        .map(|(p, quantity)| {
            Ok(BookingItem {
                procedure_id: p.id.clone(),
                quantity: *quantity,
                unit_price: pricing::compute_effective_price(p, is_member),
                line_total: pricing::compute_line_total(p, *quantity, is_member)
                    .ok_or_else(order_too_large)?,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;
    let booked_services = services
        .iter()
        .map(|s| BookingService {
            service_id: s.id.clone(),
            price: s.price,
        })
        .collect();

    let code = draft
        .promotion_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let (promotion, applied_promotion_id) = match code {
        None => (None, None),
        Some(code) => match queries::find_promotion_by_code(conn, code)? {
            None => (
                Some(PromotionFeedback::from_outcome(
                    code,
                    PromotionOutcome::rejected(PromotionRejection::NotFound),
                )),
                None,
            ),
            Some(promo) => {
                let outcome = pricing::apply_promotion(subtotal, &promo, now, is_member);
                let applied_id = outcome.applied.then(|| promo.id.clone());
                (
                    Some(PromotionFeedback::from_outcome(&promo.code, outcome)),
                    applied_id,
                )
            }
        },
    };

    if let Some(feedback) = promotion.as_ref().filter(|f| !f.applied) {
        tracing::warn!(
            user_id = %actor.user_id,
            code = %feedback.code,
            reason = ?feedback.reason,
            "promotion rejected"
        );
    }

    let discount_amount = promotion.as_ref().map(|p| p.discount_amount).unwrap_or(0);

    Ok(PriceQuote {
        items,
        services: booked_services,
        subtotal,
        discount_amount,
        total_amount: pricing::compute_total(subtotal, discount_amount),
        promotion,
        applied_promotion_id,
    })
}

/// Prices a selection for display without reserving anything.
pub fn quote(
    conn: &Connection,
    draft: &BookingDraft,
    actor: &Actor,
    now: NaiveDateTime,
) -> Result<PriceQuote, AppError> {
    price_draft(conn, draft, actor, now)
}

pub fn create_booking(
    conn: &mut Connection,
    draft: &BookingDraft,
    actor: &Actor,
    now: NaiveDateTime,
    max_attempts: u32,
) -> Result<BookingCreated, AppError> {
    create_booking_with(conn, draft, actor, now, max_attempts, || {
        generate_booking_number(now)
    })
}

/// Same as [`create_booking`] with a caller-supplied booking number source.
pub fn create_booking_with<F>(
    conn: &mut Connection,
    draft: &BookingDraft,
    actor: &Actor,
    now: NaiveDateTime,
    max_attempts: u32,
    next_number: F,
) -> Result<BookingCreated, AppError>
where
    F: FnMut() -> String,
{
    validate_contact(draft)?;

    let tx = conn.transaction()?;
    let quote = price_draft(&tx, draft, actor, now)?;
    let created =
        insert_priced_booking(&tx, draft, actor, quote, now, max_attempts, next_number)?;
    tx.commit()?;

    tracing::info!(
        booking_number = %created.booking_number,
        user_id = %actor.user_id,
        total = created.total_amount,
        "booking created"
    );

    Ok(created)
}

/// Writes a priced draft inside the caller's transaction. The caller commits,
/// or drops the transaction on error so nothing is kept.
fn insert_priced_booking<F>(
    tx: &Connection,
    draft: &BookingDraft,
    actor: &Actor,
    quote: PriceQuote,
    now: NaiveDateTime,
    max_attempts: u32,
    mut next_number: F,
) -> Result<BookingCreated, AppError>
where
    F: FnMut() -> String,
{
    if let Some(promotion_id) = quote.applied_promotion_id.as_deref() {
        if !queries::increment_promotion_usage_if_under_cap(tx, promotion_id)? {
            let code = quote
                .promotion
                .as_ref()
                .map(|p| p.code.clone())
                .unwrap_or_default();
            tracing::warn!(code = %code, "promotion cap reached during redemption");
            return Err(AppError::PromotionUnavailable(code));
        }
    }

    let mut booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        booking_number: String::new(),
        user_id: actor.user_id.clone(),
        hospital_id: draft.hospital_id.clone(),
        doctor_id: draft.doctor_id.clone(),
        items: quote.items,
        services: quote.services,
        subtotal: quote.subtotal,
        discount_amount: quote.discount_amount,
        total_amount: quote.total_amount,
        promotion_id: quote.applied_promotion_id,
        preferred_date: draft.preferred_date,
        preferred_time: draft.preferred_time.clone(),
        arrival_date: draft.arrival_date,
        departure_date: draft.departure_date,
        flight_number: draft.flight_number.clone(),
        passport_name: draft.passport_name.trim().to_string(),
        phone: draft.phone.trim().to_string(),
        notes: draft.notes.clone(),
        status: BookingStatus::Pending,
        status_history: vec![lifecycle::initial_history(&actor.user_id, now)],
        created_at: now,
        updated_at: now,
    };

    let mut inserted = false;
    for attempt in 1..=max_attempts {
        booking.booking_number = next_number();
        if queries::insert_booking(tx, &booking)? {
            inserted = true;
            break;
        }
        tracing::warn!(
            booking_number = %booking.booking_number,
            attempt,
            "booking number collision, regenerating"
        );
    }
    if !inserted {
        return Err(AppError::BookingNumberExhausted {
            attempts: max_attempts,
        });
    }

    queries::insert_booking_items(tx, &booking.id, &booking.items)?;
    queries::insert_booking_services(tx, &booking.id, &booking.services)?;
    for entry in &booking.status_history {
        queries::append_booking_status_history(tx, &booking.id, entry)?;
    }

    Ok(BookingCreated {
        booking_id: booking.id,
        booking_number: booking.booking_number,
        status: booking.status,
        subtotal: booking.subtotal,
        discount_amount: booking.discount_amount,
        total_amount: booking.total_amount,
        promotion: quote.promotion,
    })
}

fn persist_transition(
    tx: Transaction<'_>,
    mut booking: Booking,
    requested: BookingStatus,
    actor_id: &str,
    note: Option<String>,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let previous = booking.status;
    let entry = lifecycle::transition(&mut booking, requested, actor_id, note, now)?;

    if !queries::update_booking_status(&tx, &booking.id, previous, requested, &now)? {
        return Err(AppError::StaleStatus);
    }
    queries::append_booking_status_history(&tx, &booking.id, &entry)?;
    tx.commit()?;

    tracing::info!(
        booking_number = %booking.booking_number,
        from = %previous,
        to = %requested,
        actor = actor_id,
        "booking status changed"
    );

    Ok(booking)
}

/// Staff-driven status change. Status update and history append commit together.
pub fn transition_booking(
    conn: &mut Connection,
    booking_id: &str,
    requested: BookingStatus,
    actor_id: &str,
    note: Option<String>,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let tx = conn.transaction()?;
    let booking = queries::get_booking_by_id(&tx, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    persist_transition(tx, booking, requested, actor_id, note, now)
}

/// Looks up a booking the actor owns. Someone else's booking reads as missing.
pub fn get_booking_for_user(
    conn: &Connection,
    booking_number: &str,
    actor: &Actor,
) -> Result<Booking, AppError> {
    queries::get_booking_by_number(conn, booking_number)?
        .filter(|b| b.user_id == actor.user_id)
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_number}")))
}

pub fn cancel_booking_for_user(
    conn: &mut Connection,
    booking_number: &str,
    actor: &Actor,
    note: Option<String>,
    now: NaiveDateTime,
) -> Result<Booking, AppError> {
    let tx = conn.transaction()?;
    let booking = get_booking_for_user(&tx, booking_number, actor)?;

    if !lifecycle::can_user_cancel(booking.status) {
        return Err(AppError::NotCancellable(booking.status));
    }

    persist_transition(
        tx,
        booking,
        BookingStatus::Cancelled,
        &actor.user_id,
        note,
        now,
    )
}
