use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::{
    AdditionalService, Booking, BookingItem, BookingService, BookingStatus, DiscountType, Doctor,
    Hospital, LocalizedText, Procedure, Promotion, ServiceType, StatusHistoryEntry,
};

const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FMT: &str = "%Y-%m-%d";

fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FMT).to_string()
}

fn format_date(d: Option<NaiveDate>) -> Option<String> {
    d.map(|d| d.format(DATE_FMT).to_string())
}

fn parse_datetime(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT)
        .with_context(|| format!("invalid timestamp in database: {s}"))
}

fn parse_date(s: Option<String>) -> anyhow::Result<Option<NaiveDate>> {
    s.map(|s| {
        NaiveDate::parse_from_str(&s, DATE_FMT)
            .with_context(|| format!("invalid date in database: {s}"))
    })
    .transpose()
}

fn parse_status(s: &str) -> anyhow::Result<BookingStatus> {
    BookingStatus::parse(s).with_context(|| format!("unknown booking status in database: {s}"))
}

// ── Hospitals & Doctors ──

pub fn insert_hospital(conn: &Connection, hospital: &Hospital) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO hospitals (id, name_vi, name_ko, name_en, is_active) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            hospital.id,
            hospital.name.vi,
            hospital.name.ko,
            hospital.name.en,
            hospital.is_active,
        ],
    )?;
    Ok(())
}

pub fn find_hospital_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Hospital>> {
    let hospital = conn
        .query_row(
            "SELECT id, name_vi, name_ko, name_en, is_active FROM hospitals WHERE id = ?1",
            params![id],
            |row| {
                Ok(Hospital {
                    id: row.get(0)?,
                    name: LocalizedText {
                        vi: row.get(1)?,
                        ko: row.get(2)?,
                        en: row.get(3)?,
                    },
                    is_active: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(hospital)
}

pub fn insert_doctor(conn: &Connection, doctor: &Doctor) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO doctors (id, hospital_id, name, is_active) VALUES (?1, ?2, ?3, ?4)",
        params![doctor.id, doctor.hospital_id, doctor.name, doctor.is_active],
    )?;
    Ok(())
}

pub fn find_doctor_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Doctor>> {
    let doctor = conn
        .query_row(
            "SELECT id, hospital_id, name, is_active FROM doctors WHERE id = ?1",
            params![id],
            |row| {
                Ok(Doctor {
                    id: row.get(0)?,
                    hospital_id: row.get(1)?,
                    name: row.get(2)?,
                    is_active: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(doctor)
}

// ── Procedures ──

const PROCEDURE_COLUMNS: &str = "id, hospital_id, name_vi, name_ko, name_en, \
     description_vi, description_ko, description_en, original_price, discounted_price, \
     beberia_price, duration_minutes, recovery_days, is_popular, is_active";

fn procedure_from_row(row: &Row) -> rusqlite::Result<Procedure> {
    Ok(Procedure {
        id: row.get(0)?,
        hospital_id: row.get(1)?,
        name: LocalizedText {
            vi: row.get(2)?,
            ko: row.get(3)?,
            en: row.get(4)?,
        },
        description: LocalizedText {
            vi: row.get(5)?,
            ko: row.get(6)?,
            en: row.get(7)?,
        },
        original_price: row.get(8)?,
        discounted_price: row.get(9)?,
        beberia_price: row.get(10)?,
        duration_minutes: row.get(11)?,
        recovery_days: row.get(12)?,
        is_popular: row.get(13)?,
        is_active: row.get(14)?,
    })
}

pub fn insert_procedure(conn: &Connection, p: &Procedure) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO procedures ({PROCEDURE_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)"
        ),
        params![
            p.id,
            p.hospital_id,
            p.name.vi,
            p.name.ko,
            p.name.en,
            p.description.vi,
            p.description.ko,
            p.description.en,
            p.original_price,
            p.discounted_price,
            p.beberia_price,
            p.duration_minutes,
            p.recovery_days,
            p.is_popular,
            p.is_active,
        ],
    )?;
    Ok(())
}

pub fn find_procedure_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Procedure>> {
    let procedure = conn
        .query_row(
            &format!("SELECT {PROCEDURE_COLUMNS} FROM procedures WHERE id = ?1"),
            params![id],
            procedure_from_row,
        )
        .optional()?;
    Ok(procedure)
}

pub fn list_procedures_for_hospital(
    conn: &Connection,
    hospital_id: &str,
) -> anyhow::Result<Vec<Procedure>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PROCEDURE_COLUMNS} FROM procedures
         WHERE hospital_id = ?1 AND is_active = 1
         ORDER BY is_popular DESC, name_en ASC"
    ))?;

    let rows = stmt.query_map(params![hospital_id], procedure_from_row)?;

    let mut procedures = vec![];
    for row in rows {
        procedures.push(row?);
    }
    Ok(procedures)
}

// ── Additional Services ──

const SERVICE_COLUMNS: &str = "id, service_type, name_vi, name_ko, name_en, \
     description_vi, description_ko, description_en, price, options, is_active";

fn parse_service_row(row: &Row) -> anyhow::Result<AdditionalService> {
    let type_str: String = row.get(1)?;
    let options_json: String = row.get(9)?;

    Ok(AdditionalService {
        id: row.get(0)?,
        service_type: ServiceType::parse(&type_str)
            .with_context(|| format!("unknown service type in database: {type_str}"))?,
        name: LocalizedText {
            vi: row.get(2)?,
            ko: row.get(3)?,
            en: row.get(4)?,
        },
        description: LocalizedText {
            vi: row.get(5)?,
            ko: row.get(6)?,
            en: row.get(7)?,
        },
        price: row.get(8)?,
        options: serde_json::from_str(&options_json).unwrap_or(serde_json::json!({})),
        is_active: row.get(10)?,
    })
}

pub fn insert_service(conn: &Connection, s: &AdditionalService) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO additional_services ({SERVICE_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        params![
            s.id,
            s.service_type.as_str(),
            s.name.vi,
            s.name.ko,
            s.name.en,
            s.description.vi,
            s.description.ko,
            s.description.en,
            s.price,
            serde_json::to_string(&s.options)?,
            s.is_active,
        ],
    )?;
    Ok(())
}

pub fn find_service_by_id(
    conn: &Connection,
    id: &str,
) -> anyhow::Result<Option<AdditionalService>> {
    let service = conn
        .query_row(
            &format!("SELECT {SERVICE_COLUMNS} FROM additional_services WHERE id = ?1"),
            params![id],
            |row| Ok(parse_service_row(row)),
        )
        .optional()?;
    service.transpose()
}

pub fn list_active_services(conn: &Connection) -> anyhow::Result<Vec<AdditionalService>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SERVICE_COLUMNS} FROM additional_services WHERE is_active = 1 ORDER BY service_type, price"
    ))?;

    let rows = stmt.query_map([], |row| Ok(parse_service_row(row)))?;

    let mut services = vec![];
    for row in rows {
        services.push(row??);
    }
    Ok(services)
}

// ── Promotions ──

const PROMOTION_COLUMNS: &str = "id, code, discount_type, discount_value, max_discount, \
     min_order_amount, beberia_only, valid_from, valid_to, max_usage, current_usage, is_active";

fn parse_promotion_row(row: &Row) -> anyhow::Result<Promotion> {
    let type_str: String = row.get(2)?;
    let valid_from: String = row.get(7)?;
    let valid_to: String = row.get(8)?;

    Ok(Promotion {
        id: row.get(0)?,
        code: row.get(1)?,
        discount_type: DiscountType::parse(&type_str)
            .with_context(|| format!("unknown discount type in database: {type_str}"))?,
        discount_value: row.get(3)?,
        max_discount: row.get(4)?,
        min_order_amount: row.get(5)?,
        beberia_only: row.get(6)?,
        valid_from: parse_datetime(&valid_from)?,
        valid_to: parse_datetime(&valid_to)?,
        max_usage: row.get(9)?,
        current_usage: row.get(10)?,
        is_active: row.get(11)?,
    })
}

pub fn insert_promotion(conn: &Connection, p: &Promotion) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO promotions ({PROMOTION_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            p.id,
            p.code,
            p.discount_type.as_str(),
            p.discount_value,
            p.max_discount,
            p.min_order_amount,
            p.beberia_only,
            format_datetime(&p.valid_from),
            format_datetime(&p.valid_to),
            p.max_usage,
            p.current_usage,
            p.is_active,
        ],
    )?;
    Ok(())
}

/// Codes are matched case-insensitively.
pub fn find_promotion_by_code(conn: &Connection, code: &str) -> anyhow::Result<Option<Promotion>> {
    let promotion = conn
        .query_row(
            &format!("SELECT {PROMOTION_COLUMNS} FROM promotions WHERE code = ?1 COLLATE NOCASE"),
            params![code],
            |row| Ok(parse_promotion_row(row)),
        )
        .optional()?;
    promotion.transpose()
}

/// Redeems one use of the promotion in a single conditional write.
/// Returns `false` when the cap was already reached.
pub fn increment_promotion_usage_if_under_cap(
    conn: &Connection,
    promotion_id: &str,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE promotions SET current_usage = current_usage + 1
         WHERE id = ?1 AND (max_usage IS NULL OR current_usage < max_usage)",
        params![promotion_id],
    )?;
    Ok(count == 1)
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, booking_number, user_id, hospital_id, doctor_id, subtotal, \
     discount_amount, total_amount, promotion_id, preferred_date, preferred_time, arrival_date, \
     departure_date, flight_number, passport_name, phone, notes, status, created_at, updated_at";

/// Inserts the booking row only. Returns `false` if the booking number is
/// already taken so the caller can retry with a fresh one.
pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<bool> {
    let result = conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)"
        ),
        params![
            booking.id,
            booking.booking_number,
            booking.user_id,
            booking.hospital_id,
            booking.doctor_id,
            booking.subtotal,
            booking.discount_amount,
            booking.total_amount,
            booking.promotion_id,
            format_date(booking.preferred_date),
            booking.preferred_time,
            format_date(booking.arrival_date),
            format_date(booking.departure_date),
            booking.flight_number,
            booking.passport_name,
            booking.phone,
            booking.notes,
            booking.status.as_str(),
            format_datetime(&booking.created_at),
            format_datetime(&booking.updated_at),
        ],
    );

    match result {
        Ok(_) => Ok(true),
        Err(rusqlite::Error::SqliteFailure(err, Some(msg)))
            if err.code == rusqlite::ErrorCode::ConstraintViolation
                && msg.contains("bookings.booking_number") =>
        {
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn insert_booking_items(
    conn: &Connection,
    booking_id: &str,
    items: &[BookingItem],
) -> anyhow::Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO booking_items (booking_id, procedure_id, quantity, unit_price, line_total)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for item in items {
        stmt.execute(params![
            booking_id,
            item.procedure_id,
            item.quantity,
            item.unit_price,
            item.line_total,
        ])?;
    }
    Ok(())
}

pub fn insert_booking_services(
    conn: &Connection,
    booking_id: &str,
    services: &[BookingService],
) -> anyhow::Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO booking_services (booking_id, service_id, price) VALUES (?1, ?2, ?3)",
    )?;
    for service in services {
        stmt.execute(params![booking_id, service.service_id, service.price])?;
    }
    Ok(())
}

pub fn append_booking_status_history(
    conn: &Connection,
    booking_id: &str,
    entry: &StatusHistoryEntry,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO booking_status_history (booking_id, status, changed_by, note, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            booking_id,
            entry.status.as_str(),
            entry.changed_by,
            entry.note,
            format_datetime(&entry.created_at),
        ],
    )?;
    Ok(())
}

/// Compare-and-set on the status: only succeeds if the row is still in `from`.
pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    from: BookingStatus,
    to: BookingStatus,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![to.as_str(), format_datetime(now), id, from.as_str()],
    )?;
    Ok(count > 0)
}

fn parse_booking_row(row: &Row) -> anyhow::Result<Booking> {
    let status_str: String = row.get(17)?;
    let created_at_str: String = row.get(18)?;
    let updated_at_str: String = row.get(19)?;

    Ok(Booking {
        id: row.get(0)?,
        booking_number: row.get(1)?,
        user_id: row.get(2)?,
        hospital_id: row.get(3)?,
        doctor_id: row.get(4)?,
        items: vec![],
        services: vec![],
        subtotal: row.get(5)?,
        discount_amount: row.get(6)?,
        total_amount: row.get(7)?,
        promotion_id: row.get(8)?,
        preferred_date: parse_date(row.get(9)?)?,
        preferred_time: row.get(10)?,
        arrival_date: parse_date(row.get(11)?)?,
        departure_date: parse_date(row.get(12)?)?,
        flight_number: row.get(13)?,
        passport_name: row.get(14)?,
        phone: row.get(15)?,
        notes: row.get(16)?,
        status: parse_status(&status_str)?,
        status_history: vec![],
        created_at: parse_datetime(&created_at_str)?,
        updated_at: parse_datetime(&updated_at_str)?,
    })
}

fn load_booking_children(conn: &Connection, booking: &mut Booking) -> anyhow::Result<()> {
    let mut stmt = conn.prepare(
        "SELECT procedure_id, quantity, unit_price, line_total
         FROM booking_items WHERE booking_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![booking.id], |row| {
        Ok(BookingItem {
            procedure_id: row.get(0)?,
            quantity: row.get(1)?,
            unit_price: row.get(2)?,
            line_total: row.get(3)?,
        })
    })?;
    for row in rows {
        booking.items.push(row?);
    }

    let mut stmt = conn.prepare(
        "SELECT service_id, price FROM booking_services WHERE booking_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![booking.id], |row| {
        Ok(BookingService {
            service_id: row.get(0)?,
            price: row.get(1)?,
        })
    })?;
    for row in rows {
        booking.services.push(row?);
    }

    let mut stmt = conn.prepare(
        "SELECT status, changed_by, note, created_at
         FROM booking_status_history WHERE booking_id = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![booking.id], |row| {
        let status_str: String = row.get(0)?;
        let created_at_str: String = row.get(3)?;
        let changed_by: String = row.get(1)?;
        let note: Option<String> = row.get(2)?;
        Ok((status_str, changed_by, note, created_at_str))
    })?;
    for row in rows {
        let (status_str, changed_by, note, created_at_str) = row?;
        booking.status_history.push(StatusHistoryEntry {
            status: parse_status(&status_str)?,
            changed_by,
            note,
            created_at: parse_datetime(&created_at_str)?,
        });
    }

    Ok(())
}

fn query_bookings(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        let mut booking = row??;
        load_booking_children(conn, &mut booking)?;
        bookings.push(booking);
    }
    Ok(bookings)
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1");
    Ok(query_bookings(conn, &sql, params![id])?.into_iter().next())
}

pub fn get_booking_by_number(
    conn: &Connection,
    booking_number: &str,
) -> anyhow::Result<Option<Booking>> {
    let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE booking_number = ?1");
    Ok(query_bookings(conn, &sql, params![booking_number])?
        .into_iter()
        .next())
}

pub fn list_bookings_for_user(conn: &Connection, user_id: &str) -> anyhow::Result<Vec<Booking>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = ?1 ORDER BY created_at DESC, id DESC"
    );
    query_bookings(conn, &sql, params![user_id])
}

pub fn list_bookings(
    conn: &Connection,
    status_filter: Option<BookingStatus>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    match status_filter {
        Some(status) => {
            let sql = format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings WHERE status = ?1
                 ORDER BY created_at DESC, id DESC LIMIT ?2"
            );
            query_bookings(conn, &sql, params![status.as_str(), limit])
        }
        None => {
            let sql = format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY created_at DESC, id DESC LIMIT ?1"
            );
            query_bookings(conn, &sql, params![limit])
        }
    }
}

pub struct BookingStats {
    pub counts: Vec<(BookingStatus, i64)>,
    pub completed_revenue: i64,
}

pub fn get_booking_stats(conn: &Connection) -> anyhow::Result<BookingStats> {
    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM bookings GROUP BY status")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut counts: Vec<(BookingStatus, i64)> =
        BookingStatus::ALL.iter().map(|s| (*s, 0)).collect();
    for row in rows {
        let (status_str, count) = row?;
        let status = parse_status(&status_str)?;
        if let Some(slot) = counts.iter_mut().find(|(s, _)| *s == status) {
            slot.1 = count;
        }
    }

    let completed_revenue: i64 = conn.query_row(
        "SELECT COALESCE(SUM(total_amount), 0) FROM bookings WHERE status = ?1",
        params![BookingStatus::Completed.as_str()],
        |row| row.get(0),
    )?;

    Ok(BookingStats {
        counts,
        completed_revenue,
    })
}
