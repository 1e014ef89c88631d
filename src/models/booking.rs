use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    DepositPaid,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 8] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::DepositPaid,
        BookingStatus::Scheduled,
        BookingStatus::InProgress,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
        BookingStatus::NoShow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::DepositPaid => "DEPOSIT_PAID",
            BookingStatus::Scheduled => "SCHEDULED",
            BookingStatus::InProgress => "IN_PROGRESS",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::NoShow => "NO_SHOW",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One procedure line, priced at booking time and never re-priced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingItem {
    pub procedure_id: String,
    pub quantity: i32,
    pub unit_price: i64,
    pub line_total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingService {
    pub service_id: String,
    pub price: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusHistoryEntry {
    pub status: BookingStatus,
    pub changed_by: String,
    pub note: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub booking_number: String,
    pub user_id: String,
    pub hospital_id: String,
    pub doctor_id: Option<String>,
    pub items: Vec<BookingItem>,
    pub services: Vec<BookingService>,
    pub subtotal: i64,
    pub discount_amount: i64,
    pub total_amount: i64,
    pub promotion_id: Option<String>,
    pub preferred_date: Option<NaiveDate>,
    pub preferred_time: Option<String>,
    pub arrival_date: Option<NaiveDate>,
    pub departure_date: Option<NaiveDate>,
    pub flight_number: Option<String>,
    pub passport_name: String,
    pub phone: String,
    pub notes: Option<String>,
    pub status: BookingStatus,
    pub status_history: Vec<StatusHistoryEntry>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A procedure selection inside a draft. Quantity defaults to 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftProcedure {
    pub procedure_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

/// What the client submits to create (or quote) a booking.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingDraft {
    pub hospital_id: String,
    pub doctor_id: Option<String>,
    pub procedures: Vec<DraftProcedure>,
    #[serde(default)]
    pub service_ids: Vec<String>,
    pub preferred_date: Option<NaiveDate>,
    pub preferred_time: Option<String>,
    pub promotion_code: Option<String>,
    #[serde(default)]
    pub passport_name: String,
    #[serde(default)]
    pub phone: String,
    pub arrival_date: Option<NaiveDate>,
    pub departure_date: Option<NaiveDate>,
    pub flight_number: Option<String>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_wire_name() {
        for status in BookingStatus::ALL {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BookingStatus::parse("in_progress"), Some(BookingStatus::InProgress));
        assert_eq!(BookingStatus::parse("ARCHIVED"), None);
    }

    #[test]
    fn test_draft_quantity_defaults_to_one() {
        let draft: BookingDraft = serde_json::from_str(
            r#"{"hospital_id":"h1","procedures":[{"procedure_id":"p1"}]}"#,
        )
        .unwrap();
        assert_eq!(draft.procedures[0].quantity, 1);
        assert!(draft.service_ids.is_empty());
    }
}
