use serde::{Deserialize, Serialize};

/// Text carried in the three storefront languages.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LocalizedText {
    pub vi: String,
    pub ko: String,
    pub en: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hospital {
    pub id: String,
    pub name: LocalizedText,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: String,
    pub hospital_id: String,
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Procedure {
    pub id: String,
    pub hospital_id: String,
    pub name: LocalizedText,
    pub description: LocalizedText,
    pub original_price: i64,
    pub discounted_price: Option<i64>,
    /// Member-only price; never above `discounted_price`.
    pub beberia_price: Option<i64>,
    pub duration_minutes: Option<i32>,
    pub recovery_days: Option<i32>,
    pub is_popular: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceType {
    AirportPickup,
    Translation,
    Accommodation,
    PostCare,
}

impl ServiceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::AirportPickup => "AIRPORT_PICKUP",
            ServiceType::Translation => "TRANSLATION",
            ServiceType::Accommodation => "ACCOMMODATION",
            ServiceType::PostCare => "POST_CARE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AIRPORT_PICKUP" => Some(ServiceType::AirportPickup),
            "TRANSLATION" => Some(ServiceType::Translation),
            "ACCOMMODATION" => Some(ServiceType::Accommodation),
            "POST_CARE" => Some(ServiceType::PostCare),
            _ => None,
        }
    }
}

/// Flat-priced ancillary offering bundled with a booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdditionalService {
    pub id: String,
    pub service_type: ServiceType,
    pub name: LocalizedText,
    pub description: LocalizedText,
    pub price: i64,
    pub options: serde_json::Value,
    pub is_active: bool,
}
