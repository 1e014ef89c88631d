use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    Percentage,
    FixedAmount,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "PERCENTAGE",
            DiscountType::FixedAmount => "FIXED_AMOUNT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PERCENTAGE" => Some(DiscountType::Percentage),
            "FIXED_AMOUNT" => Some(DiscountType::FixedAmount),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Promotion {
    pub id: String,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    /// Only consulted for percentage discounts.
    pub max_discount: Option<i64>,
    pub min_order_amount: Option<i64>,
    pub beberia_only: bool,
    pub valid_from: NaiveDateTime,
    pub valid_to: NaiveDateTime,
    pub max_usage: Option<i64>,
    pub current_usage: i64,
    pub is_active: bool,
}
