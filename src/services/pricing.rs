use chrono::NaiveDateTime;
use serde::Serialize;

use crate::models::{AdditionalService, DiscountType, Procedure, Promotion};

/// The price charged for one unit of a procedure before any promotion code.
///
/// Members fall back through `beberia_price`, `discounted_price`, `original_price`;
/// everyone else skips the member tier.
pub fn compute_effective_price(procedure: &Procedure, is_member: bool) -> i64 {
    let member_tier = procedure.beberia_price.filter(|_| is_member);

    [member_tier, procedure.discounted_price]
        .into_iter()
        .flatten()
        .next()
        .unwrap_or(procedure.original_price)
}

/// `None` when the line total does not fit in an `i64`.
pub fn compute_line_total(procedure: &Procedure, quantity: i32, is_member: bool) -> Option<i64> {
    compute_effective_price(procedure, is_member).checked_mul(i64::from(quantity))
}

/// Sum of every line total plus every service price, or `None` on overflow.
pub fn compute_subtotal(
    procedures: &[(&Procedure, i32)],
    services: &[&AdditionalService],
    is_member: bool,
) -> Option<i64> {
    let procedures_total = procedures.iter().try_fold(0i64, |acc, (procedure, quantity)| {
        acc.checked_add(compute_line_total(procedure, *quantity, is_member)?)
    })?;

    services
        .iter()
        .try_fold(procedures_total, |acc, s| acc.checked_add(s.price))
}

/// Why a promotion code did not discount the order.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PromotionRejection {
    NotFound,
    Inactive,
    NotYetValid,
    Expired,
    UsageExhausted,
    MembersOnly,
    MinimumOrderNotMet,
}

impl PromotionRejection {
    pub fn message(&self) -> &'static str {
        match self {
            PromotionRejection::NotFound => "promotion code not found",
            PromotionRejection::Inactive => "promotion is not active",
            PromotionRejection::NotYetValid => "promotion has not started yet",
            PromotionRejection::Expired => "promotion has expired",
            PromotionRejection::UsageExhausted => "promotion usage limit reached",
            PromotionRejection::MembersOnly => "promotion is for Beberia members only",
            PromotionRejection::MinimumOrderNotMet => "order does not meet the promotion minimum",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PromotionOutcome {
    pub discount_amount: i64,
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<PromotionRejection>,
}

impl PromotionOutcome {
    pub fn rejected(reason: PromotionRejection) -> Self {
        Self {
            discount_amount: 0,
            applied: false,
            rejection: Some(reason),
        }
    }
}

pub fn check_promotion(
    subtotal: i64,
    promotion: &Promotion,
    now: NaiveDateTime,
    user_is_member: bool,
) -> Result<(), PromotionRejection> {
    if !promotion.is_active {
        return Err(PromotionRejection::Inactive);
    }
    if now < promotion.valid_from {
        return Err(PromotionRejection::NotYetValid);
    }
    if now > promotion.valid_to {
        return Err(PromotionRejection::Expired);
    }
    if let Some(max_usage) = promotion.max_usage {
        if promotion.current_usage >= max_usage {
            return Err(PromotionRejection::UsageExhausted);
        }
    }
    if promotion.beberia_only && !user_is_member {
        return Err(PromotionRejection::MembersOnly);
    }
    if let Some(min_order) = promotion.min_order_amount {
        if subtotal < min_order {
            return Err(PromotionRejection::MinimumOrderNotMet);
        }
    }
    Ok(())
}

/// Discount granted by `promotion` on `subtotal`.
///
/// Fixed-amount discounts are recorded as-is even when they exceed the
/// subtotal; only the total is floored at zero (see [`compute_total`]).
pub fn apply_promotion(
    subtotal: i64,
    promotion: &Promotion,
    now: NaiveDateTime,
    user_is_member: bool,
) -> PromotionOutcome {
    if let Err(reason) = check_promotion(subtotal, promotion, now, user_is_member) {
        return PromotionOutcome::rejected(reason);
    }

    let discount_amount = match promotion.discount_type {
        DiscountType::Percentage => {
            let raw = i128::from(subtotal) * i128::from(promotion.discount_value) / 100;
            let raw = i64::try_from(raw).unwrap_or(i64::MAX);
            match promotion.max_discount {
                Some(cap) => raw.min(cap),
                None => raw,
            }
        }
        DiscountType::FixedAmount => promotion.discount_value,
    };

    PromotionOutcome {
        discount_amount,
        applied: true,
        rejection: None,
    }
}

pub fn compute_total(subtotal: i64, discount_amount: i64) -> i64 {
    subtotal.saturating_sub(discount_amount).max(0)
}
