use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};

use super::repository::{AppliedCoupon, Coupon, CouponType};
use crate::utils::money::{format_amount, percent_of, round2};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CouponError {
    #[error("Invalid coupon code")]
    InvalidCode,
    #[error("Add items worth {} more to use this coupon", format_amount(.shortfall))]
    BelowMinimum { shortfall: BigDecimal },
    #[error("This coupon has expired")]
    Expired,
    #[error("Remove the applied coupon before applying another")]
    AlreadyApplied,
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

pub fn discount_for(coupon: &Coupon, item_total: &BigDecimal) -> BigDecimal {
    match coupon.r#type {
        CouponType::Percentage => round2(&percent_of(item_total, &coupon.discount)),
        CouponType::Amount => coupon.discount.clone(),
    }
}

/// Validates `code` against the user's coupons and freezes its discount at the
/// current item total.
pub fn apply_coupon(
    code: &str,
    available: &[Coupon],
    item_total: &BigDecimal,
    now: DateTime<Utc>,
) -> Result<AppliedCoupon, CouponError> {
    let code = normalize_code(code);
    if code.is_empty() {
        return Err(CouponError::InvalidCode);
    }

    let coupon = available
        .iter()
        .find(|coupon| coupon.code == code)
        .ok_or(CouponError::InvalidCode)?;

    if coupon.expiry.is_some_and(|expiry| expiry < now) {
        return Err(CouponError::Expired);
    }

    if item_total < &coupon.min_price {
        return Err(CouponError::BelowMinimum {
            shortfall: &coupon.min_price - item_total,
        });
    }

    Ok(AppliedCoupon {
        coupon: coupon.clone(),
        discount_amount: discount_for(coupon, item_total),
    })
}
