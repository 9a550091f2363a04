//! Price computation for a cart snapshot.
//!
//! Everything here is pure: the same cart, coupon and delivery quote always
//! produce the same breakdown. Nothing is cached, callers recompute after every
//! change to the session.

use bigdecimal::{BigDecimal, Zero};
use serde::Serialize;

use crate::modules::{
    cart::repository::{Cart, CartLineItem},
    coupon::repository::AppliedCoupon,
};
use crate::utils::money::{percent_of, round2, serialize_amount};

pub const TAX_PERCENT: i32 = 5;
pub const PLATFORM_FEE: i32 = 8;
pub const FREE_DELIVERY_THRESHOLD: i32 = 500;
pub const DEFAULT_DELIVERY_FEE: i32 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct LinePrice {
    pub original: BigDecimal,
    pub discounted: BigDecimal,
    pub has_discount: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    #[serde(serialize_with = "serialize_amount")]
    pub item_total: BigDecimal,
    #[serde(serialize_with = "serialize_amount")]
    pub original_total: BigDecimal,
    #[serde(serialize_with = "serialize_amount")]
    pub total_savings: BigDecimal,
    #[serde(serialize_with = "serialize_amount")]
    pub tax: BigDecimal,
    #[serde(serialize_with = "serialize_amount")]
    pub platform_fee: BigDecimal,
    #[serde(serialize_with = "serialize_amount")]
    pub delivery_fee: BigDecimal,
    pub is_free_delivery: bool,
    #[serde(serialize_with = "serialize_amount")]
    pub coupon_discount: BigDecimal,
    #[serde(serialize_with = "serialize_amount")]
    pub final_amount: BigDecimal,
}

/// Fee schedule applied on top of the item total.
#[derive(Debug, Clone)]
pub struct PricingRules {
    pub tax_percent: BigDecimal,
    pub platform_fee: BigDecimal,
    pub free_delivery_threshold: BigDecimal,
}

impl Default for PricingRules {
    fn default() -> Self {
        Self {
            tax_percent: BigDecimal::from(TAX_PERCENT),
            platform_fee: BigDecimal::from(PLATFORM_FEE),
            free_delivery_threshold: BigDecimal::from(FREE_DELIVERY_THRESHOLD),
        }
    }
}

pub fn price_for_line(line: &CartLineItem) -> LinePrice {
    let original = line.unit_price() * BigDecimal::from(line.quantity);

    match &line.item.offers {
        Some(offer) if offer.required_quantity.is_some_and(|required| line.quantity >= required) => {
            let discount = percent_of(&original, &offer.discount_amount);
            LinePrice {
                discounted: &original - discount,
                original,
                has_discount: true,
            }
        }
        _ => LinePrice {
            discounted: original.clone(),
            original,
            has_discount: false,
        },
    }
}

/// Sum of discounted line prices. A missing cart counts as empty.
pub fn cart_item_total(cart: Option<&Cart>) -> BigDecimal {
    cart.map(|cart| {
        cart.items
            .iter()
            .map(|line| price_for_line(line).discounted)
            .sum()
    })
    .unwrap_or_else(BigDecimal::zero)
}

impl PricingRules {
    pub fn is_free_delivery(&self, item_total: &BigDecimal) -> bool {
        item_total >= &self.free_delivery_threshold
    }

    pub fn compute_breakdown(
        &self,
        cart: Option<&Cart>,
        applied_coupon: Option<&AppliedCoupon>,
        delivery_fee_quote: &BigDecimal,
    ) -> PriceBreakdown {
        let lines = cart.map(|cart| cart.items.as_slice()).unwrap_or_default();

        let original_total: BigDecimal = lines
            .iter()
            .map(|line| price_for_line(line).original)
            .sum();
        let item_total = cart_item_total(cart);
        let total_savings = &original_total - &item_total;

        let tax = round2(&percent_of(&item_total, &self.tax_percent));
        let is_free_delivery = self.is_free_delivery(&item_total);
        let delivery_fee = match is_free_delivery {
            true => BigDecimal::zero(),
            false => delivery_fee_quote.clone(),
        };
        let coupon_discount = applied_coupon
            .map(|coupon| coupon.discount_amount.clone())
            .unwrap_or_else(BigDecimal::zero);

        let final_amount =
            &item_total - &coupon_discount + &tax + &delivery_fee + &self.platform_fee;
        let final_amount = match final_amount < BigDecimal::zero() {
            true => BigDecimal::zero(),
            false => final_amount,
        };

        PriceBreakdown {
            item_total: round2(&item_total),
            original_total: round2(&original_total),
            total_savings: round2(&total_savings),
            tax,
            platform_fee: round2(&self.platform_fee),
            delivery_fee: round2(&delivery_fee),
            is_free_delivery,
            coupon_discount: round2(&coupon_discount),
            final_amount: round2(&final_amount),
        }
    }
}

pub fn compute_breakdown(
    cart: Option<&Cart>,
    applied_coupon: Option<&AppliedCoupon>,
    delivery_fee_quote: &BigDecimal,
) -> PriceBreakdown {
    PricingRules::default().compute_breakdown(cart, applied_coupon, delivery_fee_quote)
}
