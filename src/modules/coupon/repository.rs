use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::{
    api::{self, Executor, Request},
    money::{deserialize_amount, serialize_amount},
};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CouponType {
    #[serde(rename = "percentage")]
    Percentage,
    #[serde(rename = "amount")]
    Amount,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub code: String,
    #[serde(rename = "type")]
    pub r#type: CouponType,
    #[serde(default, deserialize_with = "deserialize_amount", serialize_with = "serialize_amount")]
    pub discount: BigDecimal,
    #[serde(default, deserialize_with = "deserialize_amount", serialize_with = "serialize_amount")]
    pub min_price: BigDecimal,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

/// A coupon together with the discount it was worth when it was applied.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppliedCoupon {
    #[serde(flatten)]
    pub coupon: Coupon,
    #[serde(serialize_with = "serialize_amount")]
    pub discount_amount: BigDecimal,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CouponsResponse {
    List(Vec<Coupon>),
    Wrapped { coupons: Vec<Coupon> },
}

pub async fn find_available(e: &dyn Executor) -> Result<Vec<Coupon>, api::Error> {
    api::send::<CouponsResponse>(e, Request::get("coupons"))
        .await
        .map(|res| match res {
            CouponsResponse::List(coupons) => coupons,
            CouponsResponse::Wrapped { coupons } => coupons,
        })
}
