use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_aux::field_attributes::deserialize_string_from_number;

use crate::modules::{cart::repository::Customization, payment::PaymentMethod};
use crate::utils::{
    api::{self, Executor, Request},
    money::{deserialize_amount, serialize_amount},
};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderUser {
    pub name: String,
    pub phone_number: String,
    pub address: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    #[serde(serialize_with = "serialize_amount", deserialize_with = "deserialize_amount")]
    pub price: BigDecimal,
    #[serde(serialize_with = "serialize_amount", deserialize_with = "deserialize_amount")]
    pub total_price: BigDecimal,
    pub customizations: Vec<Customization>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BillDetails {
    #[serde(serialize_with = "serialize_amount", deserialize_with = "deserialize_amount")]
    pub item_total: BigDecimal,
    #[serde(serialize_with = "serialize_amount", deserialize_with = "deserialize_amount")]
    pub platform_fee: BigDecimal,
    #[serde(serialize_with = "serialize_amount", deserialize_with = "deserialize_amount")]
    pub delivery_fee: BigDecimal,
    #[serde(serialize_with = "serialize_amount", deserialize_with = "deserialize_amount")]
    pub tax: BigDecimal,
    /// Coupon discount.
    #[serde(serialize_with = "serialize_amount", deserialize_with = "deserialize_amount")]
    pub discount: BigDecimal,
    #[serde(serialize_with = "serialize_amount", deserialize_with = "deserialize_amount")]
    pub offer_savings: BigDecimal,
    /// Offer savings plus the coupon discount.
    #[serde(serialize_with = "serialize_amount", deserialize_with = "deserialize_amount")]
    pub total_savings: BigDecimal,
    #[serde(serialize_with = "serialize_amount", deserialize_with = "deserialize_amount")]
    pub final_amount: BigDecimal,
    pub payment_method: PaymentMethod,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    pub user: OrderUser,
    pub restaurant_id: String,
    pub cart_id: String,
    pub coupon_code: Option<String>,
    pub items: Vec<OrderItem>,
    pub bill_details: BillDetails,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    pub order_id: String,
    pub coins_earned: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OrderRef {
    #[serde(deserialize_with = "deserialize_string_from_number")]
    pub order_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PlaceOrderResponse {
    pub order: OrderRef,
    #[serde(default)]
    pub coins_earned: u64,
}

impl From<PlaceOrderResponse> for PlacedOrder {
    fn from(res: PlaceOrderResponse) -> Self {
        Self {
            order_id: res.order.order_id,
            coins_earned: res.coins_earned,
        }
    }
}

pub async fn place(e: &dyn Executor, payload: &OrderPayload) -> Result<PlacedOrder, api::Error> {
    let body = serde_json::to_value(payload).map_err(|err| {
        tracing::error!("Failed to encode order payload: {}", err);
        api::Error::RequestNotSent
    })?;

    api::send::<PlaceOrderResponse>(e, Request::post("orders", body))
        .await
        .map(PlacedOrder::from)
}
