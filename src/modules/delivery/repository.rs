use bigdecimal::BigDecimal;
use serde::Deserialize;

use crate::modules::address::repository::Location;
use crate::utils::{
    api::{self, Executor, Request},
    money::deserialize_amount,
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeliveryFeeResponse {
    #[serde(deserialize_with = "deserialize_amount")]
    delivery_fee: BigDecimal,
}

pub async fn find_fee(
    e: &dyn Executor,
    location: Location,
    restaurant_id: &str,
) -> Result<BigDecimal, api::Error> {
    api::send::<DeliveryFeeResponse>(
        e,
        Request::get("deliveryFee")
            .query("lat", location.lat)
            .query("lon", location.lon)
            .query("restaurantId", restaurant_id),
    )
    .await
    .map(|res| res.delivery_fee)
}
