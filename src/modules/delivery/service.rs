use bigdecimal::BigDecimal;

use super::repository;
use crate::modules::{address::repository::Location, pricing::DEFAULT_DELIVERY_FEE};
use crate::utils::api::Executor;

pub fn fallback_fee() -> BigDecimal {
    BigDecimal::from(DEFAULT_DELIVERY_FEE)
}

/// Quotes the delivery fee for a restaurant. Checkout never blocks on this:
/// any failure resolves to the fallback fee.
pub async fn resolve_fee(
    e: &dyn Executor,
    location: Option<Location>,
    restaurant_id: &str,
) -> BigDecimal {
    let Some(location) = location else {
        tracing::warn!(
            "No coordinates for delivery fee quote of restaurant {}, using fallback",
            restaurant_id
        );
        return fallback_fee();
    };

    match repository::find_fee(e, location, restaurant_id).await {
        Ok(fee) => fee,
        Err(err) => {
            tracing::warn!(
                "Failed to quote delivery fee for restaurant {}: {}, using fallback",
                restaurant_id,
                err
            );
            fallback_fee()
        }
    }
}
