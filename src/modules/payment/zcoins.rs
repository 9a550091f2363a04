use bigdecimal::BigDecimal;
use serde::Deserialize;

use super::{cod, Availability, Error};
use crate::modules::order::repository::{OrderPayload, PlacedOrder};
use crate::utils::{
    api::{self, Executor, Request},
    money::{ceil_whole, deserialize_amount},
};

#[derive(Deserialize)]
struct Balance {
    #[serde(default, deserialize_with = "deserialize_amount")]
    balance: BigDecimal,
}

#[derive(Deserialize)]
struct BalanceResponse {
    zcoins: Balance,
}

pub async fn find_balance(e: &dyn Executor) -> Result<BigDecimal, api::Error> {
    api::send::<BalanceResponse>(e, Request::get("zcoins/balance"))
        .await
        .map(|res| res.zcoins.balance)
}

/// Coins are whole units, so the payable amount rounds up.
pub fn coins_needed(final_amount: &BigDecimal) -> BigDecimal {
    ceil_whole(final_amount)
}

pub fn availability(balance: &BigDecimal, final_amount: &BigDecimal) -> Availability {
    let needed = coins_needed(final_amount);
    match balance >= &needed {
        true => Availability::Enabled,
        false => Availability::Disabled {
            reason: format!("Insufficient Zcoins: {} needed, {} available", needed, balance),
        },
    }
}

pub async fn submit(e: &dyn Executor, payload: &OrderPayload) -> Result<PlacedOrder, Error> {
    let balance = find_balance(e).await.map_err(|err| {
        tracing::error!("Failed to fetch Zcoins balance: {}", err);
        Error::OrderPlacementFailure(String::from("Could not verify your Zcoins balance"))
    })?;

    let needed = coins_needed(&payload.bill_details.final_amount);
    if balance < needed {
        return Err(Error::InsufficientCoins { needed, balance });
    }

    cod::submit(e, payload).await
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn fractional_amount_needs_the_next_coin() {
        let final_amount = BigDecimal::from_str("100.4").unwrap();
        assert_eq!(coins_needed(&final_amount), BigDecimal::from(101));
        assert!(!availability(&BigDecimal::from(100), &final_amount).is_enabled());
        assert!(availability(&BigDecimal::from(101), &final_amount).is_enabled());
    }

    #[test]
    fn disabled_reason_names_both_amounts() {
        let final_amount = BigDecimal::from_str("100.4").unwrap();
        assert_eq!(
            availability(&BigDecimal::from(100), &final_amount),
            Availability::Disabled {
                reason: String::from("Insufficient Zcoins: 101 needed, 100 available")
            }
        );
    }
}
