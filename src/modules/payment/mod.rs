pub mod cod;
pub mod gateway;
pub mod online;
pub mod zcoins;

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::modules::order::repository::{OrderPayload, PlacedOrder};
use crate::utils::{api::Executor, money::format_amount};
use gateway::{GatewayScript, GatewaySettings, PaymentGateway};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("You need {} Zcoins but only have {}", .needed, .balance)]
    InsufficientCoins {
        needed: BigDecimal,
        balance: BigDecimal,
    },
    #[error("Could not start the payment gateway, please try again")]
    GatewayLoadFailure,
    #[error("{0}")]
    GatewayVerificationFailure(String),
    #[error("{0}")]
    OrderPlacementFailure(String),
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PaymentMethod {
    #[serde(rename = "COD")]
    Cod,
    #[serde(rename = "RAZORPAY")]
    Razorpay,
    #[serde(rename = "ZCOINS")]
    Zcoins,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Cod => write!(f, "COD"),
            PaymentMethod::Razorpay => write!(f, "RAZORPAY"),
            PaymentMethod::Zcoins => write!(f, "ZCOINS"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Availability {
    Enabled,
    Disabled { reason: String },
}

impl Availability {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Availability::Enabled)
    }
}

/// What a payment attempt ended with when nothing went wrong.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentOutcome {
    Placed(PlacedOrder),
    /// The user closed the gateway before paying. No order exists.
    Dismissed,
}

/// Collaborators a payment method needs to submit an order.
pub struct PaymentContext<'a> {
    pub executor: &'a dyn Executor,
    pub gateway: &'a dyn PaymentGateway,
    pub script: &'a GatewayScript,
    pub settings: &'a GatewaySettings,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [
        PaymentMethod::Cod,
        PaymentMethod::Razorpay,
        PaymentMethod::Zcoins,
    ];

    pub fn availability(&self, coin_balance: Option<&BigDecimal>, final_amount: &BigDecimal) -> Availability {
        match self {
            PaymentMethod::Cod | PaymentMethod::Razorpay => Availability::Enabled,
            PaymentMethod::Zcoins => match coin_balance {
                Some(balance) => zcoins::availability(balance, final_amount),
                None => Availability::Disabled {
                    reason: String::from("Zcoins balance unavailable"),
                },
            },
        }
    }

    pub async fn submit(
        &self,
        ctx: &PaymentContext<'_>,
        payload: &OrderPayload,
    ) -> Result<PaymentOutcome, Error> {
        tracing::debug!(
            "Submitting order for cart {} with {} ({})",
            payload.cart_id,
            self,
            format_amount(&payload.bill_details.final_amount)
        );

        match self {
            PaymentMethod::Cod => cod::submit(ctx.executor, payload)
                .await
                .map(PaymentOutcome::Placed),
            PaymentMethod::Zcoins => zcoins::submit(ctx.executor, payload)
                .await
                .map(PaymentOutcome::Placed),
            PaymentMethod::Razorpay => online::submit(ctx, payload).await,
        }
    }
}
