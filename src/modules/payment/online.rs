use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use super::gateway::{GatewayCheckout, GatewayOrder, GatewayOutcome, PaymentIdentifiers, Prefill};
use super::{Error, PaymentContext, PaymentOutcome};
use crate::modules::order::repository::{OrderPayload, OrderRef, PlacedOrder};
use crate::utils::{
    api::{self, Executor, Request},
    money::serialize_amount,
};

pub const VERIFICATION_FAILED: &str = "Payment verification failed";

#[derive(Deserialize)]
struct CreateOrderResponse {
    #[serde(default)]
    success: bool,
    order: Option<GatewayOrder>,
}

#[derive(Serialize)]
struct CreateOrderRequest<'a> {
    #[serde(serialize_with = "serialize_amount")]
    amount: &'a BigDecimal,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyPaymentRequest<'a> {
    #[serde(flatten)]
    identifiers: &'a PaymentIdentifiers,
    order_details: &'a OrderPayload,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyPaymentResponse {
    #[serde(default)]
    success: bool,
    order: Option<OrderRef>,
    #[serde(default)]
    coins_earned: u64,
    message: Option<String>,
}

/// Creates the order on the gateway's side for `amount`. No app order exists yet.
pub async fn create_gateway_order(
    e: &dyn Executor,
    amount: &BigDecimal,
) -> Result<Option<GatewayOrder>, api::Error> {
    let body = serde_json::to_value(CreateOrderRequest { amount }).map_err(|err| {
        tracing::error!("Failed to encode gateway order request: {}", err);
        api::Error::RequestNotSent
    })?;

    api::send::<CreateOrderResponse>(e, Request::post("payments/razorpay/orders", body))
        .await
        .map(|res| match res.success {
            true => res.order,
            false => None,
        })
}

/// Hands the gateway's identifiers to the server, which verifies the signature
/// and only then creates the app order.
pub async fn verify_payment(
    e: &dyn Executor,
    identifiers: &PaymentIdentifiers,
    payload: &OrderPayload,
) -> Result<PlacedOrder, Error> {
    let body = serde_json::to_value(VerifyPaymentRequest {
        identifiers,
        order_details: payload,
    })
    .map_err(|err| {
        tracing::error!("Failed to encode verification request: {}", err);
        Error::GatewayVerificationFailure(String::from(VERIFICATION_FAILED))
    })?;

    let res = api::send::<VerifyPaymentResponse>(e, Request::post("payments/razorpay/verify", body))
        .await
        .map_err(|err| {
            tracing::error!(
                "Failed to verify payment {}: {}",
                identifiers.razorpay_payment_id,
                err
            );
            Error::GatewayVerificationFailure(
                err.server_message()
                    .unwrap_or(VERIFICATION_FAILED)
                    .to_string(),
            )
        })?;

    match (res.success, res.order) {
        (true, Some(order)) => Ok(PlacedOrder {
            order_id: order.order_id,
            coins_earned: res.coins_earned,
        }),
        _ => {
            tracing::error!(
                "Server rejected payment {}",
                identifiers.razorpay_payment_id
            );
            Err(Error::GatewayVerificationFailure(
                res.message
                    .unwrap_or_else(|| String::from(VERIFICATION_FAILED)),
            ))
        }
    }
}

pub async fn submit(ctx: &PaymentContext<'_>, payload: &OrderPayload) -> Result<PaymentOutcome, Error> {
    ctx.script
        .ensure_loaded(ctx.gateway, &ctx.settings.script_url)
        .await
        .map_err(|err| {
            tracing::error!("{}", err);
            Error::GatewayLoadFailure
        })?;

    let gateway_order = create_gateway_order(ctx.executor, &payload.bill_details.final_amount)
        .await
        .map_err(|err| {
            tracing::error!("Failed to create gateway order: {}", err);
            Error::GatewayLoadFailure
        })?
        .ok_or_else(|| {
            tracing::error!("Gateway order creation was not successful");
            Error::GatewayLoadFailure
        })?;

    let outcome = ctx
        .gateway
        .open(GatewayCheckout {
            key: ctx.settings.key_id.clone(),
            name: ctx.settings.merchant_name.clone(),
            order: gateway_order.clone(),
            prefill: Prefill {
                name: payload.user.name.clone(),
                contact: payload.user.phone_number.clone(),
            },
        })
        .await
        .map_err(|err| {
            tracing::error!("{}", err);
            Error::GatewayLoadFailure
        })?;

    match outcome {
        GatewayOutcome::Dismissed => {
            tracing::info!("Gateway order {} dismissed by user", gateway_order.id);
            Ok(PaymentOutcome::Dismissed)
        }
        GatewayOutcome::Completed(identifiers) => {
            if identifiers.razorpay_order_id != gateway_order.id {
                tracing::error!(
                    "Gateway reported order {} while {} was opened",
                    identifiers.razorpay_order_id,
                    gateway_order.id
                );
                return Err(Error::GatewayVerificationFailure(String::from(
                    VERIFICATION_FAILED,
                )));
            }

            verify_payment(ctx.executor, &identifiers, payload)
                .await
                .map(PaymentOutcome::Placed)
        }
    }
}
