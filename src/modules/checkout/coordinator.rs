use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::session::{CheckoutSession, CheckoutSnapshot, CheckoutStep, PageData, SessionEvent};
use super::CheckoutError;
use crate::modules::{
    address::{
        self,
        repository::{Location, Profile},
    },
    cache::QueryKey,
    cart, coupon, delivery,
    order::repository::OrderPayload,
    payment::{
        gateway::PaymentGateway, zcoins, Availability, PaymentContext, PaymentMethod,
        PaymentOutcome,
    },
    pricing::{PriceBreakdown, PricingRules},
};
use crate::types::Context;

/// Resolves `future` unless `token` is cancelled first.
async fn until_cancelled<T>(
    token: &CancellationToken,
    future: impl Future<Output = T>,
) -> Result<T, CheckoutError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(CheckoutError::Cancelled),
        value = future => Ok(value),
    }
}

/// Drives one checkout session against the API and the payment gateway.
pub struct CheckoutCoordinator {
    ctx: Arc<Context>,
    gateway: Arc<dyn PaymentGateway>,
    session: CheckoutSession,
    cancel: CancellationToken,
}

impl CheckoutCoordinator {
    pub fn new(ctx: Arc<Context>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self::with_rules(ctx, gateway, PricingRules::default())
    }

    pub fn with_rules(
        ctx: Arc<Context>,
        gateway: Arc<dyn PaymentGateway>,
        rules: PricingRules,
    ) -> Self {
        Self {
            ctx,
            gateway,
            session: CheckoutSession::new(rules),
            cancel: CancellationToken::new(),
        }
    }

    pub fn session(&self) -> &CheckoutSession {
        &self.session
    }

    pub fn step(&self) -> &CheckoutStep {
        self.session.step()
    }

    /// Handle that ends the session from elsewhere, e.g. when the page goes away.
    pub fn cancellation_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Ends the session. Requests still in flight are dropped without touching it.
    pub fn leave(&self) {
        tracing::debug!("Leaving checkout {}", self.session.id());
        self.cancel.cancel();
    }

    fn ensure_active(&self) -> Result<(), CheckoutError> {
        match self.cancel.is_cancelled() {
            true => Err(CheckoutError::Cancelled),
            false => Ok(()),
        }
    }

    /// Loads everything the page shows. Runs once per session, later calls
    /// return immediately. Without `location` the delivery fee is quoted for
    /// the last position on the profile.
    pub async fn enter(&mut self, location: Option<Location>) -> Result<(), CheckoutError> {
        self.ensure_active()?;
        if self.session.is_loaded() {
            return Ok(());
        }

        let ctx = self.ctx.clone();
        let token = self.cancel.clone();
        let e = ctx.executor.as_ref();

        let (cart, profile) = until_cancelled(&token, async {
            tokio::join!(
                cart::service::find_active(e, &ctx.cache),
                address::repository::find_profile(e),
            )
        })
        .await?;
        let cart = cart?;
        let profile = profile.unwrap_or_else(|err| {
            tracing::error!("Failed to fetch profile: {}", err);
            Profile::default()
        });

        let restaurant_id = cart
            .as_ref()
            .map(|cart| cart.restaurant_id.clone())
            .unwrap_or_default();
        let location = location.or(profile.location);

        let fetch_coins = ctx
            .cache
            .get_or_fetch(QueryKey::Zcoins, || zcoins::find_balance(e));

        let (addresses, coupons, delivery_fee_quote, coin_balance) = until_cancelled(&token, async {
            tokio::join!(
                address::repository::find_all(e),
                coupon::repository::find_available(e),
                delivery::service::resolve_fee(e, location, &restaurant_id),
                fetch_coins,
            )
        })
        .await?;

        let data = PageData {
            cart,
            addresses: addresses.unwrap_or_else(|err| {
                tracing::error!("Failed to fetch saved addresses: {}", err);
                vec![]
            }),
            profile,
            coupons: coupons.unwrap_or_else(|err| {
                tracing::error!("Failed to fetch coupons: {}", err);
                vec![]
            }),
            delivery_fee_quote,
            coin_balance: coin_balance
                .map_err(|err| tracing::error!("Failed to fetch Zcoins balance: {}", err))
                .ok(),
        };

        self.session.dispatch(SessionEvent::Loaded(data))
    }

    pub fn breakdown(&self) -> PriceBreakdown {
        self.session.breakdown()
    }

    pub fn payment_options(&self) -> Vec<(PaymentMethod, Availability)> {
        self.session.payment_options()
    }

    pub fn open_address_panel(&mut self) -> Result<(), CheckoutError> {
        self.session.dispatch(SessionEvent::OpenAddressPanel)
    }

    pub fn close_address_panel(&mut self) -> Result<(), CheckoutError> {
        self.session.dispatch(SessionEvent::CloseAddressPanel)
    }

    pub fn use_current_location(&mut self) -> Result<(), CheckoutError> {
        self.session.dispatch(SessionEvent::UseCurrentLocation)
    }

    pub fn select_saved_address(&mut self, address_id: &str) -> Result<(), CheckoutError> {
        self.session
            .dispatch(SessionEvent::SelectSavedAddress(address_id.to_string()))
    }

    pub fn enter_phone_number(&mut self, phone_number: &str) -> Result<(), CheckoutError> {
        self.session
            .dispatch(SessionEvent::EnterPhoneNumber(phone_number.to_string()))
    }

    pub fn apply_coupon(&mut self, code: &str) -> Result<(), CheckoutError> {
        self.session.dispatch(SessionEvent::ApplyCoupon {
            code: code.to_string(),
            now: Utc::now(),
        })
    }

    pub fn remove_coupon(&mut self) -> Result<(), CheckoutError> {
        self.session.dispatch(SessionEvent::RemoveCoupon)
    }

    /// Changes a line right away, then reconciles with the server. The line is
    /// put back the way it was when the server refuses the change.
    pub async fn set_quantity(&mut self, line_id: &str, quantity: u32) -> Result<(), CheckoutError> {
        self.ensure_active()?;

        let previous = self.session.cart().cloned();
        self.session.dispatch(SessionEvent::SetQuantity {
            line_id: line_id.to_string(),
            quantity,
        })?;

        let ctx = self.ctx.clone();
        let token = self.cancel.clone();
        let updated = until_cancelled(
            &token,
            cart::service::update_quantity(ctx.executor.as_ref(), &ctx.cache, line_id, quantity),
        )
        .await?;

        match updated {
            Ok(Some(cart)) => self.session.dispatch(SessionEvent::ReplaceCart(Some(cart))),
            Ok(None) => Ok(()),
            Err(err) => {
                tracing::warn!(
                    "Rolling back quantity of line {} in checkout {}",
                    line_id,
                    self.session.id()
                );
                self.session.dispatch(SessionEvent::ReplaceCart(previous))?;
                Err(err.into())
            }
        }
    }

    /// Freezes what is about to be paid for and returns it for display.
    pub fn open_payment_dialog(&mut self) -> Result<CheckoutSnapshot, CheckoutError> {
        self.session.dispatch(SessionEvent::OpenPaymentDialog)?;
        self.session
            .snapshot()
            .cloned()
            .ok_or(CheckoutError::EmptyCart)
    }

    pub fn close_payment_dialog(&mut self) -> Result<(), CheckoutError> {
        self.session.dispatch(SessionEvent::ClosePaymentDialog)
    }

    pub fn build_order_payload(&self, method: PaymentMethod) -> Result<OrderPayload, CheckoutError> {
        self.session.build_order_payload(method)
    }

    /// Pays with `method`. A dismissed gateway is not an error: the session goes
    /// back to method selection and nothing is invalidated.
    pub async fn submit(&mut self, method: PaymentMethod) -> Result<PaymentOutcome, CheckoutError> {
        self.ensure_active()?;

        if method == PaymentMethod::Zcoins {
            self.session.check_coins()?;
        }

        self.session.dispatch(SessionEvent::SubmissionStarted)?;
        let payload = self.session.build_order_payload(method)?;

        let ctx = self.ctx.clone();
        let gateway = self.gateway.clone();
        let token = self.cancel.clone();
        let payment_ctx = PaymentContext {
            executor: ctx.executor.as_ref(),
            gateway: gateway.as_ref(),
            script: ctx.script.as_ref(),
            settings: &ctx.gateway,
        };

        let outcome = until_cancelled(&token, method.submit(&payment_ctx, &payload)).await?;

        match outcome {
            Ok(PaymentOutcome::Placed(order)) => {
                tracing::info!(
                    "Order {} placed with {} from checkout {}",
                    order.order_id,
                    method,
                    self.session.id()
                );
                self.session
                    .dispatch(SessionEvent::SubmissionSucceeded(order.clone()))?;
                ctx.cache.invalidate(&QueryKey::ORDER_PLACED).await;
                Ok(PaymentOutcome::Placed(order))
            }
            Ok(PaymentOutcome::Dismissed) => {
                self.session.dispatch(SessionEvent::SubmissionDismissed)?;
                Ok(PaymentOutcome::Dismissed)
            }
            Err(err) => {
                let err = CheckoutError::from(err);
                tracing::error!(
                    "Checkout {} failed with {}: {}",
                    self.session.id(),
                    method,
                    err
                );
                self.session
                    .dispatch(SessionEvent::SubmissionFailed(err.to_string()))?;
                Err(err)
            }
        }
    }
}
