//! Hosted checkout modal of the online payment gateway.
//!
//! The gateway reports its result through callbacks fired from outside our
//! control flow. [`CallbackGateway`] turns those callbacks into a future so the
//! checkout can simply await the outcome.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_aux::field_attributes::deserialize_string_from_number;
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, OnceCell};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    #[error("Failed to load payment gateway: {0}")]
    LoadFailed(String),
    #[error("Failed to open payment gateway: {0}")]
    OpenFailed(String),
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub key_id: String,
    pub script_url: String,
    pub merchant_name: String,
}

/// Order created on the gateway's side. Not an app order.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GatewayOrder {
    #[serde(deserialize_with = "deserialize_string_from_number")]
    pub id: String,
    /// Smallest currency unit, as reported by the gateway.
    pub amount: u64,
    pub currency: String,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Prefill {
    pub name: String,
    pub contact: String,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct GatewayCheckout {
    pub key: String,
    pub name: String,
    pub order: GatewayOrder,
    pub prefill: Prefill,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PaymentIdentifiers {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayOutcome {
    Completed(PaymentIdentifiers),
    Dismissed,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Loads the checkout script. May be called more than once.
    async fn load(&self, script_url: &str) -> Result<(), GatewayError>;

    /// Opens the modal and resolves once the user pays or closes it.
    async fn open(&self, checkout: GatewayCheckout) -> Result<GatewayOutcome, GatewayError>;
}

/// Remembers a successful script load for the lifetime of the process.
#[derive(Default)]
pub struct GatewayScript {
    loaded: OnceCell<()>,
}

impl GatewayScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.initialized()
    }

    pub async fn ensure_loaded(
        &self,
        gateway: &dyn PaymentGateway,
        script_url: &str,
    ) -> Result<(), GatewayError> {
        self.loaded
            .get_or_try_init(|| async {
                tracing::debug!("Loading payment gateway script from {}", script_url);
                gateway.load(script_url).await
            })
            .await
            .map(|_| ())
    }
}

/// Handles given to the host's modal. Either fires at most once.
///
/// The handles own the gateway order they were created for, so they stay valid
/// after whoever opened the modal has moved on.
#[derive(Clone)]
pub struct GatewayCallbacks {
    gateway_order_id: String,
    sender: Arc<Mutex<Option<oneshot::Sender<GatewayOutcome>>>>,
}

impl GatewayCallbacks {
    fn resolve(&self, outcome: GatewayOutcome) {
        let sender = match self.sender.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };

        match sender {
            Some(sender) => {
                if sender.send(outcome).is_err() {
                    tracing::warn!(
                        "Gateway outcome for {} arrived after checkout stopped waiting",
                        self.gateway_order_id
                    );
                }
            }
            None => tracing::warn!(
                "Ignoring repeated gateway callback for {}",
                self.gateway_order_id
            ),
        }
    }

    pub fn on_success(&self, identifiers: PaymentIdentifiers) {
        self.resolve(GatewayOutcome::Completed(identifiers));
    }

    pub fn on_dismiss(&self) {
        self.resolve(GatewayOutcome::Dismissed);
    }
}

pub type ScriptLoader = Arc<dyn Fn(String) -> BoxFuture<'static, Result<(), String>> + Send + Sync>;
pub type ModalLauncher = Arc<dyn Fn(GatewayCheckout, GatewayCallbacks) -> Result<(), String> + Send + Sync>;

/// Gateway backed by a host that injects the script and renders the modal.
pub struct CallbackGateway {
    loader: ScriptLoader,
    launcher: ModalLauncher,
}

impl CallbackGateway {
    pub fn new(loader: ScriptLoader, launcher: ModalLauncher) -> Self {
        Self { loader, launcher }
    }
}

#[async_trait]
impl PaymentGateway for CallbackGateway {
    async fn load(&self, script_url: &str) -> Result<(), GatewayError> {
        (self.loader)(script_url.to_string())
            .await
            .map_err(GatewayError::LoadFailed)
    }

    async fn open(&self, checkout: GatewayCheckout) -> Result<GatewayOutcome, GatewayError> {
        let (sender, receiver) = oneshot::channel();
        let callbacks = GatewayCallbacks {
            gateway_order_id: checkout.order.id.clone(),
            sender: Arc::new(Mutex::new(Some(sender))),
        };

        (self.launcher)(checkout, callbacks).map_err(GatewayError::OpenFailed)?;

        // A host that drops every handle without calling back closed the modal.
        Ok(receiver.await.unwrap_or(GatewayOutcome::Dismissed))
    }
}
