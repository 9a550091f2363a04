use async_trait::async_trait;
use bigdecimal::BigDecimal;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zfood_checkout::modules::{
    cache::QueryKey,
    checkout::{coordinator::CheckoutCoordinator, session::CheckoutStep, CheckoutError},
    order::repository::PlacedOrder,
    payment::{
        gateway::{
            GatewayCheckout, GatewayError, GatewayOutcome, GatewaySettings, PaymentGateway,
            PaymentIdentifiers,
        },
        PaymentMethod, PaymentOutcome,
    },
};
use zfood_checkout::types::Context;
use zfood_checkout::utils::api::{self, Executor, Request};

fn dec(raw: &str) -> BigDecimal {
    BigDecimal::from_str(raw).unwrap()
}

fn cart_json(price: &str, quantity: u32) -> Value {
    json!({
        "cart": {
            "_id": "cart-1",
            "restaurantId": "rest-1",
            "items": [{
                "_id": "line-1",
                "item": {
                    "_id": "dish-1",
                    "name": "Paneer Tikka",
                    "price": price,
                    "restaurantId": "rest-1",
                    "offers": { "offerName": "Bulk", "requiredQuantity": 2, "discountAmount": 10 }
                },
                "itemPrice": price,
                "quantity": quantity,
                "selectedCustomizations": [
                    { "fieldName": "Spice", "options": { "name": "Hot", "price": 0 } }
                ]
            }]
        }
    })
}

fn failure(status: StatusCode, message: &str) -> Result<Value, api::Error> {
    Err(api::Error::UnexpectedStatus {
        status,
        message: Some(message.to_string()),
    })
}

/// In-memory API keyed by "METHOD route".
struct FakeApi {
    routes: Mutex<HashMap<String, Result<Value, api::Error>>>,
    calls: Mutex<Vec<Request>>,
    hanging: Mutex<Option<String>>,
}

impl FakeApi {
    fn new() -> Self {
        let api = Self {
            routes: Mutex::new(HashMap::new()),
            calls: Mutex::new(vec![]),
            hanging: Mutex::new(None),
        };

        // 200 x 3 with a 10% bulk offer: item total 540, final 575.
        api.respond("GET cart", Ok(cart_json("200", 3)));
        api.respond(
            "GET profile",
            Ok(json!({
                "user": {
                    "name": "Asha",
                    "phoneNumber": "9999900000",
                    "address": "Near Cubbon Park",
                    "location": { "lat": 12.97, "lng": 77.59 }
                }
            })),
        );
        api.respond(
            "GET addresses",
            Ok(json!({
                "addresses": [
                    { "_id": "home", "label": "Home", "address": "12 MG Road", "phone": "8888800000" }
                ]
            })),
        );
        api.respond(
            "GET coupons",
            Ok(json!([
                { "code": "TENOFF", "type": "percentage", "discount": 10, "minPrice": 400 },
                { "code": "BIGSPEND", "type": "amount", "discount": 100, "minPrice": 1000 }
            ])),
        );
        api.respond("GET deliveryFee", Ok(json!({ "deliveryFee": 40 })));
        api.respond("GET zcoins/balance", Ok(json!({ "zcoins": { "balance": 1000 } })));
        api.respond(
            "POST orders",
            Ok(json!({ "order": { "orderId": 1042 }, "coinsEarned": 12 })),
        );
        api.respond(
            "POST payments/razorpay/orders",
            Ok(json!({
                "success": true,
                "order": { "id": "order_G1", "amount": 57500, "currency": "INR" }
            })),
        );
        api.respond(
            "POST payments/razorpay/verify",
            Ok(json!({ "success": true, "order": { "orderId": "ord-77" }, "coinsEarned": 5 })),
        );
        api
    }

    fn respond(&self, key: &str, response: Result<Value, api::Error>) {
        self.routes
            .lock()
            .unwrap()
            .insert(key.to_string(), response);
    }

    fn hang_on(&self, key: &str) {
        *self.hanging.lock().unwrap() = Some(key.to_string());
    }

    fn calls_to(&self, key: &str) -> Vec<Request> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|request| format!("{} {}", request.method, request.route) == key)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Executor for FakeApi {
    async fn execute(&self, request: Request) -> Result<Value, api::Error> {
        let key = format!("{} {}", request.method, request.route);
        self.calls.lock().unwrap().push(request);

        let hangs = self.hanging.lock().unwrap().as_deref() == Some(key.as_str());
        if hangs {
            std::future::pending::<()>().await;
        }

        let response = self.routes.lock().unwrap().get(&key).cloned();
        response.unwrap_or_else(|| failure(StatusCode::NOT_FOUND, "Not found"))
    }
}

/// Gateway that answers every modal with a fixed outcome.
struct ScriptedGateway {
    outcome: GatewayOutcome,
    fail_load: bool,
    loads: AtomicU32,
    opened: Mutex<Vec<GatewayCheckout>>,
}

impl ScriptedGateway {
    fn new(outcome: GatewayOutcome) -> Self {
        Self {
            outcome,
            fail_load: false,
            loads: AtomicU32::new(0),
            opened: Mutex::new(vec![]),
        }
    }

    fn paid() -> Self {
        Self::new(GatewayOutcome::Completed(PaymentIdentifiers {
            razorpay_order_id: String::from("order_G1"),
            razorpay_payment_id: String::from("pay_P1"),
            razorpay_signature: String::from("sig"),
        }))
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn load(&self, _script_url: &str) -> Result<(), GatewayError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        match self.fail_load {
            true => Err(GatewayError::LoadFailed(String::from("network error"))),
            false => Ok(()),
        }
    }

    async fn open(&self, checkout: GatewayCheckout) -> Result<GatewayOutcome, GatewayError> {
        self.opened.lock().unwrap().push(checkout);
        Ok(self.outcome.clone())
    }
}

struct Harness {
    api: Arc<FakeApi>,
    gateway: Arc<ScriptedGateway>,
    ctx: Arc<Context>,
    coordinator: CheckoutCoordinator,
}

impl Harness {
    fn new(api: FakeApi, gateway: ScriptedGateway) -> Self {
        let api = Arc::new(api);
        let gateway = Arc::new(gateway);
        let ctx = Arc::new(Context::new(
            api.clone(),
            GatewaySettings {
                key_id: String::from("rzp_test_key"),
                script_url: String::from("https://checkout.razorpay.com/v1/checkout.js"),
                merchant_name: String::from("Zfood"),
            },
        ));
        let coordinator = CheckoutCoordinator::new(ctx.clone(), gateway.clone());

        Self {
            api,
            gateway,
            ctx,
            coordinator,
        }
    }

    fn default_setup() -> Self {
        Self::new(FakeApi::new(), ScriptedGateway::paid())
    }

    async fn ready_to_pay(&mut self) {
        self.coordinator.enter(None).await.unwrap();
        self.coordinator.open_payment_dialog().unwrap();
    }

    async fn invalidations(&self) -> Vec<u64> {
        let mut counts = vec![];
        for key in QueryKey::ORDER_PLACED {
            counts.push(self.ctx.cache.invalidations(key).await);
        }
        counts
    }
}

#[tokio::test]
async fn cod_order_is_placed_and_queries_invalidated() {
    let mut harness = Harness::default_setup();
    harness.ready_to_pay().await;

    let outcome = harness.coordinator.submit(PaymentMethod::Cod).await.unwrap();
    let order = PlacedOrder {
        order_id: String::from("1042"),
        coins_earned: 12,
    };

    assert_eq!(outcome, PaymentOutcome::Placed(order.clone()));
    assert_eq!(harness.coordinator.step(), &CheckoutStep::Success(order));
    assert_eq!(harness.invalidations().await, vec![1, 1, 1, 1]);

    let placed = harness.api.calls_to("POST orders");
    assert_eq!(placed.len(), 1);
    let body = placed[0].body.clone().unwrap();
    assert_eq!(body["billDetails"]["paymentMethod"], "COD");
    assert_eq!(body["billDetails"]["finalAmount"], 575);
    assert_eq!(body["billDetails"]["offerSavings"], 60);
    assert_eq!(body["items"][0]["totalPrice"], 540);
    assert_eq!(body["items"][0]["customizations"][0]["fieldName"], "Spice");
    assert_eq!(body["user"]["address"], "Near Cubbon Park");
    assert_eq!(body["couponCode"], Value::Null);
}

#[tokio::test]
async fn order_placement_failure_shows_server_message() {
    let api = FakeApi::new();
    api.respond(
        "POST orders",
        failure(StatusCode::UNPROCESSABLE_ENTITY, "Restaurant is closed"),
    );
    let mut harness = Harness::new(api, ScriptedGateway::paid());
    harness.ready_to_pay().await;

    let err = harness.coordinator.submit(PaymentMethod::Cod).await.unwrap_err();
    assert_eq!(
        err,
        CheckoutError::OrderPlacementFailure(String::from("Restaurant is closed"))
    );
    assert_eq!(
        harness.coordinator.step(),
        &CheckoutStep::Failed(String::from("Restaurant is closed"))
    );
    assert_eq!(harness.invalidations().await, vec![0, 0, 0, 0]);
}

#[tokio::test]
async fn razorpay_payment_is_verified_before_the_order_exists() {
    let mut harness = Harness::default_setup();
    harness.ready_to_pay().await;

    let outcome = harness
        .coordinator
        .submit(PaymentMethod::Razorpay)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        PaymentOutcome::Placed(PlacedOrder {
            order_id: String::from("ord-77"),
            coins_earned: 5,
        })
    );

    assert!(harness.api.calls_to("POST orders").is_empty());

    let created = harness.api.calls_to("POST payments/razorpay/orders");
    assert_eq!(created[0].body, Some(json!({ "amount": 575 })));

    let verified = harness.api.calls_to("POST payments/razorpay/verify");
    let body = verified[0].body.clone().unwrap();
    assert_eq!(body["razorpay_order_id"], "order_G1");
    assert_eq!(body["razorpay_payment_id"], "pay_P1");
    assert_eq!(body["orderDetails"]["billDetails"]["paymentMethod"], "RAZORPAY");

    let opened = harness.gateway.opened.lock().unwrap().clone();
    assert_eq!(opened[0].key, "rzp_test_key");
    assert_eq!(opened[0].prefill.contact, "9999900000");
    assert_eq!(harness.invalidations().await, vec![1, 1, 1, 1]);
}

#[tokio::test]
async fn dismissed_gateway_creates_nothing() {
    let mut harness = Harness::new(FakeApi::new(), ScriptedGateway::new(GatewayOutcome::Dismissed));
    harness.ready_to_pay().await;

    let outcome = harness
        .coordinator
        .submit(PaymentMethod::Razorpay)
        .await
        .unwrap();

    assert_eq!(outcome, PaymentOutcome::Dismissed);
    assert_eq!(
        harness.coordinator.step(),
        &CheckoutStep::PaymentMethodSelection
    );
    assert!(harness.api.calls_to("POST orders").is_empty());
    assert!(harness.api.calls_to("POST payments/razorpay/verify").is_empty());
    assert_eq!(harness.invalidations().await, vec![0, 0, 0, 0]);
    assert!(harness.coordinator.session().cart().is_some());
}

#[tokio::test]
async fn gateway_script_loads_once() {
    let mut harness = Harness::new(FakeApi::new(), ScriptedGateway::new(GatewayOutcome::Dismissed));
    harness.ready_to_pay().await;

    harness.coordinator.submit(PaymentMethod::Razorpay).await.unwrap();
    harness.coordinator.submit(PaymentMethod::Razorpay).await.unwrap();

    assert_eq!(harness.gateway.loads.load(Ordering::SeqCst), 1);
    assert_eq!(harness.gateway.opened.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn failed_verification_is_reported() {
    let api = FakeApi::new();
    api.respond(
        "POST payments/razorpay/verify",
        Ok(json!({ "success": false, "message": "Signature mismatch" })),
    );
    let mut harness = Harness::new(api, ScriptedGateway::paid());
    harness.ready_to_pay().await;

    let err = harness
        .coordinator
        .submit(PaymentMethod::Razorpay)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        CheckoutError::GatewayVerificationFailure(String::from("Signature mismatch"))
    );
    assert_eq!(
        harness.coordinator.session().last_failure(),
        Some("Signature mismatch")
    );
    assert_eq!(harness.invalidations().await, vec![0, 0, 0, 0]);
}

#[tokio::test]
async fn gateway_reporting_another_order_is_not_verified() {
    let gateway = ScriptedGateway::new(GatewayOutcome::Completed(PaymentIdentifiers {
        razorpay_order_id: String::from("order_OTHER"),
        razorpay_payment_id: String::from("pay_P1"),
        razorpay_signature: String::from("sig"),
    }));
    let mut harness = Harness::new(FakeApi::new(), gateway);
    harness.ready_to_pay().await;

    let err = harness
        .coordinator
        .submit(PaymentMethod::Razorpay)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        CheckoutError::GatewayVerificationFailure(String::from("Payment verification failed"))
    );
    assert!(harness.api.calls_to("POST payments/razorpay/verify").is_empty());
    assert!(harness.api.calls_to("POST orders").is_empty());
    assert_eq!(harness.invalidations().await, vec![0, 0, 0, 0]);
}

#[tokio::test]
async fn script_failure_stops_before_a_gateway_order() {
    let mut gateway = ScriptedGateway::paid();
    gateway.fail_load = true;
    let mut harness = Harness::new(FakeApi::new(), gateway);
    harness.ready_to_pay().await;

    let err = harness
        .coordinator
        .submit(PaymentMethod::Razorpay)
        .await
        .unwrap_err();

    assert_eq!(err, CheckoutError::GatewayLoadFailure);
    assert!(harness.api.calls_to("POST payments/razorpay/orders").is_empty());
    assert!(harness.gateway.opened.lock().unwrap().is_empty());
}

#[tokio::test]
async fn zcoins_need_the_rounded_up_amount() {
    let api = FakeApi::new();
    // 80 + 4 tax + 8.4 delivery + 8 platform = 100.4
    api.respond("GET cart", Ok(cart_json("80", 1)));
    api.respond("GET deliveryFee", Ok(json!({ "deliveryFee": 8.4 })));
    api.respond("GET zcoins/balance", Ok(json!({ "zcoins": { "balance": 100 } })));
    let mut harness = Harness::new(api, ScriptedGateway::paid());
    harness.ready_to_pay().await;

    assert_eq!(harness.coordinator.breakdown().final_amount, dec("100.4"));
    let options = harness.coordinator.payment_options();
    assert!(!options[2].1.is_enabled());

    let err = harness
        .coordinator
        .submit(PaymentMethod::Zcoins)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        CheckoutError::InsufficientCoins {
            needed: BigDecimal::from(101),
            balance: BigDecimal::from(100),
        }
    );
    assert_eq!(
        harness.coordinator.step(),
        &CheckoutStep::PaymentMethodSelection
    );
    assert!(harness.api.calls_to("POST orders").is_empty());
}

#[tokio::test]
async fn zcoins_balance_is_checked_again_on_submit() {
    let mut harness = Harness::default_setup();
    harness.ready_to_pay().await;
    harness
        .api
        .respond("GET zcoins/balance", Ok(json!({ "zcoins": { "balance": 100 } })));

    let err = harness
        .coordinator
        .submit(PaymentMethod::Zcoins)
        .await
        .unwrap_err();

    assert_eq!(
        err,
        CheckoutError::InsufficientCoins {
            needed: BigDecimal::from(575),
            balance: BigDecimal::from(100),
        }
    );
    assert!(harness.api.calls_to("POST orders").is_empty());
}

#[tokio::test]
async fn zcoins_order_goes_through_order_placement() {
    let mut harness = Harness::default_setup();
    harness.ready_to_pay().await;

    harness.coordinator.submit(PaymentMethod::Zcoins).await.unwrap();

    let placed = harness.api.calls_to("POST orders");
    assert_eq!(
        placed[0].body.as_ref().unwrap()["billDetails"]["paymentMethod"],
        "ZCOINS"
    );
}

#[tokio::test]
async fn missing_phone_blocks_submission() {
    let api = FakeApi::new();
    api.respond(
        "GET profile",
        Ok(json!({ "user": { "name": "Asha", "phoneNumber": "", "address": "Near Cubbon Park" } })),
    );
    let mut harness = Harness::new(api, ScriptedGateway::paid());
    harness.ready_to_pay().await;

    let err = harness.coordinator.submit(PaymentMethod::Cod).await.unwrap_err();
    assert_eq!(err, CheckoutError::MissingContact);
    assert_eq!(
        harness.coordinator.step(),
        &CheckoutStep::PaymentMethodSelection
    );
    assert!(harness.api.calls_to("POST orders").is_empty());

    harness.coordinator.enter_phone_number("9999900000").unwrap();
    harness.coordinator.submit(PaymentMethod::Cod).await.unwrap();
}

#[tokio::test]
async fn missing_address_blocks_submission() {
    let api = FakeApi::new();
    api.respond(
        "GET profile",
        Ok(json!({ "user": { "name": "Asha", "phoneNumber": "9999900000", "address": "" } })),
    );
    api.respond("GET addresses", Ok(json!({ "addresses": [] })));
    let mut harness = Harness::new(api, ScriptedGateway::paid());
    harness.ready_to_pay().await;

    let err = harness.coordinator.submit(PaymentMethod::Cod).await.unwrap_err();
    assert_eq!(err, CheckoutError::MissingContact);
    assert_eq!(
        harness.coordinator.step(),
        &CheckoutStep::PaymentMethodSelection
    );
    assert!(harness.api.calls_to("POST orders").is_empty());
}

#[tokio::test]
async fn delivery_fee_falls_back_when_quote_fails() {
    let api = FakeApi::new();
    api.respond("GET cart", Ok(cart_json("200", 1)));
    api.respond(
        "GET deliveryFee",
        failure(StatusCode::INTERNAL_SERVER_ERROR, "Maps unavailable"),
    );
    let mut harness = Harness::new(api, ScriptedGateway::paid());
    harness.coordinator.enter(None).await.unwrap();

    let breakdown = harness.coordinator.breakdown();
    assert_eq!(breakdown.delivery_fee, BigDecimal::from(10));
    // 200 + 10 tax + 10 delivery + 8 platform
    assert_eq!(breakdown.final_amount, dec("228"));
}

#[tokio::test]
async fn delivery_fee_uses_profile_location() {
    let mut harness = Harness::default_setup();
    harness.coordinator.enter(None).await.unwrap();

    let quoted = harness.api.calls_to("GET deliveryFee");
    assert_eq!(quoted.len(), 1);
    assert!(quoted[0]
        .query
        .contains(&(String::from("restaurantId"), String::from("rest-1"))));
    assert!(quoted[0]
        .query
        .contains(&(String::from("lat"), String::from("12.97"))));
}

#[tokio::test]
async fn page_data_is_loaded_once() {
    let mut harness = Harness::default_setup();
    harness.coordinator.enter(None).await.unwrap();
    harness.coordinator.enter(None).await.unwrap();

    assert_eq!(harness.api.calls_to("GET cart").len(), 1);
    assert_eq!(harness.api.calls_to("GET addresses").len(), 1);
    assert_eq!(harness.api.calls_to("GET coupons").len(), 1);
}

#[tokio::test]
async fn every_visit_reads_the_cart_from_the_server() {
    let mut harness = Harness::default_setup();
    harness.coordinator.enter(None).await.unwrap();

    harness.api.respond("GET cart", Ok(cart_json("200", 5)));
    let mut next_visit = CheckoutCoordinator::new(harness.ctx.clone(), harness.gateway.clone());
    next_visit.enter(None).await.unwrap();

    assert_eq!(harness.api.calls_to("GET cart").len(), 2);
    assert_eq!(next_visit.session().cart().unwrap().total_items(), 5);

    next_visit.open_payment_dialog().unwrap();
    next_visit.submit(PaymentMethod::Cod).await.unwrap();

    let placed = harness.api.calls_to("POST orders");
    let body = placed[0].body.clone().unwrap();
    assert_eq!(body["items"][0]["quantity"], 5);
    // 200 x 5 less 10% = 900
    assert_eq!(body["items"][0]["totalPrice"], 900);
}

#[tokio::test]
async fn coupon_round_trip_restores_breakdown() {
    let mut harness = Harness::default_setup();
    harness.coordinator.enter(None).await.unwrap();
    let before = harness.coordinator.breakdown();

    harness.coordinator.apply_coupon("tenoff").unwrap();
    assert_eq!(harness.coordinator.breakdown().coupon_discount, dec("54"));

    assert_eq!(
        harness.coordinator.apply_coupon("BIGSPEND").unwrap_err(),
        CheckoutError::CouponAlreadyApplied
    );

    harness.coordinator.remove_coupon().unwrap();
    assert_eq!(harness.coordinator.breakdown(), before);

    assert_eq!(
        harness.coordinator.apply_coupon("BIGSPEND").unwrap_err(),
        CheckoutError::BelowMinimum {
            shortfall: BigDecimal::from(460)
        }
    );
    assert_eq!(
        harness.coordinator.session().coupon_error(),
        "Add items worth ₹460.00 more to use this coupon"
    );
}

#[tokio::test]
async fn quantity_change_is_reconciled_with_the_server() {
    let api = FakeApi::new();
    api.respond("PATCH cart/items/line-1", Ok(cart_json("200", 4)));
    let mut harness = Harness::new(api, ScriptedGateway::paid());
    harness.coordinator.enter(None).await.unwrap();

    harness.coordinator.set_quantity("line-1", 4).await.unwrap();

    let cart = harness.coordinator.session().cart().unwrap();
    assert_eq!(cart.total_items(), 4);
    assert_eq!(harness.ctx.cache.invalidations(QueryKey::Cart).await, 1);
    assert_eq!(harness.ctx.cache.invalidations(QueryKey::TotalPrice).await, 1);
    assert_eq!(harness.ctx.cache.invalidations(QueryKey::Zcoins).await, 0);
    assert_eq!(
        harness.api.calls_to("PATCH cart/items/line-1")[0].body,
        Some(json!({ "quantity": 4 }))
    );
}

#[tokio::test]
async fn failed_quantity_change_is_rolled_back() {
    let api = FakeApi::new();
    api.respond(
        "PATCH cart/items/line-1",
        failure(StatusCode::CONFLICT, "Item sold out"),
    );
    let mut harness = Harness::new(api, ScriptedGateway::paid());
    harness.coordinator.enter(None).await.unwrap();

    let err = harness
        .coordinator
        .set_quantity("line-1", 5)
        .await
        .unwrap_err();

    assert_eq!(err, CheckoutError::CartUnavailable(String::from("Item sold out")));
    assert_eq!(harness.coordinator.session().cart().unwrap().total_items(), 3);
    assert_eq!(harness.ctx.cache.invalidations(QueryKey::Cart).await, 0);
}

#[tokio::test]
async fn left_session_refuses_work() {
    let mut harness = Harness::default_setup();
    harness.coordinator.leave();

    assert_eq!(
        harness.coordinator.enter(None).await,
        Err(CheckoutError::Cancelled)
    );
    assert!(harness.api.calls_to("GET cart").is_empty());
}

#[tokio::test]
async fn leaving_mid_submission_drops_the_result() {
    let mut harness = Harness::default_setup();
    harness.ready_to_pay().await;
    harness.api.hang_on("POST orders");

    let handle = harness.coordinator.cancellation_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();
    });

    let err = harness.coordinator.submit(PaymentMethod::Cod).await.unwrap_err();
    assert_eq!(err, CheckoutError::Cancelled);
    assert!(!matches!(
        harness.coordinator.step(),
        CheckoutStep::Success(_)
    ));
    assert_eq!(harness.invalidations().await, vec![0, 0, 0, 0]);
}
