//! Checkout state for one visit to the cart page.
//!
//! All changes go through [`CheckoutSession::dispatch`]. Handlers check the
//! current step first and leave the session untouched when they fail.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use ulid::Ulid;
use validator::Validate;

use super::CheckoutError;
use crate::modules::{
    address::{
        repository::{Address, Profile},
        service::AddressBook,
    },
    cart::{self, repository::Cart},
    coupon::{
        repository::{AppliedCoupon, Coupon},
        service as coupon_service,
    },
    order::repository::{BillDetails, OrderItem, OrderPayload, OrderUser, PlacedOrder},
    payment::{zcoins, Availability, PaymentMethod},
    pricing::{self, PriceBreakdown, PricingRules},
};
use crate::utils::{
    money::round2,
    validation::{self, validate_not_blank},
};

#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutStep {
    Idle,
    AddressSelection,
    ReviewOrder,
    PaymentMethodSelection,
    Submitting,
    Success(PlacedOrder),
    /// Last attempt failed. Behaves like `PaymentMethodSelection`.
    Failed(String),
}

impl CheckoutStep {
    pub fn name(&self) -> &'static str {
        match self {
            CheckoutStep::Idle => "idle",
            CheckoutStep::AddressSelection => "selecting an address",
            CheckoutStep::ReviewOrder => "reviewing the order",
            CheckoutStep::PaymentMethodSelection => "choosing a payment method",
            CheckoutStep::Submitting => "submitting",
            CheckoutStep::Success(_) => "done",
            CheckoutStep::Failed(_) => "recovering from a failed payment",
        }
    }

    /// Steps in which the cart, coupon and address can still change.
    pub fn is_editable(&self) -> bool {
        matches!(
            self,
            CheckoutStep::Idle | CheckoutStep::AddressSelection | CheckoutStep::ReviewOrder
        )
    }

    fn can_submit(&self) -> bool {
        matches!(
            self,
            CheckoutStep::PaymentMethodSelection | CheckoutStep::Failed(_)
        )
    }
}

/// Everything fetched when the page is entered.
#[derive(Debug, Clone, Default)]
pub struct PageData {
    pub cart: Option<Cart>,
    pub addresses: Vec<Address>,
    pub profile: Profile,
    pub coupons: Vec<Coupon>,
    pub delivery_fee_quote: BigDecimal,
    pub coin_balance: Option<BigDecimal>,
}

/// What the payment dialog shows. Taken once when the dialog opens and used
/// for the order payload, so pricing is never derived twice.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSnapshot {
    pub cart: Cart,
    pub applied_coupon: Option<AppliedCoupon>,
    pub breakdown: PriceBreakdown,
    pub delivery_address: String,
}

#[derive(Debug, Validate)]
pub struct ContactDetails {
    #[validate(custom(function = "validate_not_blank"))]
    pub phone_number: String,
    #[validate(custom(function = "validate_not_blank"))]
    pub delivery_address: String,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Loaded(PageData),
    OpenAddressPanel,
    CloseAddressPanel,
    UseCurrentLocation,
    SelectSavedAddress(String),
    EnterPhoneNumber(String),
    ApplyCoupon { code: String, now: DateTime<Utc> },
    RemoveCoupon,
    /// Local half of a quantity change.
    SetQuantity { line_id: String, quantity: u32 },
    /// Replaces the cart with the server's copy, or restores it after a failed change.
    ReplaceCart(Option<Cart>),
    OpenPaymentDialog,
    ClosePaymentDialog,
    SubmissionStarted,
    SubmissionDismissed,
    SubmissionSucceeded(PlacedOrder),
    SubmissionFailed(String),
}

impl SessionEvent {
    fn name(&self) -> &'static str {
        match self {
            SessionEvent::Loaded(_) => "load the page",
            SessionEvent::OpenAddressPanel => "change the address",
            SessionEvent::CloseAddressPanel => "close the address panel",
            SessionEvent::UseCurrentLocation => "use the current location",
            SessionEvent::SelectSavedAddress(_) => "select a saved address",
            SessionEvent::EnterPhoneNumber(_) => "change the phone number",
            SessionEvent::ApplyCoupon { .. } => "apply a coupon",
            SessionEvent::RemoveCoupon => "remove the coupon",
            SessionEvent::SetQuantity { .. } => "change a quantity",
            SessionEvent::ReplaceCart(_) => "update the cart",
            SessionEvent::OpenPaymentDialog => "open the payment dialog",
            SessionEvent::ClosePaymentDialog => "close the payment dialog",
            SessionEvent::SubmissionStarted => "submit the order",
            SessionEvent::SubmissionDismissed
            | SessionEvent::SubmissionSucceeded(_)
            | SessionEvent::SubmissionFailed(_) => "finish the submission",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    id: Ulid,
    step: CheckoutStep,
    loaded: bool,
    rules: PricingRules,
    cart: Option<Cart>,
    coupons: Vec<Coupon>,
    applied_coupon: Option<AppliedCoupon>,
    coupon_error: String,
    address_book: AddressBook,
    customer_name: String,
    phone_number: String,
    delivery_fee_quote: BigDecimal,
    coin_balance: Option<BigDecimal>,
    snapshot: Option<CheckoutSnapshot>,
    last_failure: Option<String>,
}

impl Default for CheckoutSession {
    fn default() -> Self {
        Self::new(PricingRules::default())
    }
}

impl CheckoutSession {
    pub fn new(rules: PricingRules) -> Self {
        Self {
            id: Ulid::new(),
            step: CheckoutStep::Idle,
            loaded: false,
            rules,
            cart: None,
            coupons: vec![],
            applied_coupon: None,
            coupon_error: String::new(),
            address_book: AddressBook::default(),
            customer_name: String::new(),
            phone_number: String::new(),
            delivery_fee_quote: pricing::DEFAULT_DELIVERY_FEE.into(),
            coin_balance: None,
            snapshot: None,
            last_failure: None,
        }
    }

    pub fn id(&self) -> Ulid {
        self.id
    }

    pub fn step(&self) -> &CheckoutStep {
        &self.step
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn cart(&self) -> Option<&Cart> {
        self.cart.as_ref()
    }

    pub fn coupons(&self) -> &[Coupon] {
        &self.coupons
    }

    pub fn applied_coupon(&self) -> Option<&AppliedCoupon> {
        self.applied_coupon.as_ref()
    }

    pub fn coupon_error(&self) -> &str {
        &self.coupon_error
    }

    pub fn address_book(&self) -> &AddressBook {
        &self.address_book
    }

    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }

    pub fn phone_number(&self) -> &str {
        &self.phone_number
    }

    pub fn delivery_fee_quote(&self) -> &BigDecimal {
        &self.delivery_fee_quote
    }

    pub fn coin_balance(&self) -> Option<&BigDecimal> {
        self.coin_balance.as_ref()
    }

    pub fn snapshot(&self) -> Option<&CheckoutSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    pub fn breakdown(&self) -> PriceBreakdown {
        self.rules.compute_breakdown(
            self.cart.as_ref(),
            self.applied_coupon.as_ref(),
            &self.delivery_fee_quote,
        )
    }

    /// Availability of every method for the amount about to be paid.
    pub fn payment_options(&self) -> Vec<(PaymentMethod, Availability)> {
        let final_amount = match &self.snapshot {
            Some(snapshot) => snapshot.breakdown.final_amount.clone(),
            None => self.breakdown().final_amount,
        };

        PaymentMethod::ALL
            .iter()
            .map(|method| {
                (
                    *method,
                    method.availability(self.coin_balance.as_ref(), &final_amount),
                )
            })
            .collect()
    }

    pub fn contact_details(&self) -> ContactDetails {
        let delivery_address = match &self.snapshot {
            Some(snapshot) => snapshot.delivery_address.clone(),
            None => self.address_book.delivery_address(),
        };

        ContactDetails {
            phone_number: self.phone_number.trim().to_string(),
            delivery_address: delivery_address.trim().to_string(),
        }
    }

    pub fn dispatch(&mut self, event: SessionEvent) -> Result<(), CheckoutError> {
        let action = event.name();
        let from = self.step.name();

        let result = match event {
            SessionEvent::Loaded(data) => self.load(data),
            SessionEvent::OpenAddressPanel => self.open_address_panel(),
            SessionEvent::CloseAddressPanel => self.close_address_panel(),
            SessionEvent::UseCurrentLocation => self.use_current_location(),
            SessionEvent::SelectSavedAddress(address_id) => self.select_saved_address(&address_id),
            SessionEvent::EnterPhoneNumber(phone_number) => self.enter_phone_number(phone_number),
            SessionEvent::ApplyCoupon { code, now } => self.apply_coupon(&code, now),
            SessionEvent::RemoveCoupon => self.remove_coupon(),
            SessionEvent::SetQuantity { line_id, quantity } => self.set_quantity(&line_id, quantity),
            SessionEvent::ReplaceCart(cart) => self.replace_cart(cart),
            SessionEvent::OpenPaymentDialog => self.open_payment_dialog(),
            SessionEvent::ClosePaymentDialog => self.close_payment_dialog(),
            SessionEvent::SubmissionStarted => self.start_submission(),
            SessionEvent::SubmissionDismissed => self.dismiss_submission(),
            SessionEvent::SubmissionSucceeded(order) => self.complete_submission(order),
            SessionEvent::SubmissionFailed(message) => self.fail_submission(message),
        };

        match &result {
            Ok(()) => tracing::debug!(
                "Checkout {}: {} ({} -> {})",
                self.id,
                action,
                from,
                self.step.name()
            ),
            Err(err) => tracing::debug!("Checkout {}: could not {}: {}", self.id, action, err),
        }

        result
    }

    fn invalid(&self, action: &'static str) -> CheckoutError {
        CheckoutError::InvalidTransition {
            step: self.step.name(),
            action,
        }
    }

    fn ensure_editable(&self, action: &'static str) -> Result<(), CheckoutError> {
        match self.step.is_editable() {
            true => Ok(()),
            false => Err(self.invalid(action)),
        }
    }

    fn load(&mut self, data: PageData) -> Result<(), CheckoutError> {
        self.ensure_editable("load the page")?;

        self.address_book = AddressBook::new(data.addresses, data.profile.address);
        self.customer_name = data.profile.name;
        self.phone_number = data.profile.phone_number;
        self.cart = data.cart;
        self.coupons = data.coupons;
        self.delivery_fee_quote = data.delivery_fee_quote;
        self.coin_balance = data.coin_balance;
        self.loaded = true;
        Ok(())
    }

    fn open_address_panel(&mut self) -> Result<(), CheckoutError> {
        match self.step {
            CheckoutStep::Idle | CheckoutStep::ReviewOrder | CheckoutStep::AddressSelection => {
                self.step = CheckoutStep::AddressSelection;
                Ok(())
            }
            _ => Err(self.invalid("change the address")),
        }
    }

    fn close_address_panel(&mut self) -> Result<(), CheckoutError> {
        if self.step != CheckoutStep::AddressSelection {
            return Err(self.invalid("close the address panel"));
        }

        self.step = match self.address_book.delivery_address().is_empty() {
            true => CheckoutStep::Idle,
            false => CheckoutStep::ReviewOrder,
        };
        Ok(())
    }

    fn use_current_location(&mut self) -> Result<(), CheckoutError> {
        if self.step != CheckoutStep::AddressSelection {
            return Err(self.invalid("use the current location"));
        }

        self.address_book.use_current_location()?;
        self.step = CheckoutStep::ReviewOrder;
        Ok(())
    }

    fn select_saved_address(&mut self, address_id: &str) -> Result<(), CheckoutError> {
        if self.step != CheckoutStep::AddressSelection {
            return Err(self.invalid("select a saved address"));
        }

        let address = self.address_book.select_saved(address_id)?;
        if !address.phone.trim().is_empty() {
            self.phone_number = address.phone.clone();
        }
        self.step = CheckoutStep::ReviewOrder;
        Ok(())
    }

    fn enter_phone_number(&mut self, phone_number: String) -> Result<(), CheckoutError> {
        match self.step {
            CheckoutStep::Idle | CheckoutStep::ReviewOrder => {}
            CheckoutStep::AddressSelection => self.step = CheckoutStep::ReviewOrder,
            CheckoutStep::PaymentMethodSelection | CheckoutStep::Failed(_) => {}
            _ => return Err(self.invalid("change the phone number")),
        }

        self.phone_number = phone_number;
        Ok(())
    }

    fn apply_coupon(&mut self, code: &str, now: DateTime<Utc>) -> Result<(), CheckoutError> {
        self.ensure_editable("apply a coupon")?;

        let applied = match self.applied_coupon {
            Some(_) => Err(coupon_service::CouponError::AlreadyApplied),
            None => coupon_service::apply_coupon(
                code,
                &self.coupons,
                &pricing::cart_item_total(self.cart.as_ref()),
                now,
            ),
        };

        match applied {
            Ok(applied) => {
                self.applied_coupon = Some(applied);
                self.coupon_error.clear();
                Ok(())
            }
            Err(err) => {
                self.coupon_error = err.to_string();
                Err(err.into())
            }
        }
    }

    fn remove_coupon(&mut self) -> Result<(), CheckoutError> {
        self.ensure_editable("remove the coupon")?;

        self.applied_coupon = None;
        self.coupon_error.clear();
        Ok(())
    }

    fn set_quantity(&mut self, line_id: &str, quantity: u32) -> Result<(), CheckoutError> {
        self.ensure_editable("change a quantity")?;

        let cart = self.cart.as_mut().ok_or(CheckoutError::EmptyCart)?;
        cart::service::apply_quantity(cart, line_id, quantity)?;
        Ok(())
    }

    fn replace_cart(&mut self, cart: Option<Cart>) -> Result<(), CheckoutError> {
        self.ensure_editable("update the cart")?;

        self.cart = cart;
        Ok(())
    }

    fn open_payment_dialog(&mut self) -> Result<(), CheckoutError> {
        match self.step {
            CheckoutStep::Idle | CheckoutStep::ReviewOrder => {}
            _ => return Err(self.invalid("open the payment dialog")),
        }

        let cart = match &self.cart {
            Some(cart) if !cart.is_empty() => cart.clone(),
            _ => return Err(CheckoutError::EmptyCart),
        };
        if let Err(err) = cart.validate() {
            return Err(CheckoutError::CartUnavailable(err.to_string()));
        }

        self.snapshot = Some(CheckoutSnapshot {
            breakdown: self.breakdown(),
            applied_coupon: self.applied_coupon.clone(),
            delivery_address: self.address_book.delivery_address(),
            cart,
        });
        self.last_failure = None;
        self.step = CheckoutStep::PaymentMethodSelection;
        Ok(())
    }

    fn close_payment_dialog(&mut self) -> Result<(), CheckoutError> {
        if !self.step.can_submit() {
            return Err(self.invalid("close the payment dialog"));
        }

        self.snapshot = None;
        self.step = CheckoutStep::ReviewOrder;
        Ok(())
    }

    fn start_submission(&mut self) -> Result<(), CheckoutError> {
        if !self.step.can_submit() {
            return Err(self.invalid("submit the order"));
        }

        self.contact_details().validate().map_err(|err| {
            tracing::debug!(
                "Checkout {} has no contact: {}",
                self.id,
                validation::first_message(&err)
            );
            CheckoutError::MissingContact
        })?;

        self.step = CheckoutStep::Submitting;
        Ok(())
    }

    fn dismiss_submission(&mut self) -> Result<(), CheckoutError> {
        if self.step != CheckoutStep::Submitting {
            return Err(self.invalid("finish the submission"));
        }

        self.step = CheckoutStep::PaymentMethodSelection;
        Ok(())
    }

    fn complete_submission(&mut self, order: PlacedOrder) -> Result<(), CheckoutError> {
        if self.step != CheckoutStep::Submitting {
            return Err(self.invalid("finish the submission"));
        }

        self.cart = None;
        self.applied_coupon = None;
        self.coupon_error.clear();
        self.snapshot = None;
        self.last_failure = None;
        self.step = CheckoutStep::Success(order);
        Ok(())
    }

    fn fail_submission(&mut self, message: String) -> Result<(), CheckoutError> {
        if self.step != CheckoutStep::Submitting {
            return Err(self.invalid("finish the submission"));
        }

        self.last_failure = Some(message.clone());
        self.step = CheckoutStep::Failed(message);
        Ok(())
    }

    /// Order payload for `method`, built from the snapshot taken when the
    /// payment dialog opened.
    pub fn build_order_payload(&self, method: PaymentMethod) -> Result<OrderPayload, CheckoutError> {
        let snapshot = self
            .snapshot
            .as_ref()
            .ok_or_else(|| self.invalid("build the order"))?;
        let breakdown = &snapshot.breakdown;

        let items = snapshot
            .cart
            .items
            .iter()
            .map(|line| OrderItem {
                name: line.item.name.clone(),
                quantity: line.quantity,
                price: line.unit_price(),
                total_price: round2(&pricing::price_for_line(line).discounted),
                customizations: line.selected_customizations.clone(),
            })
            .collect();

        Ok(OrderPayload {
            user: OrderUser {
                name: self.customer_name.clone(),
                phone_number: self.phone_number.trim().to_string(),
                address: snapshot.delivery_address.clone(),
            },
            restaurant_id: snapshot.cart.restaurant_id.clone(),
            cart_id: snapshot.cart.id.clone(),
            coupon_code: snapshot
                .applied_coupon
                .as_ref()
                .map(|applied| applied.coupon.code.clone()),
            items,
            bill_details: BillDetails {
                item_total: breakdown.item_total.clone(),
                platform_fee: breakdown.platform_fee.clone(),
                delivery_fee: breakdown.delivery_fee.clone(),
                tax: breakdown.tax.clone(),
                discount: breakdown.coupon_discount.clone(),
                offer_savings: breakdown.total_savings.clone(),
                total_savings: &breakdown.total_savings + &breakdown.coupon_discount,
                final_amount: breakdown.final_amount.clone(),
                payment_method: method,
            },
        })
    }

    /// Local Zcoins check against the balance fetched on entry. The balance is
    /// checked again by the server path.
    pub fn check_coins(&self) -> Result<(), CheckoutError> {
        let (Some(balance), Some(snapshot)) = (&self.coin_balance, &self.snapshot) else {
            return Ok(());
        };

        let needed = zcoins::coins_needed(&snapshot.breakdown.final_amount);
        match balance >= &needed {
            true => Ok(()),
            false => Err(CheckoutError::InsufficientCoins {
                needed,
                balance: balance.clone(),
            }),
        }
    }
}
