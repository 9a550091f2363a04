pub mod coordinator;
pub mod session;

use bigdecimal::BigDecimal;

use crate::modules::{address, cart, coupon::service::CouponError, payment};
use crate::utils::money::format_amount;

/// Everything that can end a checkout attempt. None of these are retried
/// automatically; the user starts over from the step they were on.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CheckoutError {
    #[error("Invalid coupon code")]
    InvalidCode,
    #[error("Add items worth {} more to use this coupon", format_amount(.shortfall))]
    BelowMinimum { shortfall: BigDecimal },
    #[error("This coupon has expired")]
    CouponExpired,
    #[error("Remove the applied coupon before applying another")]
    CouponAlreadyApplied,
    #[error("Please add a phone number and address for delivery")]
    MissingContact,
    #[error("Current location is not available")]
    LocationUnavailable,
    #[error("Address not found")]
    AddressNotFound,
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
    #[error("Your cart is empty")]
    EmptyCart,
    #[error("{0}")]
    CartUnavailable(String),
    #[error("Cannot {action} while {step}")]
    InvalidTransition {
        step: &'static str,
        action: &'static str,
    },
    #[error("Checkout was closed")]
    Cancelled,
}

impl From<CouponError> for CheckoutError {
    fn from(err: CouponError) -> Self {
        match err {
            CouponError::InvalidCode => CheckoutError::InvalidCode,
            CouponError::BelowMinimum { shortfall } => CheckoutError::BelowMinimum { shortfall },
            CouponError::Expired => CheckoutError::CouponExpired,
            CouponError::AlreadyApplied => CheckoutError::CouponAlreadyApplied,
        }
    }
}

impl From<payment::Error> for CheckoutError {
    fn from(err: payment::Error) -> Self {
        match err {
            payment::Error::InsufficientCoins { needed, balance } => {
                CheckoutError::InsufficientCoins { needed, balance }
            }
            payment::Error::GatewayLoadFailure => CheckoutError::GatewayLoadFailure,
            payment::Error::GatewayVerificationFailure(message) => {
                CheckoutError::GatewayVerificationFailure(message)
            }
            payment::Error::OrderPlacementFailure(message) => {
                CheckoutError::OrderPlacementFailure(message)
            }
        }
    }
}

impl From<cart::service::Error> for CheckoutError {
    fn from(err: cart::service::Error) -> Self {
        CheckoutError::CartUnavailable(err.to_string())
    }
}

impl From<address::service::Error> for CheckoutError {
    fn from(err: address::service::Error) -> Self {
        match err {
            address::service::Error::LocationUnavailable => CheckoutError::LocationUnavailable,
            address::service::Error::AddressNotFound => CheckoutError::AddressNotFound,
        }
    }
}
