pub mod address;
pub mod cache;
pub mod cart;
pub mod checkout;
pub mod coupon;
pub mod delivery;
pub mod order;
pub mod payment;
pub mod pricing;
