pub mod api;
pub mod money;
pub mod validation;
