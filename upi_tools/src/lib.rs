//! A thin REST client for the UPI payment gateway.
//!
//! The gateway exposes an OAuth2 client-credentials token endpoint and a checkout order API. Access tokens are
//! cached in-process and refreshed shortly before they expire; every request carries a bounded timeout so a stalled
//! gateway can never hold up an order-placement request indefinitely (the caller opens its database transaction
//! only after this client has returned).
mod api;
mod config;
mod data_objects;
mod error;

pub use api::UpiApi;
pub use config::{UpiConfig, UpiEnvironment};
pub use data_objects::{CheckoutOrder, CheckoutOrderRequest, TokenResponse};
pub use error::UpiApiError;
