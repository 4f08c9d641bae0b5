//! Tiffin Engine
//!
//! The Tiffin Engine is the core of a food-delivery marketplace backend. It owns the order lifecycle (draft, live and
//! past representations of an order), payment reconciliation, rider dispatch and the weekly restaurant settlement
//! batch. The library is provider-agnostic.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@db`]). SQLite is the supported backend. You should never need to access
//!    the database directly. Instead, use the public API provided by the engine. The exception is the data types used
//!    in the database, which are defined in the `db_types` module and are public.
//! 2. The engine public API ([`mod@tfe_api`]). This provides the public-facing functionality of the engine: the order
//!    state machine (including the exclusive rider claim), the payment flows, dispatch and settlements. Specific
//!    backends need to implement the traits in [`mod@traits`] in order to act as a backend for the Tiffin server.
//!
//! The engine also provides a set of events that can be subscribed to. These events are emitted after the owning
//! transaction commits. For example, when an order reaches `PICKEDUP`, an `OrderStatusChanged` event is emitted. A
//! simple actor framework is used so that you can easily hook into these events and perform custom actions, such as
//! push-notification dispatch, without coupling them to the transaction.
mod db;

pub mod db_types;
pub mod events;
pub mod helpers;
mod tfe_api;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::SqliteDatabase;
pub use db::traits::{
    self as traits,
    ErrorClass,
    GatewayEvent,
    GatewayFinalState,
    MarketplaceDatabase,
    MarketplaceError,
    OrderManagement,
    PaymentGateway,
    PushSender,
    RiderManagement,
    SettlementManagement,
    TokenManagement,
    TokenOwner,
    WebhookOutcome,
};
pub use tfe_api::{
    dispatch_api::DispatchApi,
    errors::OrderFlowError,
    order_flow_api::OrderFlowApi,
    order_objects,
    payment_flow_api::{PaymentFlowApi, PlacementPolicy},
    settlement_api::{SettlementApi, SettlementRates},
};
