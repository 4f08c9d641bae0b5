//! The traits a storage backend must implement to drive the Tiffin engine, plus the collaborator interfaces the
//! engine consumes (push-notification sender, payment gateway client).
mod collaborators;
mod data_objects;
mod marketplace_database;
mod order_management;
mod rider_management;
mod settlement_management;
mod token_management;

pub use collaborators::{GatewayError, GatewayOrder, Notice, NoticeKind, PaymentGateway, PushError, PushOutcome, PushSender};
pub use data_objects::{
    BlockStatus,
    CollectionReport,
    GatewayEvent,
    GatewayFinalState,
    OrderLineView,
    PaymentResolution,
    UnsettledOrder,
    WebhookOutcome,
};
pub use marketplace_database::{ErrorClass, MarketplaceDatabase, MarketplaceError};
pub use order_management::OrderManagement;
pub use rider_management::RiderManagement;
pub use settlement_management::SettlementManagement;
pub use token_management::{TokenManagement, TokenOwner};
