use chrono::Duration;
use thiserror::Error;

use crate::{
    db_types::{
        ClaimTelemetry,
        DraftOrder,
        LiveOrder,
        NewOrder,
        NewPayment,
        OrderStatus,
        PastOrder,
        PaymentLog,
        RestaurantStatus,
        RiderMetaData,
    },
    traits::{
        data_objects::{GatewayEvent, PaymentResolution, WebhookOutcome},
        OrderManagement,
        RiderManagement,
        SettlementManagement,
        TokenManagement,
    },
};

/// This trait defines the highest level of behaviour for backends supporting the Tiffin engine: the order lifecycle
/// writes and the payment reconciliation writes.
///
/// Everything here is a conditional write. The storage layer, not the application, is what serialises competing
/// rider claims: [`claim_order`](Self::claim_order) must be an atomic compare-and-swap, and the multi-row operations
/// ([`complete_order`](Self::complete_order), [`apply_gateway_event`](Self::apply_gateway_event), the order creation
/// calls) must be all-or-nothing transactions.
#[allow(async_fn_in_trait)]
pub trait MarketplaceDatabase:
    Clone + OrderManagement + RiderManagement + SettlementManagement + TokenManagement {
    /// The URL of the database.
    fn url(&self) -> &str;

    //------------------------------------- Payment reconciliation -------------------------------------------------

    /// Creates a COD order: the payment log (`NOT_COLLECTED`) and the live order (`PENDING`) in one transaction.
    /// There is no draft intermediary because there is no asynchronous confirmation to wait for.
    fn create_cod_order(
        &self,
        payment: NewPayment,
        order: NewOrder,
        ticket: i64,
        otp: i64,
    ) -> impl ::std::future::Future<Output = Result<(LiveOrder, PaymentLog), MarketplaceError>> + Send;

    /// Stores a `PENDING` online payment. Fails with [`MarketplaceError::PaymentAlreadyExists`] on a duplicate
    /// transaction id or merchant reference.
    fn create_pending_payment(&self, payment: NewPayment) -> impl ::std::future::Future<Output = Result<PaymentLog, MarketplaceError>> + Send;

    /// Creates the draft order for a pending online payment, with its item lines, in one transaction. At most one
    /// draft may ever reference a payment; a second attempt fails with [`MarketplaceError::DraftAlreadyExists`]
    /// rather than silently overwriting.
    fn create_draft_order(
        &self,
        payment_id: i64,
        order: NewOrder,
        ticket: i64,
        otp: i64,
    ) -> impl ::std::future::Future<Output = Result<DraftOrder, MarketplaceError>> + Send;

    /// Applies a definitive gateway signal to the payment and, on success, promotes the draft to a live order.
    ///
    /// This call is idempotent. Replaying a success event for an already-promoted draft is a no-op that still
    /// reports success ([`WebhookOutcome::AlreadyPromoted`]). The promotion claims the draft with a conditional
    /// `AWAITING_PAYMENT` → `CREATING_ORDER` transition before creating the live order, and checks for an existing
    /// live order referencing the payment before doing any work.
    fn apply_gateway_event(&self, event: &GatewayEvent) -> impl ::std::future::Future<Output = Result<WebhookOutcome, MarketplaceError>> + Send;

    /// Read-only reconciliation poll for a merchant reference. A payment that exists without a live order yet is
    /// reported as pending, not as an error.
    fn payment_resolution(&self, merchant_ref: &str) -> impl ::std::future::Future<Output = Result<PaymentResolution, MarketplaceError>> + Send;

    /// Marks drafts still `AWAITING_PAYMENT` after `ttl` as `CANCELLED`. Expired drafts are not resurrectable.
    /// Returns the drafts that were expired.
    fn expire_stale_drafts(&self, ttl: Duration) -> impl ::std::future::Future<Output = Result<Vec<DraftOrder>, MarketplaceError>> + Send;

    //------------------------------------- Order state machine ----------------------------------------------------

    /// Restaurant accepts the order: `PENDING` → `PREPARING`, recording the preparation estimate.
    fn restaurant_accept(&self, order_id: i64, preparation_minutes: i64) -> impl ::std::future::Future<Output = Result<LiveOrder, MarketplaceError>> + Send;

    /// Advances the kitchen sub-state (`PREPARING` → `ALMOST_READY` → `READY`). Forward-only; `READY` stamps
    /// `served_at`. Permitted while the order itself is `PREPARING` or already claimed (`ACCEPTED`).
    fn advance_restaurant_status(
        &self,
        order_id: i64,
        to: RestaurantStatus,
    ) -> impl ::std::future::Future<Output = Result<LiveOrder, MarketplaceError>> + Send;

    /// The exclusive rider claim. A single atomic conditional write that succeeds only if the order has no rider
    /// assigned (and is biddable: `PREPARING` with kitchen state `ALMOST_READY`/`READY`), or the assigned rider
    /// equals the caller and the order is still `ACCEPTED` (idempotent re-claim). Everything else is a refusal:
    /// a different rider holds it → [`MarketplaceError::OrderAlreadyClaimed`]; not biddable →
    /// [`MarketplaceError::OrderNotBiddable`]. The loser must not retry the same order.
    ///
    /// On a first successful claim the accept-time telemetry is recorded as a new [`RiderMetaData`] row in the same
    /// transaction. The rider's own `is_available`/`serving_order` fields are *not* updated here: they are
    /// best-effort secondary state, written separately by the caller.
    fn claim_order(
        &self,
        rider_id: i64,
        order_id: i64,
        telemetry: ClaimTelemetry,
    ) -> impl ::std::future::Future<Output = Result<LiveOrder, MarketplaceError>> + Send;

    /// The rider checked in at the restaurant (selfie upload). Stamps `reached_restaurant_at` once; the order status
    /// does not change.
    fn record_reached_restaurant(
        &self,
        rider_id: i64,
        selfie_url: &str,
    ) -> impl ::std::future::Future<Output = Result<RiderMetaData, MarketplaceError>> + Send;

    /// Physical pickup: `ACCEPTED` → `PICKEDUP`, gated on the kitchen having marked the order `READY`. A violation
    /// of the gate is [`MarketplaceError::OrderNotReady`] — a business-rule denial, deliberately distinct from a
    /// claim conflict.
    fn confirm_pickup(&self, rider_id: i64, order_id: i64) -> impl ::std::future::Future<Output = Result<LiveOrder, MarketplaceError>> + Send;

    /// Arrival at the customer: `PICKEDUP` → `DROP`, stamping `arrived_at` and the metadata `drop_at`.
    fn confirm_drop(&self, rider_id: i64, order_id: i64) -> impl ::std::future::Future<Output = Result<LiveOrder, MarketplaceError>> + Send;

    /// Completes the delivery. The supplied OTP must numerically equal the stored OTP. In one transaction: the order
    /// is marked `DELIVERED`, its item lines are denormalised from the current catalog, a past order is written, the
    /// live order is removed, a COD payment transitions `NOT_COLLECTED` → `SUCCESS`, and the rider is freed. A
    /// partial application would leave an order in two lifecycle stages at once, so all of it commits or none does.
    fn complete_order(&self, rider_id: i64, order_id: i64, otp: i64) -> impl ::std::future::Future<Output = Result<PastOrder, MarketplaceError>> + Send;

    /// Archives a non-terminal order as `CANCELLED` or `REJECTED` with a reason, freeing the rider if one was
    /// assigned. Same single-transaction rules as completion.
    fn cancel_order(&self, order_id: i64, to: OrderStatus, reason: &str) -> impl ::std::future::Future<Output = Result<PastOrder, MarketplaceError>> + Send;

    /// Closes the database connection.
    fn close(&mut self) -> impl ::std::future::Future<Output = Result<(), MarketplaceError>> + Send {
        async { Ok(()) }
    }
}

#[derive(Debug, Clone, Error)]
pub enum MarketplaceError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(i64),
    #[error("No draft order exists for payment {0}")]
    DraftNotFound(i64),
    #[error("The requested payment {0} does not exist")]
    PaymentNotFound(String),
    #[error("The requested customer {0} does not exist")]
    CustomerNotFound(i64),
    #[error("The requested restaurant {0} does not exist")]
    HotelNotFound(i64),
    #[error("The requested rider {0} does not exist")]
    RiderNotFound(i64),
    #[error("The requested listing {0} does not exist or is out of stock")]
    ListingNotFound(i64),
    #[error("The requested settlement {0} does not exist")]
    SettlementNotFound(i64),
    #[error("Customer {customer_id} has no address at index {location_index}")]
    AddressNotFound { customer_id: i64, location_index: i64 },
    #[error("No delivery metadata exists for rider {0}")]
    RiderMetaNotFound(i64),
    #[error("Order {0} is already assigned to another rider")]
    OrderAlreadyClaimed(i64),
    #[error("A draft already exists for payment {0}")]
    DraftAlreadyExists(i64),
    #[error("Cannot insert payment, since it already exists with reference {0}")]
    PaymentAlreadyExists(String),
    #[error("Settlement {0} has already been marked as paid")]
    SettlementAlreadyPaid(i64),
    #[error("A settlement for restaurant {hotel_id} already exists for that week")]
    SettlementAlreadyExists { hotel_id: i64 },
    #[error("Order {0} is not open for rider claims")]
    OrderNotBiddable(i64),
    #[error("Order {0} is not marked READY by the restaurant yet")]
    OrderNotReady(i64),
    #[error("The OTP does not match order {0}")]
    OtpMismatch(i64),
    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidStatusChange { order_id: i64, from: String, to: String },
    #[error("Rider {0} is blocked until their collected cash is deposited")]
    RiderBlocked(i64),
    #[error("Rider {0} is mid-delivery and cannot be blocked")]
    RiderOnDelivery(i64),
    #[error("Customer {0} has an order in progress; the address book is locked until it completes")]
    AddressLocked(i64),
    #[error("An order must contain at least one item line")]
    EmptyOrder,
}

/// The error taxonomy the server maps onto HTTP statuses. Conflicts mean "do not retry the same target";
/// business-rule violations mean "the action is not allowed in this state"; the rest are self-describing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    Conflict,
    BusinessRule,
    Validation,
    Internal,
}

impl MarketplaceError {
    pub fn class(&self) -> ErrorClass {
        use MarketplaceError::*;
        match self {
            DatabaseError(_) => ErrorClass::Internal,
            OrderNotFound(_) | DraftNotFound(_) | PaymentNotFound(_) | CustomerNotFound(_) | HotelNotFound(_)
            | RiderNotFound(_) | ListingNotFound(_) | SettlementNotFound(_) | AddressNotFound { .. }
            | RiderMetaNotFound(_) => ErrorClass::NotFound,
            OrderAlreadyClaimed(_) | DraftAlreadyExists(_) | PaymentAlreadyExists(_) | SettlementAlreadyPaid(_)
            | SettlementAlreadyExists { .. } => ErrorClass::Conflict,
            OrderNotBiddable(_) | OrderNotReady(_) | OtpMismatch(_) | InvalidStatusChange { .. } | RiderBlocked(_)
            | RiderOnDelivery(_) | AddressLocked(_) => ErrorClass::BusinessRule,
            EmptyOrder => ErrorClass::Validation,
        }
    }
}

impl From<sqlx::Error> for MarketplaceError {
    fn from(e: sqlx::Error) -> Self {
        MarketplaceError::DatabaseError(e.to_string())
    }
}
