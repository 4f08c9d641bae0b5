use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use tfn_common::Paise;
use thiserror::Error;

use crate::helpers::GeoPoint;

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {0}: {1}")]
pub struct ConversionError(pub &'static str, pub String);

//--------------------------------------    TicketNumber    ----------------------------------------------------------
/// The human-facing order identifier. It travels with the order through all three lifecycle representations and is
/// distinct from the internal storage id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct TicketNumber(pub i64);

impl Display for TicketNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<i64> for TicketNumber {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

//--------------------------------------    OrderStatus     ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order is live but the restaurant has not accepted it yet.
    Pending,
    /// The restaurant accepted the order and the kitchen is working on it.
    Preparing,
    /// A rider won the claim and is on the way to the restaurant.
    Accepted,
    /// The rider physically collected the food.
    Pickedup,
    /// The rider arrived at the customer's location.
    Drop,
    /// Terminal. The OTP matched and the order was archived.
    Delivered,
    /// Terminal. Cancelled by the customer or an admin.
    Cancelled,
    /// Terminal. Rejected by the restaurant.
    Rejected,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::Rejected)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Accepted => "ACCEPTED",
            OrderStatus::Pickedup => "PICKEDUP",
            OrderStatus::Drop => "DROP",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
        };
        f.write_str(s)
    }
}

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PREPARING" => Ok(Self::Preparing),
            "ACCEPTED" => Ok(Self::Accepted),
            "PICKEDUP" => Ok(Self::Pickedup),
            "DROP" => Ok(Self::Drop),
            "DELIVERED" => Ok(Self::Delivered),
            "CANCELLED" => Ok(Self::Cancelled),
            "REJECTED" => Ok(Self::Rejected),
            s => Err(ConversionError("order status", s.to_string())),
        }
    }
}

impl From<String> for OrderStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to PENDING");
            OrderStatus::Pending
        })
    }
}

//-----------------------------------    RestaurantStatus    ---------------------------------------------------------
/// Kitchen-progress sub-state, independent of the overall order status. Advanced by the restaurant only, and only
/// ever forward. It gates rider visibility (`ALMOST_READY`/`READY`) and physical pickup (`READY`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RestaurantStatus {
    Preparing,
    AlmostReady,
    Ready,
}

impl Display for RestaurantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RestaurantStatus::Preparing => "PREPARING",
            RestaurantStatus::AlmostReady => "ALMOST_READY",
            RestaurantStatus::Ready => "READY",
        };
        f.write_str(s)
    }
}

impl FromStr for RestaurantStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PREPARING" => Ok(Self::Preparing),
            "ALMOST_READY" => Ok(Self::AlmostReady),
            "READY" => Ok(Self::Ready),
            s => Err(ConversionError("restaurant status", s.to_string())),
        }
    }
}

//--------------------------------------    DraftStatus     ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DraftStatus {
    /// Waiting for the gateway to confirm the payment.
    AwaitingPayment,
    /// A webhook delivery claimed this draft and is creating the live order.
    CreatingOrder,
    /// Terminal. The live order exists.
    Created,
    /// Terminal. The gateway reported a failed payment.
    Failed,
    /// Terminal. The draft expired or was abandoned.
    Cancelled,
}

impl Display for DraftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DraftStatus::AwaitingPayment => "AWAITING_PAYMENT",
            DraftStatus::CreatingOrder => "CREATING_ORDER",
            DraftStatus::Created => "CREATED",
            DraftStatus::Failed => "FAILED",
            DraftStatus::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}

impl FromStr for DraftStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AWAITING_PAYMENT" => Ok(Self::AwaitingPayment),
            "CREATING_ORDER" => Ok(Self::CreatingOrder),
            "CREATED" => Ok(Self::Created),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            s => Err(ConversionError("draft status", s.to_string())),
        }
    }
}

//--------------------------------------    PaymentMode     ----------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMode {
    Cod,
    Online,
}

impl Display for PaymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMode::Cod => f.write_str("COD"),
            PaymentMode::Online => f.write_str("ONLINE"),
        }
    }
}

//-------------------------------------    PaymentStatus    ----------------------------------------------------------
/// For `ONLINE` payments the log starts `PENDING` and only the gateway confirmation moves it to `SUCCESS`. For `COD`
/// it starts `NOT_COLLECTED` and becomes `SUCCESS` when the rider completes the delivery and takes the cash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failure,
    NotCollected,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failure => "FAILURE",
            PaymentStatus::NotCollected => "NOT_COLLECTED",
        };
        f.write_str(s)
    }
}

//-----------------------------------    SettlementStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementStatus {
    Pending,
    Paid,
}

impl Display for SettlementStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettlementStatus::Pending => f.write_str("PENDING"),
            SettlementStatus::Paid => f.write_str("PAID"),
        }
    }
}

//--------------------------------------     Customer       ----------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub notifications_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One entry in a customer's address book. Orders reference addresses by `position` (the `location_index`), so rows
/// must not be reordered or edited while the customer has a live order.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CustomerAddress {
    pub id: i64,
    pub customer_id: i64,
    pub position: i64,
    pub title: String,
    pub latitude: f64,
    pub longitude: f64,
    pub house_no: Option<String>,
    pub building: Option<String>,
    pub landmark: Option<String>,
    pub is_default: bool,
}

impl CustomerAddress {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

//--------------------------------------      Hotel         ----------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Hotel {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub is_serving: bool,
    pub created_at: DateTime<Utc>,
}

impl Hotel {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

//--------------------------------------     Listing        ----------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Listing {
    pub id: i64,
    pub hotel_id: i64,
    pub name: String,
    pub price: Paise,
    pub in_stock: bool,
}

//--------------------------------------      Rider         ----------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Rider {
    pub id: i64,
    pub name: String,
    pub phone: String,
    pub on_duty: bool,
    pub is_available: bool,
    pub is_blocked: bool,
    /// Cash-holding limit. Unsettled COD collections at or above 95% of this trigger an automatic block.
    pub deposit_amount: Paise,
    /// Best-effort secondary state. The live order's `rider_id` is the source of truth for who serves what.
    pub serving_order: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a rider is currently doing, derived from their serving order and its metadata. Never stored; the live order
/// is authoritative and this projection cannot drift from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiderActivity {
    Empty,
    Accepted,
    Reached,
    Pickedup,
    Drop,
}

impl RiderActivity {
    /// Projects the activity from the serving order. `ACCEPTED` splits into ACCEPTED/REACHED depending on whether
    /// the rider has checked in at the restaurant.
    pub fn derive(order: Option<&LiveOrder>, meta: Option<&RiderMetaData>) -> Self {
        match order.map(|o| o.status) {
            None => RiderActivity::Empty,
            Some(OrderStatus::Accepted) => {
                if meta.map(|m| m.reached_restaurant_at.is_some()).unwrap_or(false) {
                    RiderActivity::Reached
                } else {
                    RiderActivity::Accepted
                }
            },
            Some(OrderStatus::Pickedup) => RiderActivity::Pickedup,
            Some(OrderStatus::Drop) => RiderActivity::Drop,
            Some(_) => RiderActivity::Empty,
        }
    }
}

impl Display for RiderActivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiderActivity::Empty => "EMPTY",
            RiderActivity::Accepted => "ACCEPTED",
            RiderActivity::Reached => "REACHED",
            RiderActivity::Pickedup => "PICKEDUP",
            RiderActivity::Drop => "DROP",
        };
        f.write_str(s)
    }
}

//-----------------------------------    RiderMetaData    ------------------------------------------------------------
/// Accept-time telemetry for a single delivery. Owned by exactly one order; survives the Live→Past transition by
/// reference. Each timestamp is set once and never reverted.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RiderMetaData {
    pub id: i64,
    pub rider_id: i64,
    pub accepted_latitude: f64,
    pub accepted_longitude: f64,
    pub accepted_at: DateTime<Utc>,
    pub restaurant_distance_m: i64,
    pub customer_distance_m: i64,
    pub selfie_url: Option<String>,
    pub reached_restaurant_at: Option<DateTime<Utc>>,
    pub pickup_confirmed_at: Option<DateTime<Utc>>,
    pub drop_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Rider-supplied telemetry accompanying a claim attempt.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ClaimTelemetry {
    pub latitude: f64,
    pub longitude: f64,
    pub restaurant_distance_m: i64,
    pub customer_distance_m: i64,
}

//--------------------------------------    PaymentLog    ------------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PaymentLog {
    pub id: i64,
    pub txid: String,
    /// Our reference for the transaction at the gateway. Unique; webhook deliveries are matched against it.
    pub merchant_ref: String,
    pub mode: PaymentMode,
    pub status: PaymentStatus,
    pub customer_id: i64,
    pub amount: Paise,
    pub gateway_order_id: Option<String>,
    pub gateway_token: Option<String>,
    pub gateway_state: Option<String>,
    pub is_settled: bool,
    pub settled_at: Option<DateTime<Utc>>,
    pub settled_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub txid: String,
    pub merchant_ref: String,
    pub mode: PaymentMode,
    pub status: PaymentStatus,
    pub customer_id: i64,
    pub amount: Paise,
    pub gateway_order_id: Option<String>,
    pub gateway_token: Option<String>,
}

impl NewPayment {
    pub fn cod(customer_id: i64, amount: Paise, txid: String, merchant_ref: String) -> Self {
        Self {
            txid,
            merchant_ref,
            mode: PaymentMode::Cod,
            status: PaymentStatus::NotCollected,
            customer_id,
            amount,
            gateway_order_id: None,
            gateway_token: None,
        }
    }

    pub fn online(customer_id: i64, amount: Paise, txid: String, merchant_ref: String) -> Self {
        Self {
            txid,
            merchant_ref,
            mode: PaymentMode::Online,
            status: PaymentStatus::Pending,
            customer_id,
            amount,
            gateway_order_id: None,
            gateway_token: None,
        }
    }

    pub fn with_gateway(mut self, gateway_order_id: String, gateway_token: String) -> Self {
        self.gateway_order_id = Some(gateway_order_id);
        self.gateway_token = Some(gateway_token);
        self
    }
}

//--------------------------------------    OrderLine     ------------------------------------------------------------
/// One item line on an incoming order: a listing reference plus quantity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderLine {
    pub listing_id: i64,
    pub quantity: i64,
}

/// The validated input for creating a draft or live order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: i64,
    pub hotel_id: i64,
    pub location_index: i64,
    pub lines: Vec<OrderLine>,
    pub total_price: Paise,
    pub remarks: Option<String>,
}

//--------------------------------------    DraftOrder    ------------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DraftOrder {
    pub id: i64,
    pub ticket: TicketNumber,
    pub otp: i64,
    pub status: DraftStatus,
    pub customer_id: i64,
    pub hotel_id: i64,
    pub payment_id: i64,
    pub location_index: i64,
    pub total_price: Paise,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------    LiveOrder     ------------------------------------------------------------
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct LiveOrder {
    pub id: i64,
    pub ticket: TicketNumber,
    pub otp: i64,
    pub status: OrderStatus,
    pub restaurant_status: RestaurantStatus,
    pub customer_id: i64,
    pub hotel_id: i64,
    pub rider_id: Option<i64>,
    pub rider_meta_id: Option<i64>,
    pub payment_id: i64,
    pub location_index: i64,
    pub total_price: Paise,
    pub remarks: Option<String>,
    pub preparation_minutes: i64,
    pub ordered_at: DateTime<Utc>,
    pub served_at: Option<DateTime<Utc>>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LiveOrderItem {
    pub id: i64,
    pub order_id: i64,
    pub listing_id: i64,
    pub quantity: i64,
}

//--------------------------------------    PastOrder     ------------------------------------------------------------
/// Terminal archival snapshot. Items are denormalised (name and price captured at delivery time) and the delivery
/// address is embedded rather than referenced, so later edits to the catalog or the address book cannot rewrite
/// history.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct PastOrder {
    pub id: i64,
    pub ticket: TicketNumber,
    pub otp: i64,
    pub status: OrderStatus,
    pub reason: Option<String>,
    pub customer_id: i64,
    pub hotel_id: i64,
    pub rider_id: Option<i64>,
    pub rider_meta_id: Option<i64>,
    pub payment_id: i64,
    pub addr_title: String,
    pub addr_latitude: f64,
    pub addr_longitude: f64,
    pub addr_house_no: Option<String>,
    pub addr_building: Option<String>,
    pub addr_landmark: Option<String>,
    pub total_price: Paise,
    pub remarks: Option<String>,
    pub preparation_minutes: i64,
    pub ordered_at: DateTime<Utc>,
    pub served_at: Option<DateTime<Utc>>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PastOrderItem {
    pub id: i64,
    pub order_id: i64,
    pub listing_id: Option<i64>,
    pub name: String,
    pub unit_price: Paise,
    pub quantity: i64,
}

impl PastOrderItem {
    pub fn line_total(&self) -> Paise {
        self.unit_price * self.quantity
    }
}

//--------------------------------------    Settlement    ------------------------------------------------------------
/// One weekly payout record per (hotel, week_start, week_end). Uniqueness is enforced by the storage layer, which is
/// what makes the batch idempotent.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Settlement {
    pub id: i64,
    pub hotel_id: i64,
    pub week_start: DateTime<Utc>,
    pub week_end: DateTime<Utc>,
    pub total_orders: i64,
    pub gross_revenue: Paise,
    pub commission_amount: Paise,
    pub tax_on_commission: Paise,
    pub net_revenue: Paise,
    pub status: SettlementStatus,
    pub generated_at: DateTime<Utc>,
    pub proof_image_url: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub paid_by: Option<i64>,
    pub payment_mode: Option<String>,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewSettlement {
    pub hotel_id: i64,
    pub week_start: DateTime<Utc>,
    pub week_end: DateTime<Utc>,
    pub total_orders: i64,
    pub gross_revenue: Paise,
    pub commission_amount: Paise,
    pub tax_on_commission: Paise,
    pub net_revenue: Paise,
}

/// Proof metadata an admin attaches when marking a settlement as paid.
#[derive(Debug, Clone, Deserialize)]
pub struct SettlementProof {
    pub proof_image_url: String,
    pub payment_mode: Option<String>,
    pub remarks: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn order_status_round_trip() {
        for s in ["PENDING", "PREPARING", "ACCEPTED", "PICKEDUP", "DROP", "DELIVERED", "CANCELLED", "REJECTED"] {
            let status: OrderStatus = s.parse().unwrap();
            assert_eq!(status.to_string(), s);
        }
        assert!("Pickedup".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(!OrderStatus::Drop.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
    }

    #[test]
    fn restaurant_status_round_trip() {
        assert_eq!("ALMOST_READY".parse::<RestaurantStatus>().unwrap(), RestaurantStatus::AlmostReady);
        assert_eq!(RestaurantStatus::AlmostReady.to_string(), "ALMOST_READY");
    }

    #[test]
    fn activity_projection() {
        assert_eq!(RiderActivity::derive(None, None), RiderActivity::Empty);
        let mut order = sample_order(OrderStatus::Accepted);
        let mut meta = sample_meta();
        assert_eq!(RiderActivity::derive(Some(&order), Some(&meta)), RiderActivity::Accepted);
        meta.reached_restaurant_at = Some(Utc::now());
        assert_eq!(RiderActivity::derive(Some(&order), Some(&meta)), RiderActivity::Reached);
        order.status = OrderStatus::Pickedup;
        assert_eq!(RiderActivity::derive(Some(&order), Some(&meta)), RiderActivity::Pickedup);
        order.status = OrderStatus::Drop;
        assert_eq!(RiderActivity::derive(Some(&order), None), RiderActivity::Drop);
    }

    fn sample_order(status: OrderStatus) -> LiveOrder {
        LiveOrder {
            id: 1,
            ticket: TicketNumber(482_193),
            otp: 654_321,
            status,
            restaurant_status: RestaurantStatus::Ready,
            customer_id: 1,
            hotel_id: 1,
            rider_id: Some(7),
            rider_meta_id: Some(3),
            payment_id: 1,
            location_index: 0,
            total_price: Paise::from_rupees(250),
            remarks: None,
            preparation_minutes: 15,
            ordered_at: Utc::now(),
            served_at: None,
            arrived_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample_meta() -> RiderMetaData {
        RiderMetaData {
            id: 3,
            rider_id: 7,
            accepted_latitude: 19.95,
            accepted_longitude: 79.29,
            accepted_at: Utc::now(),
            restaurant_distance_m: 1_200,
            customer_distance_m: 2_400,
            selfie_url: None,
            reached_restaurant_at: None,
            pickup_confirmed_at: None,
            drop_at: None,
            delivered_at: None,
        }
    }
}
