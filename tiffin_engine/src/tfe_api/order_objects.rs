//! Wire-facing result objects assembled by the engine APIs.
use serde::Serialize;
use tfn_common::Paise;

use crate::{db_types::TicketNumber, helpers::SettlementWindow};

/// A claimable order as shown to an idle rider, enriched with straight-line estimates.
#[derive(Debug, Clone, Serialize)]
pub struct BiddableOrder {
    pub order_id: i64,
    pub ticket: TicketNumber,
    pub hotel_name: String,
    pub hotel_address: String,
    /// Rider → restaurant, metres.
    pub hotel_distance_m: i64,
    /// Rider → restaurant at the assumed average speed, minutes.
    pub travel_minutes: i64,
    /// Restaurant → customer, metres.
    pub customer_distance_m: i64,
}

/// What the client needs to hand off to the gateway SDK after an online payment is initiated.
#[derive(Debug, Clone, Serialize)]
pub struct OnlineHandoff {
    pub payment_id: i64,
    pub draft_id: i64,
    pub merchant_ref: String,
    pub gateway_order_id: String,
    pub gateway_token: String,
    pub amount: Paise,
}

/// A serving hotel enriched for the customer-facing listing.
#[derive(Debug, Clone, Serialize)]
pub struct HotelView {
    pub hotel_id: i64,
    pub name: String,
    pub address: String,
    pub distance_m: i64,
    pub delivery_minutes: i64,
}

/// The hotel-facing running revenue report for the week in progress.
#[derive(Debug, Clone, Serialize)]
pub struct WeeklyReport {
    pub week_start: chrono::DateTime<chrono::Utc>,
    pub week_end: chrono::DateTime<chrono::Utc>,
    pub total_orders: usize,
    pub gross_revenue: Paise,
}

impl WeeklyReport {
    pub fn new(window: SettlementWindow, total_orders: usize, gross_revenue: Paise) -> Self {
        Self { week_start: window.start, week_end: window.end, total_orders, gross_revenue }
    }
}

/// What one weekly settlement batch run did.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BatchSummary {
    pub created: usize,
    pub skipped: usize,
    pub failed: usize,
}
