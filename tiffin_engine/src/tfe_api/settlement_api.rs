use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use tfn_common::Paise;

use crate::{
    db_types::{NewSettlement, Settlement, SettlementProof},
    events::{EventProducers, SettlementAlertEvent},
    helpers::{last_settlement_window, running_window, SettlementWindow},
    tfe_api::{
        errors::OrderFlowError,
        order_objects::{BatchSummary, WeeklyReport},
    },
    traits::{MarketplaceError, OrderManagement, SettlementManagement},
};

/// Commission and tax rates in basis points.
#[derive(Debug, Clone, Copy)]
pub struct SettlementRates {
    pub commission_bp: i64,
    pub tax_bp: i64,
}

impl Default for SettlementRates {
    fn default() -> Self {
        // 20% platform commission, 18% GST on the commission.
        Self { commission_bp: 2_000, tax_bp: 1_800 }
    }
}

/// `SettlementApi` turns a week of delivered orders into per-restaurant payout records.
pub struct SettlementApi<B> {
    db: B,
    producers: EventProducers,
    rates: SettlementRates,
}

impl<B> Debug for SettlementApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementApi")
    }
}

impl<B> SettlementApi<B> {
    pub fn new(db: B, producers: EventProducers, rates: SettlementRates) -> Self {
        Self { db, producers, rates }
    }
}

impl<B> SettlementApi<B>
where B: SettlementManagement + OrderManagement
{
    /// Settles the most recently completed Thursday–Wednesday window for every restaurant.
    ///
    /// Each restaurant is independent: one failure is alerted and skipped, never allowed to roll back or block the
    /// others. Re-running the batch for the same window is safe — existing settlements are skipped and the unique
    /// (hotel, week) constraint catches any race between two concurrent runs.
    pub async fn run_weekly_batch(&self, now: DateTime<Utc>) -> Result<BatchSummary, OrderFlowError> {
        let window = last_settlement_window(now);
        let hotels = self.db.hotel_ids().await?;
        let mut summary = BatchSummary { created: 0, skipped: 0, failed: 0 };
        for hotel_id in hotels {
            match self.settle_hotel(hotel_id, &window).await {
                Ok(true) => summary.created += 1,
                Ok(false) => summary.skipped += 1,
                Err(e) => {
                    summary.failed += 1;
                    error!("🧾️ Settlement failed for hotel {hotel_id}: {e}");
                    self.publish_alert(hotel_id, e.to_string()).await;
                },
            }
        }
        info!(
            "🧾️ Weekly settlement run complete: {} created, {} skipped, {} failed",
            summary.created, summary.skipped, summary.failed
        );
        Ok(summary)
    }

    async fn settle_hotel(&self, hotel_id: i64, window: &SettlementWindow) -> Result<bool, MarketplaceError> {
        if self.db.settlement_exists(hotel_id, window).await? {
            return Ok(false);
        }
        let orders = self.db.delivered_orders_in_window(hotel_id, window).await?;
        if orders.is_empty() {
            return Ok(false);
        }
        let mut gross = Paise::default();
        for order in &orders {
            let items = self.db.fetch_past_order_items(order.id).await?;
            gross = items.iter().fold(gross, |acc, item| acc + item.line_total());
        }
        let commission = gross.apply_rate_bp(self.rates.commission_bp);
        let tax = commission.apply_rate_bp(self.rates.tax_bp);
        let net = gross - commission - tax;
        let settlement = NewSettlement {
            hotel_id,
            week_start: window.start,
            week_end: window.end,
            total_orders: orders.len() as i64,
            gross_revenue: gross,
            commission_amount: commission,
            tax_on_commission: tax,
            net_revenue: net,
        };
        match self.db.insert_settlement(settlement).await {
            Ok(s) => {
                debug!("🧾️ Settlement {} created for hotel {hotel_id}: gross {gross}, net {net}", s.id);
                Ok(true)
            },
            // A concurrent run got there first; that is a skip, not a failure.
            Err(MarketplaceError::SettlementAlreadyExists { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// `PENDING` → `PAID` with proof, re-verified at write time against concurrent admin sessions.
    pub async fn mark_paid(
        &self,
        settlement_id: i64,
        admin_id: i64,
        proof: &SettlementProof,
    ) -> Result<Settlement, OrderFlowError> {
        let settlement = self.db.mark_settlement_paid(settlement_id, admin_id, proof).await?;
        info!("🧾️ Settlement {settlement_id} marked PAID by admin {admin_id}");
        Ok(settlement)
    }

    /// Revenue accumulated in the week currently in progress, for the hotel dashboard.
    pub async fn weekly_report(&self, hotel_id: i64, now: DateTime<Utc>) -> Result<WeeklyReport, OrderFlowError> {
        let window = running_window(now);
        let orders = self.db.delivered_orders_in_window(hotel_id, &window).await?;
        let mut gross = Paise::default();
        for order in &orders {
            let items = self.db.fetch_past_order_items(order.id).await?;
            gross = items.iter().fold(gross, |acc, item| acc + item.line_total());
        }
        Ok(WeeklyReport::new(window, orders.len(), gross))
    }

    pub async fn settlements_for_hotel(&self, hotel_id: i64) -> Result<Vec<Settlement>, OrderFlowError> {
        let settlements = self.db.settlements_for_hotel(hotel_id).await?;
        Ok(settlements)
    }

    async fn publish_alert(&self, hotel_id: i64, message: String) {
        for producer in &self.producers.settlement_alert_producers {
            producer.publish_event(SettlementAlertEvent { hotel_id, message: message.clone() }).await;
        }
    }
}
