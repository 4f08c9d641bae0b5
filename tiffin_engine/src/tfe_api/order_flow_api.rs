use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{ClaimTelemetry, LiveOrder, OrderStatus, PastOrder, RestaurantStatus, RiderActivity, RiderMetaData},
    events::{EventProducers, OrderArchivedEvent, OrderStatusChangedEvent},
    tfe_api::errors::OrderFlowError,
    traits::MarketplaceDatabase,
};

/// `OrderFlowApi` owns the live-order state machine: the restaurant-side transitions, the exclusive rider claim and
/// the delivery flow through to archival. Events are published only after the underlying transaction has committed.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> OrderFlowApi<B>
where B: MarketplaceDatabase
{
    /// The restaurant accepts a `PENDING` order and commits to a preparation estimate.
    pub async fn restaurant_accept(
        &self,
        order_id: i64,
        preparation_minutes: i64,
    ) -> Result<LiveOrder, OrderFlowError> {
        let order = self.db.restaurant_accept(order_id, preparation_minutes).await?;
        debug!("🔄️ Order {} accepted by the kitchen ({preparation_minutes} min)", order.ticket);
        self.publish_status_change(&order, OrderStatus::Pending).await;
        Ok(order)
    }

    /// Kitchen progress: `PREPARING` → `ALMOST_READY`. From this point the order is visible to riders.
    pub async fn restaurant_almost_ready(&self, order_id: i64) -> Result<LiveOrder, OrderFlowError> {
        let order = self.db.advance_restaurant_status(order_id, RestaurantStatus::AlmostReady).await?;
        Ok(order)
    }

    /// Kitchen progress: → `READY`. Unlocks physical pickup.
    pub async fn restaurant_ready(&self, order_id: i64) -> Result<LiveOrder, OrderFlowError> {
        let order = self.db.advance_restaurant_status(order_id, RestaurantStatus::Ready).await?;
        Ok(order)
    }

    /// A rider attempts to become the exclusive fulfiller of an order.
    ///
    /// The claim itself is a storage-level compare-and-swap; of any number of racing riders exactly one wins, the
    /// rest observe a conflict and must pick a different order. The winner's own availability fields are updated
    /// afterwards, best-effort: the order's `rider_id` is the source of truth, so a crash between the two writes
    /// only leaves stale secondary state.
    pub async fn claim_order(
        &self,
        rider_id: i64,
        order_id: i64,
        telemetry: ClaimTelemetry,
    ) -> Result<LiveOrder, OrderFlowError> {
        let order = self.db.claim_order(rider_id, order_id, telemetry).await?;
        if let Err(e) = self.db.mark_rider_serving(rider_id, order_id).await {
            warn!("🔄️ Could not update rider {rider_id} availability after claiming order {order_id}: {e}");
        }
        info!("🔄️ Order {} claimed by rider {rider_id}", order.ticket);
        self.publish_status_change(&order, OrderStatus::Preparing).await;
        Ok(order)
    }

    /// The rider checked in at the restaurant with a selfie. No order-status change.
    pub async fn reached_restaurant(&self, rider_id: i64, selfie_url: &str) -> Result<RiderMetaData, OrderFlowError> {
        let meta = self.db.record_reached_restaurant(rider_id, selfie_url).await?;
        Ok(meta)
    }

    /// Physical pickup, gated on the kitchen having marked the order `READY`.
    pub async fn confirm_pickup(&self, rider_id: i64, order_id: i64) -> Result<LiveOrder, OrderFlowError> {
        let order = self.db.confirm_pickup(rider_id, order_id).await?;
        debug!("🔄️ Order {} picked up by rider {rider_id}", order.ticket);
        self.publish_status_change(&order, OrderStatus::Accepted).await;
        Ok(order)
    }

    /// The rider arrived at the customer's door.
    pub async fn confirm_drop(&self, rider_id: i64, order_id: i64) -> Result<LiveOrder, OrderFlowError> {
        let order = self.db.confirm_drop(rider_id, order_id).await?;
        debug!("🔄️ Order {} reached the drop location", order.ticket);
        self.publish_status_change(&order, OrderStatus::Pickedup).await;
        Ok(order)
    }

    /// OTP-verified completion. On success the order is archived atomically and the rider freed; the archived event
    /// drives the post-delivery block recomputation.
    pub async fn complete_order(&self, rider_id: i64, order_id: i64, otp: i64) -> Result<PastOrder, OrderFlowError> {
        let past = self.db.complete_order(rider_id, order_id, otp).await?;
        info!("🔄️ Order {} delivered and archived", past.ticket);
        self.publish_archived(&past).await;
        Ok(past)
    }

    /// Cancels or rejects a live order, archiving it with a reason.
    pub async fn cancel_order(
        &self,
        order_id: i64,
        to: OrderStatus,
        reason: &str,
    ) -> Result<PastOrder, OrderFlowError> {
        let past = self.db.cancel_order(order_id, to, reason).await?;
        info!("🔄️ Order {} archived as {to}", past.ticket);
        self.publish_archived(&past).await;
        Ok(past)
    }

    /// What the rider is doing right now, projected from their serving order rather than stored.
    pub async fn rider_activity(&self, rider_id: i64) -> Result<RiderActivity, OrderFlowError> {
        let order = self.db.fetch_serving_order(rider_id).await?;
        let meta = self.db.fetch_latest_meta(rider_id).await?;
        Ok(RiderActivity::derive(order.as_ref(), meta.as_ref()))
    }

    async fn publish_status_change(&self, order: &LiveOrder, previous: OrderStatus) {
        for producer in &self.producers.order_status_producers {
            producer.publish_event(OrderStatusChangedEvent::new(order.clone(), previous)).await;
        }
    }

    async fn publish_archived(&self, order: &PastOrder) {
        for producer in &self.producers.order_archived_producers {
            producer.publish_event(OrderArchivedEvent::new(order.clone())).await;
        }
    }
}
