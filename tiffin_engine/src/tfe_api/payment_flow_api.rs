use std::fmt::Debug;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use log::*;

use crate::{
    db_types::{DraftOrder, LiveOrder, NewOrder, NewPayment, PaymentLog},
    events::{EventProducers, NewOrderEvent},
    helpers::{is_after_cutoff_ist, new_merchant_ref, new_otp, new_ticket, new_transaction_ref, ServiceAreas},
    tfe_api::{errors::OrderFlowError, order_objects::OnlineHandoff},
    traits::{GatewayEvent, MarketplaceDatabase, MarketplaceError, PaymentGateway, PaymentResolution, WebhookOutcome},
};

/// Placement-time policy knobs, injected as a snapshot rather than read from a mutable global.
#[derive(Debug, Clone, Default)]
pub struct PlacementPolicy {
    /// COD orders are refused at or after this IST wall-clock time. `None` disables the cutoff.
    pub cod_cutoff: Option<NaiveTime>,
}

/// `PaymentFlowApi` is the entry point for order placement: the COD path, the online-payment path with its
/// asynchronous gateway confirmation, and the client's reconciliation poll.
///
/// Two invariants shape this code. The gateway is always called *before* any local transaction is opened, so a slow
/// gateway can never hold database locks. And the webhook path is idempotent end-to-end: re-delivery of a success
/// event is a no-op that still reports success.
pub struct PaymentFlowApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
    areas: ServiceAreas,
    policy: PlacementPolicy,
}

impl<B, G> Debug for PaymentFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi")
    }
}

impl<B, G> PaymentFlowApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers, areas: ServiceAreas, policy: PlacementPolicy) -> Self {
        Self { db, gateway, producers, areas, policy }
    }
}

impl<B, G> PaymentFlowApi<B, G>
where
    B: MarketplaceDatabase,
    G: PaymentGateway,
{
    /// Places a cash-on-delivery order. No gateway round-trip: the payment log (`NOT_COLLECTED`) and the live order
    /// are created in one atomic step, and the restaurant is alerted after the commit.
    pub async fn place_cod_order(
        &self,
        order: NewOrder,
        now: DateTime<Utc>,
    ) -> Result<(LiveOrder, PaymentLog), OrderFlowError> {
        self.validate_order(&order).await?;
        if let Some(cutoff) = self.policy.cod_cutoff {
            if is_after_cutoff_ist(now, cutoff) {
                return Err(OrderFlowError::CodCutoffPassed(cutoff));
            }
        }
        let payment =
            NewPayment::cod(order.customer_id, order.total_price, new_transaction_ref(now), new_merchant_ref(now));
        let (live, log) = self.db.create_cod_order(payment, order, new_ticket(), new_otp()).await?;
        info!("🔄️💰️ COD order {} placed (payment {})", live.ticket, log.merchant_ref);
        self.publish_new_order(&live).await;
        Ok((live, log))
    }

    /// Starts the online-payment path: request a gateway order *first*, then atomically record the pending payment
    /// and its draft. The returned handoff credentials let the client open the gateway's payment sheet; the draft
    /// is promoted later, when the gateway webhook lands.
    pub async fn initiate_online_payment(
        &self,
        order: NewOrder,
        now: DateTime<Utc>,
    ) -> Result<OnlineHandoff, OrderFlowError> {
        self.validate_order(&order).await?;
        let merchant_ref = new_merchant_ref(now);
        // External call before any local transaction. A gateway failure aborts the attempt with no state created.
        let gateway_order = self.gateway.create_order(order.total_price, &merchant_ref).await?;
        let payment = NewPayment::online(order.customer_id, order.total_price, new_transaction_ref(now), merchant_ref)
            .with_gateway(gateway_order.gateway_order_id.clone(), gateway_order.token.clone());
        let log = self.db.create_pending_payment(payment).await?;
        let draft = self.db.create_draft_order(log.id, order, new_ticket(), new_otp()).await?;
        info!("🔄️💰️ Online payment {} initiated, draft {} awaiting confirmation", log.merchant_ref, draft.ticket);
        Ok(OnlineHandoff {
            payment_id: log.id,
            draft_id: draft.id,
            merchant_ref: log.merchant_ref,
            gateway_order_id: gateway_order.gateway_order_id,
            gateway_token: gateway_order.token,
            amount: log.amount,
        })
    }

    /// Applies an authenticated gateway webhook. Safe to replay: every outcome acknowledges the delivery.
    pub async fn handle_gateway_event(&self, event: GatewayEvent) -> Result<WebhookOutcome, OrderFlowError> {
        trace!("🔄️💰️ Gateway event for {}: {}", event.merchant_ref, event.raw_state);
        let outcome = self.db.apply_gateway_event(&event).await?;
        if let WebhookOutcome::Promoted(order) = &outcome {
            self.publish_new_order(order).await;
        }
        Ok(outcome)
    }

    /// The client's polling query. Payment-exists-but-no-order-yet reports pending, never an error.
    pub async fn payment_status(&self, merchant_ref: &str) -> Result<PaymentResolution, OrderFlowError> {
        let resolution = self.db.payment_resolution(merchant_ref).await?;
        Ok(resolution)
    }

    /// Expires drafts that never received a confirmation. Driven by the background worker.
    pub async fn expire_stale_drafts(&self, ttl: Duration) -> Result<Vec<DraftOrder>, OrderFlowError> {
        let expired = self.db.expire_stale_drafts(ttl).await?;
        if !expired.is_empty() {
            info!("🔄️💰️ {} drafts expired after waiting {}h for payment", expired.len(), ttl.num_hours());
        }
        Ok(expired)
    }

    /// Validation happens before any persistence write. The geofence gate: the delivery address must sit inside a
    /// (buffered) service area, and the restaurant inside the same exact polygon.
    async fn validate_order(&self, order: &NewOrder) -> Result<(), OrderFlowError> {
        if order.lines.is_empty() {
            return Err(MarketplaceError::EmptyOrder.into());
        }
        if order.total_price.value() <= 0 {
            return Err(OrderFlowError::Validation("order total must be positive".to_string()));
        }
        self.db
            .fetch_customer(order.customer_id)
            .await?
            .ok_or(MarketplaceError::CustomerNotFound(order.customer_id))?;
        let address = self.db.fetch_customer_address(order.customer_id, order.location_index).await?.ok_or(
            MarketplaceError::AddressNotFound { customer_id: order.customer_id, location_index: order.location_index },
        )?;
        let area = self.areas.match_area(&address.point()).ok_or(OrderFlowError::OutOfServiceArea)?;
        let hotel = self.db.fetch_hotel(order.hotel_id).await?.ok_or(MarketplaceError::HotelNotFound(order.hotel_id))?;
        if !area.contains(&hotel.point()) {
            return Err(OrderFlowError::HotelOutsideZone);
        }
        let ids: Vec<i64> = order.lines.iter().map(|l| l.listing_id).collect();
        let listings = self.db.fetch_listings(&ids).await?;
        for line in &order.lines {
            if line.quantity <= 0 {
                return Err(OrderFlowError::Validation("line quantities must be positive".to_string()));
            }
            let listing = listings
                .iter()
                .find(|l| l.id == line.listing_id)
                .ok_or(MarketplaceError::ListingNotFound(line.listing_id))?;
            if listing.hotel_id != order.hotel_id {
                return Err(OrderFlowError::Validation(format!(
                    "listing {} does not belong to restaurant {}",
                    line.listing_id, order.hotel_id
                )));
            }
        }
        Ok(())
    }

    async fn publish_new_order(&self, order: &LiveOrder) {
        for producer in &self.producers.new_order_producers {
            producer.publish_event(NewOrderEvent::new(order.clone())).await;
        }
    }
}
