//! `SqliteDatabase` is a concrete implementation of a Tiffin engine backend.
//!
//! It implements all the traits defined in the [`crate::traits`] module on top of sqlx/SQLite. SQLite serialises
//! writers, which is exactly what the rider-claim compare-and-swap relies on: the conditional UPDATE in
//! [`db::orders::try_claim`] can only return a row to one of any number of racing callers.
use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;
use sqlx::SqlitePool;
use tfn_common::Paise;

use super::db::{self, drafts, orders, parties, payments, riders, settlements};
use crate::{
    db_types::{
        ClaimTelemetry,
        Customer,
        CustomerAddress,
        DraftOrder,
        DraftStatus,
        Hotel,
        Listing,
        LiveOrder,
        NewOrder,
        NewPayment,
        NewSettlement,
        OrderStatus,
        PastOrder,
        PastOrderItem,
        PaymentLog,
        PaymentStatus,
        RestaurantStatus,
        Rider,
        RiderMetaData,
        Settlement,
        SettlementProof,
    },
    helpers::SettlementWindow,
    traits::{
        BlockStatus,
        GatewayEvent,
        GatewayFinalState,
        MarketplaceDatabase,
        MarketplaceError,
        OrderLineView,
        OrderManagement,
        PaymentResolution,
        RiderManagement,
        SettlementManagement,
        TokenManagement,
        TokenOwner,
        UnsettledOrder,
        WebhookOutcome,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, MarketplaceError> {
        let pool = db::new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    //----------------------------------- Party bootstrap (admin/import surface) -----------------------------------

    pub async fn create_customer(&self, name: &str, phone: &str) -> Result<Customer, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        parties::insert_customer(name, phone, &mut conn).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn add_customer_address(
        &self,
        customer_id: i64,
        title: &str,
        latitude: f64,
        longitude: f64,
        house_no: Option<&str>,
        building: Option<&str>,
        landmark: Option<&str>,
        is_default: bool,
    ) -> Result<CustomerAddress, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        // The address book is frozen while an order is in flight. The delivery-address snapshot taken at archive
        // time indexes into it, so a reshuffle mid-delivery would corrupt history.
        let live = orders::live_orders_for_customer(customer_id, &mut conn).await?;
        if !live.is_empty() {
            return Err(MarketplaceError::AddressLocked(customer_id));
        }
        parties::insert_address(customer_id, title, latitude, longitude, house_no, building, landmark, is_default, &mut conn)
            .await
    }

    pub async fn create_hotel(
        &self,
        name: &str,
        phone: &str,
        address: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<Hotel, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        parties::insert_hotel(name, phone, address, latitude, longitude, &mut conn).await
    }

    pub async fn create_listing(&self, hotel_id: i64, name: &str, price: Paise) -> Result<Listing, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        parties::insert_listing(hotel_id, name, price, &mut conn).await
    }

    pub async fn create_rider(
        &self,
        name: &str,
        phone: &str,
        deposit_amount: Paise,
    ) -> Result<Rider, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        parties::insert_rider(name, phone, deposit_amount, &mut conn).await
    }

    /// Turns off `is_serving` for every hotel. Returns how many were serving.
    pub async fn reset_all_serving(&self) -> Result<u64, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        parties::reset_all_serving(&mut conn).await
    }
}

impl MarketplaceDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn create_cod_order(
        &self,
        payment: NewPayment,
        order: NewOrder,
        ticket: i64,
        otp: i64,
    ) -> Result<(LiveOrder, PaymentLog), MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let log = payments::insert_payment(payment, &mut tx).await?;
        let live = orders::insert_live_order(&order, ticket, otp, log.id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ COD order {} created with payment {}", live.ticket, log.merchant_ref);
        Ok((live, log))
    }

    async fn create_pending_payment(&self, payment: NewPayment) -> Result<PaymentLog, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let log = payments::insert_payment(payment, &mut conn).await?;
        debug!("🗃️ Online payment {} stored as PENDING", log.merchant_ref);
        Ok(log)
    }

    async fn create_draft_order(
        &self,
        payment_id: i64,
        order: NewOrder,
        ticket: i64,
        otp: i64,
    ) -> Result<DraftOrder, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let draft = drafts::insert_draft(payment_id, &order, ticket, otp, &mut tx).await?;
        tx.commit().await?;
        Ok(draft)
    }

    async fn apply_gateway_event(&self, event: &GatewayEvent) -> Result<WebhookOutcome, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::fetch_by_ref_or_gateway_id(&event.merchant_ref, &event.gateway_order_id, &mut tx)
            .await?
            .ok_or_else(|| MarketplaceError::PaymentNotFound(event.merchant_ref.clone()))?;

        match event.final_state() {
            GatewayFinalState::Pending => {
                payments::record_gateway_state(payment.id, &event.raw_state, &mut tx).await?;
                tx.commit().await?;
                Ok(WebhookOutcome::Ignored)
            },
            GatewayFinalState::Failed => {
                payments::transition_status(
                    payment.id,
                    PaymentStatus::Pending,
                    PaymentStatus::Failure,
                    Some(&event.raw_state),
                    &mut tx,
                )
                .await?;
                drafts::mark_failed_by_payment(payment.id, &mut tx).await?;
                tx.commit().await?;
                info!("🗃️ Payment {} marked FAILURE from gateway state {}", payment.merchant_ref, event.raw_state);
                Ok(WebhookOutcome::PaymentFailed)
            },
            GatewayFinalState::Completed => {
                // Duplicate delivery: the live order already exists. Refresh the payment and acknowledge.
                if let Some(live) = orders::fetch_live_order_by_payment(payment.id, &mut tx).await? {
                    payments::transition_status(
                        payment.id,
                        PaymentStatus::Pending,
                        PaymentStatus::Success,
                        Some(&event.raw_state),
                        &mut tx,
                    )
                    .await?;
                    payments::record_gateway_state(payment.id, &event.raw_state, &mut tx).await?;
                    tx.commit().await?;
                    debug!("🗃️ Webhook replay for payment {}: live order {} already exists", payment.merchant_ref, live.id);
                    return Ok(WebhookOutcome::AlreadyPromoted(live.id));
                }
                // Claim the draft before creating anything.
                let Some(draft) = drafts::claim_draft(payment.id, &mut tx).await? else {
                    let maybe = drafts::fetch_draft_by_payment(payment.id, &mut tx).await?;
                    let outcome = match maybe {
                        Some(d) if d.status == DraftStatus::Created => {
                            // Promoted and already delivered: the order lives in the archive now.
                            payments::record_gateway_state(payment.id, &event.raw_state, &mut tx).await?;
                            match orders::fetch_past_order_by_payment(payment.id, &mut tx).await? {
                                Some(past) => WebhookOutcome::AlreadyPromoted(past.id),
                                None => WebhookOutcome::Unclaimable,
                            }
                        },
                        _ => {
                            warn!("🗃️ Payment {} succeeded but its draft is not claimable", payment.merchant_ref);
                            WebhookOutcome::Unclaimable
                        },
                    };
                    tx.commit().await?;
                    return Ok(outcome);
                };
                let lines = drafts::draft_lines(draft.id, &mut tx).await?;
                let order = NewOrder {
                    customer_id: draft.customer_id,
                    hotel_id: draft.hotel_id,
                    location_index: draft.location_index,
                    lines,
                    total_price: draft.total_price,
                    remarks: draft.remarks.clone(),
                };
                let live = orders::insert_live_order(&order, draft.ticket.0, draft.otp, payment.id, &mut tx).await?;
                drafts::set_draft_status(draft.id, DraftStatus::Created, &mut tx).await?;
                payments::transition_status(
                    payment.id,
                    PaymentStatus::Pending,
                    PaymentStatus::Success,
                    Some(&event.raw_state),
                    &mut tx,
                )
                .await?;
                tx.commit().await?;
                info!("🗃️ Draft {} promoted to live order {} for payment {}", draft.id, live.id, payment.merchant_ref);
                Ok(WebhookOutcome::Promoted(live))
            },
        }
    }

    async fn payment_resolution(&self, merchant_ref: &str) -> Result<PaymentResolution, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_by_merchant_ref(merchant_ref, &mut conn)
            .await?
            .ok_or_else(|| MarketplaceError::PaymentNotFound(merchant_ref.to_string()))?;
        match payment.status {
            PaymentStatus::Failure => Ok(PaymentResolution::Failed),
            PaymentStatus::Pending => Ok(PaymentResolution::Pending),
            PaymentStatus::Success | PaymentStatus::NotCollected => {
                if let Some(live) = orders::fetch_live_order_by_payment(payment.id, &mut conn).await? {
                    Ok(PaymentResolution::Succeeded { order_id: live.id })
                } else if let Some(past) = orders::fetch_past_order_by_payment(payment.id, &mut conn).await? {
                    Ok(PaymentResolution::Succeeded { order_id: past.id })
                } else {
                    // The payment settled but the promotion has not landed yet. Pending, not an error.
                    Ok(PaymentResolution::Pending)
                }
            },
        }
    }

    async fn expire_stale_drafts(&self, ttl: Duration) -> Result<Vec<DraftOrder>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        drafts::expire_stale(ttl, &mut conn).await
    }

    async fn restaurant_accept(&self, order_id: i64, preparation_minutes: i64) -> Result<LiveOrder, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        match orders::restaurant_accept(order_id, preparation_minutes, &mut conn).await? {
            Some(order) => Ok(order),
            None => match orders::fetch_live_order(order_id, &mut conn).await? {
                None => Err(MarketplaceError::OrderNotFound(order_id)),
                Some(o) => Err(MarketplaceError::InvalidStatusChange {
                    order_id,
                    from: o.status.to_string(),
                    to: OrderStatus::Preparing.to_string(),
                }),
            },
        }
    }

    async fn advance_restaurant_status(
        &self,
        order_id: i64,
        to: RestaurantStatus,
    ) -> Result<LiveOrder, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        match orders::advance_restaurant_status(order_id, to, &mut conn).await? {
            Some(order) => Ok(order),
            None => match orders::fetch_live_order(order_id, &mut conn).await? {
                None => Err(MarketplaceError::OrderNotFound(order_id)),
                Some(o) => Err(MarketplaceError::InvalidStatusChange {
                    order_id,
                    from: o.restaurant_status.to_string(),
                    to: to.to_string(),
                }),
            },
        }
    }

    async fn claim_order(
        &self,
        rider_id: i64,
        order_id: i64,
        telemetry: ClaimTelemetry,
    ) -> Result<LiveOrder, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        match orders::try_claim(rider_id, order_id, &mut tx).await? {
            Some(mut order) => {
                if order.rider_meta_id.is_none() {
                    let meta = riders::insert_meta(rider_id, &telemetry, &mut tx).await?;
                    order = orders::set_rider_meta(order.id, meta.id, &mut tx).await?;
                }
                tx.commit().await?;
                debug!("🗃️ Rider {rider_id} won the claim on order {order_id}");
                Ok(order)
            },
            None => {
                let existing = orders::fetch_live_order(order_id, &mut tx).await?;
                tx.rollback().await?;
                match existing {
                    None => Err(MarketplaceError::OrderNotFound(order_id)),
                    Some(o) if o.rider_id.is_some() && o.rider_id != Some(rider_id) => {
                        debug!("🗃️ Rider {rider_id} lost the claim on order {order_id} to rider {:?}", o.rider_id);
                        Err(MarketplaceError::OrderAlreadyClaimed(order_id))
                    },
                    // Re-claiming after having moved past ACCEPTED is a forward-transition violation, not a claim.
                    Some(o) if o.rider_id == Some(rider_id) => Err(MarketplaceError::InvalidStatusChange {
                        order_id,
                        from: o.status.to_string(),
                        to: OrderStatus::Accepted.to_string(),
                    }),
                    Some(_) => Err(MarketplaceError::OrderNotBiddable(order_id)),
                }
            },
        }
    }

    async fn record_reached_restaurant(
        &self,
        rider_id: i64,
        selfie_url: &str,
    ) -> Result<RiderMetaData, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let order = riders::fetch_serving_order(rider_id, &mut conn)
            .await?
            .ok_or(MarketplaceError::RiderMetaNotFound(rider_id))?;
        let meta_id = order.rider_meta_id.ok_or(MarketplaceError::RiderMetaNotFound(rider_id))?;
        riders::set_selfie(meta_id, selfie_url, &mut conn)
            .await?
            .ok_or(MarketplaceError::RiderMetaNotFound(rider_id))
    }

    async fn confirm_pickup(&self, rider_id: i64, order_id: i64) -> Result<LiveOrder, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        match orders::confirm_pickup(rider_id, order_id, &mut tx).await? {
            Some(order) => {
                if let Some(meta_id) = order.rider_meta_id {
                    riders::stamp_meta(meta_id, riders::MetaStamp::PickupConfirmed, &mut tx).await?;
                }
                tx.commit().await?;
                Ok(order)
            },
            None => {
                let existing = orders::fetch_live_order(order_id, &mut tx).await?;
                tx.rollback().await?;
                match existing {
                    None => Err(MarketplaceError::OrderNotFound(order_id)),
                    // The pickup gate outranks everything else: not-READY is a business-rule denial, not a race.
                    Some(o) if o.restaurant_status != RestaurantStatus::Ready => {
                        Err(MarketplaceError::OrderNotReady(order_id))
                    },
                    Some(o) if o.rider_id != Some(rider_id) => Err(MarketplaceError::OrderAlreadyClaimed(order_id)),
                    Some(o) => Err(MarketplaceError::InvalidStatusChange {
                        order_id,
                        from: o.status.to_string(),
                        to: OrderStatus::Pickedup.to_string(),
                    }),
                }
            },
        }
    }

    async fn confirm_drop(&self, rider_id: i64, order_id: i64) -> Result<LiveOrder, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        match orders::confirm_drop(rider_id, order_id, &mut tx).await? {
            Some(order) => {
                if let Some(meta_id) = order.rider_meta_id {
                    riders::stamp_meta(meta_id, riders::MetaStamp::Drop, &mut tx).await?;
                }
                tx.commit().await?;
                Ok(order)
            },
            None => {
                let existing = orders::fetch_live_order(order_id, &mut tx).await?;
                tx.rollback().await?;
                match existing {
                    None => Err(MarketplaceError::OrderNotFound(order_id)),
                    Some(o) if o.rider_id != Some(rider_id) => Err(MarketplaceError::OrderAlreadyClaimed(order_id)),
                    Some(o) => Err(MarketplaceError::InvalidStatusChange {
                        order_id,
                        from: o.status.to_string(),
                        to: OrderStatus::Drop.to_string(),
                    }),
                }
            },
        }
    }

    async fn complete_order(&self, rider_id: i64, order_id: i64, otp: i64) -> Result<PastOrder, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_live_order(order_id, &mut tx)
            .await?
            .ok_or(MarketplaceError::OrderNotFound(order_id))?;
        if order.rider_id != Some(rider_id) {
            return Err(MarketplaceError::OrderAlreadyClaimed(order_id));
        }
        // Exact numeric comparison. "0482193" parses to 482193 upstream; anything that is not the stored number
        // is a refusal.
        if order.otp != otp {
            return Err(MarketplaceError::OtpMismatch(order_id));
        }
        let address = parties::fetch_address(order.customer_id, order.location_index, &mut tx).await?.ok_or(
            MarketplaceError::AddressNotFound { customer_id: order.customer_id, location_index: order.location_index },
        )?;
        let lines = orders::archived_lines(order.id, &mut tx).await?;
        let delivered_at = Utc::now();
        let past =
            orders::insert_past_from_live(&order, OrderStatus::Delivered, None, &address, &lines, Some(delivered_at), &mut tx)
                .await?;
        // COD cash changes hands at the door. Online payments are already SUCCESS and the condition does not match.
        payments::transition_status(order.payment_id, PaymentStatus::NotCollected, PaymentStatus::Success, None, &mut tx)
            .await?;
        orders::delete_live_order(order.id, &mut tx).await?;
        riders::free_rider(rider_id, &mut tx).await?;
        if let Some(meta_id) = order.rider_meta_id {
            riders::stamp_meta(meta_id, riders::MetaStamp::Delivered, &mut tx).await?;
        }
        tx.commit().await?;
        info!("🗃️ Order {} delivered by rider {rider_id} and archived as past order {}", order.ticket, past.id);
        Ok(past)
    }

    async fn cancel_order(&self, order_id: i64, to: OrderStatus, reason: &str) -> Result<PastOrder, MarketplaceError> {
        if !matches!(to, OrderStatus::Cancelled | OrderStatus::Rejected) {
            return Err(MarketplaceError::InvalidStatusChange {
                order_id,
                from: "any".to_string(),
                to: to.to_string(),
            });
        }
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_live_order(order_id, &mut tx)
            .await?
            .ok_or(MarketplaceError::OrderNotFound(order_id))?;
        let address = parties::fetch_address(order.customer_id, order.location_index, &mut tx).await?.ok_or(
            MarketplaceError::AddressNotFound { customer_id: order.customer_id, location_index: order.location_index },
        )?;
        let lines = orders::archived_lines(order.id, &mut tx).await?;
        let past = orders::insert_past_from_live(&order, to, Some(reason), &address, &lines, None, &mut tx).await?;
        orders::delete_live_order(order.id, &mut tx).await?;
        if let Some(rider_id) = order.rider_id {
            riders::free_rider(rider_id, &mut tx).await?;
        }
        tx.commit().await?;
        info!("🗃️ Order {} archived as {to} ({reason})", order.ticket);
        Ok(past)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_live_order(&self, order_id: i64) -> Result<Option<LiveOrder>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_live_order(order_id, &mut conn).await
    }

    async fn fetch_live_orders_for_customer(&self, customer_id: i64) -> Result<Vec<LiveOrder>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        orders::live_orders_for_customer(customer_id, &mut conn).await
    }

    async fn fetch_live_orders_for_hotel(&self, hotel_id: i64) -> Result<Vec<LiveOrder>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        orders::live_orders_for_hotel(hotel_id, &mut conn).await
    }

    async fn fetch_past_orders_for_customer(&self, customer_id: i64) -> Result<Vec<PastOrder>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        orders::past_orders_for_customer(customer_id, &mut conn).await
    }

    async fn fetch_biddable_orders(&self) -> Result<Vec<LiveOrder>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        orders::biddable_orders(&mut conn).await
    }

    async fn fetch_order_lines(&self, order_id: i64) -> Result<Vec<OrderLineView>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        orders::order_lines(order_id, &mut conn).await
    }

    async fn fetch_past_order_items(&self, order_id: i64) -> Result<Vec<PastOrderItem>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        orders::past_order_items(order_id, &mut conn).await
    }

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<PaymentLog>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_payment(payment_id, &mut conn).await
    }

    async fn fetch_payment_by_merchant_ref(&self, merchant_ref: &str) -> Result<Option<PaymentLog>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        payments::fetch_by_merchant_ref(merchant_ref, &mut conn).await
    }

    async fn fetch_customer(&self, customer_id: i64) -> Result<Option<Customer>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        parties::fetch_customer(customer_id, &mut conn).await
    }

    async fn fetch_customer_address(
        &self,
        customer_id: i64,
        location_index: i64,
    ) -> Result<Option<CustomerAddress>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        parties::fetch_address(customer_id, location_index, &mut conn).await
    }

    async fn fetch_hotel(&self, hotel_id: i64) -> Result<Option<Hotel>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        parties::fetch_hotel(hotel_id, &mut conn).await
    }

    async fn fetch_serving_hotels(&self) -> Result<Vec<Hotel>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        parties::serving_hotels(&mut conn).await
    }

    async fn fetch_listings(&self, ids: &[i64]) -> Result<Vec<Listing>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        parties::in_stock_listings(ids, &mut conn).await
    }
}

impl RiderManagement for SqliteDatabase {
    async fn fetch_rider(&self, rider_id: i64) -> Result<Option<Rider>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        riders::fetch_rider(rider_id, &mut conn).await
    }

    async fn fetch_serving_order(&self, rider_id: i64) -> Result<Option<LiveOrder>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        riders::fetch_serving_order(rider_id, &mut conn).await
    }

    async fn fetch_latest_meta(&self, rider_id: i64) -> Result<Option<RiderMetaData>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        riders::latest_meta_for_rider(rider_id, &mut conn).await
    }

    async fn mark_rider_serving(&self, rider_id: i64, order_id: i64) -> Result<(), MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        riders::mark_serving(rider_id, order_id, &mut conn).await
    }

    async fn toggle_duty(&self, rider_id: i64) -> Result<Rider, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let rider =
            riders::fetch_rider(rider_id, &mut conn).await?.ok_or(MarketplaceError::RiderNotFound(rider_id))?;
        if rider.is_blocked && !rider.on_duty {
            return Err(MarketplaceError::RiderBlocked(rider_id));
        }
        riders::toggle_duty(rider_id, &mut conn).await?.ok_or(MarketplaceError::RiderNotFound(rider_id))
    }

    async fn unsettled_cod_total(&self, rider_id: i64) -> Result<Paise, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        riders::unsettled_cod_total(rider_id, &mut conn).await
    }

    async fn unsettled_cod_orders(&self, rider_id: i64) -> Result<Vec<UnsettledOrder>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        riders::unsettled_cod_orders(rider_id, &mut conn).await
    }

    async fn recompute_block(&self, rider_id: i64) -> Result<BlockStatus, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let rider =
            riders::fetch_rider(rider_id, &mut conn).await?.ok_or(MarketplaceError::RiderNotFound(rider_id))?;
        let outstanding = riders::unsettled_cod_total(rider_id, &mut conn).await?;
        // Blocked at >= 95% of the deposit. Scaled integer compare, no floats.
        let blocked =
            rider.deposit_amount.value() > 0 && outstanding.value() * 100 >= rider.deposit_amount.value() * 95;
        riders::set_blocked(rider_id, blocked, &mut conn).await?;
        if blocked != rider.is_blocked {
            info!("🗃️ Rider {rider_id} block flag now {blocked} (outstanding {outstanding})");
        }
        Ok(BlockStatus { blocked, outstanding, deposit_amount: rider.deposit_amount })
    }

    async fn set_blocked(&self, rider_id: i64, blocked: bool) -> Result<Rider, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        if blocked {
            // You cannot block someone currently holding an order. The live set is authoritative here, not the
            // rider's own serving_order field.
            if riders::fetch_serving_order(rider_id, &mut conn).await?.is_some() {
                return Err(MarketplaceError::RiderOnDelivery(rider_id));
            }
        }
        riders::set_blocked(rider_id, blocked, &mut conn).await?.ok_or(MarketplaceError::RiderNotFound(rider_id))
    }

    async fn settle_rider_cod(&self, rider_id: i64, admin_id: i64) -> Result<u64, MarketplaceError> {
        let mut tx = self.pool.begin().await?;
        let count = payments::settle_cod_for_rider(rider_id, admin_id, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ {count} COD payments settled for rider {rider_id} by admin {admin_id}");
        Ok(count)
    }
}

impl SettlementManagement for SqliteDatabase {
    async fn hotel_ids(&self) -> Result<Vec<i64>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        parties::hotel_ids(&mut conn).await
    }

    async fn settlement_exists(&self, hotel_id: i64, window: &SettlementWindow) -> Result<bool, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        settlements::settlement_exists(hotel_id, window, &mut conn).await
    }

    async fn delivered_orders_in_window(
        &self,
        hotel_id: i64,
        window: &SettlementWindow,
    ) -> Result<Vec<PastOrder>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        settlements::delivered_orders_in_window(hotel_id, window, &mut conn).await
    }

    async fn insert_settlement(&self, settlement: NewSettlement) -> Result<Settlement, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        settlements::insert_settlement(settlement, &mut conn).await
    }

    async fn mark_settlement_paid(
        &self,
        settlement_id: i64,
        admin_id: i64,
        proof: &SettlementProof,
    ) -> Result<Settlement, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        match settlements::mark_paid(settlement_id, admin_id, proof, &mut conn).await? {
            Some(settlement) => Ok(settlement),
            None => match settlements::fetch_settlement(settlement_id, &mut conn).await? {
                None => Err(MarketplaceError::SettlementNotFound(settlement_id)),
                Some(_) => Err(MarketplaceError::SettlementAlreadyPaid(settlement_id)),
            },
        }
    }

    async fn settlements_for_hotel(&self, hotel_id: i64) -> Result<Vec<Settlement>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        settlements::settlements_for_hotel(hotel_id, &mut conn).await
    }
}

impl TokenManagement for SqliteDatabase {
    async fn register_token(&self, owner: TokenOwner, owner_id: i64, token: &str) -> Result<(), MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        parties::register_token(owner, owner_id, token, &mut conn).await
    }

    async fn tokens_for(&self, owner: TokenOwner, owner_id: i64) -> Result<Vec<String>, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        parties::tokens_for(owner, owner_id, &mut conn).await
    }

    async fn prune_tokens(
        &self,
        owner: TokenOwner,
        owner_id: i64,
        invalid: &[String],
    ) -> Result<u64, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        parties::prune_tokens(owner, owner_id, invalid, &mut conn).await
    }

    async fn toggle_notifications(&self, customer_id: i64) -> Result<bool, MarketplaceError> {
        let mut conn = self.pool.acquire().await?;
        let customer = parties::toggle_notifications(customer_id, &mut conn)
            .await?
            .ok_or(MarketplaceError::CustomerNotFound(customer_id))?;
        Ok(customer.notifications_enabled)
    }
}
