use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Rider, RiderActivity},
    helpers::{travel_minutes, GeoPoint, ServiceAreas},
    tfe_api::{
        errors::OrderFlowError,
        order_objects::{BiddableOrder, HotelView},
    },
    traits::{BlockStatus, CollectionReport, MarketplaceError, OrderManagement, RiderManagement, UnsettledOrder},
};

/// `DispatchApi` computes what idle riders see (claimable orders with distance estimates), enforces the
/// deposit-threshold blocking policy at its edges, and serves the geofence-filtered hotel listing.
pub struct DispatchApi<B> {
    db: B,
    areas: ServiceAreas,
}

impl<B> Debug for DispatchApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DispatchApi")
    }
}

impl<B> DispatchApi<B> {
    pub fn new(db: B, areas: ServiceAreas) -> Self {
        Self { db, areas }
    }
}

impl<B> DispatchApi<B>
where B: OrderManagement + RiderManagement
{
    /// Orders an idle rider may bid on, sorted oldest first, with straight-line distance and travel-time estimates.
    /// A blocked rider is refused outright with a reason distinct from ordinary validation failures.
    pub async fn biddable_orders(
        &self,
        rider_id: i64,
        position: GeoPoint,
    ) -> Result<Vec<BiddableOrder>, OrderFlowError> {
        let rider = self.db.fetch_rider(rider_id).await?.ok_or(MarketplaceError::RiderNotFound(rider_id))?;
        if rider.is_blocked {
            return Err(MarketplaceError::RiderBlocked(rider_id).into());
        }
        let orders = self.db.fetch_biddable_orders().await?;
        let mut result = Vec::with_capacity(orders.len());
        for order in orders {
            let Some(hotel) = self.db.fetch_hotel(order.hotel_id).await? else {
                warn!("🛵️ Order {} references missing hotel {}", order.id, order.hotel_id);
                continue;
            };
            let hotel_distance_m = position.distance_m(&hotel.point()).round() as i64;
            // Restaurant → customer leg; zero when the address has gone missing rather than dropping the order.
            let customer_distance_m =
                match self.db.fetch_customer_address(order.customer_id, order.location_index).await? {
                    Some(address) => hotel.point().distance_m(&address.point()).round() as i64,
                    None => {
                        warn!("🛵️ Order {} has no address at index {}", order.id, order.location_index);
                        0
                    },
                };
            result.push(BiddableOrder {
                order_id: order.id,
                ticket: order.ticket,
                hotel_name: hotel.name,
                hotel_address: hotel.address,
                hotel_distance_m,
                travel_minutes: travel_minutes(hotel_distance_m as f64),
                customer_distance_m,
            });
        }
        Ok(result)
    }

    /// Serving hotels inside the service area that exactly contains the customer's coordinate, enriched with
    /// distance and a delivery-time estimate. No area at all is an explicit out-of-service refusal.
    pub async fn serviceable_hotels(&self, position: GeoPoint) -> Result<Vec<HotelView>, OrderFlowError> {
        let area = self.areas.match_area(&position).ok_or(OrderFlowError::OutOfServiceArea)?;
        let hotels = self.db.fetch_serving_hotels().await?;
        let views = hotels
            .into_iter()
            .filter(|h| area.contains(&h.point()))
            .map(|h| {
                let distance_m = position.distance_m(&h.point()).round() as i64;
                HotelView {
                    hotel_id: h.id,
                    name: h.name,
                    address: h.address,
                    distance_m,
                    delivery_minutes: travel_minutes(distance_m as f64),
                }
            })
            .collect();
        Ok(views)
    }

    /// Flips on/off duty. Blocked riders cannot go on duty until they deposit their collected cash.
    pub async fn toggle_duty(&self, rider_id: i64) -> Result<Rider, OrderFlowError> {
        let rider = self.db.toggle_duty(rider_id).await?;
        debug!("🛵️ Rider {rider_id} is now {}", if rider.on_duty { "on duty" } else { "off duty" });
        Ok(rider)
    }

    /// How much cash the rider owes against their deposit.
    pub async fn collection_report(&self, rider_id: i64) -> Result<CollectionReport, OrderFlowError> {
        let rider = self.db.fetch_rider(rider_id).await?.ok_or(MarketplaceError::RiderNotFound(rider_id))?;
        let amount_to_deposit = self.db.unsettled_cod_total(rider_id).await?;
        Ok(CollectionReport { amount_to_deposit, deposit_amount: rider.deposit_amount })
    }

    /// The itemised list behind the collection report, latest delivery first.
    pub async fn unsettled_orders(&self, rider_id: i64) -> Result<Vec<UnsettledOrder>, OrderFlowError> {
        let orders = self.db.unsettled_cod_orders(rider_id).await?;
        Ok(orders)
    }

    /// Re-evaluates the 95%-of-deposit auto-block. Invoked by the post-delivery hook and by admin tooling.
    pub async fn recompute_block(&self, rider_id: i64) -> Result<BlockStatus, OrderFlowError> {
        let status = self.db.recompute_block(rider_id).await?;
        Ok(status)
    }

    /// Admin override: blocking a serving rider is refused; unblocking is always allowed.
    pub async fn set_blocked(&self, rider_id: i64, blocked: bool) -> Result<Rider, OrderFlowError> {
        let rider = self.db.set_blocked(rider_id, blocked).await?;
        info!("🛵️ Admin set rider {rider_id} blocked={blocked}");
        Ok(rider)
    }

    /// Records that the rider deposited their collected COD cash with `admin_id`, then lifts the block if the
    /// remaining exposure allows it.
    pub async fn settle_cod(&self, rider_id: i64, admin_id: i64) -> Result<BlockStatus, OrderFlowError> {
        let count = self.db.settle_rider_cod(rider_id, admin_id).await?;
        debug!("🛵️ {count} COD payments settled for rider {rider_id}");
        let status = self.db.recompute_block(rider_id).await?;
        Ok(status)
    }

    /// Derived projection of what the rider is doing. See [`RiderActivity::derive`].
    pub async fn activity(&self, rider_id: i64) -> Result<RiderActivity, OrderFlowError> {
        let order = self.db.fetch_serving_order(rider_id).await?;
        let meta = self.db.fetch_latest_meta(rider_id).await?;
        Ok(RiderActivity::derive(order.as_ref(), meta.as_ref()))
    }
}
