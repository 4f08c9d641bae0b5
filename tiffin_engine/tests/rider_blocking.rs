//! The deposit-threshold blocking policy: auto-block at 95% of the deposit, duty/dispatch refusals while blocked,
//! the mid-delivery block guard, and settling cash to lift the block.
mod common;

use chrono::Utc;
use common::{setup, telemetry, TestWorld};
use tfn_common::Paise;
use tiffin_engine::{db_types::NewOrder, helpers::GeoPoint, traits::MarketplaceError, OrderFlowError};

async fn deliver_cod(world: &TestWorld, rider_id: i64, total: Paise) {
    let payments = world.payment_flow();
    let flow = world.order_flow();
    let order_input = NewOrder { total_price: total, ..world.standard_order() };
    let (order, _) = payments.place_cod_order(order_input, Utc::now()).await.unwrap();
    flow.restaurant_accept(order.id, 10).await.unwrap();
    flow.restaurant_almost_ready(order.id).await.unwrap();
    flow.claim_order(rider_id, order.id, telemetry()).await.unwrap();
    flow.restaurant_ready(order.id).await.unwrap();
    flow.confirm_pickup(rider_id, order.id).await.unwrap();
    flow.confirm_drop(rider_id, order.id).await.unwrap();
    flow.complete_order(rider_id, order.id, order.otp).await.unwrap();
}

#[tokio::test]
async fn crossing_the_threshold_blocks_and_settling_unblocks() {
    let world = setup().await;
    let dispatch = world.dispatch();

    // Deposit is ₹2000; ₹1800 of collected cash is below 95%, ₹2000 total is above it.
    deliver_cod(&world, world.rider.id, Paise::from_rupees(1_800)).await;
    let status = dispatch.recompute_block(world.rider.id).await.unwrap();
    assert!(!status.blocked);
    assert_eq!(status.outstanding, Paise::from_rupees(1_800));

    deliver_cod(&world, world.rider.id, Paise::from_rupees(200)).await;
    let status = dispatch.recompute_block(world.rider.id).await.unwrap();
    assert!(status.blocked, "₹2000 of ₹2000 deposit must block");

    // Blocked riders can neither see new orders nor go on duty.
    let refused = dispatch.biddable_orders(world.rider.id, GeoPoint::new(19.95, 79.29)).await;
    assert!(matches!(refused, Err(OrderFlowError::Database(MarketplaceError::RiderBlocked(_)))));
    let duty = dispatch.toggle_duty(world.rider.id).await;
    assert!(matches!(duty, Err(OrderFlowError::Database(MarketplaceError::RiderBlocked(_)))));

    // Depositing the cash clears the exposure and lifts the block.
    let status = dispatch.settle_cod(world.rider.id, 1).await.unwrap();
    assert!(!status.blocked);
    assert_eq!(status.outstanding, Paise::from_rupees(0));
    assert!(dispatch.toggle_duty(world.rider.id).await.is_ok());
}

#[tokio::test]
async fn exactly_ninety_five_percent_blocks() {
    let world = setup().await;
    let dispatch = world.dispatch();
    // 95% of ₹2000 is ₹1900 — meeting the threshold counts as crossing it.
    deliver_cod(&world, world.rider.id, Paise::from_rupees(1_900)).await;
    let status = dispatch.recompute_block(world.rider.id).await.unwrap();
    assert!(status.blocked);
}

#[tokio::test]
async fn a_serving_rider_cannot_be_blocked() {
    let world = setup().await;
    let payments = world.payment_flow();
    let flow = world.order_flow();
    let dispatch = world.dispatch();

    let (order, _) = payments.place_cod_order(world.standard_order(), Utc::now()).await.unwrap();
    flow.restaurant_accept(order.id, 10).await.unwrap();
    flow.restaurant_almost_ready(order.id).await.unwrap();
    flow.claim_order(world.rider.id, order.id, telemetry()).await.unwrap();

    let refused = dispatch.set_blocked(world.rider.id, true).await;
    assert!(matches!(refused, Err(OrderFlowError::Database(MarketplaceError::RiderOnDelivery(_)))));

    // Unblocking is always allowed, even for an off-duty rider.
    assert!(dispatch.set_blocked(world.rival.id, false).await.is_ok());

    // Once the delivery completes, the admin block goes through.
    flow.restaurant_ready(order.id).await.unwrap();
    flow.confirm_pickup(world.rider.id, order.id).await.unwrap();
    flow.confirm_drop(world.rider.id, order.id).await.unwrap();
    flow.complete_order(world.rider.id, order.id, order.otp).await.unwrap();
    assert!(dispatch.set_blocked(world.rider.id, true).await.unwrap().is_blocked);
}

#[tokio::test]
async fn dispatch_lists_ready_orders_with_estimates() {
    let world = setup().await;
    let payments = world.payment_flow();
    let flow = world.order_flow();
    let dispatch = world.dispatch();

    let (order, _) = payments.place_cod_order(world.standard_order(), Utc::now()).await.unwrap();
    // Not yet biddable: PENDING.
    assert!(dispatch.biddable_orders(world.rider.id, GeoPoint::new(19.949, 79.289)).await.unwrap().is_empty());

    flow.restaurant_accept(order.id, 20).await.unwrap();
    flow.restaurant_almost_ready(order.id).await.unwrap();
    let offers = dispatch.biddable_orders(world.rider.id, GeoPoint::new(19.949, 79.289)).await.unwrap();
    assert_eq!(offers.len(), 1);
    let offer = &offers[0];
    assert_eq!(offer.order_id, order.id);
    assert_eq!(offer.hotel_name, "Annapurna Bhojanalay");
    assert!(offer.hotel_distance_m > 0);
    assert!(offer.travel_minutes >= 10);
    assert!(offer.customer_distance_m > 0);

    // Once claimed it disappears from everyone's list.
    flow.claim_order(world.rider.id, order.id, telemetry()).await.unwrap();
    assert!(dispatch.biddable_orders(world.rival.id, GeoPoint::new(19.949, 79.289)).await.unwrap().is_empty());
}
