//! The full delivery lifecycle: COD placement, kitchen progress, pickup gating, OTP-checked completion and the
//! single-representation invariant across Live → Past.
mod common;

use chrono::Utc;
use common::{setup, telemetry};
use tfn_common::Paise;
use tiffin_engine::{
    db_types::{OrderStatus, PaymentMode, PaymentStatus, RestaurantStatus, RiderActivity},
    traits::MarketplaceError,
    OrderFlowError,
    OrderManagement,
    RiderManagement,
};

#[tokio::test]
async fn cod_placement_creates_payment_and_live_order() {
    let world = setup().await;
    let payments = world.payment_flow();

    let mut order = world.standard_order();
    order.lines.truncate(1);
    order.lines[0].quantity = 2;
    order.total_price = Paise::from_rupees(250);
    let (live, log) = payments.place_cod_order(order, Utc::now()).await.expect("COD placement failed");

    assert_eq!(live.status, OrderStatus::Pending);
    assert_eq!(live.restaurant_status, RestaurantStatus::Preparing);
    assert_eq!(live.total_price, Paise::from_rupees(250));
    assert_eq!(log.mode, PaymentMode::Cod);
    assert_eq!(log.status, PaymentStatus::NotCollected);
    assert_eq!(log.amount, Paise::from_rupees(250));
    assert!((100_000..1_000_000).contains(&live.otp), "OTP must be six digits");
}

#[tokio::test]
async fn pickup_is_gated_on_kitchen_ready() {
    let world = setup().await;
    let payments = world.payment_flow();
    let flow = world.order_flow();

    let (order, _) = payments.place_cod_order(world.standard_order(), Utc::now()).await.unwrap();
    flow.restaurant_accept(order.id, 20).await.unwrap();
    flow.restaurant_almost_ready(order.id).await.unwrap();
    flow.claim_order(world.rider.id, order.id, telemetry()).await.unwrap();
    flow.reached_restaurant(world.rider.id, "https://img.example/selfie.jpg").await.unwrap();

    // The kitchen is ALMOST_READY, not READY: pickup must be denied as a business rule, not a conflict.
    let denied = flow.confirm_pickup(world.rider.id, order.id).await;
    assert!(matches!(denied, Err(OrderFlowError::Database(MarketplaceError::OrderNotReady(_)))));

    flow.restaurant_ready(order.id).await.unwrap();
    let picked = flow.confirm_pickup(world.rider.id, order.id).await.unwrap();
    assert_eq!(picked.status, OrderStatus::Pickedup);
    assert!(picked.served_at.is_some(), "READY must have stamped served_at");
}

#[tokio::test]
async fn completion_requires_exact_otp_and_archives_atomically() {
    let world = setup().await;
    let payments = world.payment_flow();
    let flow = world.order_flow();

    let (order, log) = payments.place_cod_order(world.standard_order(), Utc::now()).await.unwrap();
    flow.restaurant_accept(order.id, 20).await.unwrap();
    flow.restaurant_almost_ready(order.id).await.unwrap();
    flow.claim_order(world.rider.id, order.id, telemetry()).await.unwrap();
    flow.restaurant_ready(order.id).await.unwrap();
    flow.confirm_pickup(world.rider.id, order.id).await.unwrap();
    flow.confirm_drop(world.rider.id, order.id).await.unwrap();
    assert_eq!(flow.rider_activity(world.rider.id).await.unwrap(), RiderActivity::Drop);

    // Wrong OTP: refused, nothing archived.
    let wrong = flow.complete_order(world.rider.id, order.id, order.otp + 1).await;
    assert!(matches!(wrong, Err(OrderFlowError::Database(MarketplaceError::OtpMismatch(_)))));
    assert!(world.db.fetch_live_order(order.id).await.unwrap().is_some());

    // The archive snapshots prices as of the delivery moment, decoupled from later catalog edits.
    let past = flow.complete_order(world.rider.id, order.id, order.otp).await.expect("completion failed");
    assert_eq!(past.status, OrderStatus::Delivered);
    assert!(past.delivered_at.is_some());
    assert_eq!(past.addr_title, "Home");

    // Single representation: the live row is gone, the past row exists.
    assert!(world.db.fetch_live_order(order.id).await.unwrap().is_none());
    let items = world.db.fetch_past_order_items(past.id).await.unwrap();
    assert_eq!(items.len(), 2);
    let thali = items.iter().find(|i| i.name == "Special Thali").unwrap();
    assert_eq!(thali.unit_price, Paise::from_rupees(120));
    assert_eq!(thali.quantity, 2);

    // COD cash changed hands at the door.
    let paid = world.db.fetch_payment(log.id).await.unwrap().unwrap();
    assert_eq!(paid.status, PaymentStatus::Success);

    // The rider is free again.
    let rider = world.db.fetch_rider(world.rider.id).await.unwrap().unwrap();
    assert!(rider.is_available);
    assert_eq!(rider.serving_order, None);
    assert_eq!(flow.rider_activity(world.rider.id).await.unwrap(), RiderActivity::Empty);
}

#[tokio::test]
async fn cancellation_archives_with_reason_and_frees_the_rider() {
    let world = setup().await;
    let payments = world.payment_flow();
    let flow = world.order_flow();

    let (order, _) = payments.place_cod_order(world.standard_order(), Utc::now()).await.unwrap();
    flow.restaurant_accept(order.id, 10).await.unwrap();
    flow.restaurant_almost_ready(order.id).await.unwrap();
    flow.claim_order(world.rider.id, order.id, telemetry()).await.unwrap();

    let past = flow.cancel_order(order.id, OrderStatus::Rejected, "kitchen ran out of stock").await.unwrap();
    assert_eq!(past.status, OrderStatus::Rejected);
    assert_eq!(past.reason.as_deref(), Some("kitchen ran out of stock"));
    assert!(world.db.fetch_live_order(order.id).await.unwrap().is_none());
    let rider = world.db.fetch_rider(world.rider.id).await.unwrap().unwrap();
    assert!(rider.is_available);

    // Terminal means terminal: a delivered/cancelled order can no longer be cancelled.
    let gone = flow.cancel_order(order.id, OrderStatus::Cancelled, "too late").await;
    assert!(matches!(gone, Err(OrderFlowError::Database(MarketplaceError::OrderNotFound(_)))));
}

#[tokio::test]
async fn geofence_rejects_out_of_area_placement() {
    let world = setup().await;
    let payments = world.payment_flow();

    // Second address far outside the service polygon.
    world
        .db
        .add_customer_address(world.customer.id, "Farm", 21.5000, 80.5000, None, None, None, false)
        .await
        .unwrap();
    let mut order = world.standard_order();
    order.location_index = 1;
    let rejected = payments.place_cod_order(order, Utc::now()).await;
    assert!(matches!(rejected, Err(OrderFlowError::OutOfServiceArea)));
}
