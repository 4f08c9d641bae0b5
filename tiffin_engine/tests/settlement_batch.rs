//! The weekly settlement batch: window selection, revenue arithmetic and idempotent re-runs.
mod common;

use chrono::{Duration, Utc};
use common::{setup, telemetry};
use tfn_common::Paise;
use tiffin_engine::{
    db_types::{SettlementProof, SettlementStatus},
    helpers::last_settlement_window,
    traits::MarketplaceError,
    OrderFlowError,
};

/// Drives one order through the full lifecycle so a delivered past order exists, then backdates it into the most
/// recently completed settlement week.
async fn deliver_and_backdate(world: &common::TestWorld) -> i64 {
    let payments = world.payment_flow();
    let flow = world.order_flow();
    let (order, _) = payments.place_cod_order(world.standard_order(), Utc::now()).await.unwrap();
    flow.restaurant_accept(order.id, 15).await.unwrap();
    flow.restaurant_almost_ready(order.id).await.unwrap();
    flow.claim_order(world.rider.id, order.id, telemetry()).await.unwrap();
    flow.restaurant_ready(order.id).await.unwrap();
    flow.confirm_pickup(world.rider.id, order.id).await.unwrap();
    flow.confirm_drop(world.rider.id, order.id).await.unwrap();
    let past = flow.complete_order(world.rider.id, order.id, order.otp).await.unwrap();

    let window = last_settlement_window(Utc::now());
    let inside = window.start + Duration::hours(12);
    sqlx::query("UPDATE past_orders SET ordered_at = $1 WHERE id = $2")
        .bind(inside)
        .bind(past.id)
        .execute(world.db.pool())
        .await
        .unwrap();
    past.id
}

#[tokio::test]
async fn weekly_batch_is_idempotent_and_sums_item_lines() {
    let world = setup().await;
    let api = world.settlements();

    deliver_and_backdate(&world).await;
    deliver_and_backdate(&world).await;

    let now = Utc::now();
    let first = api.run_weekly_batch(now).await.unwrap();
    assert_eq!(first.created, 1);
    assert_eq!(first.failed, 0);

    // Re-running the same window creates nothing new.
    let second = api.run_weekly_batch(now).await.unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.skipped, 1);

    let settlements = api.settlements_for_hotel(world.hotel.id).await.unwrap();
    assert_eq!(settlements.len(), 1);
    let s = &settlements[0];
    // Two orders of 2×₹120 + 1×₹65 = ₹305 each, summed from the denormalised item lines.
    assert_eq!(s.total_orders, 2);
    assert_eq!(s.gross_revenue, Paise::from_rupees(610));
    assert_eq!(s.commission_amount, Paise::from_rupees(122));
    assert_eq!(s.tax_on_commission, Paise::from(2_196)); // 18% of ₹122.00
    assert_eq!(s.net_revenue, Paise::from(46_604)); // 61000 - 12200 - 2196
    assert_eq!(s.status, SettlementStatus::Pending);
}

#[tokio::test]
async fn hotels_without_qualifying_orders_are_skipped() {
    let world = setup().await;
    let api = world.settlements();
    // No delivered orders at all: nothing is created, nothing fails.
    let summary = api.run_weekly_batch(Utc::now()).await.unwrap();
    assert_eq!(summary.created, 0);
    assert_eq!(summary.failed, 0);
    assert!(api.settlements_for_hotel(world.hotel.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn marking_paid_is_guarded_against_double_payment() {
    let world = setup().await;
    let api = world.settlements();
    deliver_and_backdate(&world).await;
    api.run_weekly_batch(Utc::now()).await.unwrap();
    let settlement = api.settlements_for_hotel(world.hotel.id).await.unwrap().remove(0);

    let proof = SettlementProof {
        proof_image_url: "https://img.example/payout-receipt.png".to_string(),
        payment_mode: Some("UPI".to_string()),
        remarks: None,
    };
    let paid = api.mark_paid(settlement.id, 1, &proof).await.unwrap();
    assert_eq!(paid.status, SettlementStatus::Paid);
    assert_eq!(paid.paid_by, Some(1));
    assert!(paid.paid_at.is_some());

    // A second admin session racing on the same settlement observes a conflict.
    let again = api.mark_paid(settlement.id, 2, &proof).await;
    assert!(matches!(
        again,
        Err(OrderFlowError::Database(MarketplaceError::SettlementAlreadyPaid(_)))
    ));
}
