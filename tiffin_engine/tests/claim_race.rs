//! The exclusive-claim contract under concurrency: of two riders racing for the same order, exactly one wins and
//! the loser observes a conflict it must not retry.
mod common;

use chrono::Utc;
use common::{setup, telemetry};
use tiffin_engine::{traits::MarketplaceError, OrderFlowError, OrderManagement};

#[tokio::test]
async fn two_riders_race_for_one_order() {
    let world = setup().await;
    let payments = world.payment_flow();
    let flow = world.order_flow();

    let (order, _) = payments.place_cod_order(world.standard_order(), Utc::now()).await.expect("COD placement failed");
    flow.restaurant_accept(order.id, 20).await.unwrap();
    flow.restaurant_almost_ready(order.id).await.unwrap();

    // Two devices fire the claim within the same instant.
    let flow_a = world.order_flow();
    let flow_b = world.order_flow();
    let (rider, rival, order_id) = (world.rider.id, world.rival.id, order.id);
    let (a, b) = tokio::join!(
        tokio::spawn(async move { flow_a.claim_order(rider, order_id, telemetry()).await }),
        tokio::spawn(async move { flow_b.claim_order(rival, order_id, telemetry()).await }),
    );
    let results = [a.unwrap(), b.unwrap()];
    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1, "exactly one rider must win the claim");
    let winner = results.iter().find_map(|r| r.as_ref().ok()).unwrap().clone();
    let loss = results.into_iter().find(|r| r.is_err()).unwrap();
    assert!(
        matches!(&loss, Err(OrderFlowError::Database(MarketplaceError::OrderAlreadyClaimed(_)))),
        "the loser must see a conflict, got {loss:?}"
    );

    // The winner's claim stuck and telemetry was recorded exactly once.
    let stored = world.db.fetch_live_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.rider_id, winner.rider_id);
    assert!(stored.rider_meta_id.is_some());
}

#[tokio::test]
async fn holder_may_reclaim_while_accepted_but_not_later() {
    let world = setup().await;
    let payments = world.payment_flow();
    let flow = world.order_flow();

    let (order, _) = payments.place_cod_order(world.standard_order(), Utc::now()).await.unwrap();
    flow.restaurant_accept(order.id, 15).await.unwrap();
    flow.restaurant_almost_ready(order.id).await.unwrap();

    let first = flow.claim_order(world.rider.id, order.id, telemetry()).await.unwrap();
    // Idempotent re-claim from the claimed state: same rider, same metadata row.
    let again = flow.claim_order(world.rider.id, order.id, telemetry()).await.unwrap();
    assert_eq!(first.rider_meta_id, again.rider_meta_id);

    // After moving forward, re-claim is a status violation, not a claim.
    flow.restaurant_ready(order.id).await.unwrap();
    flow.confirm_pickup(world.rider.id, order.id).await.unwrap();
    let late = flow.claim_order(world.rider.id, order.id, telemetry()).await;
    assert!(matches!(
        late,
        Err(OrderFlowError::Database(MarketplaceError::InvalidStatusChange { .. }))
    ));
}

#[tokio::test]
async fn unready_orders_are_not_biddable() {
    let world = setup().await;
    let payments = world.payment_flow();
    let flow = world.order_flow();

    let (order, _) = payments.place_cod_order(world.standard_order(), Utc::now()).await.unwrap();

    // Still PENDING: the kitchen has not even accepted.
    let premature = flow.claim_order(world.rider.id, order.id, telemetry()).await;
    assert!(matches!(premature, Err(OrderFlowError::Database(MarketplaceError::OrderNotBiddable(_)))));

    // PREPARING but the kitchen is not ALMOST_READY yet.
    flow.restaurant_accept(order.id, 25).await.unwrap();
    let still_early = flow.claim_order(world.rider.id, order.id, telemetry()).await;
    assert!(matches!(still_early, Err(OrderFlowError::Database(MarketplaceError::OrderNotBiddable(_)))));
}
