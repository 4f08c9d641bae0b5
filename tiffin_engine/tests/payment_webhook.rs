//! The online-payment path: gateway-first ordering, draft promotion on webhook success, and end-to-end idempotency
//! under duplicate deliveries.
mod common;

use chrono::{Duration, Utc};
use common::{setup, StubGateway};
use tiffin_engine::{
    db_types::DraftStatus,
    events::EventProducers,
    traits::{GatewayEvent, PaymentResolution, WebhookOutcome},
    OrderFlowError,
    OrderManagement,
    PaymentFlowApi,
    PlacementPolicy,
};

#[tokio::test]
async fn webhook_success_promotes_draft_exactly_once() {
    let world = setup().await;
    let payments = world.payment_flow();

    let handoff = payments.initiate_online_payment(world.standard_order(), Utc::now()).await.expect("initiate failed");
    assert!(handoff.gateway_order_id.starts_with("GW-"));

    // Nothing is live yet; the client poll reports pending.
    assert_eq!(payments.payment_status(&handoff.merchant_ref).await.unwrap(), PaymentResolution::Pending);

    let event = GatewayEvent::new(&handoff.merchant_ref, &handoff.gateway_order_id, "COMPLETED");
    let first = payments.handle_gateway_event(event.clone()).await.unwrap();
    let order_id = match first {
        WebhookOutcome::Promoted(ref order) => order.id,
        ref other => panic!("first delivery must promote, got {other:?}"),
    };

    // Duplicate delivery of the same success event: acknowledged, no second order.
    let replay = payments.handle_gateway_event(event.clone()).await.unwrap();
    assert!(matches!(replay, WebhookOutcome::AlreadyPromoted(id) if id == order_id));
    let replay_again = payments.handle_gateway_event(event).await.unwrap();
    assert!(matches!(replay_again, WebhookOutcome::AlreadyPromoted(_)));

    let live = world.db.fetch_live_orders_for_customer(world.customer.id).await.unwrap();
    assert_eq!(live.len(), 1, "exactly one live order may exist per payment");

    match payments.payment_status(&handoff.merchant_ref).await.unwrap() {
        PaymentResolution::Succeeded { order_id: id } => assert_eq!(id, order_id),
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn webhook_failure_marks_payment_and_draft_failed() {
    let world = setup().await;
    let payments = world.payment_flow();

    let handoff = payments.initiate_online_payment(world.standard_order(), Utc::now()).await.unwrap();
    let event = GatewayEvent::new(&handoff.merchant_ref, &handoff.gateway_order_id, "FAILED");
    let outcome = payments.handle_gateway_event(event).await.unwrap();
    assert!(matches!(outcome, WebhookOutcome::PaymentFailed));

    assert_eq!(payments.payment_status(&handoff.merchant_ref).await.unwrap(), PaymentResolution::Failed);
    assert!(world.db.fetch_live_orders_for_customer(world.customer.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn non_final_states_are_ignored() {
    let world = setup().await;
    let payments = world.payment_flow();

    let handoff = payments.initiate_online_payment(world.standard_order(), Utc::now()).await.unwrap();
    let event = GatewayEvent::new(&handoff.merchant_ref, &handoff.gateway_order_id, "PROCESSING");
    let outcome = payments.handle_gateway_event(event).await.unwrap();
    assert!(matches!(outcome, WebhookOutcome::Ignored));
    assert_eq!(payments.payment_status(&handoff.merchant_ref).await.unwrap(), PaymentResolution::Pending);
}

#[tokio::test]
async fn gateway_failure_leaves_no_local_state() {
    let world = setup().await;
    let broken = PaymentFlowApi::new(
        world.db.clone(),
        StubGateway { fail: true },
        EventProducers::default(),
        common::service_areas(),
        PlacementPolicy::default(),
    );
    let result = broken.initiate_online_payment(world.standard_order(), Utc::now()).await;
    assert!(matches!(result, Err(OrderFlowError::Gateway(_))));
    assert!(world.db.fetch_live_orders_for_customer(world.customer.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn stale_drafts_expire_and_cannot_be_promoted() {
    let world = setup().await;
    let payments = world.payment_flow();

    let handoff = payments.initiate_online_payment(world.standard_order(), Utc::now()).await.unwrap();
    // unixepoch has one-second resolution; let the draft age past zero.
    tokio::time::sleep(std::time::Duration::from_millis(1_500)).await;
    let expired = payments.expire_stale_drafts(Duration::zero()).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].status, DraftStatus::Cancelled);

    // A late success signal finds nothing claimable; it is acknowledged, not retried.
    let event = GatewayEvent::new(&handoff.merchant_ref, &handoff.gateway_order_id, "SUCCESS");
    let outcome = payments.handle_gateway_event(event).await.unwrap();
    assert!(matches!(outcome, WebhookOutcome::Unclaimable));
    assert!(world.db.fetch_live_orders_for_customer(world.customer.id).await.unwrap().is_empty());
}
