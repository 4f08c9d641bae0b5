//! The gateway webhook endpoint: signature enforcement and idempotent promotion.
use actix_web::{http::StatusCode, test};
use serde_json::json;
use tiffin_engine::OrderManagement;

use crate::{
    endpoint_tests::helpers::{harness, sign_webhook},
    test_app,
};

#[actix_web::test]
async fn unsigned_webhooks_are_rejected() {
    let h = harness().await;
    let app = test_app!(h);
    let body = json!({ "event": "checkout.order.completed", "payload": {
        "merchantOrderId": "M123", "orderId": "GW-1", "state": "COMPLETED"
    }})
    .to_string();

    let missing = test::TestRequest::post()
        .uri("/gateway/webhook")
        .insert_header(("content-type", "application/json"))
        .set_payload(body.clone())
        .to_request();
    assert_eq!(test::call_service(&app, missing).await.status(), StatusCode::UNAUTHORIZED);

    let forged = test::TestRequest::post()
        .uri("/gateway/webhook")
        .insert_header(("content-type", "application/json"))
        .insert_header(("x-gateway-signature", "deadbeef"))
        .set_payload(body)
        .to_request();
    assert_eq!(test::call_service(&app, forged).await.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn signed_success_promotes_and_replays_are_acknowledged() {
    let h = harness().await;
    let app = test_app!(h);

    // Initiate the online path to get a draft waiting on confirmation.
    let initiate =
        test::TestRequest::post().uri("/customer/orders/online").set_json(h.order_body()).to_request();
    let resp = test::call_service(&app, initiate).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let handoff: serde_json::Value = test::read_body_json(resp).await;
    let merchant_ref = handoff["merchant_ref"].as_str().unwrap().to_string();
    let gateway_order_id = handoff["gateway_order_id"].as_str().unwrap().to_string();

    let body = json!({ "event": "checkout.order.completed", "payload": {
        "merchantOrderId": merchant_ref, "orderId": gateway_order_id, "state": "COMPLETED"
    }})
    .to_string();
    let signature = sign_webhook(&body);

    for _ in 0..2 {
        // First delivery promotes; the replay is acknowledged without creating a second order.
        let req = test::TestRequest::post()
            .uri("/gateway/webhook")
            .insert_header(("content-type", "application/json"))
            .insert_header(("x-gateway-signature", signature.clone()))
            .set_payload(body.clone())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }
    let live = h.db.fetch_live_orders_for_customer(h.customer.id).await.unwrap();
    assert_eq!(live.len(), 1);

    let poll = test::TestRequest::get()
        .uri(&format!("/customer/payments/{merchant_ref}/status"))
        .to_request();
    let resp = test::call_service(&app, poll).await;
    let status: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(status["state"], "SUCCEEDED");
    assert_eq!(status["order_id"].as_i64().unwrap(), live[0].id);
}

#[actix_web::test]
async fn unrelated_events_are_acknowledged_and_ignored() {
    let h = harness().await;
    let app = test_app!(h);
    let body = json!({ "event": "checkout.order.refund", "payload": {
        "merchantOrderId": "M-whatever", "orderId": "GW-x", "state": "COMPLETED"
    }})
    .to_string();
    let req = test::TestRequest::post()
        .uri("/gateway/webhook")
        .insert_header(("content-type", "application/json"))
        .insert_header(("x-gateway-signature", sign_webhook(&body)))
        .set_payload(body)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}
