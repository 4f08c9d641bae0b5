//! Endpoint-level checks of the order lifecycle: placement, the claim race outcome codes, pickup gating and
//! OTP-checked completion.
use actix_web::{http::StatusCode, test};
use serde_json::json;
use tiffin_engine::OrderManagement;

use crate::{endpoint_tests::helpers::harness, test_app};

#[actix_web::test]
async fn health_answers() {
    let h = harness().await;
    let app = test_app!(h);
    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
}

#[actix_web::test]
async fn cod_order_placement_returns_order_and_payment() {
    let h = harness().await;
    let app = test_app!(h);
    let req = test::TestRequest::post().uri("/customer/orders/cod").set_json(h.order_body()).to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["order"]["status"], "PENDING");
    assert_eq!(body["payment"]["mode"], "COD");
    assert_eq!(body["payment"]["status"], "NOT_COLLECTED");
}

#[actix_web::test]
async fn losing_rider_gets_conflict_status() {
    let h = harness().await;
    let app = test_app!(h);

    let placed = test::call_service(
        &app,
        test::TestRequest::post().uri("/customer/orders/cod").set_json(h.order_body()).to_request(),
    )
    .await;
    let body: serde_json::Value = test::read_body_json(placed).await;
    let order_id = body["order"]["id"].as_i64().unwrap();

    let accept = test::TestRequest::post()
        .uri(&format!("/hotel/orders/{order_id}/accept"))
        .set_json(json!({ "preparation_minutes": 20 }))
        .to_request();
    assert_eq!(test::call_service(&app, accept).await.status(), StatusCode::OK);
    let almost =
        test::TestRequest::post().uri(&format!("/hotel/orders/{order_id}/almost-ready")).to_request();
    assert_eq!(test::call_service(&app, almost).await.status(), StatusCode::OK);

    let claim_body = json!({
        "order_id": order_id,
        "latitude": 19.949, "longitude": 79.289,
        "restaurant_distance_m": 400, "customer_distance_m": 150
    });
    let first = test::TestRequest::post()
        .uri(&format!("/rider/{}/claim", h.rider.id))
        .set_json(claim_body.clone())
        .to_request();
    assert_eq!(test::call_service(&app, first).await.status(), StatusCode::OK);

    // The second device loses: a conflict it must not retry, not a validation error.
    let second =
        test::TestRequest::post().uri(&format!("/rider/{}/claim", h.rival.id)).set_json(claim_body).to_request();
    assert_eq!(test::call_service(&app, second).await.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn pickup_gate_and_otp_mismatch_are_unprocessable() {
    let h = harness().await;
    let app = test_app!(h);

    let placed = test::call_service(
        &app,
        test::TestRequest::post().uri("/customer/orders/cod").set_json(h.order_body()).to_request(),
    )
    .await;
    let body: serde_json::Value = test::read_body_json(placed).await;
    let order_id = body["order"]["id"].as_i64().unwrap();

    for step in [format!("/hotel/orders/{order_id}/accept"), format!("/hotel/orders/{order_id}/almost-ready")] {
        let req = test::TestRequest::post().uri(&step).set_json(json!({ "preparation_minutes": 15 })).to_request();
        assert!(test::call_service(&app, req).await.status().is_success());
    }
    let claim = test::TestRequest::post()
        .uri(&format!("/rider/{}/claim", h.rider.id))
        .set_json(json!({
            "order_id": order_id,
            "latitude": 19.949, "longitude": 79.289,
            "restaurant_distance_m": 400, "customer_distance_m": 150
        }))
        .to_request();
    assert!(test::call_service(&app, claim).await.status().is_success());

    // Not READY yet: a business-rule denial, distinguishable from the 409 conflict above.
    let early_pickup = test::TestRequest::post()
        .uri(&format!("/rider/{}/pickup", h.rider.id))
        .set_json(json!({ "order_id": order_id }))
        .to_request();
    assert_eq!(test::call_service(&app, early_pickup).await.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let ready = test::TestRequest::post().uri(&format!("/hotel/orders/{order_id}/ready")).to_request();
    assert!(test::call_service(&app, ready).await.status().is_success());
    let pickup = test::TestRequest::post()
        .uri(&format!("/rider/{}/pickup", h.rider.id))
        .set_json(json!({ "order_id": order_id }))
        .to_request();
    assert!(test::call_service(&app, pickup).await.status().is_success());
    let drop = test::TestRequest::post()
        .uri(&format!("/rider/{}/drop", h.rider.id))
        .set_json(json!({ "order_id": order_id }))
        .to_request();
    assert!(test::call_service(&app, drop).await.status().is_success());

    // Wrong OTP: unprocessable. Malformed OTP: bad request before any state is touched.
    let wrong_otp = test::TestRequest::post()
        .uri(&format!("/rider/{}/complete", h.rider.id))
        .set_json(json!({ "order_id": order_id, "otp": "000001" }))
        .to_request();
    let resp = test::call_service(&app, wrong_otp).await;
    // The seeded OTP is random six digits, so 000001 can never match it.
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let junk_otp = test::TestRequest::post()
        .uri(&format!("/rider/{}/complete", h.rider.id))
        .set_json(json!({ "order_id": order_id, "otp": "not-a-number" }))
        .to_request();
    assert_eq!(test::call_service(&app, junk_otp).await.status(), StatusCode::BAD_REQUEST);

    // The stored OTP completes the order.
    let live = h.db.fetch_live_orders_for_customer(h.customer.id).await.unwrap();
    let otp = live[0].otp;
    let complete = test::TestRequest::post()
        .uri(&format!("/rider/{}/complete", h.rider.id))
        .set_json(json!({ "order_id": order_id, "otp": otp.to_string() }))
        .to_request();
    let resp = test::call_service(&app, complete).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let past: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(past["status"], "DELIVERED");
}

#[actix_web::test]
async fn out_of_area_customer_is_refused_hotels() {
    let h = harness().await;
    let app = test_app!(h);
    let inside = test::TestRequest::get().uri("/customer/hotels?latitude=19.95&longitude=79.29").to_request();
    let resp = test::call_service(&app, inside).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let hotels: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(hotels.as_array().unwrap().len(), 1);

    let outside = test::TestRequest::get().uri("/customer/hotels?latitude=21.5&longitude=80.5").to_request();
    assert_eq!(test::call_service(&app, outside).await.status(), StatusCode::BAD_REQUEST);
}
