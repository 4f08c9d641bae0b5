//! The typed app-version map and the alert snapshot.
use actix_web::{http::StatusCode, test};

use crate::{
    config::{GlobalAlert, VersionRequirement},
    endpoint_tests::helpers::harness,
    test_app,
};

#[actix_web::test]
async fn version_lookup_is_typed() {
    let mut h = harness().await;
    h.config.app_versions.rider = VersionRequirement {
        min_version: "1.4.0".to_string(),
        max_version: "2.0.0".to_string(),
        update_link: "https://play.example/rider".to_string(),
    };
    let app = test_app!(h);

    let known = test::TestRequest::get().uri("/app-version/rider").to_request();
    let resp = test::call_service(&app, known).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["min_version"], "1.4.0");

    // Unknown app names fail at the route boundary; there is no stringly map to silently miss.
    let unknown = test::TestRequest::get().uri("/app-version/driver").to_request();
    assert_eq!(test::call_service(&app, unknown).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn alert_serves_the_config_snapshot() {
    let mut h = harness().await;
    let app = test_app!(h);
    let no_alert = test::TestRequest::get().uri("/alert").to_request();
    assert_eq!(test::call_service(&app, no_alert).await.status(), StatusCode::NOT_FOUND);

    h.config.alert =
        Some(GlobalAlert { title: "Heavy rain".to_string(), message: "Deliveries may be delayed".to_string() });
    let app = test_app!(h);
    let resp = test::call_service(&app, test::TestRequest::get().uri("/alert").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["title"], "Heavy rain");
}
