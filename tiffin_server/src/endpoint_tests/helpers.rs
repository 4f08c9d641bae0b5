//! Harness for the endpoint tests: a seeded marketplace on a throwaway database, the real route wiring from
//! [`crate::server::app_config`], and a deterministic in-process gateway.
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tfn_common::{Paise, Secret};
use tiffin_engine::{
    db_types::{Customer, Hotel, Listing, Rider},
    events::EventProducers,
    helpers::{GeoPoint, ServiceArea, ServiceAreas, DEFAULT_BUFFER_M},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::{GatewayError, GatewayOrder, PaymentGateway},
    SqliteDatabase,
};

use crate::config::ServerConfig;

pub const WEBHOOK_SECRET: &str = "test-webhook-secret";

pub struct TestHarness {
    pub db: SqliteDatabase,
    pub config: ServerConfig,
    pub customer: Customer,
    pub hotel: Hotel,
    pub thali: Listing,
    pub rider: Rider,
    pub rival: Rider,
}

pub async fn harness() -> TestHarness {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let suffix = rand::random::<u32>();
    let customer = db.create_customer("Asha", &format!("98{suffix:08}")).await.unwrap();
    db.add_customer_address(customer.id, "Home", 19.9500, 79.2900, Some("12"), Some("Lotus Residency"), None, true)
        .await
        .unwrap();
    let hotel =
        db.create_hotel("Annapurna Bhojanalay", &format!("97{suffix:08}"), "Main Rd", 19.9510, 79.2910).await.unwrap();
    let thali = db.create_listing(hotel.id, "Special Thali", Paise::from_rupees(120)).await.unwrap();
    let rider = db.create_rider("Bharat", &format!("96{suffix:08}"), Paise::from_rupees(2_000)).await.unwrap();
    let rival = db.create_rider("Chetan", &format!("95{suffix:08}"), Paise::from_rupees(2_000)).await.unwrap();

    let mut config = ServerConfig::new("127.0.0.1", 0);
    config.service_areas = service_areas();
    config.webhook_secret = Secret::new(WEBHOOK_SECRET.to_string());
    // Endpoint tests run at arbitrary wall-clock times; the cutoff has its own engine-level tests.
    config.cod_cutoff = None;
    TestHarness { db, config, customer, hotel, thali, rider, rival }
}

pub fn service_areas() -> ServiceAreas {
    let area = ServiceArea {
        name: "central".to_string(),
        polygon: vec![
            GeoPoint::new(19.940, 79.280),
            GeoPoint::new(19.960, 79.280),
            GeoPoint::new(19.960, 79.300),
            GeoPoint::new(19.940, 79.300),
        ],
    };
    ServiceAreas::new(vec![area], DEFAULT_BUFFER_M).expect("test polygon is valid")
}

impl TestHarness {
    pub fn producers(&self) -> EventProducers {
        EventProducers::default()
    }

    pub fn order_body(&self) -> serde_json::Value {
        serde_json::json!({
            "customer_id": self.customer.id,
            "hotel_id": self.hotel.id,
            "location_index": 0,
            "items": [{ "listing_id": self.thali.id, "quantity": 2 }],
            "total_price": 24_000,
        })
    }
}

#[derive(Clone, Default)]
pub struct StubGateway;

impl PaymentGateway for StubGateway {
    async fn create_order(&self, _amount: Paise, merchant_ref: &str) -> Result<GatewayOrder, GatewayError> {
        Ok(GatewayOrder { gateway_order_id: format!("GW-{merchant_ref}"), token: format!("tok-{merchant_ref}") })
    }
}

/// Hex HMAC-SHA256 signature over the raw webhook body, as the gateway would send it.
pub fn sign_webhook(body: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET.as_bytes()).expect("any key length works");
    mac.update(body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Builds the service under test with the shared app wiring.
#[macro_export]
macro_rules! test_app {
    ($harness:expr) => {{
        actix_web::test::init_service(actix_web::App::new().configure($crate::server::app_config(
            $harness.config.clone(),
            $harness.db.clone(),
            $crate::endpoint_tests::helpers::StubGateway,
            $harness.producers(),
        )))
        .await
    }};
}
