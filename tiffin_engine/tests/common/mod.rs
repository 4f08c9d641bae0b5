//! Shared fixtures for the engine integration tests: a seeded marketplace (one customer with an address inside the
//! test service area, one hotel with two listings, two riders) on a throwaway SQLite database.
#![allow(dead_code)]

use tfn_common::Paise;
use tiffin_engine::{
    db_types::{ClaimTelemetry, Customer, CustomerAddress, Hotel, Listing, NewOrder, OrderLine, Rider},
    events::EventProducers,
    helpers::{GeoPoint, ServiceArea, ServiceAreas, DEFAULT_BUFFER_M},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::{GatewayError, GatewayOrder, PaymentGateway},
    DispatchApi,
    OrderFlowApi,
    PaymentFlowApi,
    PlacementPolicy,
    SettlementApi,
    SettlementRates,
    SqliteDatabase,
};

pub struct TestWorld {
    pub db: SqliteDatabase,
    pub customer: Customer,
    pub address: CustomerAddress,
    pub hotel: Hotel,
    pub thali: Listing,
    pub dosa: Listing,
    pub rider: Rider,
    pub rival: Rider,
}

/// A 2.2 km square around the test city centre; the seeded customer and hotel both sit inside it.
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

pub async fn setup() -> TestWorld {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    let suffix = rand::random::<u32>();
    let customer = db.create_customer("Asha", &format!("98{suffix:08}")).await.unwrap();
    let address = db
        .add_customer_address(customer.id, "Home", 19.9500, 79.2900, Some("12"), Some("Lotus Residency"), None, true)
        .await
        .unwrap();
    let hotel = db.create_hotel("Annapurna Bhojanalay", &format!("97{suffix:08}"), "Main Rd", 19.9510, 79.2910).await.unwrap();
    let thali = db.create_listing(hotel.id, "Special Thali", Paise::from_rupees(120)).await.unwrap();
    let dosa = db.create_listing(hotel.id, "Masala Dosa", Paise::from_rupees(65)).await.unwrap();
    let rider = db.create_rider("Bharat", &format!("96{suffix:08}"), Paise::from_rupees(2_000)).await.unwrap();
    let rival = db.create_rider("Chetan", &format!("95{suffix:08}"), Paise::from_rupees(2_000)).await.unwrap();
    TestWorld { db, customer, address, hotel, thali, dosa, rider, rival }
}

impl TestWorld {
    /// A COD-ready order: 2 × thali + 1 × dosa for ₹305.
    pub fn standard_order(&self) -> NewOrder {
        NewOrder {
            customer_id: self.customer.id,
            hotel_id: self.hotel.id,
            location_index: 0,
            lines: vec![
                OrderLine { listing_id: self.thali.id, quantity: 2 },
                OrderLine { listing_id: self.dosa.id, quantity: 1 },
            ],
            total_price: Paise::from_rupees(305),
            remarks: None,
        }
    }

    pub fn order_flow(&self) -> OrderFlowApi<SqliteDatabase> {
        OrderFlowApi::new(self.db.clone(), EventProducers::default())
    }

    pub fn payment_flow(&self) -> PaymentFlowApi<SqliteDatabase, StubGateway> {
        PaymentFlowApi::new(
            self.db.clone(),
            StubGateway::default(),
            EventProducers::default(),
            service_areas(),
            PlacementPolicy::default(),
        )
    }

    pub fn dispatch(&self) -> DispatchApi<SqliteDatabase> {
        DispatchApi::new(self.db.clone(), service_areas())
    }

    pub fn settlements(&self) -> SettlementApi<SqliteDatabase> {
        SettlementApi::new(self.db.clone(), EventProducers::default(), SettlementRates::default())
    }
}

pub fn telemetry() -> ClaimTelemetry {
    ClaimTelemetry { latitude: 19.9490, longitude: 79.2890, restaurant_distance_m: 400, customer_distance_m: 150 }
}

/// A deterministic in-process gateway. `fail_next` makes `create_order` return an API error instead.
#[derive(Clone, Default)]
pub struct StubGateway {
    pub fail: bool,
}

impl PaymentGateway for StubGateway {
    async fn create_order(&self, _amount: Paise, merchant_ref: &str) -> Result<GatewayOrder, GatewayError> {
        if self.fail {
            return Err(GatewayError::Api { status: 502, message: "gateway unavailable".to_string() });
        }
        Ok(GatewayOrder { gateway_order_id: format!("GW-{merchant_ref}"), token: format!("tok-{merchant_ref}") })
    }
}
