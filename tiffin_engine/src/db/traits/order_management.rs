use crate::{
    db_types::{Customer, CustomerAddress, Hotel, Listing, LiveOrder, PastOrder, PastOrderItem, PaymentLog},
    traits::{data_objects::OrderLineView, MarketplaceError},
};

/// Read-side access to orders and the parties around them. These queries back the customer, rider and restaurant
/// views; none of them mutate state.
#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone {
    fn fetch_live_order(&self, order_id: i64) -> impl ::std::future::Future<Output = Result<Option<LiveOrder>, MarketplaceError>> + Send;

    fn fetch_live_orders_for_customer(&self, customer_id: i64) -> impl ::std::future::Future<Output = Result<Vec<LiveOrder>, MarketplaceError>> + Send;

    fn fetch_live_orders_for_hotel(&self, hotel_id: i64) -> impl ::std::future::Future<Output = Result<Vec<LiveOrder>, MarketplaceError>> + Send;

    /// Past orders for a customer, most recent first.
    fn fetch_past_orders_for_customer(&self, customer_id: i64) -> impl ::std::future::Future<Output = Result<Vec<PastOrder>, MarketplaceError>> + Send;

    /// Orders currently open to rider claims: status `PREPARING` with kitchen state `ALMOST_READY` or `READY`.
    fn fetch_biddable_orders(&self) -> impl ::std::future::Future<Output = Result<Vec<LiveOrder>, MarketplaceError>> + Send;

    /// Live-order item lines joined with their listing names.
    fn fetch_order_lines(&self, order_id: i64) -> impl ::std::future::Future<Output = Result<Vec<OrderLineView>, MarketplaceError>> + Send;

    /// The denormalised item lines of an archived order.
    fn fetch_past_order_items(&self, order_id: i64) -> impl ::std::future::Future<Output = Result<Vec<PastOrderItem>, MarketplaceError>> + Send;

    fn fetch_payment(&self, payment_id: i64) -> impl ::std::future::Future<Output = Result<Option<PaymentLog>, MarketplaceError>> + Send;

    fn fetch_payment_by_merchant_ref(&self, merchant_ref: &str) -> impl ::std::future::Future<Output = Result<Option<PaymentLog>, MarketplaceError>> + Send;

    fn fetch_customer(&self, customer_id: i64) -> impl ::std::future::Future<Output = Result<Option<Customer>, MarketplaceError>> + Send;

    /// The address at the given `location_index` in the customer's address book.
    fn fetch_customer_address(
        &self,
        customer_id: i64,
        location_index: i64,
    ) -> impl ::std::future::Future<Output = Result<Option<CustomerAddress>, MarketplaceError>> + Send;

    fn fetch_hotel(&self, hotel_id: i64) -> impl ::std::future::Future<Output = Result<Option<Hotel>, MarketplaceError>> + Send;

    /// All hotels currently serving, for the customer-facing listing.
    fn fetch_serving_hotels(&self) -> impl ::std::future::Future<Output = Result<Vec<Hotel>, MarketplaceError>> + Send;

    /// In-stock listings by id. Missing or out-of-stock ids are simply absent from the result; callers decide
    /// whether that is an error.
    fn fetch_listings(&self, ids: &[i64]) -> impl ::std::future::Future<Output = Result<Vec<Listing>, MarketplaceError>> + Send;
}
