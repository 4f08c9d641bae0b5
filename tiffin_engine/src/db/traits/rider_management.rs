use tfn_common::Paise;

use crate::{
    db_types::{LiveOrder, Rider, RiderMetaData},
    traits::{
        data_objects::{BlockStatus, UnsettledOrder},
        MarketplaceError,
    },
};

/// Rider operational state. The rider's availability fields are best-effort secondary state — the live order's
/// `rider_id` is always the source of truth — but the blocking policy lives here and is authoritative.
#[allow(async_fn_in_trait)]
pub trait RiderManagement: Clone {
    fn fetch_rider(&self, rider_id: i64) -> impl ::std::future::Future<Output = Result<Option<Rider>, MarketplaceError>> + Send;

    /// The live order this rider currently serves, if any.
    fn fetch_serving_order(&self, rider_id: i64) -> impl ::std::future::Future<Output = Result<Option<LiveOrder>, MarketplaceError>> + Send;

    /// The rider's most recent delivery metadata.
    fn fetch_latest_meta(&self, rider_id: i64) -> impl ::std::future::Future<Output = Result<Option<RiderMetaData>, MarketplaceError>> + Send;

    /// Best-effort secondary write after a won claim: `is_available = false`, `serving_order = order_id`.
    fn mark_rider_serving(&self, rider_id: i64, order_id: i64) -> impl ::std::future::Future<Output = Result<(), MarketplaceError>> + Send;

    /// Flips `on_duty`. A blocked rider attempting to go *on* duty is refused with
    /// [`MarketplaceError::RiderBlocked`]; going off duty is always allowed.
    fn toggle_duty(&self, rider_id: i64) -> impl ::std::future::Future<Output = Result<Rider, MarketplaceError>> + Send;

    /// Total delivered-but-unsettled COD cash this rider is carrying.
    fn unsettled_cod_total(&self, rider_id: i64) -> impl ::std::future::Future<Output = Result<Paise, MarketplaceError>> + Send;

    /// The itemised list behind [`unsettled_cod_total`](Self::unsettled_cod_total), latest delivery first.
    fn unsettled_cod_orders(&self, rider_id: i64) -> impl ::std::future::Future<Output = Result<Vec<UnsettledOrder>, MarketplaceError>> + Send;

    /// Re-evaluates the deposit-threshold policy: blocked iff the unsettled COD total is at or above 95% of the
    /// rider's deposit amount. Called after every completed delivery.
    fn recompute_block(&self, rider_id: i64) -> impl ::std::future::Future<Output = Result<BlockStatus, MarketplaceError>> + Send;

    /// Admin override. Blocking a rider who is mid-delivery is refused with
    /// [`MarketplaceError::RiderOnDelivery`]; unblocking is always allowed.
    fn set_blocked(&self, rider_id: i64, blocked: bool) -> impl ::std::future::Future<Output = Result<Rider, MarketplaceError>> + Send;

    /// Marks all of the rider's unsettled COD payments as settled (the rider deposited the cash with `admin_id`).
    /// Returns the number of payments settled.
    fn settle_rider_cod(&self, rider_id: i64, admin_id: i64) -> impl ::std::future::Future<Output = Result<u64, MarketplaceError>> + Send;
}
