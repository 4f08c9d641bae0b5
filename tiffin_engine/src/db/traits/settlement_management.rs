use crate::{
    db_types::{NewSettlement, PastOrder, Settlement, SettlementProof},
    helpers::SettlementWindow,
    traits::MarketplaceError,
};

/// Storage for the weekly restaurant payout records. Uniqueness of (hotel, week_start, week_end) is enforced here,
/// which is what makes re-running the batch safe.
#[allow(async_fn_in_trait)]
pub trait SettlementManagement: Clone {
    /// Ids of every hotel, for the batch sweep.
    fn hotel_ids(&self) -> impl ::std::future::Future<Output = Result<Vec<i64>, MarketplaceError>> + Send;

    fn settlement_exists(&self, hotel_id: i64, window: &SettlementWindow) -> impl ::std::future::Future<Output = Result<bool, MarketplaceError>> + Send;

    /// Past orders with status `DELIVERED` ordered within the window, for one hotel.
    fn delivered_orders_in_window(
        &self,
        hotel_id: i64,
        window: &SettlementWindow,
    ) -> impl ::std::future::Future<Output = Result<Vec<PastOrder>, MarketplaceError>> + Send;

    /// Inserts a `PENDING` settlement. A concurrent duplicate for the same (hotel, week) triple fails with
    /// [`MarketplaceError::SettlementAlreadyExists`].
    fn insert_settlement(&self, settlement: NewSettlement) -> impl ::std::future::Future<Output = Result<Settlement, MarketplaceError>> + Send;

    /// `PENDING` → `PAID` with proof metadata and the acting admin. The status is re-verified at write time; a
    /// settlement that is no longer pending fails with [`MarketplaceError::SettlementAlreadyPaid`] so two admin
    /// sessions cannot both pay it.
    fn mark_settlement_paid(
        &self,
        settlement_id: i64,
        admin_id: i64,
        proof: &SettlementProof,
    ) -> impl ::std::future::Future<Output = Result<Settlement, MarketplaceError>> + Send;

    /// Settlement history for one hotel, newest week first.
    fn settlements_for_hotel(&self, hotel_id: i64) -> impl ::std::future::Future<Output = Result<Vec<Settlement>, MarketplaceError>> + Send;
}
