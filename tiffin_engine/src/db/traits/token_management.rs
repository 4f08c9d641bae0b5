use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{db_types::ConversionError, traits::MarketplaceError};

/// Which party a device token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenOwner {
    Customer,
    Hotel,
    Rider,
}

impl Display for TokenOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenOwner::Customer => f.write_str("customer"),
            TokenOwner::Hotel => f.write_str("hotel"),
            TokenOwner::Rider => f.write_str("rider"),
        }
    }
}

impl FromStr for TokenOwner {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "hotel" => Ok(Self::Hotel),
            "rider" => Ok(Self::Rider),
            s => Err(ConversionError("token owner", s.to_string())),
        }
    }
}

/// Device-token bookkeeping for push notifications. Registration is idempotent; tokens the push provider rejects
/// are pruned so dead devices stop accumulating.
#[allow(async_fn_in_trait)]
pub trait TokenManagement: Clone {
    fn register_token(&self, owner: TokenOwner, owner_id: i64, token: &str) -> impl ::std::future::Future<Output = Result<(), MarketplaceError>> + Send;

    fn tokens_for(&self, owner: TokenOwner, owner_id: i64) -> impl ::std::future::Future<Output = Result<Vec<String>, MarketplaceError>> + Send;

    /// Removes the given invalid tokens. Returns how many were actually deleted.
    fn prune_tokens(
        &self,
        owner: TokenOwner,
        owner_id: i64,
        invalid: &[String],
    ) -> impl ::std::future::Future<Output = Result<u64, MarketplaceError>> + Send;

    /// Flips the customer's notification preference. Returns the new value.
    fn toggle_notifications(&self, customer_id: i64) -> impl ::std::future::Future<Output = Result<bool, MarketplaceError>> + Send;
}
