use chrono::NaiveTime;
use thiserror::Error;

use crate::traits::{ErrorClass, GatewayError, MarketplaceError};

#[derive(Debug, Error)]
pub enum OrderFlowError {
    #[error(transparent)]
    Database(#[from] MarketplaceError),
    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("The delivery location is outside our service areas")]
    OutOfServiceArea,
    #[error("The restaurant does not deliver to this address")]
    HotelOutsideZone,
    #[error("Cash on delivery is not available after {0} IST")]
    CodCutoffPassed(NaiveTime),
    #[error("Invalid request: {0}")]
    Validation(String),
}

impl OrderFlowError {
    /// Folds the flow-level failures into the same taxonomy the storage errors carry, so the server can map
    /// everything onto HTTP statuses in one place.
    pub fn class(&self) -> ErrorClass {
        match self {
            OrderFlowError::Database(e) => e.class(),
            // A gateway fault aborts the whole attempt before any local state exists.
            OrderFlowError::Gateway(_) => ErrorClass::Internal,
            OrderFlowError::OutOfServiceArea | OrderFlowError::HotelOutsideZone => ErrorClass::Validation,
            OrderFlowError::CodCutoffPassed(_) => ErrorClass::BusinessRule,
            OrderFlowError::Validation(_) => ErrorClass::Validation,
        }
    }
}
