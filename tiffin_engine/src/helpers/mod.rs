mod geo;
mod ticket;
mod week;

pub use geo::{travel_minutes, GeoPoint, ServiceArea, ServiceAreaError, ServiceAreas, DEFAULT_BUFFER_M};
pub use ticket::{new_merchant_ref, new_otp, new_ticket, new_transaction_ref};
pub use week::{ist, is_after_cutoff_ist, last_settlement_window, running_window, SettlementWindow};
