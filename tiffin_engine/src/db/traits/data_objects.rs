use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tfn_common::Paise;

use crate::db_types::{LiveOrder, TicketNumber};

/// An order item line joined with its listing name, for rider/customer order views.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrderLineView {
    pub name: String,
    pub quantity: i64,
}

/// One delivered-but-uncollected COD order in a rider's deposit report.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UnsettledOrder {
    pub order_id: i64,
    pub ticket: TicketNumber,
    pub hotel_name: String,
    pub amount: Paise,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Result of re-evaluating the deposit-threshold policy for a rider.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BlockStatus {
    pub blocked: bool,
    pub outstanding: Paise,
    pub deposit_amount: Paise,
}

/// What a rider owes against their deposit.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CollectionReport {
    pub amount_to_deposit: Paise,
    pub deposit_amount: Paise,
}

/// The definitive state the gateway reported for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayFinalState {
    Completed,
    Failed,
    Pending,
}

impl GatewayFinalState {
    /// Maps a raw gateway state string onto our internal taxonomy. Unknown states are treated as still-pending,
    /// never as failures.
    pub fn from_gateway_state(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "COMPLETED" | "SUCCESS" => Self::Completed,
            "FAILED" | "ERROR" | "CANCELLED" | "ABORTED" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// A webhook delivery from the payment gateway, already authenticated by the server layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayEvent {
    pub merchant_ref: String,
    pub gateway_order_id: String,
    /// The state string exactly as the gateway sent it; stored on the payment log for audit.
    pub raw_state: String,
}

impl GatewayEvent {
    pub fn new<S1: Into<String>, S2: Into<String>, S3: Into<String>>(
        merchant_ref: S1,
        gateway_order_id: S2,
        raw_state: S3,
    ) -> Self {
        Self { merchant_ref: merchant_ref.into(), gateway_order_id: gateway_order_id.into(), raw_state: raw_state.into() }
    }

    pub fn final_state(&self) -> GatewayFinalState {
        GatewayFinalState::from_gateway_state(&self.raw_state)
    }
}

/// What applying a gateway event actually did. Every variant is a success from the webhook caller's point of view —
/// replays and already-promoted drafts must be acknowledged, not errored.
#[derive(Debug, Clone)]
pub enum WebhookOutcome {
    /// The draft was promoted and this live order now exists.
    Promoted(LiveOrder),
    /// A live order for this payment already existed; nothing was created.
    AlreadyPromoted(i64),
    /// The gateway reported failure; the payment and draft were marked failed.
    PaymentFailed,
    /// No claimable draft was found (already cancelled/expired). Acknowledged and logged.
    Unclaimable,
    /// The event carried a non-final state and was ignored.
    Ignored,
}

/// Result of the client-side payment status poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentResolution {
    /// The gateway has not delivered a definitive signal yet (or the promotion is mid-flight).
    Pending,
    /// The payment succeeded and the order exists.
    Succeeded { order_id: i64 },
    Failed,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn gateway_state_mapping() {
        assert_eq!(GatewayFinalState::from_gateway_state("COMPLETED"), GatewayFinalState::Completed);
        assert_eq!(GatewayFinalState::from_gateway_state("success"), GatewayFinalState::Completed);
        assert_eq!(GatewayFinalState::from_gateway_state("FAILED"), GatewayFinalState::Failed);
        assert_eq!(GatewayFinalState::from_gateway_state("ABORTED"), GatewayFinalState::Failed);
        assert_eq!(GatewayFinalState::from_gateway_state("CREATED"), GatewayFinalState::Pending);
        assert_eq!(GatewayFinalState::from_gateway_state(""), GatewayFinalState::Pending);
    }
}
