use std::fmt::Display;

use serde::{Deserialize, Serialize};
use tfn_common::Paise;
use tiffin_engine::db_types::{NewOrder, OrderLine, OrderStatus};

use crate::errors::ServerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Order placement request, shared by the COD and online paths.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderRequest {
    pub customer_id: i64,
    pub hotel_id: i64,
    pub location_index: i64,
    pub items: Vec<OrderItemRequest>,
    /// Total in paise, as quoted to the customer.
    pub total_price: i64,
    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct OrderItemRequest {
    pub listing_id: i64,
    pub quantity: i64,
}

impl From<PlaceOrderRequest> for NewOrder {
    fn from(req: PlaceOrderRequest) -> Self {
        NewOrder {
            customer_id: req.customer_id,
            hotel_id: req.hotel_id,
            location_index: req.location_index,
            lines: req.items.iter().map(|i| OrderLine { listing_id: i.listing_id, quantity: i.quantity }).collect(),
            total_price: Paise::from(req.total_price),
            remarks: req.remarks,
        }
    }
}

/// The gateway webhook envelope: an event name plus the order payload, mirroring the gateway's delivery format.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    pub payload: WebhookPayload,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub merchant_order_id: String,
    pub order_id: String,
    pub state: String,
}

/// The only event that drives order promotion; everything else is acknowledged and ignored.
pub const WEBHOOK_ORDER_COMPLETED: &str = "checkout.order.completed";

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Coords {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClaimRequest {
    pub order_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub restaurant_distance_m: i64,
    pub customer_distance_m: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReachedRequest {
    pub selfie_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderActionRequest {
    pub order_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompleteRequest {
    pub order_id: i64,
    /// The OTP exactly as the rider typed it. Compared numerically, so leading zeros do not defeat the match.
    pub otp: String,
}

impl CompleteRequest {
    pub fn parsed_otp(&self) -> Result<i64, ServerError> {
        self.otp
            .trim()
            .parse::<i64>()
            .map_err(|_| ServerError::InvalidRequestBody(format!("'{}' is not a numeric OTP", self.otp)))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AcceptOrderRequest {
    pub preparation_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelOrderRequest {
    pub status: OrderStatus,
    pub reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterTokenRequest {
    pub owner: tiffin_engine::TokenOwner,
    pub owner_id: i64,
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkPaidRequest {
    pub admin_id: i64,
    pub proof_image_url: String,
    #[serde(default)]
    pub payment_mode: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AdminActionRequest {
    pub admin_id: i64,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn otp_parses_numerically() {
        let req = CompleteRequest { order_id: 1, otp: "482193".to_string() };
        assert_eq!(req.parsed_otp().unwrap(), 482_193);
        // Leading zeros and whitespace do not defeat the numeric compare.
        let padded = CompleteRequest { order_id: 1, otp: " 0482193 ".to_string() };
        assert_eq!(padded.parsed_otp().unwrap(), 482_193);
        let junk = CompleteRequest { order_id: 1, otp: "48-2193".to_string() };
        assert!(junk.parsed_otp().is_err());
    }

    #[test]
    fn cancel_request_accepts_screaming_statuses() {
        let req: CancelOrderRequest =
            serde_json::from_str(r#"{"status": "REJECTED", "reason": "out of stock"}"#).unwrap();
        assert_eq!(req.status, OrderStatus::Rejected);
    }
}
