//! Interfaces for the external collaborators the engine consumes. The engine never talks to FCM or the payment
//! gateway directly; the server wires in concrete implementations.
use serde::Serialize;
use tfn_common::Paise;
use thiserror::Error;

//--------------------------------------    Push sender     ----------------------------------------------------------

/// Why a notification is being sent. Concrete senders map this to their own channel/sound/payload conventions; the
/// engine only cares that the transition happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoticeKind {
    NewOrder,
    OrderConfirmed,
    OrderPickedUp,
    OrderArrived,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub body: String,
}

impl Notice {
    pub fn new_order() -> Self {
        Self {
            kind: NoticeKind::NewOrder,
            title: "Incoming order request".to_string(),
            body: "A new order is waiting for your acceptance.".to_string(),
        }
    }

    pub fn order_confirmed() -> Self {
        Self {
            kind: NoticeKind::OrderConfirmed,
            title: "Order confirmed".to_string(),
            body: "Your order is confirmed and the kitchen has been notified.".to_string(),
        }
    }

    pub fn picked_up() -> Self {
        Self {
            kind: NoticeKind::OrderPickedUp,
            title: "Your food is on the way".to_string(),
            body: "Our delivery partner has picked up your order and is heading to you.".to_string(),
        }
    }

    pub fn arrived() -> Self {
        Self {
            kind: NoticeKind::OrderArrived,
            title: "Your order has arrived".to_string(),
            body: "Your food has arrived. Please collect it at your door.".to_string(),
        }
    }
}

/// Per-batch send result. `invalid_tokens` lists device tokens the provider rejected as dead; callers prune these
/// from the owner's token set.
#[derive(Debug, Clone, Default)]
pub struct PushOutcome {
    pub success_count: usize,
    pub failure_count: usize,
    pub invalid_tokens: Vec<String>,
}

#[derive(Debug, Clone, Error)]
pub enum PushError {
    #[error("Push send failed: {0}")]
    SendFailed(String),
}

/// Accepts a set of device tokens plus message content and reports per-token success/failure. Implementations must
/// treat an empty token set as a successful no-op.
#[allow(async_fn_in_trait)]
pub trait PushSender: Clone + Send + Sync {
    fn send(&self, tokens: &[String], notice: &Notice) -> impl ::std::future::Future<Output = Result<PushOutcome, PushError>> + Send;
}

//--------------------------------------   Payment gateway   ---------------------------------------------------------

/// The gateway-side order created for an online payment: the id the gateway assigned plus the token the client app
/// needs to open the payment sheet.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayOrder {
    pub gateway_order_id: String,
    pub token: String,
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Could not initialize gateway client: {0}")]
    Initialization(String),
    #[error("The payment gateway did not respond in time: {0}")]
    Timeout(String),
    #[error("Gateway call failed. Error {status}. {message}")]
    Api { status: u16, message: String },
    #[error("Could not interpret the gateway response: {0}")]
    InvalidResponse(String),
}

/// The synchronous half of the gateway integration. `create_order` is always called *before* any local transaction
/// is opened, and must fail within a bounded timeout; the asynchronous half arrives later as a webhook
/// ([`super::GatewayEvent`]).
#[allow(async_fn_in_trait)]
pub trait PaymentGateway: Clone + Send + Sync {
    fn create_order(&self, amount: Paise, merchant_ref: &str) -> impl ::std::future::Future<Output = Result<GatewayOrder, GatewayError>> + Send;
}
