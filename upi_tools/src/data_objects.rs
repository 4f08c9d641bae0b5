use serde::{Deserialize, Serialize};
use tfn_common::Paise;

/// The OAuth token grant the gateway returns. `expires_at` is epoch seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOrderRequest {
    pub merchant_order_id: String,
    /// Amount in paise.
    pub amount: i64,
    pub expire_after: i64,
}

impl CheckoutOrderRequest {
    pub fn new(merchant_order_id: &str, amount: Paise, expire_after_secs: i64) -> Self {
        Self { merchant_order_id: merchant_order_id.to_string(), amount: amount.value(), expire_after: expire_after_secs }
    }
}

/// The gateway-side order. `token` is what the mobile SDK needs to open the payment sheet.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOrder {
    pub order_id: String,
    pub token: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub expire_at: Option<i64>,
}
