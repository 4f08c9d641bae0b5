use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use log::*;
use reqwest::Client;
use tfn_common::Paise;
use tokio::sync::Mutex;

use crate::{
    config::UpiConfig,
    data_objects::{CheckoutOrder, CheckoutOrderRequest, TokenResponse},
    UpiApiError,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(7);
/// Fallback token lifetime when the gateway omits `expires_at`.
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(10 * 60);
/// Refresh this long before the reported expiry.
const EXPIRY_SAFETY_MARGIN: Duration = Duration::from_secs(30);
/// Gateway-side order validity.
const ORDER_EXPIRE_AFTER_SECS: i64 = 1_200;

#[derive(Debug, Default)]
struct TokenCache {
    token: Option<String>,
    expires_at: Option<Instant>,
}

impl TokenCache {
    fn current(&self) -> Option<String> {
        match (&self.token, self.expires_at) {
            (Some(token), Some(deadline)) if Instant::now() < deadline => Some(token.clone()),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct UpiApi {
    config: UpiConfig,
    client: Arc<Client>,
    /// Token cache with single-flight refresh: the mutex is held across the refresh call, so concurrent requests
    /// wait for one token fetch instead of stampeding the gateway.
    cache: Arc<Mutex<TokenCache>>,
}

impl UpiApi {
    pub fn new(config: UpiConfig) -> Result<Self, UpiApiError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| UpiApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client), cache: Arc::new(Mutex::new(TokenCache::default())) })
    }

    /// Creates a gateway order for the given amount. Returns the gateway's order id and the SDK token.
    pub async fn create_order(&self, amount: Paise, merchant_ref: &str) -> Result<CheckoutOrder, UpiApiError> {
        let token = self.access_token().await?;
        let body = CheckoutOrderRequest::new(merchant_ref, amount, ORDER_EXPIRE_AFTER_SECS);
        trace!("Creating gateway order for {merchant_ref} ({amount})");
        let response = self
            .client
            .post(self.config.checkout_url())
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| UpiApiError::RestResponseError(e.to_string()))?;
            return Err(UpiApiError::QueryError { status, message });
        }
        let order: CheckoutOrder = response.json().await.map_err(|e| UpiApiError::JsonError(e.to_string()))?;
        debug!("Gateway order {} created for {merchant_ref}", order.order_id);
        Ok(order)
    }

    /// The cached access token, refreshed when missing or within the safety margin of expiry.
    async fn access_token(&self) -> Result<String, UpiApiError> {
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.current() {
            return Ok(token);
        }
        let grant = self.request_new_token().await?;
        let token = grant.access_token.ok_or(UpiApiError::MissingField("access_token"))?;
        let ttl = grant
            .expires_at
            .and_then(|epoch| {
                let now = chrono::Utc::now().timestamp();
                u64::try_from(epoch - now).ok().map(Duration::from_secs)
            })
            .unwrap_or(DEFAULT_TOKEN_TTL);
        cache.token = Some(token.clone());
        cache.expires_at = Some(Instant::now() + ttl.saturating_sub(EXPIRY_SAFETY_MARGIN));
        debug!("Gateway access token refreshed (ttl {}s)", ttl.as_secs());
        Ok(token)
    }

    async fn request_new_token(&self) -> Result<TokenResponse, UpiApiError> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.reveal().as_str()),
            ("client_version", self.config.client_version.as_str()),
        ];
        let response =
            self.client.post(self.config.token_url()).form(&params).send().await.map_err(map_send_error)?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| UpiApiError::RestResponseError(e.to_string()))?;
            return Err(UpiApiError::QueryError { status, message });
        }
        response.json().await.map_err(|e| UpiApiError::JsonError(e.to_string()))
    }
}

fn map_send_error(e: reqwest::Error) -> UpiApiError {
    if e.is_timeout() {
        UpiApiError::Timeout(e.to_string())
    } else {
        UpiApiError::RestResponseError(e.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cache_expires_tokens() {
        let mut cache = TokenCache::default();
        assert!(cache.current().is_none());
        cache.token = Some("tok".to_string());
        cache.expires_at = Some(Instant::now() + Duration::from_secs(60));
        assert_eq!(cache.current().as_deref(), Some("tok"));
        cache.expires_at = Some(Instant::now() - Duration::from_secs(1));
        assert!(cache.current().is_none());
    }
}
