use std::str::FromStr;

use log::*;
use tfn_common::Secret;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpiEnvironment {
    #[default]
    Sandbox,
    Production,
}

impl FromStr for UpiEnvironment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PRODUCTION" | "PROD" => Ok(Self::Production),
            "SANDBOX" | "PREPROD" | "TEST" => Ok(Self::Sandbox),
            other => Err(format!("Unknown UPI environment: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpiConfig {
    pub environment: UpiEnvironment,
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub client_version: String,
    /// Overrides the environment-derived base URL. Used by tests to point the client at a local stub.
    pub base_url_override: Option<String>,
}

impl UpiConfig {
    pub fn new_from_env_or_default() -> Self {
        let environment = std::env::var("TFN_UPI_ENVIRONMENT")
            .ok()
            .and_then(|s| {
                s.parse()
                    .map_err(|e| {
                        warn!("🪛️ {e}. Using the sandbox environment instead.");
                    })
                    .ok()
            })
            .unwrap_or_default();
        let client_id = std::env::var("TFN_UPI_CLIENT_ID").unwrap_or_else(|_| {
            warn!("🪛️ TFN_UPI_CLIENT_ID not set, using (probably useless) default");
            "TEST_CLIENT".to_string()
        });
        let client_secret = Secret::new(std::env::var("TFN_UPI_CLIENT_SECRET").unwrap_or_else(|_| {
            warn!("🪛️ TFN_UPI_CLIENT_SECRET not set, using (probably useless) default");
            "00000000000000".to_string()
        }));
        let client_version = std::env::var("TFN_UPI_CLIENT_VERSION").unwrap_or_else(|_| "1".to_string());
        Self { environment, client_id, client_secret, client_version, base_url_override: None }
    }

    pub fn base_url(&self) -> String {
        if let Some(url) = &self.base_url_override {
            return url.clone();
        }
        match self.environment {
            UpiEnvironment::Production => "https://api.gateway.example.com/apis/pg".to_string(),
            UpiEnvironment::Sandbox => "https://api-preprod.gateway.example.com/apis/pg-sandbox".to_string(),
        }
    }

    pub fn token_url(&self) -> String {
        format!("{}/v1/oauth/token", self.base_url())
    }

    pub fn checkout_url(&self) -> String {
        format!("{}/checkout/v2/order", self.base_url())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn environment_parsing() {
        assert_eq!("production".parse::<UpiEnvironment>().unwrap(), UpiEnvironment::Production);
        assert_eq!("SANDBOX".parse::<UpiEnvironment>().unwrap(), UpiEnvironment::Sandbox);
        assert!("moon".parse::<UpiEnvironment>().is_err());
    }

    #[test]
    fn urls_follow_environment() {
        let mut config = UpiConfig { environment: UpiEnvironment::Production, ..Default::default() };
        assert!(config.token_url().starts_with("https://api.gateway.example.com"));
        config.base_url_override = Some("http://127.0.0.1:9000".to_string());
        assert_eq!(config.checkout_url(), "http://127.0.0.1:9000/checkout/v2/order");
    }
}
