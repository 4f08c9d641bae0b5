use std::{env, str::FromStr};

use chrono::{Duration, NaiveTime};
use log::*;
use serde::{Deserialize, Serialize};
use tfn_common::Secret;
use tiffin_engine::{
    helpers::{ServiceAreas, DEFAULT_BUFFER_M},
    PlacementPolicy,
    SettlementRates,
};
use upi_tools::UpiConfig;

use crate::errors::ServerError;

const DEFAULT_TFN_HOST: &str = "127.0.0.1";
const DEFAULT_TFN_PORT: u16 = 8380;
const DEFAULT_DRAFT_TTL_HOURS: i64 = 24;
const DEFAULT_COD_CUTOFF: &str = "20:30";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// How long a draft may wait for its payment confirmation before it expires.
    pub draft_ttl: Duration,
    /// IST wall-clock cutoff after which COD orders are refused. `None` disables the cutoff.
    pub cod_cutoff: Option<NaiveTime>,
    pub settlement_rates: SettlementRates,
    /// The named service-area polygons. Loaded once at startup; an empty set means every placement is refused.
    pub service_areas: ServiceAreas,
    /// Shared secret for verifying gateway webhook signatures.
    pub webhook_secret: Secret<String>,
    pub upi: UpiConfig,
    pub app_versions: AppVersions,
    /// Optional maintenance banner, served as an injected snapshot rather than read from a mutable global.
    pub alert: Option<GlobalAlert>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_TFN_HOST.to_string(),
            port: DEFAULT_TFN_PORT,
            database_url: String::default(),
            draft_ttl: Duration::hours(DEFAULT_DRAFT_TTL_HOURS),
            cod_cutoff: NaiveTime::from_str(&format!("{DEFAULT_COD_CUTOFF}:00")).ok(),
            settlement_rates: SettlementRates::default(),
            service_areas: ServiceAreas::new(Vec::new(), DEFAULT_BUFFER_M).expect("empty area set is valid"),
            webhook_secret: Secret::default(),
            upi: UpiConfig::default(),
            app_versions: AppVersions::default(),
            alert: None,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("TFN_HOST").ok().unwrap_or_else(|| DEFAULT_TFN_HOST.into());
        let port = env::var("TFN_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!("🪛️ {s} is not a valid port for TFN_PORT. {e} Using the default, {DEFAULT_TFN_PORT}, instead.");
                    DEFAULT_TFN_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_TFN_PORT);
        let database_url = env::var("TFN_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ TFN_DATABASE_URL is not set. Please set it to the URL for the Tiffin database.");
            String::default()
        });
        let draft_ttl = env::var("TFN_DRAFT_TTL_HOURS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Duration::hours)
            .unwrap_or_else(|| Duration::hours(DEFAULT_DRAFT_TTL_HOURS));
        let cod_cutoff = configure_cod_cutoff();
        let settlement_rates = configure_settlement_rates();
        let service_areas = configure_service_areas();
        let webhook_secret = Secret::new(env::var("TFN_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!("🪛️ TFN_WEBHOOK_SECRET is not set. Webhook deliveries will be rejected.");
            String::default()
        }));
        let upi = UpiConfig::new_from_env_or_default();
        let app_versions = AppVersions::from_env_or_default();
        let alert = GlobalAlert::from_env();
        Self {
            host,
            port,
            database_url,
            draft_ttl,
            cod_cutoff,
            settlement_rates,
            service_areas,
            webhook_secret,
            upi,
            app_versions,
            alert,
        }
    }

    pub fn placement_policy(&self) -> PlacementPolicy {
        PlacementPolicy { cod_cutoff: self.cod_cutoff }
    }
}

fn configure_cod_cutoff() -> Option<NaiveTime> {
    let raw = env::var("TFN_COD_CUTOFF").unwrap_or_else(|_| DEFAULT_COD_CUTOFF.to_string());
    if raw.trim().eq_ignore_ascii_case("none") {
        return None;
    }
    match NaiveTime::parse_from_str(&format!("{}:00", raw.trim()), "%H:%M:%S") {
        Ok(t) => Some(t),
        Err(e) => {
            error!("🪛️ {raw} is not a valid TFN_COD_CUTOFF (HH:MM). {e}. Using {DEFAULT_COD_CUTOFF}.");
            NaiveTime::parse_from_str(&format!("{DEFAULT_COD_CUTOFF}:00"), "%H:%M:%S").ok()
        },
    }
}

fn configure_settlement_rates() -> SettlementRates {
    let defaults = SettlementRates::default();
    let read = |name: &str, default: i64| {
        env::var(name)
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .filter(|bp| (0..=10_000).contains(bp))
            .unwrap_or(default)
    };
    SettlementRates {
        commission_bp: read("TFN_COMMISSION_BP", defaults.commission_bp),
        tax_bp: read("TFN_TAX_BP", defaults.tax_bp),
    }
}

fn configure_service_areas() -> ServiceAreas {
    let empty = || ServiceAreas::new(Vec::new(), DEFAULT_BUFFER_M).expect("empty area set is valid");
    match env::var("TFN_SERVICE_AREAS") {
        Ok(path) => match ServiceAreas::from_json_file(&path) {
            Ok(areas) => areas,
            Err(e) => {
                error!("🪛️ Could not load service areas from {path}: {e}. Every placement will be refused.");
                empty()
            },
        },
        Err(_) => {
            warn!("🪛️ TFN_SERVICE_AREAS is not set. Every placement will be refused as out of service area.");
            empty()
        },
    }
}

//--------------------------------------   App version map   ---------------------------------------------------------

/// The client applications that check in for forced-update requirements. A typed enum rather than a raw string key:
/// unknown app names fail at the route boundary instead of silently returning nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppChannel {
    Customer,
    Rider,
    Restaurant,
}

impl FromStr for AppChannel {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "customer" => Ok(Self::Customer),
            "rider" => Ok(Self::Rider),
            "restaurant" => Ok(Self::Restaurant),
            other => Err(ServerError::InvalidRequestPath(format!("unknown app channel '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRequirement {
    pub min_version: String,
    pub max_version: String,
    pub update_link: String,
}

impl Default for VersionRequirement {
    fn default() -> Self {
        Self {
            min_version: "1.0.0".to_string(),
            max_version: "99.0.0".to_string(),
            update_link: String::default(),
        }
    }
}

/// Per-app version requirements, validated once at load time. Unknown app names are a load-time error, not a
/// runtime lookup miss.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppVersions {
    #[serde(default)]
    pub customer: VersionRequirement,
    #[serde(default)]
    pub rider: VersionRequirement,
    #[serde(default)]
    pub restaurant: VersionRequirement,
}

impl AppVersions {
    pub fn from_env_or_default() -> Self {
        match env::var("TFN_APP_VERSIONS") {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(versions) => versions,
                Err(e) => {
                    error!("🪛️ TFN_APP_VERSIONS is not valid JSON: {e}. Using defaults.");
                    Self::default()
                },
            },
            Err(_) => Self::default(),
        }
    }

    pub fn for_channel(&self, channel: AppChannel) -> &VersionRequirement {
        match channel {
            AppChannel::Customer => &self.customer,
            AppChannel::Rider => &self.rider,
            AppChannel::Restaurant => &self.restaurant,
        }
    }
}

//--------------------------------------    Global alert     ---------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct GlobalAlert {
    pub title: String,
    pub message: String,
}

impl GlobalAlert {
    fn from_env() -> Option<Self> {
        let title = env::var("TFN_ALERT_TITLE").ok()?;
        let message = env::var("TFN_ALERT_MESSAGE").unwrap_or_default();
        Some(Self { title, message })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn channel_parsing_is_strict() {
        assert_eq!("customer".parse::<AppChannel>().unwrap(), AppChannel::Customer);
        assert_eq!("Rider".parse::<AppChannel>().unwrap(), AppChannel::Rider);
        assert!("driver".parse::<AppChannel>().is_err());
    }

    #[test]
    fn version_map_parses_and_validates_at_load() {
        let json = r#"{
            "customer": {"min_version": "2.1.0", "max_version": "3.0.0", "update_link": "https://play.example/c"},
            "rider": {"min_version": "1.4.0", "max_version": "2.0.0", "update_link": "https://play.example/r"}
        }"#;
        let versions: AppVersions = serde_json::from_str(json).unwrap();
        assert_eq!(versions.for_channel(AppChannel::Customer).min_version, "2.1.0");
        assert_eq!(versions.for_channel(AppChannel::Rider).update_link, "https://play.example/r");
        // Absent channels fall back to defaults rather than failing lookups at runtime.
        assert_eq!(versions.for_channel(AppChannel::Restaurant).min_version, "1.0.0");
        assert!(serde_json::from_str::<AppVersions>(r#"{"driver": {}}"#).is_err());
    }

    #[test]
    fn default_config_has_a_cod_cutoff() {
        let config = ServerConfig::default();
        assert_eq!(config.cod_cutoff, NaiveTime::from_hms_opt(20, 30, 0));
        assert_eq!(config.draft_ttl, Duration::hours(24));
    }
}
