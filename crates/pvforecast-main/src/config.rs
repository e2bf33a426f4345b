// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use anyhow::{Context, Result};
use chrono::TimeDelta;
use pvforecast_core::{
    DEFAULT_ENDPOINT, DEFAULT_FORECAST_HOURS, DEFAULT_FORECAST_TYPE, MAX_FORECAST_HOURS,
};
use pvforecast_ha::SetupInput;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

const ADDON_OPTIONS_PATH: &str = "/data/options.json";
const TOML_CONFIG_PATH: &str = "config.toml";
const JSON_CONFIG_PATH: &str = "config.json";
const MAX_REFRESH_INTERVAL_SECS: u64 = 7 * 24 * 3600;

/// Service configuration
///
/// Flat so that the HA add-on `options.json` maps onto it directly.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// pvforecast.cz API key
    #[serde(default)]
    pub api_key: String,

    /// Forecast location; when unset the Home Assistant home location is used
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,

    #[serde(default = "default_forecast_type")]
    pub forecast_type: String,

    /// Number of hours requested from the API (1..=168)
    #[serde(default = "default_forecast_hours")]
    pub forecast_hours: u32,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// How often the forecast is re-fetched; reads refetch once the cache is
    /// older than this
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// How often the sensor value is re-read and published
    #[serde(default = "default_update_interval")]
    pub update_interval_secs: u64,

    #[serde(default)]
    pub ha_base_url: Option<String>,

    #[serde(default)]
    pub ha_token: Option<String>,
}

fn default_forecast_type() -> String {
    DEFAULT_FORECAST_TYPE.to_owned()
}

fn default_forecast_hours() -> u32 {
    DEFAULT_FORECAST_HOURS
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_owned()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_refresh_interval() -> u64 {
    3600
}

fn default_update_interval() -> u64 {
    60
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            latitude: None,
            longitude: None,
            forecast_type: default_forecast_type(),
            forecast_hours: default_forecast_hours(),
            endpoint: default_endpoint(),
            request_timeout_secs: default_request_timeout(),
            refresh_interval_secs: default_refresh_interval(),
            update_interval_secs: default_update_interval(),
            ha_base_url: None,
            ha_token: None,
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &mask(&self.api_key))
            .field("latitude", &self.latitude)
            .field("longitude", &self.longitude)
            .field("forecast_type", &self.forecast_type)
            .field("forecast_hours", &self.forecast_hours)
            .field("endpoint", &self.endpoint)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("refresh_interval_secs", &self.refresh_interval_secs)
            .field("update_interval_secs", &self.update_interval_secs)
            .field("ha_base_url", &self.ha_base_url)
            .field("ha_token", &self.ha_token.as_ref().map(|_| "****"))
            .finish()
    }
}

fn mask(secret: &str) -> &'static str {
    if secret.is_empty() { "<unset>" } else { "****" }
}

impl AppConfig {
    /// Load configuration from HA addon options or a local config file
    pub fn load() -> Result<Self> {
        Self::load_from(
            Path::new(ADDON_OPTIONS_PATH),
            Path::new(TOML_CONFIG_PATH),
            Path::new(JSON_CONFIG_PATH),
            |name| std::env::var(name).ok(),
        )
    }

    /// First existing file wins; with none, defaults plus `env` overrides are used
    fn load_from(
        addon_options: &Path,
        toml_path: &Path,
        json_path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        if let Ok(options_str) = std::fs::read_to_string(addon_options) {
            let config: AppConfig =
                serde_json::from_str(&options_str).context("Failed to parse HA addon options")?;
            info!("Loaded configuration from HA addon options");
            config.validate()?;
            return Ok(config);
        }

        if let Ok(config_str) = std::fs::read_to_string(toml_path) {
            let config: AppConfig =
                toml::from_str(&config_str).context("Failed to parse config.toml")?;
            info!("Loaded configuration from config.toml");
            config.validate()?;
            return Ok(config);
        }

        if let Ok(config_str) = std::fs::read_to_string(json_path) {
            let config: AppConfig =
                serde_json::from_str(&config_str).context("Failed to parse config.json")?;
            info!("Loaded configuration from config.json");
            config.validate()?;
            return Ok(config);
        }

        warn!("No configuration file found, using defaults with environment overrides");
        let config = Self::from_env(env);
        config.validate()?;
        Ok(config)
    }

    fn from_env(env: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(key) = env("PVFORECAST_API_KEY") {
            config.api_key = key;
        }

        if let Some(lat) = env("PVFORECAST_LATITUDE")
            && let Ok(lat) = lat.parse::<f64>()
        {
            config.latitude = Some(lat);
        }
        if let Some(lon) = env("PVFORECAST_LONGITUDE")
            && let Ok(lon) = lon.parse::<f64>()
        {
            config.longitude = Some(lon);
        }

        if let Some(hours) = env("PVFORECAST_FORECAST_HOURS")
            && let Ok(hours) = hours.parse::<u32>()
        {
            config.forecast_hours = hours;
        }

        if let Some(interval) = env("UPDATE_INTERVAL_SECS")
            && let Ok(secs) = interval.parse::<u64>()
        {
            config.update_interval_secs = secs;
        }

        if let Some(url) = env("HA_BASE_URL") {
            config.ha_base_url = Some(url);
        }
        if let Some(token) = env("HA_TOKEN") {
            config.ha_token = Some(token);
        }

        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            anyhow::bail!("api_key cannot be empty (set it in the config or PVFORECAST_API_KEY)");
        }

        if let Some(lat) = self.latitude
            && !(-90.0..=90.0).contains(&lat)
        {
            anyhow::bail!("latitude must be between -90 and 90, got {}", lat);
        }
        if let Some(lon) = self.longitude
            && !(-180.0..=180.0).contains(&lon)
        {
            anyhow::bail!("longitude must be between -180 and 180, got {}", lon);
        }

        if !(1..=MAX_FORECAST_HOURS).contains(&self.forecast_hours) {
            anyhow::bail!(
                "forecast_hours must be between 1 and {}, got {}",
                MAX_FORECAST_HOURS,
                self.forecast_hours
            );
        }

        if self.forecast_type.trim().is_empty() {
            anyhow::bail!("forecast_type cannot be empty");
        }

        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            anyhow::bail!("endpoint must be an http(s) URL, got '{}'", self.endpoint);
        }

        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than 0");
        }
        if !(1..=MAX_REFRESH_INTERVAL_SECS).contains(&self.refresh_interval_secs) {
            anyhow::bail!(
                "refresh_interval_secs must be between 1 and {}, got {}",
                MAX_REFRESH_INTERVAL_SECS,
                self.refresh_interval_secs
            );
        }
        if self.update_interval_secs == 0 {
            anyhow::bail!("update_interval_secs must be greater than 0");
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Cache age after which a sensor read refetches
    pub fn staleness_threshold(&self) -> TimeDelta {
        TimeDelta::from_std(self.refresh_interval()).unwrap_or_else(|_| TimeDelta::hours(1))
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }

    /// Form values for the setup validation flow
    pub fn setup_input(&self) -> SetupInput {
        SetupInput {
            api_key: self.api_key.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
            forecast_type: self.forecast_type.clone(),
            forecast_hours: self.forecast_hours,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn valid() -> AppConfig {
        AppConfig {
            api_key: "abc123".to_owned(),
            latitude: Some(50.08),
            longitude: Some(14.42),
            ..AppConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.forecast_type, "pv");
        assert_eq!(config.forecast_hours, 72);
        assert_eq!(config.endpoint, "http://www.pvforecast.cz/api/");
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.refresh_interval_secs, 3600);
        assert_eq!(config.update_interval_secs, 60);

        // No API key by default
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_ranges() {
        assert!(valid().validate().is_ok());

        let mut config = valid();
        config.latitude = Some(90.5);
        assert!(config.validate().unwrap_err().to_string().contains("latitude"));

        let mut config = valid();
        config.longitude = Some(-181.0);
        assert!(config.validate().unwrap_err().to_string().contains("longitude"));

        let mut config = valid();
        config.forecast_hours = 200;
        assert!(config.validate().unwrap_err().to_string().contains("forecast_hours"));

        let mut config = valid();
        config.update_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = valid();
        config.endpoint = "ftp://example.com".to_owned();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_staleness_threshold_follows_refresh_interval() {
        let mut config = valid();
        assert_eq!(config.staleness_threshold(), TimeDelta::hours(1));

        config.refresh_interval_secs = 7200;
        assert!(config.validate().is_ok());
        assert_eq!(config.staleness_threshold(), TimeDelta::hours(2));

        config.refresh_interval_secs = 8 * 24 * 3600;
        assert!(
            config
                .validate()
                .unwrap_err()
                .to_string()
                .contains("refresh_interval_secs")
        );
    }

    #[test]
    fn test_missing_location_is_valid() {
        let config = AppConfig {
            api_key: "abc123".to_owned(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_prefers_addon_options() {
        let dir = TempDir::new().unwrap();
        let options = dir.path().join("options.json");
        let toml_path = dir.path().join("config.toml");
        std::fs::write(&options, r#"{"api_key": "from_addon", "forecast_hours": 24}"#).unwrap();
        std::fs::write(&toml_path, "api_key = \"from_toml\"\n").unwrap();

        let config = AppConfig::load_from(
            &options,
            &toml_path,
            &dir.path().join("config.json"),
            |_| None,
        )
        .unwrap();

        assert_eq!(config.api_key, "from_addon");
        assert_eq!(config.forecast_hours, 24);
        assert_eq!(config.update_interval_secs, 60);
    }

    #[test]
    fn test_load_toml() {
        let dir = TempDir::new().unwrap();
        let toml_path = dir.path().join("config.toml");
        std::fs::write(
            &toml_path,
            "api_key = \"abc\"\nlatitude = 49.19\nlongitude = 16.61\nupdate_interval_secs = 30\n",
        )
        .unwrap();

        let config = AppConfig::load_from(
            &dir.path().join("missing.json"),
            &toml_path,
            &dir.path().join("config.json"),
            |_| None,
        )
        .unwrap();

        assert_eq!(config.latitude, Some(49.19));
        assert_eq!(config.longitude, Some(16.61));
        assert_eq!(config.update_interval_secs, 30);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = TempDir::new().unwrap();
        let json_path = dir.path().join("config.json");
        std::fs::write(&json_path, r#"{"api_key": "abc", "latitude": 123.0}"#).unwrap();

        let result = AppConfig::load_from(
            &dir.path().join("missing.json"),
            &dir.path().join("missing.toml"),
            &json_path,
            |_| None,
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_load_falls_back_to_env() {
        let dir = TempDir::new().unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            ("PVFORECAST_API_KEY", "env_key"),
            ("PVFORECAST_LATITUDE", "50.5"),
            ("PVFORECAST_LONGITUDE", "not-a-number"),
            ("PVFORECAST_FORECAST_HOURS", "48"),
            ("UPDATE_INTERVAL_SECS", "120"),
            ("HA_TOKEN", "secret"),
        ]);

        let config = AppConfig::load_from(
            &dir.path().join("a.json"),
            &dir.path().join("b.toml"),
            &dir.path().join("c.json"),
            |name| env.get(name).map(|v| (*v).to_owned()),
        )
        .unwrap();

        assert_eq!(config.api_key, "env_key");
        assert_eq!(config.latitude, Some(50.5));
        assert_eq!(config.longitude, None);
        assert_eq!(config.forecast_hours, 48);
        assert_eq!(config.update_interval_secs, 120);
        assert_eq!(config.ha_token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_debug_masks_secrets() {
        let mut config = valid();
        config.ha_token = Some("ha_secret".to_owned());

        let debug = format!("{config:?}");
        assert!(!debug.contains("abc123"));
        assert!(!debug.contains("ha_secret"));
    }

    #[test]
    fn test_setup_input_carries_form_values() {
        let input = valid().setup_input();
        assert_eq!(input.api_key, "abc123");
        assert_eq!(input.latitude, Some(50.08));
        assert_eq!(input.forecast_type, "pv");
    }
}
