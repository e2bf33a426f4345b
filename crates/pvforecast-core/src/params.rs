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

//! Query parameters for the pvforecast.cz API

use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_FORECAST_TYPE: &str = "pv";
pub const DEFAULT_FORECAST_FORMAT: &str = "json";
pub const DEFAULT_FORECAST_TIME_TYPE: &str = "hour";
pub const DEFAULT_FORECAST_HOURS: u32 = 72;

/// Longest horizon the API accepts (one week of hourly values)
pub const MAX_FORECAST_HOURS: u32 = 168;

fn default_forecast_type() -> String {
    DEFAULT_FORECAST_TYPE.to_owned()
}

fn default_forecast_format() -> String {
    DEFAULT_FORECAST_FORMAT.to_owned()
}

fn default_forecast_time_type() -> String {
    DEFAULT_FORECAST_TIME_TYPE.to_owned()
}

fn default_forecast_hours() -> u32 {
    DEFAULT_FORECAST_HOURS
}

/// Immutable parameter bundle sent with every forecast request
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchParameters {
    pub api_key: String,
    pub latitude: f64,
    pub longitude: f64,

    /// Forecast kind, "pv" for photovoltaic irradiance
    #[serde(default = "default_forecast_type")]
    pub forecast_type: String,

    /// Response format, the cache only understands "json"
    #[serde(default = "default_forecast_format")]
    pub forecast_format: String,

    /// Time granularity of the series ("hour")
    #[serde(default = "default_forecast_time_type")]
    pub forecast_time_type: String,

    /// Number of series entries to request
    #[serde(default = "default_forecast_hours")]
    pub forecast_hours: u32,
}

impl FetchParameters {
    /// Parameters with the API defaults for everything but key and location
    pub fn new(api_key: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            api_key: api_key.into(),
            latitude,
            longitude,
            forecast_type: default_forecast_type(),
            forecast_format: default_forecast_format(),
            forecast_time_type: default_forecast_time_type(),
            forecast_hours: DEFAULT_FORECAST_HOURS,
        }
    }

    pub fn with_forecast_type(mut self, forecast_type: impl Into<String>) -> Self {
        self.forecast_type = forecast_type.into();
        self
    }

    pub fn with_forecast_hours(mut self, hours: u32) -> Self {
        self.forecast_hours = hours;
        self
    }

    /// Query string pairs in the order the API documents them
    pub fn query(&self) -> [(&'static str, String); 7] {
        [
            ("key", self.api_key.clone()),
            ("lat", self.latitude.to_string()),
            ("lon", self.longitude.to_string()),
            ("forecast", self.forecast_type.clone()),
            ("format", self.forecast_format.clone()),
            ("type", self.forecast_time_type.clone()),
            ("number", self.forecast_hours.to_string()),
        ]
    }

    /// API key with everything but the last four characters masked
    pub fn masked_api_key(&self) -> String {
        let count = self.api_key.chars().count();
        if count <= 4 {
            return "****".to_owned();
        }
        let tail: String = self.api_key.chars().skip(count - 4).collect();
        format!("****{tail}")
    }
}

impl fmt::Debug for FetchParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchParameters")
            .field("api_key", &self.masked_api_key())
            .field("latitude", &self.latitude)
            .field("longitude", &self.longitude)
            .field("forecast_type", &self.forecast_type)
            .field("forecast_format", &self.forecast_format)
            .field("forecast_time_type", &self.forecast_time_type)
            .field("forecast_hours", &self.forecast_hours)
            .finish()
    }
}
