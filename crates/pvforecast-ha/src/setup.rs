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

//! Setup flow: validate user input with one test fetch before creating an entry

use crate::client::HomeAssistantClient;
use crate::types::HaLocation;
use pvforecast_core::{
    DEFAULT_FORECAST_HOURS, DEFAULT_FORECAST_TYPE, FetchError, FetchParameters,
    MAX_FORECAST_HOURS, build_client, fetch,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

fn default_forecast_type() -> String {
    DEFAULT_FORECAST_TYPE.to_owned()
}

fn default_forecast_hours() -> u32 {
    DEFAULT_FORECAST_HOURS
}

/// What the user typed into the setup form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupInput {
    pub api_key: String,
    /// Falls back to the Home Assistant home location
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default = "default_forecast_type")]
    pub forecast_type: String,
    #[serde(default = "default_forecast_hours")]
    pub forecast_hours: u32,
}

impl SetupInput {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            latitude: None,
            longitude: None,
            forecast_type: default_forecast_type(),
            forecast_hours: default_forecast_hours(),
        }
    }

    pub fn at(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }
}

/// A validated configuration, ready to build a sensor from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub title: String,
    pub params: FetchParameters,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("the API key was rejected")]
    InvalidApiKey,

    #[error("cannot connect to the forecast API")]
    CannotConnect,

    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl SetupError {
    /// Stable key the UI translates into a user-facing message
    pub fn translation_key(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::InvalidApiKey => "invalid_api_key",
            Self::CannotConnect => "cannot_connect",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl From<FetchError> for SetupError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::InvalidCredentials => Self::InvalidApiKey,
            FetchError::ConnectionFailure(_) => Self::CannotConnect,
            FetchError::RemoteError { .. } | FetchError::MalformedResponse(_) => {
                Self::Unknown(err.to_string())
            }
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> SetupError {
    SetupError::InvalidInput {
        field,
        reason: reason.into(),
    }
}

/// Check the form values and resolve the location.
///
/// Missing coordinates are taken from `home`; it is an error if neither is set.
pub fn validate_input(
    input: &SetupInput,
    home: Option<HaLocation>,
) -> Result<FetchParameters, SetupError> {
    let api_key = input.api_key.trim();
    if api_key.is_empty() {
        return Err(invalid("api_key", "must not be empty"));
    }

    let latitude = input
        .latitude
        .or(home.map(|h| h.latitude))
        .ok_or_else(|| invalid("latitude", "not set and no home location available"))?;
    let longitude = input
        .longitude
        .or(home.map(|h| h.longitude))
        .ok_or_else(|| invalid("longitude", "not set and no home location available"))?;

    if !(-90.0..=90.0).contains(&latitude) {
        return Err(invalid("latitude", format!("{latitude} is outside -90..90")));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(invalid(
            "longitude",
            format!("{longitude} is outside -180..180"),
        ));
    }
    if !(1..=MAX_FORECAST_HOURS).contains(&input.forecast_hours) {
        return Err(invalid(
            "forecast_hours",
            format!("{} is outside 1..{MAX_FORECAST_HOURS}", input.forecast_hours),
        ));
    }
    if input.forecast_type.trim().is_empty() {
        return Err(invalid("forecast_type", "must not be empty"));
    }

    Ok(FetchParameters::new(api_key, latitude, longitude)
        .with_forecast_type(input.forecast_type.trim())
        .with_forecast_hours(input.forecast_hours))
}

/// Validate the input and make one test call against `endpoint`.
///
/// An entry is returned only when the API answered with a well-formed forecast.
pub async fn validate_setup(
    input: &SetupInput,
    home: Option<HaLocation>,
    endpoint: &str,
    timeout: Duration,
) -> Result<ConfigEntry, SetupError> {
    let params = validate_input(input, home)?;
    let client = build_client(timeout).map_err(SetupError::from)?;

    match fetch(&client, endpoint, &params).await {
        Ok(raw) => {
            info!(
                "API key {} accepted, test fetch returned {} entries",
                params.masked_api_key(),
                raw.len()
            );
            Ok(ConfigEntry {
                title: format!("PV Forecast CZ ({}, {})", params.latitude, params.longitude),
                params,
            })
        }
        Err(e) => {
            let err = SetupError::from(e);
            if matches!(err, SetupError::Unknown(_)) {
                error!("Unexpected error during API validation: {}", err);
            } else {
                warn!("Setup validation failed: {}", err);
            }
            Err(err)
        }
    }
}

/// Home location from Home Assistant, if a client is available and answers
pub async fn home_location(client: Option<&HomeAssistantClient>) -> Option<HaLocation> {
    let client = client?;
    match client.get_location().await {
        Ok(location) => Some(location),
        Err(e) => {
            warn!("Could not read home location from Home Assistant: {}", e);
            None
        }
    }
}
