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

//! The PV forecast sensor entity presented to Home Assistant

use crate::types::HaStateUpdate;
use chrono::NaiveDateTime;
use pvforecast_core::{ForecastCache, Result};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

pub const DOMAIN: &str = "pvforecast_cz";
pub const MANUFACTURER: &str = "PVForecast.cz";
pub const MODEL: &str = "PV Forecast API";

/// Static description of a sensor kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SensorDescription {
    pub key: &'static str,
    pub name: &'static str,
    pub native_unit_of_measurement: &'static str,
    pub device_class: &'static str,
    pub state_class: &'static str,
}

impl SensorDescription {
    pub const PV_FORECAST: Self = Self {
        key: "pv_forecast",
        name: "PV Forecast",
        native_unit_of_measurement: "W/m²",
        device_class: "irradiance",
        state_class: "measurement",
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// (domain, device id) pairs
    pub identifiers: Vec<(String, String)>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
}

/// What the host shows: the current value and whether the sensor is available
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SensorState {
    pub native_value: Option<f64>,
    pub available: bool,
}

/// One configured location's forecast sensor
#[derive(Debug)]
pub struct ForecastSensor {
    description: SensorDescription,
    unique_id: String,
    device_info: DeviceInfo,
    cache: Arc<ForecastCache>,
    state: SensorState,
}

impl ForecastSensor {
    pub fn new(cache: Arc<ForecastCache>, latitude: f64, longitude: f64) -> Self {
        let unique_id = format!("{DOMAIN}_{latitude}_{longitude}");
        let device_info = DeviceInfo {
            identifiers: vec![(DOMAIN.to_owned(), unique_id.clone())],
            name: "PV Forecast CZ".to_owned(),
            manufacturer: MANUFACTURER.to_owned(),
            model: MODEL.to_owned(),
        };
        Self {
            description: SensorDescription::PV_FORECAST,
            unique_id,
            device_info,
            cache,
            state: SensorState::default(),
        }
    }

    pub fn description(&self) -> &SensorDescription {
        &self.description
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    pub fn cache(&self) -> &Arc<ForecastCache> {
        &self.cache
    }

    pub fn state(&self) -> SensorState {
        self.state
    }

    /// HA entity id derived from the unique id, e.g. `sensor.pvforecast_cz_50_08_14_42`
    pub fn entity_id(&self) -> String {
        let object_id: String = self
            .unique_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("sensor.{object_id}")
    }

    /// Scheduled hourly refresh of the underlying forecast
    pub async fn refresh(&self) -> Result<()> {
        self.cache.refresh().await
    }

    /// Re-read the value for the hour containing `now`
    pub async fn update(&mut self, now: NaiveDateTime) -> SensorState {
        let native_value = self.cache.value_as_of(now, now).await;
        let next = SensorState {
            native_value,
            available: native_value.is_some(),
        };

        if next != self.state {
            info!(
                "{} -> {:?} W/m² (available: {})",
                self.entity_id(),
                next.native_value,
                next.available
            );
        } else {
            debug!("{} unchanged at {:?}", self.entity_id(), next.native_value);
        }
        self.state = next;
        next
    }

    /// State payload for the HA REST API
    pub fn ha_state(&self) -> HaStateUpdate {
        let state = match self.state.native_value {
            Some(value) if self.state.available => value.to_string(),
            _ => "unavailable".to_owned(),
        };
        let snapshot = self.cache.snapshot();

        HaStateUpdate {
            state,
            attributes: json!({
                "friendly_name": self.description.name,
                "unit_of_measurement": self.description.native_unit_of_measurement,
                "device_class": self.description.device_class,
                "state_class": self.description.state_class,
                "unique_id": self.unique_id,
                "cache_status": snapshot.status,
                "forecast_entries": snapshot.series.len(),
                "last_refresh": snapshot.last_refresh.map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string()),
                "last_error": snapshot.last_error.as_ref().map(ToString::to_string),
            }),
        }
    }
}
