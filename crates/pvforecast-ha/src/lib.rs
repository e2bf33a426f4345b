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

//! Home Assistant glue for the PV forecast: REST client, sensor entity and
//! the setup validation flow

pub mod client;
pub mod errors;
pub mod sensor;
pub mod setup;
pub mod types;

pub use client::HomeAssistantClient;
pub use errors::{HaError, HaResult};
pub use sensor::{DOMAIN, DeviceInfo, ForecastSensor, SensorDescription, SensorState};
pub use setup::{ConfigEntry, SetupError, SetupInput, home_location, validate_input, validate_setup};
pub use types::{HaEntityState, HaLocation, HaStateUpdate};
