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

//! PV Forecast core - pvforecast.cz fetcher and hourly forecast cache
//!
//! [`ForecastFetcher`] performs a single bounded GET against the forecast API.
//! [`ForecastCache`] owns the resulting hour-indexed series, evicts past hours
//! and answers "what is the irradiance right now". The host decides when to
//! refresh; the fetcher knows nothing about the cache.

pub mod cache;
pub mod error;
pub mod fetcher;
pub mod params;
pub mod series;

pub use cache::{CacheStatus, ForecastCache, ForecastSnapshot};
pub use error::{FetchError, PartialDataError, Result};
pub use fetcher::{
    DEFAULT_ENDPOINT, DEFAULT_TIMEOUT, ForecastFetcher, ForecastSource, build_client, fetch,
};
pub use params::{
    DEFAULT_FORECAST_FORMAT, DEFAULT_FORECAST_HOURS, DEFAULT_FORECAST_TIME_TYPE,
    DEFAULT_FORECAST_TYPE, FetchParameters, MAX_FORECAST_HOURS,
};
pub use series::{ForecastSeries, RawForecast, align_to_hour, parse_hour};
