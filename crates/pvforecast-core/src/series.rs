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

//! Hour-indexed irradiance series and decoding of raw API payloads

use crate::error::PartialDataError;
use chrono::{DateTime, Local, NaiveDateTime, Timelike};
use serde_json::Value;
use std::collections::BTreeMap;

/// Undecoded API payload: timestamp string -> number or numeric string
pub type RawForecast = serde_json::Map<String, Value>;

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Truncate an instant to the top of its hour
pub fn align_to_hour(instant: NaiveDateTime) -> NaiveDateTime {
    instant
        .date()
        .and_hms_opt(instant.hour(), 0, 0)
        .unwrap_or(instant)
}

fn is_on_the_hour(instant: NaiveDateTime) -> bool {
    align_to_hour(instant) == instant
}

/// Parse an API key into the local hour it names.
///
/// The key must sit on the hour in its own clock. Keys carrying an offset are
/// then converted to local time and aligned, since the local zone may be a
/// fractional-hour offset away.
pub fn parse_hour(key: &str) -> Result<NaiveDateTime, PartialDataError> {
    let raw = key.trim();
    let unaligned = || PartialDataError::UnalignedTimestamp {
        key: key.to_owned(),
    };

    if let Some(naive) = TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    {
        return if is_on_the_hour(naive) {
            Ok(naive)
        } else {
            Err(unaligned())
        };
    }

    let with_offset =
        DateTime::parse_from_rfc3339(raw).map_err(|_| PartialDataError::InvalidTimestamp {
            key: key.to_owned(),
        })?;
    if !is_on_the_hour(with_offset.naive_local()) {
        return Err(unaligned());
    }
    Ok(align_to_hour(
        with_offset.with_timezone(&Local).naive_local(),
    ))
}

/// Coerce a JSON value to a finite irradiance value.
///
/// Numbers and numeric strings are accepted; null, booleans and NaN are not.
pub fn coerce_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// Ordered hour -> W/m² mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastSeries {
    entries: BTreeMap<NaiveDateTime, f64>,
}

impl ForecastSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a raw payload, returning the usable entries and every entry that
    /// had to be dropped
    pub fn from_raw(raw: &RawForecast) -> (Self, Vec<PartialDataError>) {
        let mut series = Self::new();
        let mut issues = Vec::new();

        for (key, value) in raw {
            let timestamp = match parse_hour(key) {
                Ok(timestamp) => timestamp,
                Err(issue) => {
                    issues.push(issue);
                    continue;
                }
            };
            let Some(number) = coerce_value(value) else {
                issues.push(PartialDataError::InvalidValue {
                    key: key.clone(),
                    value: value.to_string(),
                });
                continue;
            };
            if let Err(issue) = series.insert(timestamp, number) {
                issues.push(issue);
            }
        }

        (series, issues)
    }

    /// Store a value for the hour starting at `at`.
    ///
    /// Same rule as decoding: an instant that is not on the hour is rejected.
    pub fn insert(
        &mut self,
        at: NaiveDateTime,
        value: f64,
    ) -> Result<Option<f64>, PartialDataError> {
        if !is_on_the_hour(at) {
            return Err(PartialDataError::UnalignedTimestamp {
                key: at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            });
        }
        Ok(self.entries.insert(at, value))
    }

    /// Value for the hour containing `instant`
    pub fn get(&self, instant: NaiveDateTime) -> Option<f64> {
        self.entries.get(&align_to_hour(instant)).copied()
    }

    /// Remove every entry strictly before `now`, returning how many were removed
    pub fn evict_before(&mut self, now: NaiveDateTime) -> usize {
        let before = self.entries.len();
        self.entries.retain(|timestamp, _| *timestamp >= now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first_hour(&self) -> Option<NaiveDateTime> {
        self.entries.keys().next().copied()
    }

    pub fn last_hour(&self) -> Option<NaiveDateTime> {
        self.entries.keys().next_back().copied()
    }
}
