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

//! In-memory forecast cache.
//!
//! The series lives in an immutable [`ForecastSnapshot`] behind a lock that is
//! only held long enough to clone or swap an `Arc`. Readers therefore always
//! see a complete series, never a half-applied refresh. A refresh performs the
//! network call without holding the snapshot lock and swaps the result in with
//! a single write, so dropping an in-flight refresh leaves the cache untouched.

use crate::error::{FetchError, Result};
use crate::fetcher::ForecastSource;
use crate::series::{ForecastSeries, align_to_hour};
use chrono::{Local, NaiveDateTime, TimeDelta};
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Availability of the cached forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    /// No refresh attempted yet
    #[default]
    Unpopulated,
    /// Last refresh succeeded
    Available,
    /// Last refresh failed, previous series still served
    Stale,
    /// Last refresh failed and there is nothing to serve
    Unavailable,
}

impl CacheStatus {
    pub fn is_available(self) -> bool {
        matches!(self, Self::Available | Self::Stale)
    }
}

/// Immutable view of the cache at one point in time
#[derive(Debug, Clone, Default)]
pub struct ForecastSnapshot {
    pub series: ForecastSeries,
    /// Local time of the last successful refresh
    pub last_refresh: Option<NaiveDateTime>,
    pub status: CacheStatus,
    /// Error of the last refresh, cleared by the next success
    pub last_error: Option<FetchError>,
}

impl ForecastSnapshot {
    /// Empty, or last successful refresh older than `threshold`.
    /// A refresh stamped after `now` means the clock went back; also due.
    pub fn is_due(&self, now: NaiveDateTime, threshold: TimeDelta) -> bool {
        self.series.is_empty()
            || self
                .last_refresh
                .is_none_or(|refreshed| refreshed > now || now - refreshed > threshold)
    }
}

pub struct ForecastCache {
    source: Arc<dyn ForecastSource>,
    snapshot: RwLock<Arc<ForecastSnapshot>>,
    refresh_lock: tokio::sync::Mutex<()>,
    staleness_threshold: TimeDelta,
}

impl ForecastCache {
    pub fn new(source: Arc<dyn ForecastSource>) -> Self {
        Self {
            source,
            snapshot: RwLock::new(Arc::new(ForecastSnapshot::default())),
            refresh_lock: tokio::sync::Mutex::new(()),
            staleness_threshold: TimeDelta::hours(1),
        }
    }

    /// Override the age after which `value_at` refreshes before answering
    pub fn with_staleness_threshold(mut self, threshold: TimeDelta) -> Self {
        self.staleness_threshold = threshold;
        self
    }

    /// Current snapshot; cheap, never blocks on a running refresh
    pub fn snapshot(&self) -> Arc<ForecastSnapshot> {
        Arc::clone(&self.snapshot.read())
    }

    pub fn status(&self) -> CacheStatus {
        self.snapshot.read().status
    }

    pub fn is_available(&self) -> bool {
        self.status().is_available()
    }

    pub fn last_refresh(&self) -> Option<NaiveDateTime> {
        self.snapshot.read().last_refresh
    }

    pub fn len(&self) -> usize {
        self.snapshot.read().series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.read().series.is_empty()
    }

    /// Refresh against the local wall clock
    pub async fn refresh(&self) -> Result<()> {
        self.refresh_at(Local::now().naive_local()).await
    }

    /// Fetch a new series and replace the stored one wholesale.
    ///
    /// Entries before the hour containing `now` are evicted from the new
    /// series, so the current hour survives a mid-hour refresh. On failure the
    /// previous series is kept.
    pub async fn refresh_at(&self, now: NaiveDateTime) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;

        let raw = match self.source.fetch().await {
            Ok(raw) => raw,
            Err(e) => {
                self.mark_failed(&e);
                return Err(e);
            }
        };

        let (mut series, issues) = ForecastSeries::from_raw(&raw);
        for issue in &issues {
            warn!("Dropping forecast entry: {}", issue);
        }
        if series.is_empty() {
            let err = FetchError::MalformedResponse(format!(
                "no usable forecast entries ({} dropped)",
                issues.len()
            ));
            self.mark_failed(&err);
            return Err(err);
        }

        let evicted = series.evict_before(align_to_hour(now));
        let next = ForecastSnapshot {
            series,
            last_refresh: Some(now),
            status: CacheStatus::Available,
            last_error: None,
        };
        info!(
            "Retrieved PV forecast from {}: {} entries ({} past, {} invalid), {:?} .. {:?}",
            self.source.name(),
            next.series.len(),
            evicted,
            issues.len(),
            next.series.first_hour(),
            next.series.last_hour()
        );
        *self.snapshot.write() = Arc::new(next);

        Ok(())
    }

    fn mark_failed(&self, err: &FetchError) {
        let mut current = self.snapshot.write();
        let status = if current.series.is_empty() {
            CacheStatus::Unavailable
        } else {
            CacheStatus::Stale
        };
        error!(
            "PV forecast refresh from {} failed: {} (cache now {:?}, {} entries kept)",
            self.source.name(),
            err,
            status,
            current.series.len()
        );
        let mut next = ForecastSnapshot::clone(&current);
        next.status = status;
        next.last_error = Some(err.clone());
        *current = Arc::new(next);
    }

    /// Remove every entry strictly before `now`; returns how many were removed
    pub fn evict(&self, now: NaiveDateTime) -> usize {
        let mut current = self.snapshot.write();
        let mut next = ForecastSnapshot::clone(&current);
        let removed = next.series.evict_before(now);
        if removed > 0 {
            debug!("Evicted {} past forecast entries before {}", removed, now);
            *current = Arc::new(next);
        }
        removed
    }

    /// Stored value for the hour containing `instant`; never fetches
    pub fn lookup(&self, instant: NaiveDateTime) -> Option<f64> {
        self.snapshot.read().series.get(instant)
    }

    /// Whether a read at wall-clock `now` would refresh before answering.
    ///
    /// After a non-transient failure (rejected API key) reads stop fetching;
    /// only the scheduled `refresh` tries again.
    pub fn needs_refresh(&self, now: NaiveDateTime) -> bool {
        let snapshot = self.snapshot.read();
        if !snapshot.is_due(now, self.staleness_threshold) {
            return false;
        }
        match &snapshot.last_error {
            Some(err) if !err.is_transient() => {
                debug!("Not refreshing on read after '{}'", err);
                false
            }
            _ => true,
        }
    }

    /// Value for the hour containing `instant`, judged against the local clock
    pub async fn value_at(&self, instant: NaiveDateTime) -> Option<f64> {
        self.value_as_of(instant, Local::now().naive_local()).await
    }

    /// Value for the hour containing `instant` with the wall clock at `now`.
    ///
    /// When the cache is empty or older than the staleness threshold at `now`
    /// one refresh is attempted first. A failed refresh does not fail the
    /// lookup; whatever is still cached answers. `instant` only selects the
    /// hour and may lie in the future.
    pub async fn value_as_of(&self, instant: NaiveDateTime, now: NaiveDateTime) -> Option<f64> {
        if self.needs_refresh(now) {
            debug!("Forecast cache empty or stale at {}, refreshing", now);
            if let Err(e) = self.refresh_at(now).await {
                warn!("Answering from cached forecast after failed refresh: {}", e);
            }
        }
        self.lookup(instant)
    }
}

impl fmt::Debug for ForecastCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("ForecastCache")
            .field("source", &self.source.name())
            .field("status", &snapshot.status)
            .field("entries", &snapshot.series.len())
            .field("last_refresh", &snapshot.last_refresh)
            .finish_non_exhaustive()
    }
}
