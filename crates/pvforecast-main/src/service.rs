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

//! Host loop: hourly refresh, periodic sensor update, clean shutdown

use chrono::{Local, NaiveDateTime};
use pvforecast_ha::{ForecastSensor, HomeAssistantClient, SensorState};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, interval, interval_at};
use tracing::{debug, error, info, warn};

/// Drives one forecast sensor and publishes it to Home Assistant when connected
#[derive(Debug)]
pub struct Service {
    sensor: ForecastSensor,
    ha: Option<HomeAssistantClient>,
    refresh_interval: Duration,
    update_interval: Duration,
}

impl Service {
    pub fn new(
        sensor: ForecastSensor,
        ha: Option<HomeAssistantClient>,
        refresh_interval: Duration,
        update_interval: Duration,
    ) -> Self {
        Self {
            sensor,
            ha,
            refresh_interval,
            update_interval,
        }
    }

    pub fn sensor(&self) -> &ForecastSensor {
        &self.sensor
    }

    /// Scheduled refresh; failures are logged and the cache keeps its data
    pub async fn refresh(&self) {
        match self.sensor.refresh().await {
            Ok(()) => info!(
                "Forecast refreshed: {} entries cached",
                self.sensor.cache().len()
            ),
            Err(e) => error!("Forecast refresh failed: {}", e),
        }
    }

    /// Re-read the sensor for `now` and publish the result
    pub async fn update_at(&mut self, now: NaiveDateTime) -> SensorState {
        let state = self.sensor.update(now).await;
        self.publish().await;
        state
    }

    async fn publish(&self) {
        let payload = self.sensor.ha_state();
        let entity_id = self.sensor.entity_id();

        match &self.ha {
            Some(client) => {
                if let Err(e) = client.set_state(&entity_id, &payload).await {
                    warn!("Failed to publish {} to Home Assistant: {}", entity_id, e);
                }
            }
            None => info!("{} = {}", entity_id, payload.state),
        }
    }

    /// Run until `shutdown` resolves.
    ///
    /// Shutdown wins over pending work; an in-flight fetch is dropped and the
    /// cache keeps its last complete snapshot.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);

        let mut refresh_tick =
            interval_at(Instant::now() + self.refresh_interval, self.refresh_interval);
        let mut update_tick = interval(self.update_interval);

        info!(
            "Running: refresh every {}s, update every {}s",
            self.refresh_interval.as_secs(),
            self.update_interval.as_secs()
        );

        tokio::select! {
            biased;
            () = &mut shutdown => {
                info!("Shutdown requested before the initial refresh completed");
                return;
            }
            () = self.refresh() => {}
        }

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = refresh_tick.tick() => {
                    debug!("Refresh tick");
                    tokio::select! {
                        biased;
                        () = &mut shutdown => {
                            info!("Shutdown signal received during refresh");
                            break;
                        }
                        () = self.refresh() => {}
                    }
                }
                _ = update_tick.tick() => {
                    let now = Local::now().naive_local();
                    tokio::select! {
                        biased;
                        () = &mut shutdown => {
                            info!("Shutdown signal received during update");
                            break;
                        }
                        _ = self.update_at(now) => {}
                    }
                }
            }
        }

        info!("Shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use mockito::{Matcher, Server};
    use pvforecast_core::{CacheStatus, FetchParameters, ForecastCache, ForecastFetcher};
    use serde_json::json;
    use std::sync::Arc;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 21)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn sensor_for(endpoint: String) -> ForecastSensor {
        let params = FetchParameters::new("test_key", 50.08, 14.42);
        let fetcher =
            ForecastFetcher::with_timeout(endpoint, params, Duration::from_secs(5)).unwrap();
        let cache = Arc::new(ForecastCache::new(Arc::new(fetcher)));
        ForecastSensor::new(cache, 50.08, 14.42)
    }

    #[tokio::test]
    async fn test_update_publishes_to_home_assistant() {
        let mut forecast = Server::new_async().await;
        let api = forecast
            .mock("GET", "/api/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({
                    "2024-06-21T12:00:00": "640.5",
                    "2024-06-21T13:00:00": 700
                })
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let mut ha_server = Server::new_async().await;
        let publish = ha_server
            .mock("POST", "/api/states/sensor.pvforecast_cz_50_08_14_42")
            .match_header("authorization", "Bearer ha_token")
            .match_body(Matcher::PartialJson(json!({
                "state": "640.5",
                "attributes": {"unit_of_measurement": "W/m²", "cache_status": "available"}
            })))
            .with_status(200)
            .with_body(
                json!({
                    "entity_id": "sensor.pvforecast_cz_50_08_14_42",
                    "state": "640.5",
                    "attributes": {},
                    "last_changed": "2024-06-21T12:10:00+00:00",
                    "last_updated": "2024-06-21T12:10:00+00:00"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let ha = HomeAssistantClient::new(ha_server.url(), "ha_token").unwrap();
        let mut service = Service::new(
            sensor_for(format!("{}/api/", forecast.url())),
            Some(ha),
            Duration::from_secs(3600),
            Duration::from_secs(60),
        );

        let state = service.update_at(at(12, 10)).await;

        assert_eq!(state.native_value, Some(640.5));
        assert!(state.available);
        api.assert_async().await;
        publish.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_without_home_assistant_still_reads() {
        let mut forecast = Server::new_async().await;
        let _api = forecast
            .mock("GET", "/api/")
            .match_query(Matcher::Any)
            .with_status(403)
            .create_async()
            .await;

        let mut service = Service::new(
            sensor_for(format!("{}/api/", forecast.url())),
            None,
            Duration::from_secs(3600),
            Duration::from_secs(60),
        );

        let state = service.update_at(at(12, 10)).await;

        assert!(!state.available);
        assert_eq!(service.sensor().cache().status(), CacheStatus::Unavailable);
        assert_eq!(service.sensor().ha_state().state, "unavailable");
    }

    #[tokio::test]
    async fn test_publish_failure_is_not_fatal() {
        let mut forecast = Server::new_async().await;
        let _api = forecast
            .mock("GET", "/api/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"2024-06-21T12:00:00": 100}).to_string())
            .create_async()
            .await;

        let mut ha_server = Server::new_async().await;
        let _publish = ha_server
            .mock("POST", Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let ha = HomeAssistantClient::new(ha_server.url(), "ha_token").unwrap();
        let mut service = Service::new(
            sensor_for(format!("{}/api/", forecast.url())),
            Some(ha),
            Duration::from_secs(3600),
            Duration::from_secs(60),
        );

        let state = service.update_at(at(12, 30)).await;
        assert_eq!(state.native_value, Some(100.0));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let service = Service::new(
            sensor_for("http://127.0.0.1:9/api/".to_owned()),
            None,
            Duration::from_secs(3600),
            Duration::from_secs(60),
        );

        tokio::time::timeout(Duration::from_secs(5), service.run(async {}))
            .await
            .expect("run should return once shutdown resolves");
    }
}
