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

//! Single-shot HTTP fetch of the pvforecast.cz series

use crate::error::{FetchError, Result};
use crate::params::FetchParameters;
use crate::series::RawForecast;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info};

pub const DEFAULT_ENDPOINT: &str = "http://www.pvforecast.cz/api/";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Anything that can hand the cache a fresh raw forecast
#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn fetch(&self) -> Result<RawForecast>;

    /// Human-readable name for logs
    fn name(&self) -> &str;
}

/// Build an HTTP client whose requests can never hang past `timeout`
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .map_err(|e| FetchError::ConnectionFailure(format!("Failed to build HTTP client: {e}")))
}

/// Perform one GET against `endpoint` and decode the JSON object body.
///
/// No retries: callers decide whether and when to try again.
pub async fn fetch(
    client: &Client,
    endpoint: &str,
    params: &FetchParameters,
) -> Result<RawForecast> {
    debug!(
        "Fetching PV forecast from {} (key={}, lat={}, lon={}, forecast={}, type={}, number={})",
        endpoint,
        params.masked_api_key(),
        params.latitude,
        params.longitude,
        params.forecast_type,
        params.forecast_time_type,
        params.forecast_hours
    );

    let response = client
        .get(endpoint)
        .query(&params.query())
        .send()
        .await
        .map_err(|e| {
            let err = FetchError::from(e);
            error!("Connection error fetching PV forecast: {}", err);
            err
        })?;

    match response.status() {
        StatusCode::OK => {
            let body = response.text().await?;
            let raw = parse_body(&body)?;
            debug!("Received {} forecast entries", raw.len());
            Ok(raw)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            error!(
                "API error {}: invalid API key {}",
                response.status().as_u16(),
                params.masked_api_key()
            );
            Err(FetchError::InvalidCredentials)
        }
        status => {
            let error_text = response.text().await.unwrap_or_default();
            error!(
                "HTTP error {} fetching PV forecast from {}: {}",
                status.as_u16(),
                endpoint,
                error_text.chars().take(200).collect::<String>()
            );
            Err(FetchError::RemoteError {
                status: status.as_u16(),
            })
        }
    }
}

/// Decode a 200 body, which must be a JSON object
pub fn parse_body(body: &str) -> Result<RawForecast> {
    let not_an_object =
        |kind: &str| FetchError::MalformedResponse(format!("expected a JSON object, got {kind}"));

    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Array(_)) => Err(not_an_object("an array")),
        Ok(Value::String(_)) => Err(not_an_object("a string")),
        Ok(Value::Number(_)) => Err(not_an_object("a number")),
        Ok(Value::Bool(_)) => Err(not_an_object("a boolean")),
        Ok(Value::Null) => Err(not_an_object("null")),
        Err(e) => Err(FetchError::MalformedResponse(e.to_string())),
    }
}

/// pvforecast.cz client bound to one parameter set
#[derive(Clone)]
pub struct ForecastFetcher {
    client: Client,
    endpoint: String,
    params: FetchParameters,
}

impl ForecastFetcher {
    /// Create a fetcher with the default request timeout
    pub fn new(endpoint: impl Into<String>, params: FetchParameters) -> Result<Self> {
        Self::with_timeout(endpoint, params, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        endpoint: impl Into<String>,
        params: FetchParameters,
        timeout: Duration,
    ) -> Result<Self> {
        let client = build_client(timeout)?;
        Ok(Self::with_client(client, endpoint, params))
    }

    /// Reuse an HTTP client (session) owned by the host
    pub fn with_client(client: Client, endpoint: impl Into<String>, params: FetchParameters) -> Self {
        let endpoint = endpoint.into();
        info!(
            "PV forecast fetcher for ({}, {}) using {}",
            params.latitude, params.longitude, endpoint
        );
        Self {
            client,
            endpoint,
            params,
        }
    }
}

impl fmt::Debug for ForecastFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForecastFetcher")
            .field("endpoint", &self.endpoint)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ForecastSource for ForecastFetcher {
    async fn fetch(&self) -> Result<RawForecast> {
        fetch(&self.client, &self.endpoint, &self.params).await
    }

    fn name(&self) -> &str {
        "pvforecast.cz"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn params() -> FetchParameters {
        FetchParameters::new("test_key", 50.08, 14.42)
    }

    fn endpoint(server: &mockito::ServerGuard) -> String {
        format!("{}/api/", server.url())
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("key".into(), "test_key".into()),
                Matcher::UrlEncoded("lat".into(), "50.08".into()),
                Matcher::UrlEncoded("lon".into(), "14.42".into()),
                Matcher::UrlEncoded("forecast".into(), "pv".into()),
                Matcher::UrlEncoded("format".into(), "json".into()),
                Matcher::UrlEncoded("type".into(), "hour".into()),
                Matcher::UrlEncoded("number".into(), "72".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "2024-01-01T10:00:00": "123.4",
                    "2024-01-01T11:00:00": 250
                })
                .to_string(),
            )
            .create_async()
            .await;

        let fetcher = ForecastFetcher::new(endpoint(&server), params()).unwrap();
        let raw = fetcher.fetch().await.unwrap();

        assert_eq!(raw.len(), 2);
        assert_eq!(raw["2024-01-01T10:00:00"], json!("123.4"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_forbidden_is_invalid_credentials() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body("Forbidden")
            .create_async()
            .await;

        let fetcher = ForecastFetcher::new(endpoint(&server), params()).unwrap();
        let result = fetcher.fetch().await;

        assert_eq!(result, Err(FetchError::InvalidCredentials));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_unauthorized_is_invalid_credentials() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/")
            .match_query(Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let fetcher = ForecastFetcher::new(endpoint(&server), params()).unwrap();

        assert_eq!(fetcher.fetch().await, Err(FetchError::InvalidCredentials));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_server_error_is_remote_error() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/")
            .match_query(Matcher::Any)
            .with_status(503)
            .with_body("maintenance")
            .create_async()
            .await;

        let fetcher = ForecastFetcher::new(endpoint(&server), params()).unwrap();

        assert_eq!(
            fetcher.fetch().await,
            Err(FetchError::RemoteError { status: 503 })
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_invalid_json_is_malformed() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let fetcher = ForecastFetcher::new(endpoint(&server), params()).unwrap();

        assert!(matches!(
            fetcher.fetch().await,
            Err(FetchError::MalformedResponse(_))
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        // Nothing listens on port 9 locally
        let fetcher = ForecastFetcher::with_timeout(
            "http://127.0.0.1:9/api/",
            params(),
            Duration::from_secs(2),
        )
        .unwrap();

        assert!(matches!(
            fetcher.fetch().await,
            Err(FetchError::ConnectionFailure(_))
        ));
    }

    #[test]
    fn test_parse_body_rejects_non_objects() {
        assert!(parse_body("{}").unwrap().is_empty());
        assert!(matches!(
            parse_body("[1, 2]"),
            Err(FetchError::MalformedResponse(msg)) if msg.contains("array")
        ));
        assert!(matches!(
            parse_body("null"),
            Err(FetchError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_only_bad_credentials_are_permanent() {
        assert!(FetchError::ConnectionFailure("timed out".to_string()).is_transient());
        assert!(FetchError::RemoteError { status: 500 }.is_transient());
        assert!(!FetchError::InvalidCredentials.is_transient());
    }
}
