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

mod config;
mod service;

use anyhow::{Context, Result};
use pvforecast_core::{FetchParameters, ForecastCache, ForecastFetcher};
use pvforecast_ha::{
    ForecastSensor, HomeAssistantClient, home_location, validate_input, validate_setup,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::config::AppConfig;
use crate::service::Service;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Help,
    Version,
    Check,
    Run,
}

fn parse_args(args: &[String]) -> Result<Command> {
    if let Some(extra) = args.get(2) {
        anyhow::bail!("Unexpected argument '{extra}', see --help");
    }
    match args.get(1).map(String::as_str) {
        None => Ok(Command::Run),
        Some("--help" | "-h") => Ok(Command::Help),
        Some("--version" | "-v") => Ok(Command::Version),
        Some("--check") => Ok(Command::Check),
        Some(other) => anyhow::bail!("Unknown argument '{other}', see --help"),
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let check_only = match parse_args(&args)? {
        Command::Help => {
            println!("PV Forecast - pvforecast.cz irradiance sensor for Home Assistant");
            println!("Version: {VERSION}");
            println!();
            println!("Usage: pvforecast [OPTIONS]");
            println!();
            println!("Options:");
            println!("  -h, --help    Print this help message");
            println!("  -v, --version Print version");
            println!("  --check       Validate the API key and location, then exit");
            return Ok(());
        }
        Command::Version => {
            println!("{VERSION}");
            return Ok(());
        }
        Command::Check => true,
        Command::Run => false,
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    runtime.block_on(run(check_only))
}

async fn run(check_only: bool) -> Result<()> {
    let config = AppConfig::load()?;

    info!("Starting PV Forecast {}", VERSION);
    info!("Configuration Summary:");
    info!("   Endpoint: {}", config.endpoint);
    info!(
        "   Forecast: {} for {}h",
        config.forecast_type, config.forecast_hours
    );
    info!(
        "   Refresh every {}s, update every {}s",
        config.refresh_interval_secs, config.update_interval_secs
    );

    let ha_client = connect_home_assistant(&config);
    let home = if config.latitude.is_none() || config.longitude.is_none() {
        home_location(ha_client.as_ref()).await
    } else {
        None
    };

    if check_only {
        let entry = validate_setup(
            &config.setup_input(),
            home,
            &config.endpoint,
            config.request_timeout(),
        )
        .await
        .map_err(|e| anyhow::anyhow!("Setup check failed ({}): {}", e.translation_key(), e))?;
        println!("OK: {}", entry.title);
        return Ok(());
    }

    let params = validate_input(&config.setup_input(), home)
        .context("Invalid forecast configuration")?;
    info!("   Location: ({}, {})", params.latitude, params.longitude);
    let sensor = build_sensor(&config, params)?;

    let service = Service::new(
        sensor,
        ha_client,
        config.refresh_interval(),
        config.update_interval(),
    );

    service.run(shutdown_signal()).await;
    Ok(())
}

/// Forecast sensor whose cache refetches on read once older than the refresh interval
fn build_sensor(config: &AppConfig, params: FetchParameters) -> Result<ForecastSensor> {
    let (latitude, longitude) = (params.latitude, params.longitude);
    let fetcher =
        ForecastFetcher::with_timeout(config.endpoint.as_str(), params, config.request_timeout())
            .context("Failed to create forecast client")?;
    let cache = ForecastCache::new(Arc::new(fetcher))
        .with_staleness_threshold(config.staleness_threshold());
    Ok(ForecastSensor::new(Arc::new(cache), latitude, longitude))
}

/// Supervisor API inside the add-on, otherwise `ha_base_url`/`ha_token`.
/// Without either the sensor is only logged.
fn connect_home_assistant(config: &AppConfig) -> Option<HomeAssistantClient> {
    let result = if std::env::var("SUPERVISOR_TOKEN").is_ok() {
        info!("Initializing HA client using Supervisor API...");
        HomeAssistantClient::from_supervisor()
    } else if config.ha_token.is_some() || std::env::var("HA_TOKEN").is_ok() {
        info!("Initializing HA client from configuration...");
        HomeAssistantClient::from_config(config.ha_base_url.clone(), config.ha_token.clone())
    } else {
        info!("No Home Assistant connection configured, sensor state will be logged only");
        return None;
    };

    match result {
        Ok(client) => {
            info!("Publishing sensor state to {}", client.base_url());
            Some(client)
        }
        Err(e) => {
            warn!("Home Assistant unavailable, logging sensor state only: {}", e);
            None
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
