//! Invocation entry points. Each handler takes its collaborators and config
//! and returns the `{statusCode, headers, body}` envelope.

use anyhow::{Context, Result};
use chrono::Utc;
use log::info;

use crate::{
    config::{Config, StorageConfig},
    model::ApiResponse,
    poller::fetch_recent_weather,
    query::QueryService,
    storage::ObjectStore,
    transform::transform_pending,
};

pub const TRANSFORM_DONE_MESSAGE: &str = "Weather data transformed and stored in S3";

/// Fetch the most recent days of weather.
///
/// A failed or cancelled query still answers 200; the body is then
/// `{"error": ...}` instead of an array.
pub async fn get_weather_data(service: &dyn QueryService, config: &Config) -> Result<ApiResponse> {
    let outcome = fetch_recent_weather(service, &config.query)
        .await
        .context("Failed to fetch recent weather")?;

    ApiResponse::json(&outcome).context("Failed to serialize weather response")
}

/// Transform all pending raw files.
pub async fn transform_weather_data(
    store: &dyn ObjectStore,
    config: &StorageConfig,
) -> Result<ApiResponse> {
    let report = transform_pending(store, config, Utc::now())
        .await
        .context("Failed to transform pending weather data")?;

    info!(
        "Processed {} files, wrote {} tables, skipped {} keys",
        report.processed.len(),
        report.written.len(),
        report.skipped.len()
    );

    Ok(ApiResponse::text(TRANSFORM_DONE_MESSAGE))
}
