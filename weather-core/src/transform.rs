//! Ingestion transformer: turns raw weather documents landed in the bucket
//! into the forecast and wind CSV tables the query service reads.

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{BoxError, config::StorageConfig, storage::ObjectStore};

pub const WIND_COLUMNS: [(&str, &str); 3] = [
    ("wind_speed", "speed"),
    ("wind_direction", "direction"),
    ("wind_chill", "chill"),
];

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("Failed to list pending files under '{prefix}'")]
    List {
        prefix: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to read '{key}'")]
    Read {
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to parse '{key}' as a weather document")]
    Parse {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Forecast entries have no '{0}' field")]
    MissingField(&'static str),

    #[error("Invalid forecast date {0}")]
    InvalidDate(Value),

    #[error("Invalid temperature {value} in column '{column}'")]
    InvalidTemperature { column: String, value: Value },

    #[error("Failed to serialize table to CSV")]
    Csv(#[from] csv::Error),

    #[error("Failed to write '{key}'")]
    Write {
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to archive '{key}'")]
    Archive {
        key: String,
        #[source]
        source: BoxError,
    },
}

/// A raw document as fetched from the weather API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawWeatherDocument {
    #[serde(default)]
    pub forecasts: Option<Vec<Map<String, Value>>>,
    #[serde(default)]
    pub current_observation: Option<CurrentObservation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrentObservation {
    #[serde(default)]
    pub wind: Option<Map<String, Value>>,
}

impl RawWeatherDocument {
    pub fn forecasts(&self) -> &[Map<String, Value>] {
        self.forecasts.as_deref().unwrap_or_default()
    }

    /// The wind object, if present and non-empty.
    pub fn wind(&self) -> Option<&Map<String, Value>> {
        self.current_observation
            .as_ref()
            .and_then(|obs| obs.wind.as_ref())
            .filter(|wind| !wind.is_empty())
    }
}

/// Column-ordered rows of JSON scalars.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// CSV with a header line and no index column.
    pub fn to_csv(&self) -> Result<Vec<u8>, csv::Error> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(csv_field))?;
        }
        writer.into_inner().map_err(|e| e.into_error().into())
    }
}

fn csv_field(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// What one transformer run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformReport {
    pub processed: Vec<String>,
    pub written: Vec<String>,
    pub skipped: Vec<String>,
}

/// One row per forecast entry, with renamed columns, ISO dates, Celsius
/// temperatures and the current wind appended to every row.
///
/// Returns `None` when the document has no forecasts.
pub fn forecast_table(doc: &RawWeatherDocument) -> Result<Option<Table>, TransformError> {
    let forecasts = doc.forecasts();
    if forecasts.is_empty() {
        return Ok(None);
    }

    let mut keys: Vec<&str> = Vec::new();
    for entry in forecasts {
        for key in entry.keys() {
            if !keys.contains(&key.as_str()) {
                keys.push(key);
            }
        }
    }
    if !keys.contains(&"date") {
        return Err(TransformError::MissingField("date"));
    }

    let columns = keys
        .iter()
        .map(|key| rename_column(key).to_string())
        .chain(WIND_COLUMNS.iter().map(|(column, _)| column.to_string()))
        .collect::<Vec<_>>();

    let wind = doc.wind();
    let wind_cells: Vec<Value> = WIND_COLUMNS
        .iter()
        .map(|(_, field)| wind.and_then(|w| w.get(*field)).cloned().unwrap_or(Value::Null))
        .collect();

    let mut rows = Vec::with_capacity(forecasts.len());
    for entry in forecasts {
        let mut row = Vec::with_capacity(columns.len());
        for key in &keys {
            let value = entry.get(*key).cloned().unwrap_or(Value::Null);
            let cell = match rename_column(key) {
                "date" => epoch_to_date(&value)?,
                column @ ("max_temp" | "min_temp") => fahrenheit_to_celsius(column, &value)?,
                _ => value,
            };
            row.push(cell);
        }
        row.extend(wind_cells.iter().cloned());
        rows.push(row);
    }

    Ok(Some(Table { columns, rows }))
}

/// The wind object as a single-row table, or `None` if there is no wind data.
pub fn wind_table(doc: &RawWeatherDocument) -> Option<Table> {
    let wind = doc.wind()?;
    Some(Table {
        columns: wind.keys().cloned().collect(),
        rows: vec![wind.values().cloned().collect()],
    })
}

fn rename_column(key: &str) -> &str {
    match key {
        "high" => "max_temp",
        "low" => "min_temp",
        "text" => "weather_condition",
        other => other,
    }
}

fn epoch_to_date(value: &Value) -> Result<Value, TransformError> {
    let secs = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Null => return Ok(Value::Null),
        _ => None,
    };

    secs.and_then(|s| DateTime::from_timestamp(s, 0))
        .map(|dt| Value::String(dt.date_naive().format("%Y-%m-%d").to_string()))
        .ok_or_else(|| TransformError::InvalidDate(value.clone()))
}

fn fahrenheit_to_celsius(column: &str, value: &Value) -> Result<Value, TransformError> {
    let fahrenheit = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Null => return Ok(Value::Null),
        _ => None,
    };

    fahrenheit
        .and_then(|f| serde_json::Number::from_f64((f - 32.0) * 5.0 / 9.0))
        .map(Value::Number)
        .ok_or_else(|| TransformError::InvalidTemperature {
            column: column.to_string(),
            value: value.clone(),
        })
}

/// Transform every pending `.json` file in the raw prefix, write the derived
/// tables and move each source into the processed prefix.
///
/// `now` stamps the output keys.
pub async fn transform_pending(
    store: &dyn ObjectStore,
    config: &StorageConfig,
    now: DateTime<Utc>,
) -> Result<TransformReport, TransformError> {
    let bucket = config.bucket.as_str();
    let keys = store
        .list(bucket, &config.raw_prefix)
        .await
        .map_err(|e| TransformError::List {
            prefix: config.raw_prefix.clone(),
            source: e.into(),
        })?;

    let stamp = now.format("%Y%m%d%H%M%S").to_string();
    let mut report = TransformReport::default();

    for key in keys {
        if !key.ends_with(".json") {
            report.skipped.push(key);
            continue;
        }

        let raw = store.get(bucket, &key).await.map_err(|e| TransformError::Read {
            key: key.clone(),
            source: e.into(),
        })?;
        let doc: RawWeatherDocument =
            serde_json::from_slice(&raw).map_err(|source| TransformError::Parse {
                key: key.clone(),
                source,
            })?;

        let (dir, file_name) = pending_location(&key, &config.raw_prefix);
        let stem = file_name.strip_suffix(".json").unwrap_or(file_name);

        match forecast_table(&doc)? {
            Some(table) => {
                let out = format!("{}{dir}forecast_{stamp}_{stem}.csv", config.forecast_prefix);
                put(store, bucket, &out, table.to_csv()?).await?;
                report.written.push(out);
            }
            None => warn!("No forecasts found in {key}"),
        }

        match wind_table(&doc) {
            Some(table) => {
                let out = format!("{}{dir}wind_{stamp}_{stem}.csv", config.wind_prefix);
                put(store, bucket, &out, table.to_csv()?).await?;
                report.written.push(out);
            }
            None => warn!("No wind data found in {key}"),
        }

        let archived = format!("{}{dir}{file_name}", config.processed_prefix);
        archive(store, bucket, &key, &archived).await?;
        info!("Transformed {key}, archived to {archived}");
        report.processed.push(key);
    }

    Ok(report)
}

/// Split a pending key into its folder below `raw_prefix` (empty, or ending
/// in `/`) and its file name. Outputs and the archive copy mirror that folder.
fn pending_location<'a>(key: &'a str, raw_prefix: &str) -> (&'a str, &'a str) {
    let relative = key.strip_prefix(raw_prefix).unwrap_or(key);
    match relative.rfind('/') {
        Some(i) => relative.split_at(i + 1),
        None => ("", relative),
    }
}

async fn put(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    body: Vec<u8>,
) -> Result<(), TransformError> {
    store.put(bucket, key, body).await.map_err(|e| TransformError::Write {
        key: key.to_string(),
        source: e.into(),
    })
}

async fn archive(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    archived: &str,
) -> Result<(), TransformError> {
    let wrap = |e: anyhow::Error| TransformError::Archive {
        key: key.to_string(),
        source: e.into(),
    };
    store.copy(bucket, key, archived).await.map_err(wrap)?;
    store.delete(bucket, key).await.map_err(wrap)
}
