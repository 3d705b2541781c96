use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};

use crate::query::QueryState;

/// One day of the recent-weather query, every field as the query service rendered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherRow {
    pub date: String,
    pub max_temp: String,
    pub min_temp: String,
    pub weather_condition: String,
}

/// What the query poller hands back to its caller.
///
/// A terminal failure is a normal value here, not an `Err`: it serializes as
/// `{"error": "..."}` while successful rows serialize as a plain JSON array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    Rows(Vec<WeatherRow>),
    Failed { state: QueryState },
}

impl QueryOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, QueryOutcome::Failed { .. })
    }

    pub fn error_message(&self) -> Option<String> {
        match self {
            QueryOutcome::Rows(_) => None,
            QueryOutcome::Failed { state } => Some(format!("Query failed with state: {state}")),
        }
    }
}

impl Serialize for QueryOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            QueryOutcome::Rows(rows) => rows.serialize(serializer),
            QueryOutcome::Failed { .. } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", &self.error_message())?;
                map.end()
            }
        }
    }
}

/// Request/response envelope returned by both handlers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ApiResponse {
    /// 200 with a JSON body and the permissive CORS headers the dashboard expects.
    pub fn json<T: Serialize>(payload: &T) -> serde_json::Result<Self> {
        let headers = [
            ("Content-Type", "application/json"),
            ("Access-Control-Allow-Origin", "*"),
            ("Access-Control-Allow-Methods", "GET, OPTIONS"),
            ("Access-Control-Allow-Headers", "Content-Type"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Ok(Self {
            status_code: 200,
            headers,
            body: serde_json::to_string(payload)?,
        })
    }

    /// 200 with a bare text body and no headers.
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            headers: BTreeMap::new(),
            body: message.into(),
        }
    }
}
