//! Query poller: submit the recent-weather query, wait for it to settle and
//! turn the result set into [`WeatherRow`]s.

use std::time::Duration;

use log::{debug, info, warn};
use thiserror::Error;

use crate::{
    BoxError,
    config::QueryConfig,
    model::{QueryOutcome, WeatherRow},
    query::{Cell, QueryJobId, QueryResults, QueryService, QueryState},
};

/// Columns selected by the recent-weather query, in select-list order.
pub const WEATHER_COLUMNS: [&str; 4] = ["date", "max_temp", "min_temp", "weather_condition"];

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Query submission was rejected")]
    Submission(#[source] BoxError),

    #[error("Failed to check the state of query {job}")]
    Polling {
        job: QueryJobId,
        #[source]
        source: BoxError,
    },

    #[error("Query {job} was still running after {attempts} state checks")]
    AttemptsExhausted { job: QueryJobId, attempts: u32 },

    #[error("Query {job} did not finish within {after:?}")]
    TimedOut { job: QueryJobId, after: Duration },

    #[error("Failed to fetch the results of query {job}")]
    Results {
        job: QueryJobId,
        #[source]
        source: BoxError,
    },

    #[error("Result header has no '{0}' column")]
    MissingColumn(&'static str),

    #[error("Result row {row} has {found} cells, expected at least {expected}")]
    MalformedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// How long and how often to wait for a query to reach a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Pause between two state checks.
    pub interval: Duration,
    /// Give up after this many state checks.
    pub max_attempts: Option<u32>,
    /// Give up once this much time has passed since the first check.
    pub timeout: Option<Duration>,
}

pub fn build_recent_weather_query(config: &QueryConfig) -> String {
    format!(
        "SELECT {} FROM {}.{} ORDER BY date DESC LIMIT {};",
        WEATHER_COLUMNS.join(", "),
        config.database,
        config.table,
        config.row_limit,
    )
}

/// Check `job` right away, then once per `policy.interval`, until the service
/// reports a terminal state or one of the policy bounds is hit.
///
/// Dropping the returned future stops polling; the remote job keeps running.
pub async fn wait_for_completion(
    service: &dyn QueryService,
    job: &QueryJobId,
    policy: &PollPolicy,
) -> Result<QueryState, QueryError> {
    match policy.timeout {
        Some(limit) => tokio::time::timeout(limit, poll_until_terminal(service, job, policy))
            .await
            .map_err(|_| QueryError::TimedOut {
                job: job.clone(),
                after: limit,
            })?,
        None => poll_until_terminal(service, job, policy).await,
    }
}

async fn poll_until_terminal(
    service: &dyn QueryService,
    job: &QueryJobId,
    policy: &PollPolicy,
) -> Result<QueryState, QueryError> {
    let mut attempts: u32 = 0;
    loop {
        let state = service.state(job).await.map_err(|e| QueryError::Polling {
            job: job.clone(),
            source: e.into(),
        })?;
        attempts += 1;

        if state.is_terminal() {
            debug!("Query {job} reached {state} after {attempts} checks");
            return Ok(state);
        }

        if policy.max_attempts.is_some_and(|max| attempts >= max) {
            return Err(QueryError::AttemptsExhausted {
                job: job.clone(),
                attempts,
            });
        }

        debug!("Query {job} is {state}, checking again in {:?}", policy.interval);
        tokio::time::sleep(policy.interval).await;
    }
}

/// Run the recent-weather query and return its rows, or the terminal state
/// if the query failed or was cancelled.
pub async fn fetch_recent_weather(
    service: &dyn QueryService,
    config: &QueryConfig,
) -> Result<QueryOutcome, QueryError> {
    let query = build_recent_weather_query(config);
    info!("Submitting recent weather query to {}.{}", config.database, config.table);

    let job = service
        .submit(&query, &config.database, &config.output_location)
        .await
        .map_err(|e| QueryError::Submission(e.into()))?;

    let state = wait_for_completion(service, &job, &config.poll_policy()).await?;

    if state != QueryState::Succeeded {
        warn!("Query {job} ended with state {state}");
        return Ok(QueryOutcome::Failed { state });
    }

    let results = service.results(&job).await.map_err(|e| QueryError::Results {
        job: job.clone(),
        source: e.into(),
    })?;

    let rows = parse_weather_rows(&results)?;
    info!("Query {job} returned {} weather rows", rows.len());

    Ok(QueryOutcome::Rows(rows))
}

/// Bind data rows to [`WeatherRow`] fields by header name, skipping the header.
pub fn parse_weather_rows(results: &QueryResults) -> Result<Vec<WeatherRow>, QueryError> {
    let Some(header) = results.header() else {
        return Ok(Vec::new());
    };

    let [date, max_temp, min_temp, condition] = column_positions(header)?;
    let width = date.max(max_temp).max(min_temp).max(condition) + 1;

    results
        .data_rows()
        .iter()
        .enumerate()
        .map(|(i, row)| {
            if row.len() < width {
                return Err(QueryError::MalformedRow {
                    row: i + 1,
                    expected: width,
                    found: row.len(),
                });
            }

            Ok(WeatherRow {
                date: cell_text(&row[date]),
                max_temp: cell_text(&row[max_temp]),
                min_temp: cell_text(&row[min_temp]),
                weather_condition: cell_text(&row[condition]),
            })
        })
        .collect()
}

fn column_positions(header: &[Cell]) -> Result<[usize; 4], QueryError> {
    let mut positions = [0; 4];
    for (slot, name) in positions.iter_mut().zip(WEATHER_COLUMNS) {
        *slot = header
            .iter()
            .position(|cell| cell.as_deref().is_some_and(|c| c.eq_ignore_ascii_case(name)))
            .ok_or(QueryError::MissingColumn(name))?;
    }
    Ok(positions)
}

fn cell_text(cell: &Cell) -> String {
    cell.clone().unwrap_or_default()
}
