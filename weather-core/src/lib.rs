//! Core library for the weather ETL pipeline.
//!
//! This crate defines:
//! - Configuration of the query and the bucket layout
//! - Abstractions over the managed query service and object store, with AWS implementations
//! - The query poller that serves recent weather rows
//! - The ingestion transformer that turns raw documents into CSV tables
//!
//! It is used by `weather-cli`, but the handlers can be hosted by any request/response runtime.

pub mod config;
pub mod handler;
pub mod model;
pub mod poller;
pub mod query;
pub mod storage;
pub mod transform;

#[cfg(test)]
mod testing;

pub use config::{Config, QueryConfig, StorageConfig};
pub use model::{ApiResponse, QueryOutcome, WeatherRow};
pub use poller::{PollPolicy, QueryError, fetch_recent_weather, wait_for_completion};
pub use query::{AthenaQueryService, QueryJobId, QueryResults, QueryService, QueryState};
pub use storage::{ObjectStore, S3ObjectStore};
pub use transform::{TransformError, TransformReport, transform_pending};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
