use async_trait::async_trait;
use std::fmt::{self, Debug};

pub mod athena;

pub use athena::AthenaQueryService;

/// Opaque handle returned by the query service on submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryJobId(String);

impl QueryJobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryJobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a submitted query.
///
/// Only `Succeeded`, `Failed` and `Cancelled` are terminal. Every other state,
/// including names this crate does not know about, means "keep waiting".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    Other(String),
}

impl QueryState {
    pub fn as_str(&self) -> &str {
        match self {
            QueryState::Queued => "QUEUED",
            QueryState::Running => "RUNNING",
            QueryState::Succeeded => "SUCCEEDED",
            QueryState::Failed => "FAILED",
            QueryState::Cancelled => "CANCELLED",
            QueryState::Other(name) => name,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            QueryState::Succeeded | QueryState::Failed | QueryState::Cancelled
        )
    }
}

impl fmt::Display for QueryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for QueryState {
    fn from(value: &str) -> Self {
        match value.to_uppercase().as_str() {
            "QUEUED" => QueryState::Queued,
            "RUNNING" => QueryState::Running,
            "SUCCEEDED" => QueryState::Succeeded,
            "FAILED" => QueryState::Failed,
            "CANCELLED" => QueryState::Cancelled,
            _ => QueryState::Other(value.to_string()),
        }
    }
}

/// One result cell. `None` is SQL NULL.
pub type Cell = Option<String>;

/// Full result set of a finished query; the first row holds column names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QueryResults {
    pub rows: Vec<Vec<Cell>>,
}

impl QueryResults {
    pub fn header(&self) -> Option<&[Cell]> {
        self.rows.first().map(Vec::as_slice)
    }

    pub fn data_rows(&self) -> &[Vec<Cell>] {
        self.rows.get(1..).unwrap_or_default()
    }
}

/// Managed SQL query service that runs jobs asynchronously.
#[async_trait]
pub trait QueryService: Send + Sync + Debug {
    /// Start `query` against `database`, writing the service's own result
    /// artifact under `output_location`.
    async fn submit(
        &self,
        query: &str,
        database: &str,
        output_location: &str,
    ) -> anyhow::Result<QueryJobId>;

    async fn state(&self, job: &QueryJobId) -> anyhow::Result<QueryState>;

    /// All rows of a succeeded job, header first.
    async fn results(&self, job: &QueryJobId) -> anyhow::Result<QueryResults>;
}
