use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use aws_sdk_athena::{
    Client,
    types::{QueryExecutionContext, ResultConfiguration},
};
use log::debug;

use super::{Cell, QueryJobId, QueryResults, QueryService, QueryState};

/// [`QueryService`] backed by Amazon Athena.
#[derive(Debug, Clone)]
pub struct AthenaQueryService {
    client: Client,
}

impl AthenaQueryService {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_sdk_config(config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(config))
    }
}

#[async_trait]
impl QueryService for AthenaQueryService {
    async fn submit(&self, query: &str, database: &str, output_location: &str) -> Result<QueryJobId> {
        let res = self
            .client
            .start_query_execution()
            .query_string(query)
            .query_execution_context(QueryExecutionContext::builder().database(database).build())
            .result_configuration(
                ResultConfiguration::builder()
                    .output_location(output_location)
                    .build(),
            )
            .send()
            .await
            .map_err(aws_sdk_athena::Error::from)
            .with_context(|| format!("Athena rejected query against database '{database}'"))?;

        let id = res
            .query_execution_id()
            .ok_or_else(|| anyhow!("Athena StartQueryExecution response had no execution id"))?;

        debug!("Athena accepted query as execution {id}");
        Ok(QueryJobId::new(id))
    }

    async fn state(&self, job: &QueryJobId) -> Result<QueryState> {
        let res = self
            .client
            .get_query_execution()
            .query_execution_id(job.as_str())
            .send()
            .await
            .map_err(aws_sdk_athena::Error::from)
            .with_context(|| format!("Failed to get Athena execution {job}"))?;

        let state = res
            .query_execution()
            .and_then(|execution| execution.status())
            .and_then(|status| status.state())
            .ok_or_else(|| anyhow!("Athena execution {job} reported no state"))?;

        Ok(QueryState::from(state.as_str()))
    }

    async fn results(&self, job: &QueryJobId) -> Result<QueryResults> {
        let mut rows: Vec<Vec<Cell>> = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let res = self
                .client
                .get_query_results()
                .query_execution_id(job.as_str())
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(aws_sdk_athena::Error::from)
                .with_context(|| format!("Failed to get results of Athena execution {job}"))?;

            if let Some(set) = res.result_set() {
                rows.extend(set.rows().iter().map(|row| {
                    row.data()
                        .iter()
                        .map(|datum| datum.var_char_value().map(str::to_owned))
                        .collect::<Vec<Cell>>()
                }));
            }

            match res.next_token() {
                Some(token) => next_token = Some(token.to_owned()),
                None => break,
            }
        }

        debug!("Athena execution {job} returned {} rows", rows.len());
        Ok(QueryResults { rows })
    }
}
