//! In-memory fakes of the managed services.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::Mutex,
};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::time::Instant;

use crate::{
    query::{QueryJobId, QueryResults, QueryService, QueryState},
    storage::ObjectStore,
};

pub fn results(rows: &[&[&str]]) -> QueryResults {
    QueryResults {
        rows: rows
            .iter()
            .map(|row| row.iter().map(|cell| Some(cell.to_string())).collect())
            .collect(),
    }
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub query: String,
    pub database: String,
    pub output_location: String,
}

/// Reports the scripted states in order, repeating the last one forever.
#[derive(Debug)]
pub struct ScriptedQueryService {
    states: Mutex<VecDeque<QueryState>>,
    results: QueryResults,
    reject_submissions: bool,
    fail_state_checks: bool,
    submissions: Mutex<Vec<Submission>>,
    checks: Mutex<Vec<Instant>>,
    results_fetched: Mutex<usize>,
}

impl ScriptedQueryService {
    pub fn new(states: impl IntoIterator<Item = QueryState>, results: QueryResults) -> Self {
        Self {
            states: Mutex::new(states.into_iter().collect()),
            results,
            reject_submissions: false,
            fail_state_checks: false,
            submissions: Mutex::default(),
            checks: Mutex::default(),
            results_fetched: Mutex::default(),
        }
    }

    pub fn rejecting_submissions(mut self) -> Self {
        self.reject_submissions = true;
        self
    }

    pub fn failing_state_checks(mut self) -> Self {
        self.fail_state_checks = true;
        self
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn checks(&self) -> Vec<Instant> {
        self.checks.lock().unwrap().clone()
    }

    pub fn results_fetched(&self) -> usize {
        *self.results_fetched.lock().unwrap()
    }
}

#[async_trait]
impl QueryService for ScriptedQueryService {
    async fn submit(&self, query: &str, database: &str, output_location: &str) -> Result<QueryJobId> {
        if self.reject_submissions {
            return Err(anyhow!("Database '{database}' does not exist"));
        }
        self.submissions.lock().unwrap().push(Submission {
            query: query.to_string(),
            database: database.to_string(),
            output_location: output_location.to_string(),
        });
        Ok(QueryJobId::new("scripted-job"))
    }

    async fn state(&self, _job: &QueryJobId) -> Result<QueryState> {
        self.checks.lock().unwrap().push(Instant::now());
        if self.fail_state_checks {
            return Err(anyhow!("Rate exceeded"));
        }

        let mut states = self.states.lock().unwrap();
        let state = if states.len() > 1 { states.pop_front() } else { states.front().cloned() };
        state.ok_or_else(|| anyhow!("No scripted state left"))
    }

    async fn results(&self, _job: &QueryJobId) -> Result<QueryResults> {
        *self.results_fetched.lock().unwrap() += 1;
        Ok(self.results.clone())
    }
}

/// Object store keyed by `(bucket, key)`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<(String, String), Vec<u8>>>,
}

impl MemoryStore {
    pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Vec<u8>>) {
        self.objects
            .lock()
            .unwrap()
            .insert((bucket.to_string(), key.to_string()), body.into());
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    pub fn text(&self, bucket: &str, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .map(|body| String::from_utf8_lossy(body).into_owned())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .keys(bucket)
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| anyhow!("NoSuchKey: {key}"))
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        self.insert(bucket, key, body);
        Ok(())
    }

    async fn copy(&self, bucket: &str, from_key: &str, to_key: &str) -> Result<()> {
        let body = self.get(bucket, from_key).await?;
        self.insert(bucket, to_key, body);
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.objects
            .lock()
            .unwrap()
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}
