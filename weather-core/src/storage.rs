use async_trait::async_trait;
use std::fmt::Debug;

pub mod s3;

pub use s3::S3ObjectStore;

/// Managed object store holding raw, transformed and archived weather files.
#[async_trait]
pub trait ObjectStore: Send + Sync + Debug {
    /// Every key under `prefix`, across all listing pages.
    async fn list(&self, bucket: &str, prefix: &str) -> anyhow::Result<Vec<String>>;

    async fn get(&self, bucket: &str, key: &str) -> anyhow::Result<Vec<u8>>;

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> anyhow::Result<()>;

    /// Server-side copy within one bucket.
    async fn copy(&self, bucket: &str, from_key: &str, to_key: &str) -> anyhow::Result<()>;

    async fn delete(&self, bucket: &str, key: &str) -> anyhow::Result<()>;
}
