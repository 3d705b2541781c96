use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::{Client, primitives::ByteStream};
use log::debug;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use super::ObjectStore;

/// Everything except RFC 3986 unreserved characters.
const KEY_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// `x-amz-copy-source` value: bucket and URL-encoded key, `/` left as is.
fn copy_source(bucket: &str, key: &str) -> String {
    let encoded = key
        .split('/')
        .map(|segment| utf8_percent_encode(segment, KEY_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/");
    format!("{bucket}/{encoded}")
}

/// [`ObjectStore`] backed by Amazon S3.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_sdk_config(config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(config))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let res = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(aws_sdk_s3::Error::from)
                .with_context(|| format!("Failed to list s3://{bucket}/{prefix}"))?;

            keys.extend(
                res.contents()
                    .iter()
                    .filter_map(|object| object.key())
                    .map(str::to_owned),
            );

            match res.next_continuation_token() {
                Some(token) => continuation = Some(token.to_owned()),
                None => break,
            }
        }

        debug!("Listed {} keys under s3://{bucket}/{prefix}", keys.len());
        Ok(keys)
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let res = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(aws_sdk_s3::Error::from)
            .with_context(|| format!("Failed to get s3://{bucket}/{key}"))?;

        let body = res
            .body
            .collect()
            .await
            .with_context(|| format!("Failed to read body of s3://{bucket}/{key}"))?;

        Ok(body.into_bytes().to_vec())
    }

    async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(aws_sdk_s3::Error::from)
            .with_context(|| format!("Failed to put s3://{bucket}/{key}"))?;

        Ok(())
    }

    async fn copy(&self, bucket: &str, from_key: &str, to_key: &str) -> Result<()> {
        self.client
            .copy_object()
            .bucket(bucket)
            .copy_source(copy_source(bucket, from_key))
            .key(to_key)
            .send()
            .await
            .map_err(aws_sdk_s3::Error::from)
            .with_context(|| format!("Failed to copy s3://{bucket}/{from_key} to {to_key}"))?;

        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(aws_sdk_s3::Error::from)
            .with_context(|| format!("Failed to delete s3://{bucket}/{key}"))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_source_keeps_plain_keys() {
        assert_eq!(
            copy_source("weather-etl-project", "raw_data/to_process/weather_1.json"),
            "weather-etl-project/raw_data/to_process/weather_1.json"
        );
    }

    #[test]
    fn copy_source_encodes_each_segment() {
        assert_eq!(
            copy_source("b", "raw_data/to_process/weather 1.json"),
            "b/raw_data/to_process/weather%201.json"
        );
        assert_eq!(copy_source("b", "raw/a+b%?.json"), "b/raw/a%2Bb%25%3F.json");
        assert_eq!(copy_source("b", "raw/météo.json"), "b/raw/m%C3%A9t%C3%A9o.json");
    }
}
