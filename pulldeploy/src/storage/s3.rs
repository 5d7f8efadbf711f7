//! Amazon S3 blob storage driver: keys map onto object paths under a
//! configured bucket and optional path prefix, with credentials coming
//! from the default AWS credential chain (`aws-config`).

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use camino::Utf8Path;
use tokio::io::AsyncReadExt;

use super::{BlobReader, BlobStore, Params};
use crate::errors::{PullDeployError, PullDeployResult};

/// Stores repository data in an S3 bucket.
///
/// Valid params: `"region"`, `"bucket"` (required), `"prefix"` (optional
/// namespace within the bucket).
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: Option<String>,
}

impl S3Store {
    /// Construct a new S3 store, validating that `bucket` is present.
    pub async fn new(params: &Params) -> PullDeployResult<Self> {
        let bucket = params
            .get("bucket")
            .ok_or_else(|| PullDeployError::config("\"bucket\" is a required parameter"))?
            .clone();
        let prefix = params.get("prefix").cloned();

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = params.get("region") {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;
        let client = aws_sdk_s3::Client::new(&sdk_config);

        Ok(Self {
            client,
            bucket,
            prefix,
        })
    }

    fn s3_key(&self, key: &Utf8Path) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}/{key}"),
            None => key.to_string(),
        }
    }
}

#[async_trait]
impl BlobStore for S3Store {
    async fn get(&self, key: &Utf8Path) -> PullDeployResult<Bytes> {
        let s3_key = self.s3_key(key);
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&s3_key)
            .send()
            .await
            .map_err(|e| PullDeployError::storage(key.as_str(), e))?;
        let data = output
            .body
            .collect()
            .await
            .map_err(|e| PullDeployError::storage(key.as_str(), e))?;
        Ok(data.into_bytes())
    }

    async fn put(&self, key: &Utf8Path, data: Bytes) -> PullDeployResult<()> {
        let s3_key = self.s3_key(key);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&s3_key)
            .content_type("application/octet-stream")
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| PullDeployError::storage(key.as_str(), e))?;
        Ok(())
    }

    async fn get_reader(&self, key: &Utf8Path) -> PullDeployResult<BlobReader> {
        let data = self.get(key).await?;
        Ok(Box::pin(std::io::Cursor::new(data)))
    }

    async fn put_reader(
        &self,
        key: &Utf8Path,
        mut reader: BlobReader,
        _length: u64,
    ) -> PullDeployResult<()> {
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .map_err(|e| PullDeployError::storage(key.as_str(), e))?;
        self.put(key, Bytes::from(buf)).await
    }

    async fn delete(&self, key: &Utf8Path) -> PullDeployResult<()> {
        let s3_key = self.s3_key(key);
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&s3_key)
            .send()
            .await
            .map_err(|e| PullDeployError::storage(key.as_str(), e))?;
        Ok(())
    }
}
