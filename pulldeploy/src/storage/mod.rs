//! Blob Storage Interface: a key-to-bytes and key-to-stream
//! get/put/delete interface over a string-path namespace, with a single
//! factory selecting the concrete driver (local filesystem or S3) from
//! configuration.

pub mod local;
pub mod s3;

use std::collections::BTreeMap;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use camino::Utf8Path;
use tokio::io::AsyncRead;

use crate::errors::PullDeployResult;

/// Construction parameters for a storage driver, a flat string→string map
///.
pub type Params = BTreeMap<String, String>;

/// A stream of bytes read from storage.
pub type BlobReader = Pin<Box<dyn AsyncRead + Send>>;

/// Key→bytes and key→stream access to one application's share of blob
/// storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Retrieve the full contents of `key`. Fails with a not-found error
    /// if absent.
    async fn get(&self, key: &Utf8Path) -> PullDeployResult<Bytes>;

    /// Replace the contents of `key`, creating any missing intermediate
    /// namespace.
    async fn put(&self, key: &Utf8Path, data: Bytes) -> PullDeployResult<()>;

    /// Open a stream for reading `key`, for large artifacts.
    async fn get_reader(&self, key: &Utf8Path) -> PullDeployResult<BlobReader>;

    /// Stream `length` bytes from `reader` into `key`.
    async fn put_reader(
        &self,
        key: &Utf8Path,
        reader: BlobReader,
        length: u64,
    ) -> PullDeployResult<()>;

    /// Delete `key`. Idempotent: deleting an absent key is not an error.
    async fn delete(&self, key: &Utf8Path) -> PullDeployResult<()>;
}

/// Construct the configured storage driver, validating its parameters.
///
/// `access_method` is one of `"local"` or `"s3"`.
pub async fn build(access_method: &str, params: &Params) -> PullDeployResult<Box<dyn BlobStore>> {
    match access_method {
        "local" => Ok(Box::new(local::LocalStore::new(params)?)),
        "s3" => Ok(Box::new(s3::S3Store::new(params).await?)),
        other => Err(crate::errors::PullDeployError::config(format!(
            "invalid storage access method: {other:?}"
        ))),
    }
}
