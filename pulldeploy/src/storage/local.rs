//! Local-filesystem blob storage driver: keys map onto paths under a
//! configured base directory, rooted against the process cwd if
//! relative, with directories created on demand on write and a `Not
//! found` error on read of an absent key.

use async_trait::async_trait;
use bytes::Bytes;
use camino::{Utf8Path, Utf8PathBuf};
use tokio::io::AsyncReadExt;

use super::{BlobReader, BlobStore, Params};
use crate::errors::{PullDeployError, PullDeployResult};

/// Stores repository data under a directory in the local filesystem.
///
/// Valid params: `"basedir"` — the directory containing the repository.
pub struct LocalStore {
    base_dir: Utf8PathBuf,
}

impl LocalStore {
    /// Construct a new local store, validating that `basedir` is present
    /// and exists.
    pub fn new(params: &Params) -> PullDeployResult<Self> {
        let base_dir = params
            .get("basedir")
            .ok_or_else(|| PullDeployError::config("\"basedir\" is a required parameter"))?;
        let base_dir = abs_path(Utf8Path::new(base_dir));
        if !base_dir.exists() {
            return Err(PullDeployError::config(format!(
                "basedir does not exist: {base_dir}"
            )));
        }
        Ok(Self { base_dir })
    }

    fn resolve(&self, key: &Utf8Path) -> Utf8PathBuf {
        self.base_dir.join(key)
    }
}

/// Resolve a possibly-relative path against the process's current
/// working directory.
fn abs_path(candidate: &Utf8Path) -> Utf8PathBuf {
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else if let Ok(cwd) = std::env::current_dir() {
        Utf8PathBuf::from_path_buf(cwd)
            .unwrap_or_default()
            .join(candidate)
    } else {
        candidate.to_path_buf()
    }
}

#[async_trait]
impl BlobStore for LocalStore {
    async fn get(&self, key: &Utf8Path) -> PullDeployResult<Bytes> {
        let path = self.resolve(key);
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| PullDeployError::storage(key.as_str(), e))?;
        Ok(Bytes::from(data))
    }

    async fn put(&self, key: &Utf8Path, data: Bytes) -> PullDeployResult<()> {
        let path = self.resolve(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PullDeployError::storage(key.as_str(), e))?;
        }
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| PullDeployError::storage(key.as_str(), e))
    }

    async fn get_reader(&self, key: &Utf8Path) -> PullDeployResult<BlobReader> {
        let path = self.resolve(key);
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| PullDeployError::storage(key.as_str(), e))?;
        Ok(Box::pin(file))
    }

    async fn put_reader(
        &self,
        key: &Utf8Path,
        mut reader: BlobReader,
        _length: u64,
    ) -> PullDeployResult<()> {
        let path = self.resolve(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PullDeployError::storage(key.as_str(), e))?;
        }
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| PullDeployError::storage(key.as_str(), e))?;
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .map_err(|e| PullDeployError::storage(key.as_str(), e))?;
        tokio::io::AsyncWriteExt::write_all(&mut file, &buf)
            .await
            .map_err(|e| PullDeployError::storage(key.as_str(), e))
    }

    async fn delete(&self, key: &Utf8Path) -> PullDeployResult<()> {
        let path = self.resolve(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PullDeployError::storage(key.as_str(), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &tempfile::TempDir) -> LocalStore {
        let mut params = Params::new();
        params.insert(
            "basedir".to_string(),
            dir.path().to_str().unwrap().to_string(),
        );
        LocalStore::new(&params).unwrap()
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let key = Utf8Path::new("stubapp/index.json");
        store.put(key, Bytes::from_static(b"{}")).await.unwrap();
        let data = store.get(key).await.unwrap();
        assert_eq!(&data[..], b"{}");
    }

    #[tokio::test]
    async fn get_missing_key_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let result = store.get(Utf8Path::new("nope")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn delete_missing_key_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.delete(Utf8Path::new("nope")).await.unwrap();
    }
}
