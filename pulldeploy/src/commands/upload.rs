//! `upload`: publish a new artifact and add it to the version catalog.

use camino::Utf8Path;

use crate::config::{AppConfig, ArtifactTypeConfig, SignallerConfig};
use crate::deploy::hmac;
use crate::errors::PullDeployError;
use crate::repo;
use crate::result::CommandResult;
use crate::storage::BlobStore;

pub async fn run(
    storage: &dyn BlobStore,
    signaller_config: SignallerConfig,
    app_config: &AppConfig,
    artifact_type: &ArtifactTypeConfig,
    app_name: &str,
    version: &str,
    file_path: &Utf8Path,
    disabled: bool,
) -> CommandResult {
    let mut result = CommandResult::new("upload");

    let mut index = match super::load_index(storage, app_name).await {
        Ok(index) => index,
        Err(e) => {
            result.push_error(e);
            return result;
        }
    };

    let data = match tokio::fs::read(file_path).await {
        Ok(data) => data,
        Err(e) => {
            result.push_error(PullDeployError::Filesystem {
                path: file_path.to_path_buf(),
                source: e,
            });
            return result;
        }
    };
    let hmac_bytes = hmac::compute(&app_config.secret, &data);

    let filename = index.artifact_filename(version, &artifact_type.ext);
    let artifact_path = index.artifact_path(&filename);
    let hmac_path = index.hmac_path(&filename);

    if let Err(e) = storage.put(&artifact_path, data.into()).await {
        result.push_error(e);
        return result;
    }
    if let Err(e) = storage.put(&hmac_path, hmac_bytes.into()).await {
        result.push_error(e);
        return result;
    }

    let mut evicted = Vec::new();
    if let Err(e) = repo::add_version(&mut index, version, &filename, !disabled, |old| {
        evicted.push(old.to_string())
    }) {
        result.push_error(e);
        return result;
    }

    for old_version in &evicted {
        let old_filename = index.artifact_filename(old_version, &artifact_type.ext);
        let _ = storage.delete(&index.artifact_path(&old_filename)).await;
        let _ = storage.delete(&index.hmac_path(&old_filename)).await;
    }

    match super::save_index(storage, &mut index).await {
        Ok(()) => {
            super::notify_envs(signaller_config, app_name, index.envs.keys().map(String::as_str)).await;
            result.set_message(format!(
                "uploaded {app_name} {version} ({} retired by retention)",
                evicted.len()
            ));
        }
        Err(e) => result.push_error(e),
    }
    result
}
