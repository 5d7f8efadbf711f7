//! `purge`: remove a version everywhere, failing if still in use.

use crate::config::{ArtifactTypeConfig, SignallerConfig};
use crate::repo;
use crate::result::CommandResult;
use crate::storage::BlobStore;

pub async fn run(
    storage: &dyn BlobStore,
    signaller_config: SignallerConfig,
    artifact_type: &ArtifactTypeConfig,
    app_name: &str,
    version: &str,
) -> CommandResult {
    let mut result = CommandResult::new("purge");

    let mut index = match super::load_index(storage, app_name).await {
        Ok(index) => index,
        Err(e) => {
            result.push_error(e);
            return result;
        }
    };

    if let Err(e) = repo::rm_version(&mut index, version) {
        result.push_error(e);
        return result;
    }

    let filename = index.artifact_filename(version, &artifact_type.ext);
    let _ = storage.delete(&index.artifact_path(&filename)).await;
    let _ = storage.delete(&index.hmac_path(&filename)).await;

    match super::save_index(storage, &mut index).await {
        Ok(()) => {
            super::notify_envs(signaller_config, app_name, index.envs.keys().map(String::as_str)).await;
            result.set_message(format!("purged {app_name} {version}"));
        }
        Err(e) => result.push_error(e),
    }
    result
}
