//! CLI command implementations. Each command loads what it needs from
//! storage and/or configuration, mutates in memory, persists, and
//! returns a [`crate::result::CommandResult`] for the driver to report.

pub mod addenv;
pub mod daemon;
pub mod deploy;
pub mod disable;
pub mod enable;
pub mod initrepo;
pub mod list;
pub mod listhosts;
pub mod purge;
pub mod release;
pub mod rmenv;
pub mod set;
pub mod status;
pub mod upload;

use std::sync::Arc;

use pulldeploy_schema::Index;

use crate::config::{PdConfig, SignallerConfig};
use crate::errors::PullDeployResult;
use crate::signaller::Signaller;
use crate::storage::BlobStore;

/// Construct the storage driver configured in `config`.
pub async fn open_storage(config: &PdConfig) -> PullDeployResult<Arc<dyn BlobStore>> {
    let store = crate::storage::build(&config.storage.access_method, &config.storage.params).await?;
    Ok(Arc::from(store))
}

/// Publish a change notification for `(env_name, app_name)` so any agent
/// watching via the coordination substrate wakes immediately instead of
/// waiting for its next timer poll. A no-op when no coordination
/// service is configured.
pub async fn notify_env(signaller_config: SignallerConfig, app_name: &str, env_name: &str) {
    let mut signaller = Signaller::new(signaller_config);
    let _ = signaller.open().await;
    signaller.notify(env_name, app_name, &[]).await;
    signaller.close().await;
}

/// Publish a change notification for `app_name` in each of `env_names`,
/// for mutations (e.g. a new upload) that aren't scoped to a single
/// environment.
pub async fn notify_envs<'a>(
    signaller_config: SignallerConfig,
    app_name: &str,
    env_names: impl Iterator<Item = &'a str>,
) {
    let mut signaller = Signaller::new(signaller_config);
    let _ = signaller.open().await;
    for env_name in env_names {
        signaller.notify(env_name, app_name, &[]).await;
    }
    signaller.close().await;
}

/// Fetch and parse an application's index.
pub async fn load_index(storage: &dyn BlobStore, app_name: &str) -> PullDeployResult<Index> {
    let path = Index::new(app_name).index_path();
    let bytes = storage.get(&path).await?;
    Ok(Index::from_json(app_name, &bytes)?)
}

/// Bump the canary and persist the index.
pub async fn save_index(storage: &dyn BlobStore, index: &mut Index) -> PullDeployResult<()> {
    index.canary += 1;
    let bytes = index.to_json()?;
    storage.put(&index.index_path(), bytes.into()).await
}

/// Resolve a username to a uid, via the system user database.
pub fn lookup_uid(name: &str) -> Option<u32> {
    nix::unistd::User::from_name(name)
        .ok()
        .flatten()
        .map(|u| u.uid.as_raw())
}

/// Resolve a group name to a gid, via the system group database.
pub fn lookup_gid(name: &str) -> Option<u32> {
    nix::unistd::Group::from_name(name)
        .ok()
        .flatten()
        .map(|g| g.gid.as_raw())
}
