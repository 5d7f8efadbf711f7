//! `enable`/`disable`: toggle a version's eligibility for activation.

use crate::config::SignallerConfig;
use crate::errors::PullDeployError;
use crate::result::CommandResult;
use crate::storage::BlobStore;

pub(super) async fn set_enabled(
    storage: &dyn BlobStore,
    signaller_config: SignallerConfig,
    app_name: &str,
    version: &str,
    enabled: bool,
) -> CommandResult {
    let command_name = if enabled { "enable" } else { "disable" };
    let mut result = CommandResult::new(command_name);

    let mut index = match super::load_index(storage, app_name).await {
        Ok(index) => index,
        Err(e) => {
            result.push_error(e);
            return result;
        }
    };

    let Some(v) = index.versions.get_mut(version) else {
        result.push_error(PullDeployError::validation(format!("no such version: {version}")));
        return result;
    };
    v.enabled = enabled;

    match super::save_index(storage, &mut index).await {
        Ok(()) => {
            super::notify_envs(signaller_config, app_name, index.envs.keys().map(String::as_str)).await;
            result.set_message(format!("{app_name} {version}: enabled={enabled}"));
        }
        Err(e) => result.push_error(e),
    }
    result
}

pub async fn run(storage: &dyn BlobStore, signaller_config: SignallerConfig, app_name: &str, version: &str) -> CommandResult {
    set_enabled(storage, signaller_config, app_name, version, true).await
}
