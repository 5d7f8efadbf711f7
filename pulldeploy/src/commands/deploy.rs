//! `deploy`: mark a version as deployed to an environment.

use crate::config::SignallerConfig;
use crate::errors::PullDeployError;
use crate::repo::environment;
use crate::result::CommandResult;
use crate::storage::BlobStore;

pub async fn run(
    storage: &dyn BlobStore,
    signaller_config: SignallerConfig,
    app_name: &str,
    env_name: &str,
    version: &str,
) -> CommandResult {
    let mut result = CommandResult::new("deploy");

    let mut index = match super::load_index(storage, app_name).await {
        Ok(index) => index,
        Err(e) => {
            result.push_error(e);
            return result;
        }
    };

    if !index.versions.contains_key(version) {
        result.push_error(PullDeployError::validation(format!("no such version: {version}")));
        return result;
    }
    let Some(env) = index.envs.get_mut(env_name) else {
        result.push_error(PullDeployError::validation(format!("no such environment: {env_name}")));
        return result;
    };

    if let Err(e) = environment::deploy(env, version, |_evicted| {}) {
        result.push_error(e);
        return result;
    }

    match super::save_index(storage, &mut index).await {
        Ok(()) => {
            super::notify_env(signaller_config, app_name, env_name).await;
            result.set_message(format!("deployed {app_name} {version} to {env_name}"));
        }
        Err(e) => result.push_error(e),
    }
    result
}
