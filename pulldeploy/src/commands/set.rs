//! `set`: change an environment's retention floor.

use crate::config::SignallerConfig;
use crate::errors::PullDeployError;
use crate::result::CommandResult;
use crate::storage::BlobStore;

pub async fn run(
    storage: &dyn BlobStore,
    signaller_config: SignallerConfig,
    app_name: &str,
    env_name: &str,
    keep: u32,
) -> CommandResult {
    let mut result = CommandResult::new("set");

    if keep < 2 {
        result.push_error(PullDeployError::validation("keep must be at least 2"));
        return result;
    }

    let mut index = match super::load_index(storage, app_name).await {
        Ok(index) => index,
        Err(e) => {
            result.push_error(e);
            return result;
        }
    };

    let Some(env) = index.envs.get_mut(env_name) else {
        result.push_error(PullDeployError::validation(format!("no such environment: {env_name}")));
        return result;
    };
    env.keep = keep;

    match super::save_index(storage, &mut index).await {
        Ok(()) => {
            super::notify_env(signaller_config, app_name, env_name).await;
            result.set_message(format!("{app_name}/{env_name}: keep={keep}"));
        }
        Err(e) => result.push_error(e),
    }
    result
}
