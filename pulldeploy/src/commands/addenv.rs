//! `addenv`: add one or more environments to an application.

use crate::config::SignallerConfig;
use crate::repo;
use crate::result::CommandResult;
use crate::storage::BlobStore;

pub async fn run(
    storage: &dyn BlobStore,
    signaller_config: SignallerConfig,
    app_name: &str,
    env_names: &[String],
) -> CommandResult {
    let mut result = CommandResult::new("addenv");

    let mut index = match super::load_index(storage, app_name).await {
        Ok(index) => index,
        Err(e) => {
            result.push_error(e);
            return result;
        }
    };

    for env_name in env_names {
        if let Err(e) = repo::add_env(&mut index, env_name) {
            result.push_error(e);
        }
    }

    match super::save_index(storage, &mut index).await {
        Ok(()) => {
            super::notify_envs(signaller_config, app_name, env_names.iter().map(String::as_str)).await;
            result.set_message(format!("added {} environment(s) to {app_name}", env_names.len()));
        }
        Err(e) => result.push_error(e),
    }
    result
}
