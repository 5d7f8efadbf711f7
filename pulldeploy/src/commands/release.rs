//! `release`: activate a deployed version generally, or preview it to a
//! set of hosts.

use crate::config::SignallerConfig;
use crate::repo::environment;
use crate::result::CommandResult;
use crate::storage::BlobStore;

pub async fn run(
    storage: &dyn BlobStore,
    signaller_config: SignallerConfig,
    app_name: &str,
    env_name: &str,
    version: &str,
    previewers: &[String],
) -> CommandResult {
    let mut result = CommandResult::new("release");

    let mut index = match super::load_index(storage, app_name).await {
        Ok(index) => index,
        Err(e) => {
            result.push_error(e);
            return result;
        }
    };

    if let Err(e) = environment::release(&mut index, env_name, version, previewers) {
        result.push_error(e);
        return result;
    }

    let message = if previewers.is_empty() {
        format!("released {app_name} {version} to {env_name}")
    } else {
        format!(
            "previewed {app_name} {version} to {env_name} for {} host(s)",
            previewers.len()
        )
    };

    match super::save_index(storage, &mut index).await {
        Ok(()) => {
            super::notify_env(signaller_config, app_name, env_name).await;
            result.set_message(message);
        }
        Err(e) => result.push_error(e),
    }
    result
}
