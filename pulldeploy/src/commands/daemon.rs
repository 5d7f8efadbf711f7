//! `daemon`: run the agent reconciler until a shutdown signal arrives.

use crate::config::PdConfig;
use crate::reconciler::Reconciler;
use crate::result::CommandResult;
use crate::signaller::Signaller;

pub async fn run(config: PdConfig, env_name: &str) -> CommandResult {
    let mut result = CommandResult::new("daemon");

    let hostname = match hostname() {
        Ok(h) => h,
        Err(e) => {
            result.push_error(e);
            return result;
        }
    };

    let storage = match super::open_storage(&config).await {
        Ok(storage) => storage,
        Err(e) => {
            result.push_error(e);
            return result;
        }
    };

    let signaller = Signaller::new(config.signaller.clone());
    let mut reconciler = Reconciler::new(hostname, env_name.to_string(), config, storage, signaller);

    let notifications = match reconciler.start().await {
        Ok(notifications) => notifications,
        Err(e) => {
            result.push_error(e);
            return result;
        }
    };

    reconciler.run(notifications).await;
    result.set_message(format!("daemon for {env_name} shut down"));
    result
}

fn hostname() -> Result<String, crate::errors::PullDeployError> {
    nix::unistd::gethostname()
        .map_err(|e| crate::errors::PullDeployError::config(format!("cannot read hostname: {e}")))?
        .into_string()
        .map_err(|_| crate::errors::PullDeployError::config("hostname is not valid UTF-8"))
}
