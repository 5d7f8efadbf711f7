//! `status`: print a summary of an application's index.

use crate::repo::{self, Order};
use crate::result::CommandResult;
use crate::storage::BlobStore;

pub async fn run(storage: &dyn BlobStore, app_name: &str) -> CommandResult {
    let mut result = CommandResult::new("status");

    let index = match super::load_index(storage, app_name).await {
        Ok(index) => index,
        Err(e) => {
            result.push_error(e);
            return result;
        }
    };

    let mut lines = vec![format!("{app_name}: canary={}", index.canary)];
    for version in repo::version_list(&index, Order::Desc) {
        lines.push(format!(
            "  version {} enabled={} released={}",
            version.name, version.enabled, version.released
        ));
    }
    for (env_name, env) in &index.envs {
        lines.push(format!(
            "  env {env_name}: keep={} current={:?} prior={:?} preview={:?}",
            env.keep, env.current, env.prior, env.preview
        ));
    }

    result.set_message(lines.join("\n"));
    result
}
