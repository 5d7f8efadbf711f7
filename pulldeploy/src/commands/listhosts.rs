//! `listhosts`: print the registry entries for an application in an
//! environment.

use crate::config::SignallerConfig;
use crate::result::CommandResult;
use crate::signaller::Signaller;

pub async fn run(signaller_config: SignallerConfig, app_name: &str, env_name: &str) -> CommandResult {
    let mut result = CommandResult::new("listhosts");

    let mut signaller = Signaller::new(signaller_config);
    let _notifications = signaller.open().await;
    if !signaller.has_coordination() {
        result.set_message(String::new());
        signaller.close().await;
        return result;
    }

    let registry = signaller.registry();
    let hosts = registry.hosts(env_name, app_name).await;
    let lines: Vec<String> = hosts
        .iter()
        .map(|h| format!("{}: version={} deployed={:?}", h.host, h.version, h.deployed))
        .collect();
    result.set_message(lines.join("\n"));

    signaller.close().await;
    result
}
