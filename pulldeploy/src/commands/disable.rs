//! `disable`: the other half of [`super::enable`].

use crate::config::SignallerConfig;
use crate::result::CommandResult;
use crate::storage::BlobStore;

pub async fn run(storage: &dyn BlobStore, signaller_config: SignallerConfig, app_name: &str, version: &str) -> CommandResult {
    super::enable::set_enabled(storage, signaller_config, app_name, version, false).await
}
