//! `initrepo`: create an empty index for a new application.

use pulldeploy_schema::Index;

use crate::errors::PullDeployError;
use crate::result::CommandResult;
use crate::storage::BlobStore;

pub async fn run(storage: &dyn BlobStore, app_name: &str) -> CommandResult {
    let mut result = CommandResult::new("initrepo");
    let index = Index::new(app_name);

    if storage.get(&index.index_path()).await.is_ok() {
        result.push_error(PullDeployError::validation(format!(
            "index already exists for application {app_name}"
        )));
        return result;
    }

    let bytes = match index.to_json() {
        Ok(bytes) => bytes,
        Err(e) => {
            result.push_error(e.into());
            return result;
        }
    };
    match storage.put(&index.index_path(), bytes.into()).await {
        Ok(()) => result.set_message(format!("initialized repository for {app_name}")),
        Err(e) => result.push_error(e),
    }
    result
}
