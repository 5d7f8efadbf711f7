//! `list`: print the configured applications.

use crate::config::PdConfig;
use crate::result::CommandResult;

pub fn run(config: &PdConfig) -> CommandResult {
    let mut result = CommandResult::new("list");
    let names: Vec<&str> = config.app_list().keys().map(String::as_str).collect();
    result.set_message(names.join("\n"));
    result
}
