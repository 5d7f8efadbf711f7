//! Per-command accumulation of messages and errors.
//!
//! A command gathers every problem it encounters rather than bailing on
//! the first one, then the CLI driver prints each as `commandName:
//! message` and picks the exit code from whether any errors were
//! recorded.

use crate::errors::PullDeployError;

/// Accumulates the informational message and errors produced while
/// running one CLI command.
#[derive(Debug)]
pub struct CommandResult {
    command_name: String,
    message: String,
    errors: Vec<PullDeployError>,
}

impl CommandResult {
    /// Start a new, empty result for `command_name`.
    pub fn new(command_name: impl Into<String>) -> Self {
        Self {
            command_name: command_name.into(),
            message: String::new(),
            errors: Vec::new(),
        }
    }

    /// Set the command's single success/status message.
    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    /// The command's status message, empty if none was set.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Record an error without stopping the command.
    pub fn push_error(&mut self, err: PullDeployError) {
        self.errors.push(err);
    }

    /// How many errors have been recorded so far.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Whether any errors have been recorded.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Render every recorded error as `"commandName: message"`.
    pub fn rendered_errors(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", self.command_name, e))
            .collect()
    }

    /// Print the message (if any) and every error to stderr/stdout, the
    /// way the CLI's `Exec` driver does.
    pub fn report(&self) {
        if !self.message.is_empty() {
            println!("{}", self.message);
        }
        for line in self.rendered_errors() {
            eprintln!("{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_errors_prefixed_with_command_name() {
        let mut result = CommandResult::new("deploy");
        result.push_error(PullDeployError::validation("version already deployed"));
        assert_eq!(result.error_count(), 1);
        assert_eq!(
            result.rendered_errors(),
            vec!["deploy: validation error: version already deployed".to_string()]
        );
    }

    #[test]
    fn no_errors_means_has_errors_false() {
        let result = CommandResult::new("list");
        assert!(!result.has_errors());
    }
}
