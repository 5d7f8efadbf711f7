//! Post-deploy / post-release hook commands: optional user-supplied
//! scripts run with the release directory as the working directory,
//! letting a deployed artifact register or restart its own service.

use super::LocalDeployment;
use crate::errors::{PullDeployError, PullDeployResult};

/// The result of running a hook: the command line that was run, and its
/// trimmed stdout/stderr.
#[derive(Debug, Clone)]
pub struct HookOutput {
    pub command_line: String,
    pub stdout: String,
    pub stderr: String,
}

impl LocalDeployment {
    /// Run `argv` with `cwd = release/<version>/`. Refuses if running as
    /// uid 0 with an insecure app configuration.
    fn run_hook(&self, version: &str, argv: &[String]) -> PullDeployResult<HookOutput> {
        let Some((program, args)) = argv.split_first() else {
            return Err(PullDeployError::validation("hook command must not be empty"));
        };
        if self.is_insecure() && nix::unistd::geteuid().as_raw() == 0 {
            return Err(PullDeployError::config(
                "refusing to run hook: app configuration is insecure while running as root",
            ));
        }

        let cwd = self.release_dir_for(version);
        let command_line = argv.join(" ");
        let output = std::process::Command::new(program)
            .args(args)
            .current_dir(&cwd)
            .output()
            .map_err(|e| {
                PullDeployError::validation(format!("cannot run hook {command_line:?}: {e}"))
            })?;

        Ok(HookOutput {
            command_line,
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    /// Run the configured post-deploy hook, if any.
    pub fn post_deploy(&self, version: &str, argv: &[String]) -> PullDeployResult<HookOutput> {
        self.run_hook(version, argv)
    }

    /// Run the configured post-release hook, if any.
    pub fn post_release(&self, version: &str, argv: &[String]) -> PullDeployResult<HookOutput> {
        self.run_hook(version, argv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppConfig, ArtifactTypeConfig, ScriptsConfig};
    use camino::Utf8PathBuf;

    fn deployment(root: &Utf8PathBuf) -> LocalDeployment {
        let cfg = AppConfig {
            description: String::new(),
            secret: "x".into(),
            directory: String::new(),
            user: "nobody".into(),
            group: "nobody".into(),
            artifact_type: "targz".into(),
            scripts: ScriptsConfig::default(),
            insecure: false,
        };
        let artifact_type = ArtifactTypeConfig {
            ext: "tar.gz".into(),
            extract_cmd: vec![],
        };
        LocalDeployment::new(
            "stubapp",
            root,
            &cfg,
            nix::unistd::getuid().as_raw(),
            nix::unistd::getgid().as_raw(),
            false,
            &artifact_type,
        )
        .unwrap()
    }

    #[test]
    fn post_deploy_runs_in_release_dir_and_captures_output() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let deployment = deployment(&root);
        std::fs::create_dir_all(deployment.release_dir_for("1.0.3")).unwrap();

        let result = deployment
            .post_deploy("1.0.3", &["/bin/echo".to_string(), "hi".to_string()])
            .unwrap();
        assert_eq!(result.stdout, "hi");
        assert!(result.command_line.contains("echo"));
    }
}
