//! Artifact extraction: run the configured extract command with
//! `#ARTIFACTPATH#`/`#VERSIONDIR#` substituted, then recursively chown
//! the result to the app's configured user and group.

use camino::Utf8Path;

use super::LocalDeployment;
use crate::errors::{PullDeployError, PullDeployResult};

impl LocalDeployment {
    /// Extract the locally stored artifact for `version` into
    /// `release/<version>/`, then recursively set ownership of the
    /// extracted tree.
    ///
    /// Refuses if the artifact is absent, or if running as uid 0 with a
    /// configuration loaded from an insecure file (the extract command
    /// is runnable shell).
    pub fn extract(&self, version: &str, extract_cmd: &[String]) -> PullDeployResult<()> {
        if !self.artifact_present(version) {
            return Err(PullDeployError::validation(format!(
                "artifact does not exist for version {version}"
            )));
        }
        if self.is_insecure() && nix::unistd::geteuid().as_raw() == 0 {
            return Err(PullDeployError::config(
                "refusing to extract: artifact-type configuration is insecure while running as root",
            ));
        }

        let version_dir = self.release_dir_for(version);
        if !version_dir.exists() {
            std::fs::create_dir_all(&version_dir).map_err(|e| PullDeployError::Filesystem {
                path: version_dir.clone(),
                source: e,
            })?;
            super::set_owner(&version_dir, self.uid(), self.gid())?;
        }

        let artifact_path = self.artifact_path(version);
        let argv = substitute(extract_cmd, &artifact_path, &version_dir);
        let Some((program, args)) = argv.split_first() else {
            return Err(PullDeployError::config("extract_cmd must not be empty"));
        };

        let output = std::process::Command::new(program)
            .args(args)
            .output()
            .map_err(|e| {
                PullDeployError::validation(format!("cannot run extract command {program:?}: {e}"))
            })?;
        if !output.status.success() {
            return Err(PullDeployError::validation(format!(
                "extract command {program:?} failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        set_owner_recursive(&version_dir, self.uid(), self.gid())
    }
}

/// Replace `#ARTIFACTPATH#`/`#VERSIONDIR#` placeholders in each argv
/// entry.
fn substitute(argv: &[String], artifact_path: &Utf8Path, version_dir: &Utf8Path) -> Vec<String> {
    argv.iter()
        .map(|arg| {
            arg.replace("#ARTIFACTPATH#", artifact_path.as_str())
                .replace("#VERSIONDIR#", version_dir.as_str())
        })
        .collect()
}

#[cfg(unix)]
fn set_owner_recursive(root: &Utf8Path, uid: u32, gid: u32) -> PullDeployResult<()> {
    if nix::unistd::geteuid().as_raw() != 0 {
        return Ok(());
    }
    // Never chown to root:root even if misconfigured; the whole point of
    // this pass is to hand the extracted tree to the unprivileged
    // service account.
    if uid == 0 || gid == 0 {
        return Ok(());
    }
    for entry in walkdir::WalkDir::new(root) {
        let entry = entry.map_err(|e| {
            PullDeployError::Filesystem {
                path: root.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::Other, e),
            }
        })?;
        let Some(path) = camino::Utf8Path::from_path(entry.path()) else {
            continue;
        };
        super::set_owner(path, uid, gid)?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_owner_recursive(_root: &Utf8Path, _uid: u32, _gid: u32) -> PullDeployResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitute_replaces_both_placeholders() {
        let argv = vec![
            "/bin/tar".to_string(),
            "zxf".to_string(),
            "#ARTIFACTPATH#".to_string(),
            "-C".to_string(),
            "#VERSIONDIR#".to_string(),
        ];
        let out = substitute(
            &argv,
            Utf8Path::new("/srv/app/artifact/app-1.0.3.tar.gz"),
            Utf8Path::new("/srv/app/release/1.0.3"),
        );
        assert_eq!(
            out,
            vec![
                "/bin/tar",
                "zxf",
                "/srv/app/artifact/app-1.0.3.tar.gz",
                "-C",
                "/srv/app/release/1.0.3",
            ]
        );
    }
}
