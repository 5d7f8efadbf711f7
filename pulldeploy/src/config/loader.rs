//! Reads the daemon-wide YAML config and the per-app JSON configs off
//! disk, stats the YAML file for the root-owned/world-writable check,
//! and assembles the two into one [`PdConfig`]. No env-var overlays, no
//! hot reload beyond what `SIGHUP` already drives.

use std::collections::BTreeMap;
use std::path::Path;

use camino::Utf8Path;
use serde::Deserialize;

use super::{AppConfig, ArtifactTypeConfig, PdConfig, SignallerConfig, StorageConfig};
use crate::errors::{PullDeployError, PullDeployResult};

const APP_CONFIG_DIR: &str = "pulldeploy.d";
const APP_CONFIG_EXT: &str = "json";

/// The shape of the main `pulldeploy.yaml` file, before the
/// ownership/permission check is folded in.
#[derive(Debug, Deserialize)]
struct DaemonConfigFile {
    #[serde(default)]
    signaller: SignallerConfig,
    storage: StorageConfig,
    #[serde(default)]
    artifact_types: BTreeMap<String, ArtifactTypeConfig>,
}

/// Load the main daemon configuration file and every `*.json` file in its
/// sibling `pulldeploy.d/` directory.
///
/// Per-app load failures are collected rather than aborting the whole
/// load: a daemon with nine good app configs and one bad one should
/// still serve the nine.
pub fn load_daemon_config(config_dir: &Utf8Path) -> PullDeployResult<(PdConfig, Vec<String>)> {
    let config_file = config_dir.join("pulldeploy.yaml");
    let text = std::fs::read(&config_file)
        .map_err(|e| PullDeployError::config(format!("reading {config_file}: {e}")))?;
    let parsed: DaemonConfigFile = serde_yaml::from_slice(&text)
        .map_err(|e| PullDeployError::config(format!("parsing {config_file}: {e}")))?;

    let insecure = is_insecure(config_file.as_std_path());

    let (apps, mut errors) = load_app_list(config_dir);
    if insecure {
        errors.push(format!(
            "{config_file}: insecure (world-writable or not root-owned) while running as root"
        ));
    }

    Ok((
        PdConfig {
            signaller: parsed.signaller,
            storage: parsed.storage,
            artifact_types: parsed.artifact_types,
            artifact_types_insecure: insecure,
            apps,
        },
        errors,
    ))
}

fn load_app_list(config_dir: &Utf8Path) -> (BTreeMap<String, AppConfig>, Vec<String>) {
    let mut apps = BTreeMap::new();
    let mut errors = Vec::new();

    let app_dir = config_dir.join(APP_CONFIG_DIR);
    let entries = match std::fs::read_dir(&app_dir) {
        Ok(entries) => entries,
        Err(_) => return (apps, errors),
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(APP_CONFIG_EXT) {
            continue;
        }
        let Some(app_name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        match load_app_config(config_dir, app_name) {
            Ok(cfg) => {
                apps.insert(app_name.to_string(), cfg);
            }
            Err(e) => errors.push(e.to_string()),
        }
    }

    (apps, errors)
}

/// Load a single application's configuration by name.
pub fn load_app_config(config_dir: &Utf8Path, app_name: &str) -> PullDeployResult<AppConfig> {
    let app_config_file = config_dir
        .join(APP_CONFIG_DIR)
        .join(format!("{app_name}.{APP_CONFIG_EXT}"));
    let text = std::fs::read(&app_config_file)
        .map_err(|e| PullDeployError::config(format!("reading {app_config_file}: {e}")))?;
    let mut cfg: AppConfig = serde_json::from_slice(&text)
        .map_err(|e| PullDeployError::config(format!("parsing {app_config_file}: {e}")))?;
    cfg.insecure = is_insecure(app_config_file.as_std_path());
    Ok(cfg)
}

/// Whether a configuration file is insecure: while running as root (euid
/// 0), it is world-writable, or not owned by uid/gid 0.
///
/// Always returns `false` when not running as root — the check only
/// matters because a compromised non-root owner of the file could run
/// arbitrary shell via the extract/hook commands as root otherwise.
#[cfg(unix)]
pub fn is_insecure(path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    if nix::unistd::geteuid().as_raw() != 0 {
        return false;
    }

    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };

    let world_writable = meta.mode() & 0o002 != 0;
    let not_root_owned = meta.uid() != 0 || meta.gid() != 0;
    world_writable || not_root_owned
}

#[cfg(not(unix))]
pub fn is_insecure(_path: &Path) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    #[test]
    fn loads_daemon_config_and_app_configs() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();

        std::fs::write(
            root.join("pulldeploy.yaml"),
            r#"
signaller:
  poll_interval: 30
  poll_fallback: 120
storage:
  access_method: local
  params:
    basedir: /srv/pulldeploy
artifact_types:
  targz:
    ext: tar.gz
    extract_cmd: ["/bin/tar", "zxf", "#ARTIFACTPATH#", "-C", "#VERSIONDIR#"]
"#,
        )
        .unwrap();

        std::fs::create_dir_all(root.join("pulldeploy.d")).unwrap();
        std::fs::write(
            root.join("pulldeploy.d").join("stubapp.json"),
            r#"{
                "description": "a stub app",
                "secret": "the quick brown fox jumps over the lazy dog",
                "directory": "/srv/stubapp",
                "user": "deploy",
                "group": "deploy",
                "artifact_type": "targz"
            }"#,
        )
        .unwrap();

        let (cfg, errors) = load_daemon_config(&root).unwrap();
        assert!(errors.is_empty());
        assert_eq!(cfg.signaller.poll_interval, 30);
        assert_eq!(cfg.storage.access_method, "local");
        assert!(cfg.artifact_type("targz").is_some());
        assert!(cfg.app("stubapp").is_some());
        assert!(!cfg.app("stubapp").unwrap().insecure);
    }
}
