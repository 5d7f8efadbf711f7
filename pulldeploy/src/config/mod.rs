//! Config types for the daemon-wide YAML config and the per-app JSON
//! configs under `/etc/pulldeploy.d/`: storage backend selection,
//! coordination and timer tuning, artifact-type extract-command
//! templating, and per-app deployment settings.

pub mod loader;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Connection information for the ZooKeeper-based coordination substrate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZookeeperConfig {
    /// `host[:port]` entries for the ZooKeeper ensemble.
    #[serde(default)]
    pub servers: Vec<String>,
    /// The path under which all PullDeploy znodes are rooted.
    #[serde(default = "default_base_node")]
    pub base_node: String,
}

fn default_base_node() -> String {
    "/pulldeploy".to_string()
}

impl ZookeeperConfig {
    /// Whether a coordination service is configured at all.
    pub fn is_configured(&self) -> bool {
        !self.servers.is_empty()
    }
}

/// Timeouts and coordination-service information for the signaller.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignallerConfig {
    /// Seconds between repository polls when no coordination service is
    /// configured.
    pub poll_interval: u64,
    /// Seconds between repository polls when a coordination service is
    /// configured (defense in depth against missed watches).
    pub poll_fallback: u64,
    /// ZooKeeper connection details; servers empty means "no coordination
    /// service".
    #[serde(default)]
    pub zookeeper: ZookeeperConfig,
}

impl Default for SignallerConfig {
    fn default() -> Self {
        Self {
            poll_interval: 60,
            poll_fallback: 300,
            zookeeper: ZookeeperConfig::default(),
        }
    }
}

/// The access method for blob storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// One of `"local"`, `"s3"`.
    pub access_method: String,
    /// Driver-specific parameters (e.g. `basedir`, or `bucket`/`region`).
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// One client application's configuration, loaded from
/// `/etc/pulldeploy.d/<appname>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// A short description of the application.
    #[serde(default)]
    pub description: String,
    /// The secret used to compute and verify the artifact HMAC.
    pub secret: String,
    /// The base directory of the deployment on the app server.
    pub directory: String,
    /// The user that should own all deployed artifacts.
    pub user: String,
    /// The group that should own all deployed artifacts.
    pub group: String,
    /// Which artifact-type configuration to use (selects the extract
    /// command and file extension).
    pub artifact_type: String,
    /// Post-deploy/post-release hook commands, if any.
    #[serde(default)]
    pub scripts: ScriptsConfig,
    /// Whether the file this was loaded from failed the ownership/
    /// permission check (set by the loader, never present in the file
    /// itself).
    #[serde(skip, default)]
    pub insecure: bool,
}

/// Hook commands run after a version is deployed or released.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptsConfig {
    /// Command and arguments to run after `extract`, cwd'd into the
    /// release directory.
    #[serde(default)]
    pub post_deploy: Option<Vec<String>>,
    /// Command and arguments to run after `link`, cwd'd into the release
    /// directory.
    #[serde(default)]
    pub post_release: Option<Vec<String>>,
}

/// The configuration for one artifact type: its file extension, and the
/// command used to extract it.
///
/// `#ARTIFACTPATH#` and `#VERSIONDIR#` in `extract_cmd`'s arguments are
/// substituted at extract time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactTypeConfig {
    /// The file extension artifacts of this type are stored under, e.g.
    /// `"tar.gz"`.
    pub ext: String,
    /// The command (argv form) used to extract an artifact of this type.
    pub extract_cmd: Vec<String>,
}

/// The full daemon-wide configuration: signaller, storage, artifact
/// types, and the set of configured applications.
#[derive(Debug, Clone)]
pub struct PdConfig {
    /// Signaller timeouts and coordination-service connection info.
    pub signaller: SignallerConfig,
    /// Blob storage access method and parameters.
    pub storage: StorageConfig,
    /// Extract-command configuration, keyed by artifact-type name, as
    /// declared in the main daemon config file.
    pub artifact_types: BTreeMap<String, ArtifactTypeConfig>,
    /// Whether the main daemon config file failed the ownership/
    /// permission check (applies uniformly to every artifact type, since
    /// they are all declared in that one file).
    pub artifact_types_insecure: bool,
    /// Configured applications, keyed by app name.
    pub apps: BTreeMap<String, AppConfig>,
}

impl PdConfig {
    /// Look up one application's configuration.
    pub fn app(&self, app_name: &str) -> Option<&AppConfig> {
        self.apps.get(app_name)
    }

    /// The full set of configured applications.
    pub fn app_list(&self) -> &BTreeMap<String, AppConfig> {
        &self.apps
    }

    /// Look up the extract-command configuration for an artifact type.
    pub fn artifact_type(&self, name: &str) -> Option<&ArtifactTypeConfig> {
        self.artifact_types.get(name)
    }
}
