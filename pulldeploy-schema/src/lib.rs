//! # pulldeploy-schema
//!
//! This crate exists to serialize and deserialize the `index.json` produced
//! and consumed by PullDeploy's repository index. It holds only the wire
//! format: field names, shapes, and the handful of pure derivations (path
//! conventions) that every consumer of the index needs. The mutating
//! operations that preserve the index's invariants live in the `pulldeploy`
//! crate, which treats this crate's types as the document it reads and
//! writes.
//!
//! The root type of the schema is [`Index`].

use std::collections::BTreeMap;

use camino::Utf8PathBuf;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Maximum number of entries retained in an environment's release history.
pub const MAX_RELEASE_HISTORY: usize = 10;

/// The default retention floor for a newly created environment.
pub const DEFAULT_KEEP: u32 = 5;

/// The repository index for one application.
///
/// This is the document persisted at `<appName>/index.json` in blob
/// storage. It is the single owner of both the version catalog and the
/// per-environment deployment/release state; environments reference
/// versions by name, never by embedding a copy.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Index {
    /// The application this index describes, always stored lowercased.
    #[serde(skip)]
    pub app_name: String,
    /// Incremented every time the index is persisted. Used by agents to
    /// cheaply detect "no change since last poll".
    pub canary: u64,
    /// Versions uploaded for this application, keyed by version name.
    pub versions: BTreeMap<String, Version>,
    /// Environments defined for this application, keyed by environment
    /// name.
    #[serde(rename = "environments")]
    pub envs: BTreeMap<String, Environment>,
}

impl Index {
    /// Create a new, empty index for `app_name`, lowercased since
    /// application names are case-insensitive.
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into().to_lowercase(),
            canary: 0,
            versions: BTreeMap::new(),
            envs: BTreeMap::new(),
        }
    }

    /// The canonical path to this application's index in blob storage.
    pub fn index_path(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{}/index.json", self.app_name))
    }

    /// The canonical path to a stored artifact file.
    pub fn artifact_path(&self, filename: &str) -> Utf8PathBuf {
        Utf8PathBuf::from(format!("{}/versions/{}", self.app_name, filename))
    }

    /// The canonical path to an artifact's HMAC sidecar file.
    pub fn hmac_path(&self, filename: &str) -> Utf8PathBuf {
        let mut p = self.artifact_path(filename).into_string();
        p.push_str(".hmac");
        Utf8PathBuf::from(p)
    }

    /// The canonical filename an artifact is stored under, given its
    /// version and the configured artifact-type extension (e.g. `tar.gz`).
    pub fn artifact_filename(&self, version: &str, ext: &str) -> String {
        format!("{}-{}.{}", self.app_name, version, ext)
    }

    /// Deserialize an index from JSON bytes.
    ///
    /// `app_name` is required because the index document itself never
    /// persists it (it is implied by the storage path it was read from).
    pub fn from_json(app_name: &str, text: &[u8]) -> serde_json::Result<Self> {
        let mut index: Index = serde_json::from_slice(text)?;
        index.app_name = app_name.to_lowercase();
        Ok(index)
    }

    /// Serialize the index to pretty-printed JSON bytes.
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }
}

/// One uploaded artifact.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Version {
    /// The version name, e.g. `"1.0.3"`.
    #[serde(rename = "version")]
    pub name: String,
    /// The canonical filename this artifact is stored under.
    pub filename: String,
    /// Whether this version has ever been the active one in any
    /// environment.
    pub released: bool,
    /// Whether this version is eligible to be activated. Reversible.
    pub enabled: bool,
    /// When this version was uploaded.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl Version {
    /// Construct a freshly uploaded version, timestamped now.
    pub fn new(name: impl Into<String>, filename: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            filename: filename.into(),
            released: false,
            enabled,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// A `(version, timestamp)` pair recording one deploy or release event.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct HistoryEvent {
    /// The version this event concerns.
    pub version: String,
    /// When the event occurred.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl HistoryEvent {
    /// Construct an event for `version`, timestamped now.
    pub fn now(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// One deployment target (e.g. `"staging"`, `"prod"`) within an
/// application.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Environment {
    /// The minimum number of versions this environment attempts to
    /// retain when an upload triggers retention.
    pub keep: u32,
    /// The active version name prior to the current one, if any.
    #[serde(default)]
    pub prior: String,
    /// The currently active version name, if any.
    #[serde(default)]
    pub current: String,
    /// The version targeted only at hosts in `previewers`, if any.
    #[serde(default)]
    pub preview: String,
    /// Deploy history, newest first.
    #[serde(default)]
    pub deployed: Vec<HistoryEvent>,
    /// Release history, newest first, capped at [`MAX_RELEASE_HISTORY`].
    #[serde(default)]
    pub released: Vec<HistoryEvent>,
    /// Hosts eligible to receive `preview` instead of `current`.
    #[serde(default)]
    pub previewers: Vec<String>,
}

impl Environment {
    /// Construct a new, empty environment with the default retention
    /// floor.
    pub fn new() -> Self {
        Self {
            keep: DEFAULT_KEEP,
            prior: String::new(),
            current: String::new(),
            preview: String::new(),
            deployed: Vec::new(),
            released: Vec::new(),
            previewers: Vec::new(),
        }
    }

    /// Names of the versions currently in the deploy history.
    pub fn deployed_versions(&self) -> impl Iterator<Item = &str> {
        self.deployed.iter().map(|e| e.version.as_str())
    }

    /// The version this environment presents to `host_name`: `preview` if
    /// the host is a previewer, else `current`.
    pub fn current_version_for(&self, host_name: &str) -> &str {
        if !self.preview.is_empty() && self.previewers.iter().any(|h| h == host_name) {
            &self.preview
        } else {
            &self.current
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trips_through_json() {
        let mut index = Index::new("StubApp");
        index.canary = 3;
        index
            .versions
            .insert("1.0.3".into(), Version::new("1.0.3", "stubapp-1.0.3.tar.gz", true));
        let mut env = Environment::new();
        env.current = "1.0.3".into();
        env.deployed.push(HistoryEvent::now("1.0.3"));
        index.envs.insert("prod".into(), env);

        let bytes = index.to_json().unwrap();
        let restored = Index::from_json("stubapp", &bytes).unwrap();
        assert_eq!(restored.canary, index.canary);
        assert_eq!(restored.versions, index.versions);
        assert_eq!(restored.envs, index.envs);
        assert_eq!(restored.app_name, "stubapp");
    }

    #[test]
    fn app_name_lowercased() {
        let index = Index::new("StubApp");
        assert_eq!(index.app_name, "stubapp");
    }

    #[test]
    fn current_version_for_previewer_sees_preview() {
        let mut env = Environment::new();
        env.current = "1.0.3".into();
        env.preview = "2.0.0".into();
        env.previewers = vec!["hostA".into()];
        assert_eq!(env.current_version_for("hostA"), "2.0.0");
        assert_eq!(env.current_version_for("hostB"), "1.0.3");
    }

    #[test]
    fn path_derivations_match_convention() {
        let index = Index::new("stubapp");
        assert_eq!(index.index_path(), "stubapp/index.json");
        let filename = index.artifact_filename("1.0.3", "tar.gz");
        assert_eq!(filename, "stubapp-1.0.3.tar.gz");
        assert_eq!(
            index.artifact_path(&filename),
            "stubapp/versions/stubapp-1.0.3.tar.gz"
        );
        assert_eq!(
            index.hmac_path(&filename),
            "stubapp/versions/stubapp-1.0.3.tar.gz.hmac"
        );
    }
}
