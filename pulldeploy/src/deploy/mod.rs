//! Local Deployment: per-app on-disk layout manager covering artifact
//! and HMAC storage, extraction, the `current` symlink, deployed-version
//! enumeration, and the insecure-config refusal for root-owned layouts.

pub mod extract;
pub mod hmac;
pub mod hooks;

use camino::{Utf8Path, Utf8PathBuf};
use tokio::io::AsyncReadExt;

use crate::config::{AppConfig, ArtifactTypeConfig};
use crate::errors::{PullDeployError, PullDeployResult};
use crate::storage::BlobReader;

const ARTIFACT_DIR: &str = "artifact";
const RELEASE_DIR: &str = "release";
const CURRENT_LINK: &str = "current";

/// The local on-disk deployment tree for one application on one host.
pub struct LocalDeployment {
    app_name: String,
    ext: String,
    uid: u32,
    gid: u32,
    base_dir: Utf8PathBuf,
    artifact_dir: Utf8PathBuf,
    release_dir: Utf8PathBuf,
    /// Whether the configuration that produced this deployment's
    /// extract command / hooks came from an insecure file; when running
    /// as root this refuses `extract`/`postDeploy`/`postRelease`.
    insecure: bool,
}

impl LocalDeployment {
    /// Validate and construct a deployment rooted at `root_dir/app_name`,
    /// creating `artifact/` and `release/` with the configured ownership
    /// if they don't already exist.
    pub fn new(
        app_name: &str,
        root_dir: &Utf8Path,
        app_config: &AppConfig,
        uid: u32,
        gid: u32,
        insecure: bool,
        artifact_type: &ArtifactTypeConfig,
    ) -> PullDeployResult<Self> {
        if app_name.is_empty() {
            return Err(PullDeployError::validation("appName is mandatory"));
        }
        if artifact_type.ext.is_empty() {
            return Err(PullDeployError::validation("artifact type ext is mandatory"));
        }
        let _ = app_config;

        let root_dir = abs_path(root_dir);
        if root_dir == "/" {
            return Err(PullDeployError::validation("\"/\" not permitted as rootDir"));
        }
        let segments = root_dir.as_str().split('/').count();
        if segments < 3 {
            return Err(PullDeployError::validation(
                "rootDir must be at least 2 levels deep",
            ));
        }
        if !root_dir.exists() {
            return Err(PullDeployError::validation(format!(
                "rootDir does not exist: {root_dir}"
            )));
        }

        let base_dir = root_dir.join(app_name);
        let artifact_dir = base_dir.join(ARTIFACT_DIR);
        let release_dir = base_dir.join(RELEASE_DIR);
        for dir in [&base_dir, &artifact_dir, &release_dir] {
            make_dir(dir, uid, gid)?;
        }

        Ok(Self {
            app_name: app_name.to_string(),
            ext: artifact_type.ext.clone(),
            uid,
            gid,
            base_dir,
            artifact_dir,
            release_dir,
            insecure,
        })
    }

    fn artifact_path(&self, version: &str) -> Utf8PathBuf {
        self.artifact_dir
            .join(format!("{}-{}.{}", self.app_name, version, self.ext))
    }

    fn hmac_path(&self, version: &str) -> Utf8PathBuf {
        let mut p = self.artifact_path(version).into_string();
        p.push_str(".hmac");
        Utf8PathBuf::from(p)
    }

    fn release_path(&self, version: &str) -> Utf8PathBuf {
        self.release_dir.join(version)
    }

    fn current_link(&self) -> Utf8PathBuf {
        self.base_dir.join(CURRENT_LINK)
    }

    pub fn artifact_present(&self, version: &str) -> bool {
        self.artifact_path(version).exists()
    }

    pub fn hmac_present(&self, version: &str) -> bool {
        self.hmac_path(version).exists()
    }

    /// Stream `reader` to the artifact path for `version`, failing if it
    /// already exists.
    pub async fn write_artifact(&self, version: &str, mut reader: BlobReader) -> PullDeployResult<()> {
        let path = self.artifact_path(version);
        if path.exists() {
            return Err(PullDeployError::validation(format!(
                "artifact already exists: {path}"
            )));
        }
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .await
            .map_err(|e| fs_err(&path, e))?;
        tokio::fs::write(&path, &buf)
            .await
            .map_err(|e| fs_err(&path, e))?;
        set_owner(&path, self.uid, self.gid)?;
        Ok(())
    }

    /// Write the HMAC sidecar for `version`.
    pub async fn write_hmac(&self, version: &str, data: &[u8]) -> PullDeployResult<()> {
        let path = self.hmac_path(version);
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| fs_err(&path, e))?;
        set_owner(&path, self.uid, self.gid)
    }

    /// Read the raw bytes of a locally stored artifact.
    pub async fn read_artifact(&self, version: &str) -> PullDeployResult<Vec<u8>> {
        let path = self.artifact_path(version);
        tokio::fs::read(&path).await.map_err(|e| fs_err(&path, e))
    }

    /// Read the raw bytes of a locally stored HMAC sidecar.
    pub async fn read_hmac(&self, version: &str) -> PullDeployResult<Vec<u8>> {
        let path = self.hmac_path(version);
        tokio::fs::read(&path).await.map_err(|e| fs_err(&path, e))
    }

    /// Whether this deployment's configuration was loaded from an
    /// insecure file (only matters while running as root).
    pub fn is_insecure(&self) -> bool {
        self.insecure
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn gid(&self) -> u32 {
        self.gid
    }

    pub fn release_dir_for(&self, version: &str) -> Utf8PathBuf {
        self.release_path(version)
    }

    /// Atomically point the `current` symlink at `release/<version>/`.
    pub fn link(&self, version: &str) -> PullDeployResult<()> {
        let version_dir = self.release_path(version);
        if !version_dir.exists() {
            return Err(PullDeployError::validation(format!(
                "release directory does not exist: {version_dir}"
            )));
        }
        let link_path = self.current_link();
        let _ = std::fs::remove_file(&link_path);
        #[cfg(unix)]
        std::os::unix::fs::symlink(&version_dir, &link_path).map_err(|e| fs_err(&link_path, e))?;
        Ok(())
    }

    /// The version name the `current` symlink points at, or empty if
    /// absent/unreadable.
    pub fn get_current_link(&self) -> String {
        std::fs::read_link(self.current_link())
            .ok()
            .and_then(|target| {
                target
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
            })
            .unwrap_or_default()
    }

    /// Names of the versions extracted under `release/`.
    pub fn get_deployed_versions(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.release_dir) else {
            return Vec::new();
        };
        entries
            .flatten()
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect()
    }

    /// Remove the artifact, HMAC sidecar, and extracted tree for
    /// `version`. Refuses to remove the currently linked version.
    pub fn remove(&self, version: &str) -> PullDeployResult<()> {
        if self.get_current_link() == version {
            return Err(PullDeployError::validation(format!(
                "removing current version not permitted: {version}"
            )));
        }
        let _ = std::fs::remove_file(self.artifact_path(version));
        let _ = std::fs::remove_file(self.hmac_path(version));
        let release_dir = self.release_path(version);
        if release_dir.exists() {
            std::fs::remove_dir_all(&release_dir).map_err(|e| fs_err(&release_dir, e))?;
        }
        Ok(())
    }
}

fn abs_path(candidate: &Utf8Path) -> Utf8PathBuf {
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else if let Ok(cwd) = std::env::current_dir() {
        Utf8PathBuf::from_path_buf(cwd)
            .unwrap_or_default()
            .join(candidate)
    } else {
        candidate.to_path_buf()
    }
}

fn fs_err(path: &Utf8Path, source: std::io::Error) -> PullDeployError {
    PullDeployError::Filesystem {
        path: path.to_path_buf(),
        source,
    }
}

fn make_dir(path: &Utf8Path, uid: u32, gid: u32) -> PullDeployResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path).map_err(|e| fs_err(path, e))?;
    }
    set_owner(path, uid, gid)
}

#[cfg(unix)]
fn set_owner(path: &Utf8Path, uid: u32, gid: u32) -> PullDeployResult<()> {
    use nix::unistd::{chown, Gid, Uid};
    if nix::unistd::geteuid().as_raw() != 0 {
        return Ok(());
    }
    chown(path.as_std_path(), Some(Uid::from_raw(uid)), Some(Gid::from_raw(gid)))
        .map_err(|e| PullDeployError::Filesystem {
            path: path.to_path_buf(),
            source: std::io::Error::from(e),
        })
}

#[cfg(not(unix))]
fn set_owner(_path: &Utf8Path, _uid: u32, _gid: u32) -> PullDeployResult<()> {
    Ok(())
}
