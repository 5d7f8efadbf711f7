//! End-to-end coverage of the agent reconciler against a local-filesystem
//! storage backend: a fresh deploy should fetch, verify, extract, and
//! link; a corrupted artifact should be refused.

use std::collections::BTreeMap;

use camino::Utf8PathBuf;
use pulldeploy::commands;
use pulldeploy::config::{AppConfig, ArtifactTypeConfig, PdConfig, ScriptsConfig, SignallerConfig, StorageConfig};
use pulldeploy::deploy::hmac;
use pulldeploy::reconciler::Reconciler;
use pulldeploy::signaller::Signaller;
use pulldeploy_schema::{Environment, HistoryEvent, Index, Version};

const SECRET: &str = "the quick brown fox jumps over the lazy dog";

fn current_account() -> String {
    nix::unistd::User::from_uid(nix::unistd::getuid())
        .ok()
        .flatten()
        .map(|u| u.name)
        .expect("current user must be resolvable for the test fixture")
}

fn build_config(storage_dir: &Utf8PathBuf, app_dir: &Utf8PathBuf) -> PdConfig {
    let account = current_account();
    let mut artifact_types = BTreeMap::new();
    artifact_types.insert(
        "targz".to_string(),
        ArtifactTypeConfig {
            ext: "tar.gz".to_string(),
            // A real tarball isn't needed for this fixture; copying the
            // artifact into the release directory stands in for extraction.
            extract_cmd: vec![
                "/bin/cp".to_string(),
                "#ARTIFACTPATH#".to_string(),
                "#VERSIONDIR#/payload".to_string(),
            ],
        },
    );

    let mut apps = BTreeMap::new();
    apps.insert(
        "stubapp".to_string(),
        AppConfig {
            description: "a stub app".to_string(),
            secret: SECRET.to_string(),
            directory: app_dir.join("stubapp").to_string(),
            user: account.clone(),
            group: account,
            artifact_type: "targz".to_string(),
            scripts: ScriptsConfig::default(),
            insecure: false,
        },
    );

    let mut params = BTreeMap::new();
    params.insert("basedir".to_string(), storage_dir.to_string());

    PdConfig {
        signaller: SignallerConfig::default(),
        storage: StorageConfig {
            access_method: "local".to_string(),
            params,
        },
        artifact_types,
        artifact_types_insecure: false,
        apps,
    }
}

fn sample_index() -> Index {
    let mut index = Index::new("stubapp");
    index.versions.insert(
        "1.0.3".to_string(),
        Version::new("1.0.3", "stubapp-1.0.3.tar.gz", true),
    );
    let mut env = Environment::new();
    env.current = "1.0.3".to_string();
    env.deployed.push(HistoryEvent::now("1.0.3"));
    index.envs.insert("prod".to_string(), env);
    index
}

#[tokio::test]
async fn fresh_deploy_fetches_verifies_extracts_and_links() {
    let storage_dir = tempfile::tempdir().unwrap();
    let app_dir = tempfile::tempdir().unwrap();
    let storage_root = Utf8PathBuf::from_path_buf(storage_dir.path().to_path_buf()).unwrap();
    let app_root = Utf8PathBuf::from_path_buf(app_dir.path().to_path_buf()).unwrap();

    let config = build_config(&storage_root, &app_root);
    let storage = commands::open_storage(&config).await.unwrap();

    let index = sample_index();
    storage.put(&index.index_path(), index.to_json().unwrap().into()).await.unwrap();

    let artifact_bytes = b"a fake release archive".to_vec();
    let artifact_path = index.artifact_path("stubapp-1.0.3.tar.gz");
    let hmac_path = index.hmac_path("stubapp-1.0.3.tar.gz");
    storage.put(&artifact_path, artifact_bytes.clone().into()).await.unwrap();
    storage.put(&hmac_path, hmac::compute(SECRET, &artifact_bytes).into()).await.unwrap();

    let signaller = Signaller::new(config.signaller.clone());
    let mut reconciler = Reconciler::new("hostA".to_string(), "prod".to_string(), config, storage, signaller);
    let _notifications = reconciler.start().await.unwrap();

    let payload_path = app_root.join("stubapp/release/1.0.3/payload");
    assert!(payload_path.exists(), "extract command should have run");
    assert_eq!(std::fs::read(&payload_path).unwrap(), artifact_bytes);

    let current_link = app_root.join("stubapp/current");
    let target = std::fs::read_link(&current_link).unwrap();
    assert_eq!(target.file_name().unwrap(), "1.0.3");
}

#[tokio::test]
async fn hmac_mismatch_refuses_extraction() {
    let storage_dir = tempfile::tempdir().unwrap();
    let app_dir = tempfile::tempdir().unwrap();
    let storage_root = Utf8PathBuf::from_path_buf(storage_dir.path().to_path_buf()).unwrap();
    let app_root = Utf8PathBuf::from_path_buf(app_dir.path().to_path_buf()).unwrap();

    let config = build_config(&storage_root, &app_root);
    let storage = commands::open_storage(&config).await.unwrap();

    let index = sample_index();
    storage.put(&index.index_path(), index.to_json().unwrap().into()).await.unwrap();

    let artifact_bytes = b"a fake release archive".to_vec();
    storage
        .put(&index.artifact_path("stubapp-1.0.3.tar.gz"), artifact_bytes.into())
        .await
        .unwrap();
    storage
        .put(&index.hmac_path("stubapp-1.0.3.tar.gz"), b"not the right hmac".to_vec().into())
        .await
        .unwrap();

    let signaller = Signaller::new(config.signaller.clone());
    let mut reconciler = Reconciler::new("hostA".to_string(), "prod".to_string(), config, storage, signaller);
    let _notifications = reconciler.start().await.unwrap();

    let release_dir = app_root.join("stubapp/release/1.0.3");
    assert!(!release_dir.exists(), "extraction must not proceed after an integrity failure");
}
