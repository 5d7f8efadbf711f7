//! End-to-end coverage of the CLI command layer against a
//! local-filesystem storage backend: retention on upload, the purge
//! guard, and general/preview release.

use std::collections::BTreeMap;

use camino::Utf8PathBuf;
use pulldeploy::commands;
use pulldeploy::config::{ArtifactTypeConfig, PdConfig, SignallerConfig, StorageConfig};
use pulldeploy::storage::BlobStore;
use pulldeploy_schema::Index;

const SECRET: &str = "the quick brown fox jumps over the lazy dog";

fn build_config(storage_dir: &Utf8PathBuf) -> PdConfig {
    let mut artifact_types = BTreeMap::new();
    artifact_types.insert(
        "targz".to_string(),
        ArtifactTypeConfig {
            ext: "tar.gz".to_string(),
            extract_cmd: vec![],
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
        apps: BTreeMap::new(),
    }
}

fn app_config() -> pulldeploy::config::AppConfig {
    pulldeploy::config::AppConfig {
        description: String::new(),
        secret: SECRET.to_string(),
        directory: String::new(),
        user: "nobody".to_string(),
        group: "nobody".to_string(),
        artifact_type: "targz".to_string(),
        scripts: pulldeploy::config::ScriptsConfig::default(),
        insecure: false,
    }
}

async fn init_repo(storage: &dyn BlobStore, app_name: &str) {
    let result = commands::initrepo::run(storage, app_name).await;
    assert!(!result.has_errors(), "{:?}", result.rendered_errors());
}

#[tokio::test]
async fn upload_triggers_retention_once_keep_is_exceeded() {
    let dir = tempfile::tempdir().unwrap();
    let storage_root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let config = build_config(&storage_root);
    let storage = commands::open_storage(&config).await.unwrap();
    let artifact_type = config.artifact_type("targz").unwrap().clone();
    let app_config = app_config();

    init_repo(storage.as_ref(), "stubapp").await;
    let result =
        commands::addenv::run(storage.as_ref(), SignallerConfig::default(), "stubapp", &["prod".to_string()]).await;
    assert!(!result.has_errors());
    let result = commands::set::run(storage.as_ref(), SignallerConfig::default(), "stubapp", "prod", 2).await;
    assert!(!result.has_errors());

    let file_dir = tempfile::tempdir().unwrap();
    for n in 1..=4 {
        let version = format!("1.0.{n}");
        let file_path = Utf8PathBuf::from_path_buf(file_dir.path().join(format!("{version}.tar.gz"))).unwrap();
        tokio::fs::write(&file_path, format!("payload for {version}")).await.unwrap();
        let result = commands::upload::run(
            storage.as_ref(),
            SignallerConfig::default(),
            &app_config,
            &artifact_type,
            "stubapp",
            &version,
            &file_path,
            false,
        )
        .await;
        assert!(!result.has_errors(), "{:?}", result.rendered_errors());
    }

    // With keep=2, retention trims the existing catalog below 2 entries
    // before each upload adds one more, so the catalog settles at
    // exactly 2: the two newest versions survive.
    let index = commands::load_index(storage.as_ref(), "stubapp").await.unwrap();
    assert_eq!(index.versions.len(), 2);
    assert!(!index.versions.contains_key("1.0.1"));
    assert!(!index.versions.contains_key("1.0.2"));
    assert!(index.versions.contains_key("1.0.3"));
    assert!(index.versions.contains_key("1.0.4"));

    // Retention's eviction must have deleted the artifact+hmac for the
    // evicted versions.
    for evicted in ["1.0.1", "1.0.2"] {
        let evicted_path = index.artifact_path(&index.artifact_filename(evicted, &artifact_type.ext));
        assert!(storage.get(&evicted_path).await.is_err());
    }
}

#[tokio::test]
async fn purge_refuses_a_version_in_use() {
    let dir = tempfile::tempdir().unwrap();
    let storage_root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let config = build_config(&storage_root);
    let storage = commands::open_storage(&config).await.unwrap();
    let artifact_type = config.artifact_type("targz").unwrap().clone();
    let app_config = app_config();

    init_repo(storage.as_ref(), "stubapp").await;
    commands::addenv::run(storage.as_ref(), SignallerConfig::default(), "stubapp", &["prod".to_string()]).await;

    let file_dir = tempfile::tempdir().unwrap();
    let file_path = Utf8PathBuf::from_path_buf(file_dir.path().join("1.0.3.tar.gz")).unwrap();
    tokio::fs::write(&file_path, b"payload").await.unwrap();
    commands::upload::run(
        storage.as_ref(),
        SignallerConfig::default(),
        &app_config,
        &artifact_type,
        "stubapp",
        "1.0.3",
        &file_path,
        false,
    )
    .await;

    commands::deploy::run(storage.as_ref(), SignallerConfig::default(), "stubapp", "prod", "1.0.3").await;
    commands::release::run(storage.as_ref(), SignallerConfig::default(), "stubapp", "prod", "1.0.3", &[]).await;

    let result =
        commands::purge::run(storage.as_ref(), SignallerConfig::default(), &artifact_type, "stubapp", "1.0.3").await;
    assert!(result.has_errors());
    assert!(result.rendered_errors()[0].contains("prod"));

    let index = commands::load_index(storage.as_ref(), "stubapp").await.unwrap();
    assert!(index.versions.contains_key("1.0.3"), "purge must not have removed the in-use version");
}

#[tokio::test]
async fn release_then_preview_leaves_current_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let storage_root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    let config = build_config(&storage_root);
    let storage = commands::open_storage(&config).await.unwrap();
    let artifact_type = config.artifact_type("targz").unwrap().clone();
    let app_config = app_config();

    init_repo(storage.as_ref(), "stubapp").await;
    commands::addenv::run(storage.as_ref(), SignallerConfig::default(), "stubapp", &["prod".to_string()]).await;

    let file_dir = tempfile::tempdir().unwrap();
    for version in ["1.0.3", "1.0.4"] {
        let file_path = Utf8PathBuf::from_path_buf(file_dir.path().join(format!("{version}.tar.gz"))).unwrap();
        tokio::fs::write(&file_path, format!("payload {version}")).await.unwrap();
        commands::upload::run(
            storage.as_ref(),
            SignallerConfig::default(),
            &app_config,
            &artifact_type,
            "stubapp",
            version,
            &file_path,
            false,
        )
        .await;
        commands::deploy::run(storage.as_ref(), SignallerConfig::default(), "stubapp", "prod", version).await;
    }

    let result =
        commands::release::run(storage.as_ref(), SignallerConfig::default(), "stubapp", "prod", "1.0.3", &[]).await;
    assert!(!result.has_errors(), "{:?}", result.rendered_errors());

    let result = commands::release::run(
        storage.as_ref(),
        SignallerConfig::default(),
        "stubapp",
        "prod",
        "1.0.4",
        &["hostA".to_string()],
    )
    .await;
    assert!(!result.has_errors(), "{:?}", result.rendered_errors());

    let index: Index = commands::load_index(storage.as_ref(), "stubapp").await.unwrap();
    let env = &index.envs["prod"];
    assert_eq!(env.current, "1.0.3");
    assert_eq!(env.preview, "1.0.4");
    assert_eq!(env.previewers, vec!["hostA".to_string()]);
}
