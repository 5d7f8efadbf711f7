//! Agent Reconciler: the long-running per-host daemon that consumes
//! signals, reads the repository index, and drives
//! [`crate::deploy::LocalDeployment`] to match.

use std::collections::BTreeMap;
use std::sync::Arc;

use pulldeploy_schema::Index;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

use crate::config::PdConfig;
use crate::deploy::LocalDeployment;
use crate::signaller::{Notification, Signaller};
use crate::storage::BlobStore;

/// Long-running state for one application being reconciled on this
/// host.
struct AppState {
    last_canary: Option<u64>,
}

/// Runs the per-host agent loop until a shutdown signal is received.
pub struct Reconciler {
    hostname: String,
    env_name: String,
    config: PdConfig,
    storage: Arc<dyn BlobStore>,
    signaller: Signaller,
    apps: BTreeMap<String, AppState>,
}

impl Reconciler {
    pub fn new(
        hostname: String,
        env_name: String,
        config: PdConfig,
        storage: Arc<dyn BlobStore>,
        signaller: Signaller,
    ) -> Self {
        Self {
            hostname,
            env_name,
            config,
            storage,
            signaller,
            apps: BTreeMap::new(),
        }
    }

    /// Step 1-3: open the signaller, register every configured
    /// application, and force-sync each one.
    pub async fn start(&mut self) -> crate::errors::PullDeployResult<tokio::sync::mpsc::Receiver<Notification>> {
        let notifications = self.signaller.open().await;

        let app_names: Vec<String> = self.config.app_list().keys().cloned().collect();
        for app_name in app_names {
            self.register_app(&app_name).await;
        }
        for app_name in self.apps.keys().cloned().collect::<Vec<_>>() {
            self.synchronize(&app_name).await;
        }

        Ok(notifications)
    }

    async fn register_app(&mut self, app_name: &str) {
        self.apps
            .insert(app_name.to_string(), AppState { last_canary: None });
        self.signaller.monitor(&self.env_name, app_name);

        if let Some(local) = self.build_local_deployment(app_name) {
            let registry = self.signaller.registry();
            registry
                .register(
                    &self.env_name,
                    app_name,
                    &self.hostname,
                    &local.get_current_link(),
                    &local.get_deployed_versions(),
                )
                .await;
        }
    }

    fn build_local_deployment(&self, app_name: &str) -> Option<LocalDeployment> {
        let app_config = self.config.app(app_name)?;
        let artifact_type = self.config.artifact_type(&app_config.artifact_type)?;
        let root_dir = camino::Utf8Path::new(&app_config.directory).parent()?;
        let uid = crate::commands::lookup_uid(&app_config.user).unwrap_or(0);
        let gid = crate::commands::lookup_gid(&app_config.group).unwrap_or(0);
        LocalDeployment::new(
            app_name,
            root_dir,
            app_config,
            uid,
            gid,
            self.config.artifact_types_insecure,
            artifact_type,
        )
        .ok()
    }

    /// Step 4: the main select loop.
    pub async fn run(&mut self, mut notifications: tokio::sync::mpsc::Receiver<Notification>) {
        let mut sighup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");
        let mut sigusr1 = signal(SignalKind::user_defined1()).expect("failed to install SIGUSR1 handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

        loop {
            tokio::select! {
                Some(n) = notifications.recv() => {
                    self.synchronize(&n.app_name).await;
                }
                _ = sighup.recv() => {
                    self.reload().await;
                }
                _ = sigusr1.recv() => {
                    info!("SIGUSR1 received: log rotation is handled by the tracing-appender writer");
                }
                _ = sigint.recv() => {
                    info!("SIGINT received, shutting down");
                    self.shutdown().await;
                    return;
                }
                _ = sigterm.recv() => {
                    info!("SIGTERM received, shutting down");
                    self.shutdown().await;
                    return;
                }
            }
        }
    }

    async fn reload(&mut self) {
        info!("SIGHUP received: reloading application set");
        let registry = self.signaller.registry();
        for app_name in self.apps.keys().cloned().collect::<Vec<_>>() {
            registry.unregister(&self.env_name, &app_name, &self.hostname).await;
        }
        self.apps.clear();

        let app_names: Vec<String> = self.config.app_list().keys().cloned().collect();
        for app_name in app_names {
            self.register_app(&app_name).await;
        }
        for app_name in self.apps.keys().cloned().collect::<Vec<_>>() {
            self.synchronize(&app_name).await;
        }
    }

    async fn shutdown(&mut self) {
        let registry = self.signaller.registry();
        for app_name in self.apps.keys().cloned().collect::<Vec<_>>() {
            registry.unregister(&self.env_name, &app_name, &self.hostname).await;
        }
        self.signaller.close().await;
    }

    /// The `Synchronize(appName)` algorithm.
    async fn synchronize(&mut self, app_name: &str) {
        let Some(app_config) = self.config.app(app_name).cloned() else {
            warn!(app_name, "synchronize: no configuration for app, skipping");
            return;
        };
        let Some(artifact_type) = self.config.artifact_type(&app_config.artifact_type).cloned() else {
            warn!(app_name, "synchronize: unknown artifact type, skipping");
            return;
        };
        let Some(local) = self.build_local_deployment(app_name) else {
            warn!(app_name, "synchronize: cannot construct local deployment, skipping");
            return;
        };

        let index_path = Index::new(app_name).index_path();
        let bytes = match self.storage.get(&index_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(app_name, error = %e, "synchronize: index not found in storage");
                return;
            }
        };
        let index = match Index::from_json(app_name, &bytes) {
            Ok(index) => index,
            Err(e) => {
                error!(app_name, error = %e, "synchronize: index is corrupt");
                return;
            }
        };

        // Step 3: note the canary but never skip on its account alone —
        let state = self
            .apps
            .entry(app_name.to_string())
            .or_insert_with(|| AppState { last_canary: None });
        if state.last_canary == Some(index.canary) {
            info!(app_name, canary = index.canary, "canary unchanged, proceeding anyway");
        }

        let Some(env) = index.envs.get(&self.env_name) else {
            warn!(app_name, env = %self.env_name, "synchronize: environment not present in index");
            return;
        };

        let local_versions: std::collections::HashSet<String> =
            local.get_deployed_versions().into_iter().collect();
        let new_deployments: Vec<String> = env
            .deployed
            .iter()
            .map(|h| h.version.clone())
            .filter(|v| !local_versions.contains(v))
            .collect();

        for version in &new_deployments {
            if !local.artifact_present(version) {
                let filename = index.artifact_filename(version, &artifact_type.ext);
                let artifact_path = index.artifact_path(&filename);
                let reader = match self.storage.get_reader(&artifact_path).await {
                    Ok(reader) => reader,
                    Err(e) => {
                        warn!(app_name, version, error = %e, "failed to fetch artifact");
                        continue;
                    }
                };
                if let Err(e) = local.write_artifact(version, reader).await {
                    warn!(app_name, version, error = %e, "failed to write artifact");
                    continue;
                }
            }

            if !local.hmac_present(version) {
                let filename = index.artifact_filename(version, &artifact_type.ext);
                let hmac_path = index.hmac_path(&filename);
                match self.storage.get(&hmac_path).await {
                    Ok(data) => {
                        if let Err(e) = local.write_hmac(version, &data).await {
                            warn!(app_name, version, error = %e, "failed to write hmac");
                            continue;
                        }
                    }
                    Err(e) => {
                        warn!(app_name, version, error = %e, "failed to fetch hmac");
                        continue;
                    }
                }
            }

            if let Err(e) = local.check_hmac(version, &app_config.secret).await {
                error!(app_name, version, error = %e, "integrity check failed");
                continue;
            }

            if let Err(e) = local.extract(version, &artifact_type.extract_cmd) {
                error!(app_name, version, error = %e, "extract failed");
                continue;
            }

            if let Some(argv) = &app_config.scripts.post_deploy {
                match local.post_deploy(version, argv) {
                    Ok(out) => info!(app_name, version, stdout = %out.stdout, stderr = %out.stderr, "post-deploy hook ran"),
                    Err(e) => warn!(app_name, version, error = %e, "post-deploy hook failed"),
                }
            }

            let registry = self.signaller.registry();
            registry
                .register(
                    &self.env_name,
                    app_name,
                    &self.hostname,
                    &local.get_current_link(),
                    &local.get_deployed_versions(),
                )
                .await;
        }

        let desired = env.current_version_for(&self.hostname).to_string();
        if !desired.is_empty() && desired != local.get_current_link() {
            if let Err(e) = local.link(&desired) {
                error!(app_name, version = %desired, error = %e, "link failed");
            } else {
                if let Some(argv) = &app_config.scripts.post_release {
                    match local.post_release(&desired, argv) {
                        Ok(out) => info!(app_name, version = %desired, stdout = %out.stdout, stderr = %out.stderr, "post-release hook ran"),
                        Err(e) => warn!(app_name, version = %desired, error = %e, "post-release hook failed"),
                    }
                }
                let registry = self.signaller.registry();
                registry
                    .register(
                        &self.env_name,
                        app_name,
                        &self.hostname,
                        &local.get_current_link(),
                        &local.get_deployed_versions(),
                    )
                    .await;
            }
        }

        if let Some(state) = self.apps.get_mut(app_name) {
            state.last_canary = Some(index.canary);
        }
    }
}
