//! ZooKeeper-backed coordination substrate: an ephemeral-node existence
//! watch per `(env, app)` path, and publish-by-create-then-delete. The
//! `zookeeper` crate is a synchronous client, so every call here runs
//! inside `tokio::task::spawn_blocking`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use zookeeper::{Acl, CreateMode, KeeperState, WatchedEvent, ZooKeeper};

use super::{Notification, NotifySource};

const SESSION_TIMEOUT: Duration = Duration::from_secs(20);

/// A cloneable handle to a live ZooKeeper session.
#[derive(Clone)]
pub struct ZkHandle {
    inner: Arc<ZooKeeper>,
    base_node: String,
}

impl ZkHandle {
    /// Connect to the ensemble and start forwarding session-state
    /// transitions onto `conn_tx`.
    pub async fn connect(
        servers: Vec<String>,
        base_node: String,
        conn_tx: mpsc::Sender<bool>,
    ) -> Self {
        let connect_string = servers.join(",");
        let inner = tokio::task::spawn_blocking(move || {
            ZooKeeper::connect(&connect_string, SESSION_TIMEOUT, move |event: WatchedEvent| {
                let connected = event.keeper_state == KeeperState::SyncConnected;
                let _ = conn_tx.try_send(connected);
            })
            .expect("failed to connect to ZooKeeper ensemble")
        })
        .await
        .expect("zookeeper connect task panicked");

        let handle = Self {
            inner: Arc::new(inner),
            base_node,
        };
        handle.ensure_node(&handle.base_node.clone());
        handle
    }

    fn app_watch_path(&self, env_name: &str, app_name: &str) -> String {
        format!("{}/{}/changed/{}", self.base_node, env_name, app_name)
    }

    fn registry_path(&self, env_name: &str, app_name: &str, host_name: &str) -> String {
        if host_name.is_empty() {
            format!(
                "{}/{}/deployments/{}/registry",
                self.base_node, env_name, app_name
            )
        } else {
            format!(
                "{}/{}/deployments/{}/registry/{}",
                self.base_node, env_name, app_name, host_name
            )
        }
    }

    fn ensure_node(&self, path: &str) {
        if self.inner.exists(path, false).ok().flatten().is_some() {
            return;
        }
        let mut built = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            built.push('/');
            built.push_str(segment);
            if self.inner.exists(&built, false).ok().flatten().is_none() {
                let _ = self.inner.create(
                    &built,
                    Vec::new(),
                    Acl::open_unsafe().clone(),
                    CreateMode::Persistent,
                );
            }
        }
    }

    /// Begin watching `(env_name, app_name)` for changes, forwarding
    /// every fired watch as a `COORD` notification.
    pub fn watch(&self, env_name: &str, app_name: &str, notify_tx: mpsc::Sender<Notification>) {
        let path = self.app_watch_path(env_name, app_name);
        self.ensure_node_parents(&path);
        let inner = Arc::clone(&self.inner);
        let app_name = app_name.to_string();
        tokio::task::spawn_blocking(move || {
            watch_loop(inner, path, app_name, notify_tx);
        });
    }

    fn ensure_node_parents(&self, path: &str) {
        if let Some(parent) = path.rsplit_once('/').map(|(p, _)| p) {
            if !parent.is_empty() {
                self.ensure_node(parent);
            }
        }
    }

    /// Publish a change notification by ephemeral create-then-delete, so
    /// watchers see the create event.
    pub async fn notify(&self, env_name: &str, app_name: &str, data: &[u8]) {
        let path = self.app_watch_path(env_name, app_name);
        let data = data.to_vec();
        let inner = Arc::clone(&self.inner);
        let _ = tokio::task::spawn_blocking(move || {
            if inner
                .create(&path, data, Acl::open_unsafe().clone(), CreateMode::Ephemeral)
                .is_ok()
            {
                let _ = inner.delete(&path, None);
            }
        })
        .await;
    }

    /// Publish this host's registry entry.
    pub async fn register(&self, env_name: &str, app_name: &str, host_name: &str, payload: Vec<u8>) {
        let path = self.registry_path(env_name, app_name, host_name);
        self.ensure_node_parents(&path);
        let inner = Arc::clone(&self.inner);
        let _ = tokio::task::spawn_blocking(move || {
            if inner
                .create(&path, payload.clone(), Acl::open_unsafe().clone(), CreateMode::Ephemeral)
                .is_err()
            {
                let _ = inner.set_data(&path, payload, None);
            }
        })
        .await;
    }

    /// Remove this host's registry entry.
    pub async fn unregister(&self, env_name: &str, app_name: &str, host_name: &str) {
        let path = self.registry_path(env_name, app_name, host_name);
        let inner = Arc::clone(&self.inner);
        let _ = tokio::task::spawn_blocking(move || {
            let _ = inner.delete(&path, None);
        })
        .await;
    }

    /// List the hosts currently present in the registry for `(env,
    /// app)`, sorted by host name, with each host's raw payload bytes.
    pub async fn hosts(&self, env_name: &str, app_name: &str) -> Vec<(String, Vec<u8>)> {
        let path = self.registry_path(env_name, app_name, "");
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut names = inner.get_children(&path, false).unwrap_or_default();
            names.sort();
            names
                .into_iter()
                .map(|host| {
                    let data = inner
                        .get_data(&format!("{path}/{host}"), false)
                        .map(|(d, _)| d)
                        .unwrap_or_default();
                    (host, data)
                })
                .collect()
        })
        .await
        .unwrap_or_default()
    }

    pub async fn close(self) {
        let inner = self.inner;
        let _ = tokio::task::spawn_blocking(move || {
            let _ = inner.close();
        })
        .await;
    }
}

/// Re-arm a one-shot existence watch on `path` and block until it
/// fires, then forward a `COORD` notification and repeat.
///
/// `zookeeper-rs` delivers watch firings via a callback invoked from the
/// client's own event thread; we bridge that callback into this
/// blocking thread with a rendezvous channel so the loop can re-arm the
/// watch for `path` each time it fires.
fn watch_loop(
    inner: Arc<ZooKeeper>,
    path: String,
    app_name: String,
    notify_tx: mpsc::Sender<Notification>,
) {
    loop {
        let (fired_tx, fired_rx) = std::sync::mpsc::channel::<()>();
        let watch_result = inner.exists_w(&path, move |_event: WatchedEvent| {
            let _ = fired_tx.send(());
        });
        if watch_result.is_err() {
            return;
        }

        if fired_rx.recv().is_err() {
            return;
        }

        let notification = Notification {
            source: NotifySource::Coord,
            app_name: app_name.clone(),
            data: Vec::new(),
        };
        if notify_tx.blocking_send(notification).is_err() {
            return;
        }
    }
}
