//! Signaller + Registry: a single `notifications` channel fed by a
//! coordination-service substrate (ZooKeeper watches) and a timer
//! substrate, plus an ephemeral host registry. Both substrates fan into
//! one `tokio::sync::mpsc` channel; the sync `zookeeper` client is
//! wrapped in `tokio::task::spawn_blocking` throughout.

pub mod registry;
pub mod timer;
pub mod zk;

use tokio::sync::mpsc;

use crate::config::SignallerConfig;

/// What triggered a [`Notification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifySource {
    /// Emitted by the reconciler itself to drive an initial or
    /// configuration-reload sync.
    Forced,
    /// Emitted by the timer substrate on its configured interval.
    Timer,
    /// Emitted by the coordination substrate in response to a watched
    /// node changing.
    Coord,
}

/// One notification that an application's state may have changed.
#[derive(Debug, Clone)]
pub struct Notification {
    pub source: NotifySource,
    pub app_name: String,
    pub data: Vec<u8>,
}

/// A connection-state transition the reconciler can observe (true =
/// connected, false = lost).
pub type ConnectionState = bool;

const NOTIFICATIONS_CAPACITY: usize = 100;
const CONN_STATE_CAPACITY: usize = 10;

/// Coordinates the timer and (optional) ZooKeeper substrates into a
/// single notification stream, and exposes the host [`registry::Registry`].
pub struct Signaller {
    config: SignallerConfig,
    notify_tx: mpsc::Sender<Notification>,
    notify_rx: Option<mpsc::Receiver<Notification>>,
    conn_tx: mpsc::Sender<ConnectionState>,
    conn_rx: Option<mpsc::Receiver<ConnectionState>>,
    zk: Option<zk::ZkHandle>,
    watched: std::collections::HashSet<(String, String)>,
}

impl Signaller {
    pub fn new(config: SignallerConfig) -> Self {
        let (notify_tx, notify_rx) = mpsc::channel(NOTIFICATIONS_CAPACITY);
        let (conn_tx, conn_rx) = mpsc::channel(CONN_STATE_CAPACITY);
        Self {
            config,
            notify_tx,
            notify_rx: Some(notify_rx),
            conn_tx,
            conn_rx: Some(conn_rx),
            zk: None,
            watched: std::collections::HashSet::new(),
        }
    }

    /// Allocate resources (connecting to ZooKeeper if configured) and
    /// take ownership of the notifications receiver. May only be called
    /// once.
    pub async fn open(&mut self) -> mpsc::Receiver<Notification> {
        if self.config.zookeeper.is_configured() && self.zk.is_none() {
            let handle = zk::ZkHandle::connect(
                self.config.zookeeper.servers.clone(),
                self.config.zookeeper.base_node.clone(),
                self.conn_tx.clone(),
            )
            .await;
            self.zk = Some(handle);
        }
        self.notify_rx.take().expect("open() called more than once")
    }

    /// The connection-state channel, for observing coordination-service
    /// loss/regain.
    pub fn connection_state(&mut self) -> mpsc::Receiver<ConnectionState> {
        self.conn_rx.take().expect("connection_state() called more than once")
    }

    /// Release resources allocated by [`Self::open`].
    pub async fn close(&mut self) {
        if let Some(zk) = self.zk.take() {
            zk.close().await;
        }
    }

    /// Begin watching `(env_name, app_name)` for changes. Idempotent.
    pub fn monitor(&mut self, env_name: &str, app_name: &str) {
        let key = (env_name.to_string(), app_name.to_string());
        if !self.watched.insert(key.clone()) {
            return;
        }

        let interval = if self.zk.is_some() {
            self.config.poll_fallback
        } else {
            self.config.poll_interval
        };
        timer::spawn(interval, app_name.to_string(), self.notify_tx.clone());

        if let Some(zk) = &self.zk {
            zk.watch(env_name, app_name, self.notify_tx.clone());
        }
    }

    /// Publish a change notification for `(env_name, app_name)` to all
    /// watchers (no-op without a coordination service).
    pub async fn notify(&self, env_name: &str, app_name: &str, data: &[u8]) {
        if let Some(zk) = &self.zk {
            zk.notify(env_name, app_name, data).await;
        }
    }

    /// Emit a `FORCED` notification directly, bypassing both substrates.
    pub async fn force(&self, app_name: &str) {
        let _ = self
            .notify_tx
            .send(Notification {
                source: NotifySource::Forced,
                app_name: app_name.to_string(),
                data: Vec::new(),
            })
            .await;
    }

    /// Whether a coordination service is configured (used to decide
    /// "coordination-service fallback").
    pub fn has_coordination(&self) -> bool {
        self.zk.is_some()
    }

    pub fn registry(&self) -> registry::Registry {
        registry::Registry::new(self.zk.clone())
    }
}
