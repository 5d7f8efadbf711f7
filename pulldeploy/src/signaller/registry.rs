//! Ephemeral host registry: a per-host ephemeral node under the
//! coordination service, keyed by `(env, app, host)`, carrying the
//! host's served version and deployed set. Without a coordination
//! service these operations are no-ops returning empty lists.

use serde::{Deserialize, Serialize};

use super::zk::ZkHandle;

/// One host's published registry entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub host: String,
    pub env: String,
    pub app: String,
    pub version: String,
    pub deployed: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegistryPayload {
    version: String,
    deployed: Vec<String>,
}

pub struct Registry {
    zk: Option<ZkHandle>,
}

impl Registry {
    pub(super) fn new(zk: Option<ZkHandle>) -> Self {
        Self { zk }
    }

    /// Publish or update this host's registry entry.
    pub async fn register(
        &self,
        env_name: &str,
        app_name: &str,
        host_name: &str,
        version: &str,
        deployed: &[String],
    ) {
        let Some(zk) = &self.zk else { return };
        let payload = RegistryPayload {
            version: version.to_string(),
            deployed: deployed.to_vec(),
        };
        let Ok(bytes) = serde_json::to_vec(&payload) else {
            return;
        };
        zk.register(env_name, app_name, host_name, bytes).await;
    }

    /// Remove this host's registry entry.
    pub async fn unregister(&self, env_name: &str, app_name: &str, host_name: &str) {
        let Some(zk) = &self.zk else { return };
        zk.unregister(env_name, app_name, host_name).await;
    }

    /// List every host currently registered for `(env, app)`.
    pub async fn hosts(&self, env_name: &str, app_name: &str) -> Vec<RegistryEntry> {
        let Some(zk) = &self.zk else {
            return Vec::new();
        };
        zk.hosts(env_name, app_name)
            .await
            .into_iter()
            .map(|(host, data)| {
                let payload: RegistryPayload =
                    serde_json::from_slice(&data).unwrap_or(RegistryPayload {
                        version: String::new(),
                        deployed: Vec::new(),
                    });
                RegistryEntry {
                    host,
                    env: env_name.to_string(),
                    app: app_name.to_string(),
                    version: payload.version,
                    deployed: payload.deployed,
                }
            })
            .collect()
    }
}
