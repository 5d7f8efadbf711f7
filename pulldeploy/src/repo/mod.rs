//! Repository Index: the in-memory, JSON-persisted model of
//! one application's versions, environments, and histories, with
//! invariant-preserving mutations. The wire shapes live in
//! `pulldeploy_schema`; the mutating operations (retention, deploy,
//! release) live here.

pub mod environment;

use pulldeploy_schema::{Index, Version};

use crate::errors::{PullDeployError, PullDeployResult};

/// Sort order for [`version_list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// Add a new, empty environment named `name`.
pub fn add_env(index: &mut Index, name: &str) -> PullDeployResult<()> {
    if index.envs.contains_key(name) {
        return Err(PullDeployError::validation(format!(
            "environment already exists: {name}"
        )));
    }
    index
        .envs
        .insert(name.to_string(), pulldeploy_schema::Environment::new());
    Ok(())
}

/// Remove environment `name`.
pub fn rm_env(index: &mut Index, name: &str) -> PullDeployResult<()> {
    if index.envs.remove(name).is_none() {
        return Err(PullDeployError::validation(format!(
            "no such environment: {name}"
        )));
    }
    Ok(())
}

/// Sorted (by timestamp) list of versions.
pub fn version_list(index: &Index, order: Order) -> Vec<Version> {
    let mut versions: Vec<Version> = index.versions.values().cloned().collect();
    versions.sort_by_key(|v| v.timestamp);
    if order == Order::Desc {
        versions.reverse();
    }
    versions
}

/// Add a newly uploaded version, running retention first.
///
/// Retention: `minCount = max(env.keep for env in envs)`. From the
/// versions sorted ascending by timestamp, remove each not referenced by
/// any environment's `deployed` list until either `minCount` is reached
/// or no further unreferenced entries exist. `on_delete` is invoked for
/// each removed version so the caller can delete its artifact+hmac from
/// storage.
pub fn add_version(
    index: &mut Index,
    name: &str,
    filename: &str,
    enabled: bool,
    mut on_delete: impl FnMut(&str),
) -> PullDeployResult<()> {
    if index.versions.contains_key(name) {
        return Err(PullDeployError::validation(format!(
            "version already exists: {name}"
        )));
    }

    let min_count = index.envs.values().map(|e| e.keep).max().unwrap_or(0) as usize;

    let mut ordered: Vec<String> = version_list(index, Order::Asc)
        .into_iter()
        .map(|v| v.name)
        .collect();

    // Walk the ascending-by-age list, evicting unreferenced versions
    // until the surviving count is below `min_count` (so the new upload
    // brings it back to exactly `min_count`), or nothing left is
    // evictable.
    let mut remaining = ordered.len();
    let mut i = 0;
    while remaining >= min_count && i < ordered.len() {
        let candidate = ordered[i].clone();
        let referenced = index
            .envs
            .values()
            .any(|e| e.deployed_versions().any(|v| v == candidate));
        if referenced {
            i += 1;
            continue;
        }
        index.versions.remove(&candidate);
        on_delete(&candidate);
        ordered.remove(i);
        remaining -= 1;
    }

    index
        .versions
        .insert(name.to_string(), Version::new(name, filename, enabled));
    Ok(())
}

/// Remove a version, failing if it is referenced by `current`, `prior`,
/// or `preview` in any environment.
pub fn rm_version(index: &mut Index, name: &str) -> PullDeployResult<()> {
    if !index.versions.contains_key(name) {
        return Err(PullDeployError::validation(format!(
            "no such version: {name}"
        )));
    }

    let blocking: Vec<&str> = index
        .envs
        .iter()
        .filter(|(_, e)| e.current == name || e.prior == name || e.preview == name)
        .map(|(n, _)| n.as_str())
        .collect();
    if !blocking.is_empty() {
        return Err(PullDeployError::validation(format!(
            "version {name} is in use by environment(s): {}",
            blocking.join(", ")
        )));
    }

    for env in index.envs.values_mut() {
        env.deployed.retain(|h| h.version != name);
        env.released.retain(|h| h.version != name);
    }
    index.versions.remove(name);
    Ok(())
}

/// Whether `name` may be safely removed right now.
pub fn is_purgable(index: &Index, name: &str) -> bool {
    !index
        .envs
        .values()
        .any(|e| e.current == name || e.prior == name || e.preview == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> Index {
        let mut index = Index::new("stubapp");
        add_env(&mut index, "prod").unwrap();
        index
    }

    #[test]
    fn add_env_rejects_duplicate() {
        let mut index = sample_index();
        assert!(add_env(&mut index, "prod").is_err());
    }

    #[test]
    fn add_version_runs_retention() {
        let mut index = sample_index();
        index.envs.get_mut("prod").unwrap().keep = 3;

        let mut deleted = Vec::new();
        for n in 1..=6 {
            let version = format!("1.0.{n}");
            let filename = format!("stubapp-{version}.tar.gz");
            add_version(&mut index, &version, &filename, true, |v| {
                deleted.push(v.to_string())
            })
            .unwrap();
        }

        // Each upload trims the existing catalog below `keep` before
        // adding the new version, so the catalog settles at exactly
        // `keep` once uploads outnumber it.
        assert_eq!(index.versions.len(), 3);
        assert_eq!(deleted.len(), 3);
        assert!(index.versions.contains_key("1.0.6"));
        assert!(!index.versions.contains_key("1.0.1"));
        assert!(!index.versions.contains_key("1.0.2"));
        assert!(!index.versions.contains_key("1.0.3"));
    }

    #[test]
    fn add_version_does_not_evict_deployed() {
        let mut index = sample_index();
        index.envs.get_mut("prod").unwrap().keep = 2;
        add_version(&mut index, "1.0.0", "f0", true, |_| {}).unwrap();
        index
            .envs
            .get_mut("prod")
            .unwrap()
            .deployed
            .push(pulldeploy_schema::HistoryEvent::now("1.0.0"));

        for n in 1..=4 {
            let version = format!("1.0.{n}");
            add_version(&mut index, &version, &version, true, |_| {}).unwrap();
        }

        assert!(index.versions.contains_key("1.0.0"));
    }

    #[test]
    fn rm_version_blocked_when_current() {
        let mut index = sample_index();
        add_version(&mut index, "1.0.3", "f", true, |_| {}).unwrap();
        index.envs.get_mut("prod").unwrap().current = "1.0.3".into();
        let err = rm_version(&mut index, "1.0.3").unwrap_err();
        assert!(err.to_string().contains("prod"));
    }

    #[test]
    fn rm_version_succeeds_when_unreferenced() {
        let mut index = sample_index();
        add_version(&mut index, "1.0.3", "f", true, |_| {}).unwrap();
        rm_version(&mut index, "1.0.3").unwrap();
        assert!(!index.versions.contains_key("1.0.3"));
    }
}
