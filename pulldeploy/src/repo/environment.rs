//! Mutating operations on [`pulldeploy_schema::Environment`]: `deploy`
//! and `release`, each enforcing retention and the current/prior/preview
//! invariants.

use pulldeploy_schema::{Environment, HistoryEvent, Index, MAX_RELEASE_HISTORY};

use crate::errors::{PullDeployError, PullDeployResult};

/// Add `version` to `env.deployed`, evicting the oldest unprotected
/// entries first if that would put the list at or above `keep`.
///
/// Rejects a version already present in `deployed`. Protected versions
/// (`current`, `prior`, `preview`) are never evicted even if they are the
/// oldest entry; eviction continues past them to the next-oldest
/// candidate.
pub fn deploy(
    env: &mut Environment,
    version: &str,
    mut on_delete: impl FnMut(&str),
) -> PullDeployResult<()> {
    if env.deployed.iter().any(|h| h.version == version) {
        return Err(PullDeployError::validation(format!(
            "version already deployed: {version}"
        )));
    }

    while env.deployed.len() >= env.keep as usize {
        // Oldest entries are at the end (list is newest-first).
        let evictable = env
            .deployed
            .iter()
            .rposition(|h| !is_protected(env, &h.version));
        let Some(idx) = evictable else {
            break;
        };
        let removed = env.deployed.remove(idx);
        on_delete(&removed.version);
    }

    env.deployed.insert(0, HistoryEvent::now(version));
    Ok(())
}

fn is_protected(env: &Environment, version: &str) -> bool {
    env.current == version || env.prior == version || env.preview == version
}

/// Activate `version`, either generally (`previewers` empty) or as a
/// preview to the given hosts.
///
/// `version` must already be in `env.deployed`, and the corresponding
/// [`pulldeploy_schema::Version`] must be enabled — both looked up via
/// `index` since enablement lives on the shared version, not the
/// environment.
pub fn release(
    index: &mut Index,
    env_name: &str,
    version: &str,
    previewers: &[String],
) -> PullDeployResult<()> {
    {
        let env = index
            .envs
            .get(env_name)
            .ok_or_else(|| PullDeployError::validation(format!("no such environment: {env_name}")))?;
        if !env.deployed.iter().any(|h| h.version == version) {
            return Err(PullDeployError::validation(format!(
                "version {version} is not deployed in {env_name}"
            )));
        }
    }

    let enabled = index
        .versions
        .get(version)
        .ok_or_else(|| PullDeployError::validation(format!("no such version: {version}")))?
        .enabled;
    if !enabled {
        return Err(PullDeployError::validation(format!(
            "version {version} is disabled"
        )));
    }

    if let Some(v) = index.versions.get_mut(version) {
        v.released = true;
    }

    let env = index.envs.get_mut(env_name).expect("checked above");
    if !previewers.is_empty() {
        env.preview = version.to_string();
        env.previewers = previewers.to_vec();
    } else {
        env.preview.clear();
        env.previewers.clear();
        if env.current != version {
            env.prior = std::mem::take(&mut env.current);
            env.current = version.to_string();
            env.released.insert(0, HistoryEvent::now(version));
            env.released.truncate(MAX_RELEASE_HISTORY);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo;

    fn prepared_index() -> Index {
        let mut index = Index::new("stubapp");
        repo::add_env(&mut index, "prod").unwrap();
        repo::add_version(&mut index, "1.0.3", "f1", true, |_| {}).unwrap();
        repo::add_version(&mut index, "1.0.4", "f2", true, |_| {}).unwrap();
        index
    }

    #[test]
    fn deploy_then_general_release_sets_current_and_prior() {
        let mut index = prepared_index();
        deploy(index.envs.get_mut("prod").unwrap(), "1.0.3", |_| {}).unwrap();
        release(&mut index, "prod", "1.0.3", &[]).unwrap();

        let env = &index.envs["prod"];
        assert_eq!(env.current, "1.0.3");
        assert_eq!(env.prior, "");
        assert_eq!(env.released[0].version, "1.0.3");

        deploy(index.envs.get_mut("prod").unwrap(), "1.0.4", |_| {}).unwrap();
        release(&mut index, "prod", "1.0.4", &[]).unwrap();
        let env = &index.envs["prod"];
        assert_eq!(env.current, "1.0.4");
        assert_eq!(env.prior, "1.0.3");
    }

    #[test]
    fn preview_release_does_not_touch_current() {
        let mut index = prepared_index();
        deploy(index.envs.get_mut("prod").unwrap(), "1.0.3", |_| {}).unwrap();
        release(&mut index, "prod", "1.0.3", &[]).unwrap();
        deploy(index.envs.get_mut("prod").unwrap(), "1.0.4", |_| {}).unwrap();
        release(
            &mut index,
            "prod",
            "1.0.4",
            &["hostA".to_string()],
        )
        .unwrap();

        let env = &index.envs["prod"];
        assert_eq!(env.current, "1.0.3");
        assert_eq!(env.preview, "1.0.4");
        assert_eq!(env.previewers, vec!["hostA".to_string()]);
    }

    #[test]
    fn release_rejects_disabled_version() {
        let mut index = prepared_index();
        index.versions.get_mut("1.0.3").unwrap().enabled = false;
        deploy(index.envs.get_mut("prod").unwrap(), "1.0.3", |_| {}).unwrap();
        assert!(release(&mut index, "prod", "1.0.3", &[]).is_err());
    }

    #[test]
    fn deploy_rejects_duplicate() {
        let mut index = prepared_index();
        deploy(index.envs.get_mut("prod").unwrap(), "1.0.3", |_| {}).unwrap();
        assert!(deploy(index.envs.get_mut("prod").unwrap(), "1.0.3", |_| {}).is_err());
    }

    #[test]
    fn deploy_evicts_oldest_unprotected_at_keep_limit() {
        let mut index = prepared_index();
        index.envs.get_mut("prod").unwrap().keep = 1;
        deploy(index.envs.get_mut("prod").unwrap(), "1.0.3", |_| {}).unwrap();
        release(&mut index, "prod", "1.0.3", &[]).unwrap();

        let mut deleted = Vec::new();
        deploy(index.envs.get_mut("prod").unwrap(), "1.0.4", |v| {
            deleted.push(v.to_string())
        })
        .unwrap();

        // 1.0.3 is `current`, so it must survive; nothing else was
        // evictable, so the list grows past `keep`.
        let env = &index.envs["prod"];
        assert!(env.deployed.iter().any(|h| h.version == "1.0.3"));
        assert!(deleted.is_empty());
    }
}
