//! Profile loading and the daemon config file.

use crate::CoreError;
use cilium_policy::{read_ovs_config_files, FoldMode, PolicySource, ProfileFile};
use cilium_schema::{DnsEndpoint, HaproxyEndpoint};
use cilium_store::Db;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, error, info};

const DNS_CONFIG_MARKER: &str = "#DNSCONFIG";
const HAPROXY_CONFIG_MARKER: &str = "#HAPROXYCONFIG";

/// What one file put into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadedFile {
    Profile { owners: usize, policies: usize },
    Dns,
    Haproxy,
}

/// Load a profile, DNS or HAProxy file, or every regular file of a
/// directory in name order. Failing files of a directory are logged and
/// skipped.
pub fn store_in_db(db: &dyn Db, path: &Path) -> Result<Vec<LoadedFile>, CoreError> {
    let meta = fs::metadata(path)?;
    if meta.is_file() {
        return Ok(vec![store_file_in_db(db, path)?]);
    }
    if !meta.is_dir() {
        return Err(CoreError::UnsupportedFile(path.display().to_string()));
    }
    let mut files: Vec<_> = fs::read_dir(path)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    if files.is_empty() {
        info!("{} is empty", path.display());
    }
    let mut loaded = Vec::with_capacity(files.len());
    for file in &files {
        match store_file_in_db(db, file) {
            Ok(l) => loaded.push(l),
            Err(e) => error!("failed to load {}: {e}", file.display()),
        }
    }
    Ok(loaded)
}

pub fn store_file_in_db(db: &dyn Db, path: &Path) -> Result<LoadedFile, CoreError> {
    info!("reading file {}", path.display());
    let content = fs::read_to_string(path)?;
    if content.starts_with(DNS_CONFIG_MARKER) {
        let dns: DnsEndpoint = serde_yaml::from_str(&content)?;
        db.put_dns_config(&dns)?;
        return Ok(LoadedFile::Dns);
    }
    if content.starts_with(HAPROXY_CONFIG_MARKER) {
        let haproxy: HaproxyEndpoint = serde_yaml::from_str(&content)?;
        db.put_haproxy_config(&haproxy)?;
        return Ok(LoadedFile::Haproxy);
    }

    let profile: ProfileFile = serde_yaml::from_str(&content)?;
    for source in &profile.policy_source {
        db.put_user(&source.owner)?;
    }
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut policies = 0;
    for mut source in profile.policy_source.iter().cloned() {
        read_rule_files(base_dir, &mut source)?;
        policies += source.policies.len();
        db.put_policy(&source)?;
    }
    debug!("stored {policies} policies from {}", path.display());
    Ok(LoadedFile::Profile {
        owners: profile.policy_source.len(),
        policies,
    })
}

/// Append the rules of every referenced OVS file to the policy's inline
/// rules.
fn read_rule_files(base_dir: &Path, source: &mut PolicySource) -> Result<(), CoreError> {
    for policy in &mut source.policies {
        let ovs = &mut policy.intent_config.config.net_policy.ovs_config;
        let rules = read_ovs_config_files(base_dir, ovs)?;
        if rules.is_empty() {
            continue;
        }
        debug!("read {} OVS rules for policy {}", rules.len(), policy.name);
        ovs.ovs_rules.get_or_insert_with(Vec::new).extend(rules);
    }
    Ok(())
}

/// Optional TOML config of the adapter daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DaemonConfig {
    pub port: u16,
    /// `memory`, `file:<path>` or an `http://` store URL.
    pub store: String,
    pub fold_mode: FoldMode,
    pub events: bool,
    pub events_only: bool,
    pub reconcile: bool,
    pub reconcile_interval_secs: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            store: "memory".to_owned(),
            fold_mode: FoldMode::default(),
            events: true,
            events_only: false,
            reconcile: true,
            reconcile_interval_secs: 60,
        }
    }
}

impl DaemonConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, CoreError> {
        Ok(toml::from_str(input)?)
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}
