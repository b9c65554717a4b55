//! OVS rule files referenced from intent configs.
//!
//! A rule file has the same shape as `net-policy.ovs-config`: it may list
//! further files and inline rules. Files are resolved relative to the
//! profile's directory, each read at most once; rules of referenced files
//! precede the referencing file's own rules.

use crate::intent::OvsConfig;
use crate::PolicyError;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub fn read_ovs_config_files(base_dir: &Path, config: &OvsConfig) -> Result<Vec<String>, PolicyError> {
    let mut seen = HashSet::new();
    let mut rules = Vec::new();
    for file in config.ovs_config_files.iter().flatten() {
        read_rule_file(base_dir, &base_dir.join(file), &mut seen, &mut rules)?;
    }
    Ok(rules)
}

fn read_rule_file(
    base_dir: &Path,
    path: &Path,
    seen: &mut HashSet<PathBuf>,
    rules: &mut Vec<String>,
) -> Result<(), PolicyError> {
    let canonical = fs::canonicalize(path).map_err(|e| PolicyError::OvsFile {
        path: path.display().to_string(),
        source: e,
    })?;
    if !seen.insert(canonical.clone()) {
        return Ok(());
    }
    let content = fs::read_to_string(&canonical)?;
    let config: OvsConfig = if content.trim().is_empty() {
        OvsConfig::default()
    } else {
        serde_yaml::from_str(&content)?
    };
    for nested in config.ovs_config_files.iter().flatten() {
        read_rule_file(base_dir, &base_dir.join(nested), seen, rules)?;
    }
    rules.extend(config.ovs_rules.unwrap_or_default());
    Ok(())
}
