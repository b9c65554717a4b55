//! The Docker domain: container and host config fragments applied to
//! container-creation requests.

use cilium_schema::{ContainerConfig, DockerCreateConfig, HostConfig, Merge};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DockerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ContainerConfig>,
    #[serde(rename = "host-config", default, skip_serializing_if = "Option::is_none")]
    pub host_config: Option<HostConfig>,
    #[serde(default)]
    pub priority: i32,
}

impl DockerConfig {
    /// `other`'s non-blank fields replace ours. Priority always comes from
    /// `other`.
    pub fn merge_with_overwrite(&mut self, other: &Self) {
        self.priority = other.priority;
        self.config.merge_non_blank(&other.config);
        self.host_config.merge_non_blank(&other.host_config);
    }

    /// Every field `other` carries replaces ours, blank or not.
    pub fn overwrite_with(&mut self, other: &Self) {
        self.priority = other.priority;
        self.config.overwrite_present(&other.config);
        self.host_config.overwrite_present(&other.host_config);
    }

    /// Merge this config into an intercepted creation request.
    pub fn apply_to(&self, create: &mut DockerCreateConfig) {
        if let Some(config) = &self.config {
            create.config.merge_non_blank(config);
        }
        if self.host_config.is_some() {
            create.host_config.merge_non_blank(&self.host_config);
        }
    }
}
