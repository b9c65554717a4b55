//! Policy documents as written in profile files and stored per owner.

use crate::docker::DockerConfig;
use crate::intent::IntentConfig;
use crate::kubernetes::KubernetesConfig;
use cilium_schema::{Coverage, Labels};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Policy {
    pub name: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub coverage: Coverage,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub docker_config: DockerConfig,
    #[serde(default)]
    pub intent_config: IntentConfig,
    #[serde(default)]
    pub kubernetes_config: KubernetesConfig,
}

impl Policy {
    pub fn covers(&self, labels: &Labels) -> bool {
        self.coverage.covers(labels)
    }
}

/// All policies owned by one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicySource {
    pub owner: String,
    #[serde(default)]
    pub policies: Vec<Policy>,
}

impl PolicySource {
    /// Stamp every policy with this source's owner.
    pub fn normalize_owner(&mut self) {
        for policy in &mut self.policies {
            policy.owner.clone_from(&self.owner);
        }
    }
}

/// Top-level document of a profile YAML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProfileFile {
    #[serde(default)]
    pub policy_source: Vec<PolicySource>,
}

/// Policies of `owner`, in the order they were found.
pub fn filter_policies_by_user<'a>(sources: &'a [PolicySource], owner: &str) -> Vec<&'a Policy> {
    sources
        .iter()
        .filter(|s| s.owner == owner)
        .flat_map(|s| s.policies.iter())
        .collect()
}

/// Keep only policies whose Kubernetes object reference has `kind`, grouped
/// by owner. Owners left without policies are dropped.
pub fn filter_policies_by_kubernetes_kind(sources: &[PolicySource], kind: &str) -> Vec<PolicySource> {
    sources
        .iter()
        .filter_map(|source| {
            let policies: Vec<Policy> = source
                .policies
                .iter()
                .filter(|p| p.kubernetes_config.kind() == kind)
                .cloned()
                .collect();
            (!policies.is_empty()).then(|| PolicySource {
                owner: source.owner.clone(),
                policies,
            })
        })
        .collect()
}

/// Group every policy that covers `labels` by owner.
pub fn policies_covering(sources: &[PolicySource], labels: &Labels) -> Vec<PolicySource> {
    sources
        .iter()
        .filter_map(|source| {
            let policies: Vec<Policy> = source
                .policies
                .iter()
                .filter(|p| p.covers(labels))
                .cloned()
                .collect();
            (!policies.is_empty()).then(|| PolicySource {
                owner: source.owner.clone(),
                policies,
            })
        })
        .collect()
}
