//! Cross-user policy resolution.
//!
//! Users are visited from the highest ID down to root. Each user's configs
//! for one domain are ordered by ascending priority and folded into a
//! per-user config, which then overwrites the running result, so lower IDs
//! win outright. The result is finally merged over the domain defaults.

use crate::docker::DockerConfig;
use crate::intent::IntentConfig;
use crate::kubernetes::KubernetesConfig;
use crate::policy::{filter_policies_by_user, Policy, PolicySource};
use crate::PolicyError;
use cilium_schema::User;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// How one user's configs of the intent domain are folded together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FoldMode {
    /// Later configs overwrite earlier non-default fields.
    #[default]
    Overwrite,
    /// Later configs only fill defaults and may only shrink `max-scale`.
    Additive,
}

impl FromStr for FoldMode {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overwrite" => Ok(Self::Overwrite),
            "additive" => Ok(Self::Additive),
            other => Err(PolicyError::InvalidFoldMode(other.to_owned())),
        }
    }
}

impl fmt::Display for FoldMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overwrite => f.write_str("overwrite"),
            Self::Additive => f.write_str("additive"),
        }
    }
}

/// A per-domain config that can be resolved from policies.
pub trait DomainConfig: Clone + Default {
    const DOMAIN: &'static str;

    fn extract(policy: &Policy) -> Self;

    fn priority(&self) -> i32;

    fn with_defaults() -> Self;

    fn merge_with_overwrite(&mut self, other: &Self) -> Result<(), PolicyError>;

    fn overwrite_with(&mut self, other: &Self) -> Result<(), PolicyError>;

    /// Fold a later config of the same user into this one.
    fn fold_user(&mut self, other: &Self, _mode: FoldMode) -> Result<(), PolicyError> {
        self.merge_with_overwrite(other)
    }
}

impl DomainConfig for DockerConfig {
    const DOMAIN: &'static str = "docker";

    fn extract(policy: &Policy) -> Self {
        policy.docker_config.clone()
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn with_defaults() -> Self {
        Self::default()
    }

    fn merge_with_overwrite(&mut self, other: &Self) -> Result<(), PolicyError> {
        DockerConfig::merge_with_overwrite(self, other);
        Ok(())
    }

    fn overwrite_with(&mut self, other: &Self) -> Result<(), PolicyError> {
        DockerConfig::overwrite_with(self, other);
        Ok(())
    }
}

impl DomainConfig for IntentConfig {
    const DOMAIN: &'static str = "intent";

    fn extract(policy: &Policy) -> Self {
        policy.intent_config.clone()
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn with_defaults() -> Self {
        IntentConfig::with_defaults()
    }

    fn merge_with_overwrite(&mut self, other: &Self) -> Result<(), PolicyError> {
        IntentConfig::merge_with_overwrite(self, other);
        Ok(())
    }

    fn overwrite_with(&mut self, other: &Self) -> Result<(), PolicyError> {
        IntentConfig::overwrite_with(self, other);
        Ok(())
    }

    fn fold_user(&mut self, other: &Self, mode: FoldMode) -> Result<(), PolicyError> {
        match mode {
            FoldMode::Overwrite => IntentConfig::merge_with_overwrite(self, other),
            FoldMode::Additive => self.merge_with(other),
        }
        Ok(())
    }
}

impl DomainConfig for KubernetesConfig {
    const DOMAIN: &'static str = "kubernetes";

    fn extract(policy: &Policy) -> Self {
        policy.kubernetes_config.clone()
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn with_defaults() -> Self {
        Self::default()
    }

    fn merge_with_overwrite(&mut self, other: &Self) -> Result<(), PolicyError> {
        KubernetesConfig::merge_with_overwrite(self, other)
    }

    fn overwrite_with(&mut self, other: &Self) -> Result<(), PolicyError> {
        KubernetesConfig::overwrite_with(self, other);
        Ok(())
    }
}

/// Users ordered for resolution: descending ID, ties by name.
pub fn users_in_resolution_order(users: &[User]) -> Vec<&User> {
    let mut ordered: Vec<&User> = users.iter().collect();
    ordered.sort_by(|a, b| b.id.cmp(&a.id).then_with(|| a.name.cmp(&b.name)));
    ordered
}

/// One user's configs of domain `C`, ordered by config priority, then policy
/// priority, then policy name. Equal keys keep discovery order.
fn user_configs<C: DomainConfig>(sources: &[PolicySource], owner: &str) -> Vec<C> {
    let mut keyed: Vec<(i32, i32, &str, C)> = filter_policies_by_user(sources, owner)
        .into_iter()
        .map(|p| {
            let config = C::extract(p);
            (config.priority(), p.priority, p.name.as_str(), config)
        })
        .collect();
    keyed.sort_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));
    keyed.into_iter().map(|(_, _, _, config)| config).collect()
}

pub fn resolve<C: DomainConfig>(
    users: &[User],
    sources: &[PolicySource],
    mode: FoldMode,
) -> Result<C, PolicyError> {
    let mut accumulated = C::default();
    for user in users_in_resolution_order(users) {
        let mut configs = user_configs::<C>(sources, &user.name).into_iter();
        let Some(mut user_config) = configs.next() else {
            continue;
        };
        for config in configs {
            user_config.fold_user(&config, mode)?;
        }
        debug!("{} config of user {} ({})", C::DOMAIN, user.name, user.id);
        accumulated.overwrite_with(&user_config)?;
    }
    let mut resolved = C::with_defaults();
    resolved.merge_with_overwrite(&accumulated)?;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::Intent;
    use cilium_schema::HostConfig;

    fn intent_policy(name: &str, owner: &str, priority: i32, max_scale: u32) -> Policy {
        Policy {
            name: name.to_owned(),
            owner: owner.to_owned(),
            intent_config: IntentConfig {
                config: Intent {
                    max_scale: Some(max_scale),
                    ..Intent::default()
                },
                priority,
            },
            ..Policy::default()
        }
    }

    fn source(owner: &str, policies: Vec<Policy>) -> PolicySource {
        PolicySource {
            owner: owner.to_owned(),
            policies,
        }
    }

    #[test]
    fn lowest_id_user_wins() {
        let users = vec![User::new(0, "root"), User::new(5, "ops")];
        let sources = vec![
            source("root", vec![intent_policy("a", "root", 0, 7)]),
            source("ops", vec![intent_policy("b", "ops", 0, 3)]),
        ];
        let resolved: IntentConfig = resolve(&users, &sources, FoldMode::Overwrite).unwrap();
        assert_eq!(resolved.config.max_scale(), 7);
    }

    #[test]
    fn higher_priority_applies_last_within_user() {
        let users = vec![User::new(0, "root")];
        let sources = vec![source(
            "root",
            vec![
                intent_policy("x1", "root", 10, 2),
                intent_policy("x2", "root", 5, 9),
            ],
        )];
        let resolved: IntentConfig = resolve(&users, &sources, FoldMode::Overwrite).unwrap();
        assert_eq!(resolved.config.max_scale(), 2);
    }

    #[test]
    fn equal_priority_breaks_ties_by_name() {
        let users = vec![User::new(0, "root")];
        let sources = vec![source(
            "root",
            vec![
                intent_policy("zeta", "root", 1, 4),
                intent_policy("alpha", "root", 1, 6),
            ],
        )];
        let resolved: IntentConfig = resolve(&users, &sources, FoldMode::Overwrite).unwrap();
        assert_eq!(resolved.config.max_scale(), 4);
    }

    #[test]
    fn additive_mode_only_shrinks_max_scale() {
        let users = vec![User::new(0, "root")];
        let sources = vec![source(
            "root",
            vec![
                intent_policy("a", "root", 1, 3),
                intent_policy("b", "root", 2, 8),
            ],
        )];
        let overwrite: IntentConfig = resolve(&users, &sources, FoldMode::Overwrite).unwrap();
        assert_eq!(overwrite.config.max_scale(), 8);
        let additive: IntentConfig = resolve(&users, &sources, FoldMode::Additive).unwrap();
        assert_eq!(additive.config.max_scale(), 3);
    }

    #[test]
    fn no_policies_yields_defaults() {
        let users = vec![User::new(0, "root")];
        let resolved: IntentConfig = resolve(&users, &[], FoldMode::Overwrite).unwrap();
        assert_eq!(resolved, IntentConfig::with_defaults());
    }

    #[test]
    fn users_without_policies_are_skipped() {
        let users = vec![User::new(0, "root"), User::new(2, "dev")];
        let sources = vec![source("dev", vec![intent_policy("d", "dev", 0, 4)])];
        let resolved: IntentConfig = resolve(&users, &sources, FoldMode::Overwrite).unwrap();
        assert_eq!(resolved.config.max_scale(), 4);
        assert!(resolved.config.add_to_dns());
    }

    #[test]
    fn docker_domain_resolves_dns() {
        let users = vec![User::new(0, "root")];
        let policy = Policy {
            name: "dns".to_owned(),
            owner: "root".to_owned(),
            docker_config: DockerConfig {
                host_config: Some(HostConfig {
                    dns: Some(vec!["1.2.3.4".to_owned()]),
                    ..HostConfig::default()
                }),
                ..DockerConfig::default()
            },
            ..Policy::default()
        };
        let resolved: DockerConfig =
            resolve(&users, &[source("root", vec![policy])], FoldMode::Overwrite).unwrap();
        assert_eq!(
            resolved.host_config.unwrap().dns,
            Some(vec!["1.2.3.4".to_owned()])
        );
    }

    #[test]
    fn kubernetes_domain_surfaces_kind_errors() {
        let users = vec![User::new(0, "root")];
        let mut policy = Policy {
            name: "node".to_owned(),
            owner: "root".to_owned(),
            ..Policy::default()
        };
        policy.kubernetes_config.object_reference.kind = "Node".to_owned();
        let result: Result<KubernetesConfig, _> =
            resolve(&users, &[source("root", vec![policy])], FoldMode::Overwrite);
        assert!(matches!(result, Err(PolicyError::UnsupportedKind(_))));
    }

    #[test]
    fn fold_mode_parses() {
        assert_eq!("additive".parse::<FoldMode>().unwrap(), FoldMode::Additive);
        assert!("sideways".parse::<FoldMode>().is_err());
        assert_eq!(FoldMode::default().to_string(), "overwrite");
    }
}
