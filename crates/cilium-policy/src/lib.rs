//! Policy documents, domain config merge operators, and policy resolution.
//!
//! A `Policy` couples a label `Coverage` with one config per domain:
//! `DockerConfig`, `IntentConfig` and `KubernetesConfig`. Each domain config
//! implements `DomainConfig`, which `resolve` uses to fold the covering
//! policies of every user into one merged config per domain.

pub mod docker;
pub mod intent;
pub mod kubernetes;
pub mod ovs;
pub mod policy;
pub mod resolve;

pub use docker::DockerConfig;
pub use intent::{Intent, IntentConfig, NetConf, OvsConfig};
pub use kubernetes::KubernetesConfig;
pub use ovs::read_ovs_config_files;
pub use policy::{
    filter_policies_by_kubernetes_kind, filter_policies_by_user, policies_covering, Policy,
    PolicySource, ProfileFile,
};
pub use resolve::{resolve, users_in_resolution_order, DomainConfig, FoldMode};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("unsupported kind: '{0}'")]
    UnsupportedKind(String),
    #[error("invalid fold mode '{0}', expected 'overwrite' or 'additive'")]
    InvalidFoldMode(String),
    #[error("cannot open OVS config file {path}: {source}")]
    OvsFile {
        path: String,
        source: std::io::Error,
    },
    #[error("policy I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
