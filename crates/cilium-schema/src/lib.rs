//! Wire and data types shared by every Cilium adapter crate.
//!
//! This crate defines the schema layer: label sets and regex-based
//! `Coverage` predicates, users and network endpoints, the PowerStrip
//! message envelope (`PowerstripRequest` and the pre/post-hook responses),
//! the Docker container-creation config (`DockerCreateConfig`), Kubernetes
//! object references (`KubernetesObjRef`), and the field-wise `Merge`
//! operators used by the policy layer.

pub mod coverage;
pub mod docker;
pub mod endpoint;
pub mod kubernetes;
pub mod merge;
pub mod message;
pub mod services;
pub mod users;

pub use coverage::Coverage;
pub use docker::{
    ApiContainer, ApiPort, ContainerConfig, ContainerInfo, ContainerState, DockerCreateConfig,
    HostConfig, PortBinding, PortBindings, RestartPolicy,
};
pub use endpoint::{lookup_service_name, split_link, Endpoint};
pub use kubernetes::{KubernetesKind, KubernetesObjRef, ObjectReference};
pub use merge::{merge_json, overwrite_json, Blank, Merge};
pub use message::{
    decode_request, ClientRequest, HookType, PostHookResponse, PowerstripRequest,
    PreHookResponse, ServerResponse, POWERSTRIP_PROTOCOL_VERSION,
};
pub use services::{DnsEndpoint, HaproxyEndpoint};
pub use users::{User, ROOT_USER};

use std::collections::BTreeMap;
use thiserror::Error;

/// Container or pod metadata labels.
pub type Labels = BTreeMap<String, String>;

/// Label naming the logical service a container belongs to.
pub const SERVICE_LABEL: &str = "com.intent.service";
/// Fallback service label set by docker-compose.
pub const COMPOSE_SERVICE_LABEL: &str = "com.docker.compose.service";
/// Project label set by docker-compose.
pub const COMPOSE_PROJECT_LABEL: &str = "com.docker.compose.project";

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Unsupported PowerstripProtocolVersion. You have {got}, we have {POWERSTRIP_PROTOCOL_VERSION}")]
    UnsupportedVersion { got: u32 },
    #[error("Unsupported hook type: {0}")]
    UnsupportedHook(String),
    #[error("unsupported kind: '{0}'")]
    UnsupportedKind(String),
    #[error("no user ID left for '{0}'")]
    UserIdsExhausted(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_error_names_both_versions() {
        let e = SchemaError::UnsupportedVersion { got: 1 };
        assert_eq!(
            e.to_string(),
            "Unsupported PowerstripProtocolVersion. You have 1, we have 2"
        );
    }

    #[test]
    fn hook_error_display() {
        let e = SchemaError::UnsupportedHook("mid-hook".to_owned());
        assert!(e.to_string().contains("mid-hook"));
    }
}
