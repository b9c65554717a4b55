//! Side-effect collaborators of the Cilium adapter.
//!
//! Everything that touches the host or another service sits behind a trait
//! here so the hook logic in `cilium-core` can be exercised with the mocks in
//! [`mock`]: shell commands (`CommandRunner`), the Docker daemon
//! (`DockerApi`), the Kubernetes master (`KubernetesApi`), the DNS service
//! (`DnsApi`) and the HAProxy config service (`LoadBalancerApi`).

pub mod docker;
pub mod dns;
pub mod endpoint;
pub mod env;
pub mod exec;
pub mod haproxy;
pub mod ipam;
pub mod kubernetes;
pub mod mock;
pub mod ovs;
pub mod pipework;
pub mod retry;

pub use docker::{DockerApi, DockerEvent, HttpDocker};
pub use dns::{DnsApi, HttpDns};
pub use endpoint::{add_endpoint, remove_endpoint, remove_local_endpoint};
pub use env::NodeEnv;
pub use exec::{CommandRunner, ShellRunner};
pub use haproxy::{HaproxyConfig, HttpHaproxy, LoadBalancerApi};
pub use ipam::allocate_ip;
pub use kubernetes::{HttpKubernetes, KubernetesApi, Pod, PodList};
pub use ovs::{create_ovs_rules, force_ovs_rules};
pub use pipework::{create_bridge, BridgeRequest};
pub use retry::{Backoff, Retries, RetryPolicy};

use cilium_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("actuator I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("command '{command}' failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("unexpected script output: '{0}'")]
    ScriptOutput(String),
    #[error("invalid CIDR '{0}'")]
    InvalidCidr(String),
    #[error("reached maximum IPs used")]
    IpExhausted,
    #[error("invalid port '{0}'")]
    InvalidPort(String),
    #[error("unsupported endpoint '{0}'")]
    UnsupportedEndpoint(String),
    #[error("Remote endpoint not found for container: '{0}'")]
    RemoteEndpointNotFound(String),
}
