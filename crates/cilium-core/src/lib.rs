//! Request handling core of the Cilium adapter.
//!
//! A `Dispatcher` classifies every intercepted PowerStrip request against the
//! merged `HandlerTable`, loads the policies covering the request's labels,
//! resolves one `Runnable` per registered `RunnableKind` and lets each of them
//! rewrite the container config, the Kubernetes object or the raw exchange.
//! `EventProcessor` keeps endpoint state in sync with the Docker event stream,
//! and `store_in_db` loads profile, DNS and HAProxy files into the store.

pub mod concurrency;
pub mod config;
pub mod context;
pub mod events;
pub mod handlers;
pub mod hook;
pub mod runnable;
pub mod runnables;

#[cfg(test)]
mod testing;

pub use concurrency::{install_signal_handler, shutdown_requested};
pub use config::{store_file_in_db, store_in_db, DaemonConfig, LoadedFile};
pub use context::NodeContext;
pub use events::{CacheState, ContainerCache, EventProcessor};
pub use handlers::{HandlerTable, RequestTag, TagDomain};
pub use hook::{Dispatcher, HookResponse};
pub use runnable::{
    DockerExec, KubernetesExec, Runnable, RunnableKind, RunnableRegistry, Translator,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Schema(#[from] cilium_schema::SchemaError),
    #[error(transparent)]
    Policy(#[from] cilium_policy::PolicyError),
    #[error("store error: {0}")]
    Store(#[from] cilium_store::StoreError),
    #[error(transparent)]
    Actuator(#[from] cilium_actuator::ActuatorError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),
    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid handler pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("\"{0}\" is already registered")]
    AlreadyRegistered(String),
    #[error("Reached maximum scalability for containers with labels: {0}")]
    MaxScaleReached(String),
    #[error("LoadBalancer '{0}' unknown")]
    UnknownLoadBalancer(String),
    #[error("unknown restart policy '{0}'")]
    UnknownRestartPolicy(String),
    #[error("unsupported file type: {0}")]
    UnsupportedFile(String),
    #[error("docker daemon not ready after {0} attempts")]
    DockerUnavailable(u32),
}
