//! Persistence for the Cilium adapter.
//!
//! The `Db` trait is the only shared mutable state of the system: users,
//! policies, endpoints, the allocated IP set, stashed Docker links and port
//! bindings, and the DNS/HAProxy service records. `put_ip` is an atomic
//! put-if-absent and is the sole concurrency primitive behind IP allocation.
//!
//! Backends: `MemoryStore` (process-local), `FileStore` (JSON state file
//! guarded by an fs2 lock), and `HttpStore` (client of an adapter's `/db`
//! route, served through `rpc::dispatch`).

pub mod file;
pub mod http;
pub mod memory;
pub mod rpc;
pub mod state;

pub use file::{FileStore, StoreLock};
pub use http::HttpStore;
pub use memory::MemoryStore;
pub use rpc::{dispatch, DbRequest, DbResponse};
pub use state::State;

use cilium_policy::{policies_covering, PolicySource};
use cilium_schema::{DnsEndpoint, Endpoint, HaproxyEndpoint, Labels, PortBindings, User};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Schema(#[from] cilium_schema::SchemaError),
    #[error("IP already in use: {0}")]
    IpInUse(String),
    #[error("lock acquisition failed: {0}")]
    LockFailed(String),
    #[error("remote store error: {0}")]
    Remote(String),
    #[error("unknown store backend: {0}")]
    UnknownBackend(String),
    #[error("store state lock poisoned")]
    Poisoned,
}

pub trait Db: Send + Sync {
    fn get_users(&self) -> Result<Vec<User>, StoreError>;

    /// Register `name`, returning its ID and whether it was new.
    fn put_user(&self, name: &str) -> Result<(u32, bool), StoreError>;

    fn get_policies(&self) -> Result<Vec<PolicySource>, StoreError>;

    /// Policies covering `labels`, grouped by owner.
    fn get_policies_that_covers(&self, labels: &Labels) -> Result<Vec<PolicySource>, StoreError> {
        Ok(policies_covering(&self.get_policies()?, labels))
    }

    /// Store every policy of `source` under its name, owned by `source.owner`.
    fn put_policy(&self, source: &PolicySource) -> Result<(), StoreError>;

    /// The endpoint of `container`, or an empty one when unknown.
    fn get_endpoint(&self, container: &str) -> Result<Endpoint, StoreError>;

    fn put_endpoint(&self, endpoint: &Endpoint) -> Result<(), StoreError>;

    fn delete_endpoint(&self, container: &str) -> Result<(), StoreError>;

    /// Claim `ip`. Fails with `StoreError::IpInUse` when already claimed.
    fn put_ip(&self, ip: &str) -> Result<(), StoreError>;

    fn delete_ip(&self, ip: &str) -> Result<(), StoreError>;

    fn get_docker_links(&self, container: &str) -> Result<Vec<String>, StoreError>;

    fn put_docker_links(&self, container: &str, links: &[String]) -> Result<(), StoreError>;

    /// Links stashed under a container name before the container has an ID.
    fn get_docker_links_temp(&self, name: &str) -> Result<Vec<String>, StoreError>;

    fn put_docker_links_temp(&self, name: &str, links: &[String]) -> Result<(), StoreError>;

    fn get_port_bindings(&self, container: &str) -> Result<PortBindings, StoreError>;

    fn put_port_bindings(&self, container: &str, bindings: &PortBindings) -> Result<(), StoreError>;

    fn get_port_bindings_temp(&self, name: &str) -> Result<PortBindings, StoreError>;

    fn put_port_bindings_temp(&self, name: &str, bindings: &PortBindings) -> Result<(), StoreError>;

    fn get_dns_config(&self) -> Result<Option<DnsEndpoint>, StoreError>;

    fn put_dns_config(&self, dns: &DnsEndpoint) -> Result<(), StoreError>;

    /// The HAProxy record, or the loopback default when none was stored.
    fn get_haproxy_config(&self) -> Result<HaproxyEndpoint, StoreError>;

    fn put_haproxy_config(&self, haproxy: &HaproxyEndpoint) -> Result<(), StoreError>;

    /// Drop everything.
    fn clear(&self) -> Result<(), StoreError>;

    /// Drop users, policies and service records but keep runtime state.
    fn flush_config(&self) -> Result<(), StoreError>;
}

/// Open a store from a backend spec: `memory`, `file:<path>` or an
/// `http://` URL of another adapter.
pub fn select_store(spec: &str) -> Result<Arc<dyn Db>, StoreError> {
    if spec == "memory" {
        return Ok(Arc::new(MemoryStore::new()));
    }
    if let Some(path) = spec.strip_prefix("file:") {
        return Ok(Arc::new(FileStore::open(PathBuf::from(path))?));
    }
    if spec.starts_with("http://") || spec.starts_with("https://") {
        return Ok(Arc::new(HttpStore::new(spec)));
    }
    Err(StoreError::UnknownBackend(spec.to_owned()))
}
