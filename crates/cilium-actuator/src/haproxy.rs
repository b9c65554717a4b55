//! HAProxy config service model and client.

use crate::ActuatorError;
use cilium_schema::HaproxyEndpoint;
use serde::{Deserialize, Serialize};
use std::io::Read;
use tracing::debug;

pub const BACKEND_PREFIX: &str = "docker_intent_be_";
pub const BACKEND_SERVER_PREFIX: &str = "docker_intent_bes_";
pub const FRONTEND_PREFIX: &str = "docker_intent_fe_";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyOptions {
    pub abort_on_close: bool,
    pub all_backups: bool,
    pub check_cache: bool,
    pub forward_for: bool,
    pub http_close: bool,
    pub http_check: bool,
    pub ssl_hello_check: bool,
    pub tcp_keep_alive: bool,
    pub tcp_log: bool,
    pub tcp_smart_accept: bool,
    pub tcp_smart_connect: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendServer {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub unix_sock: String,
    pub weight: u32,
    #[serde(rename = "maxconn")]
    pub max_conn: u32,
    pub check: bool,
    pub check_interval: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Backend {
    pub name: String,
    pub mode: String,
    #[serde(rename = "servers")]
    pub backend_servers: Vec<BackendServer>,
    pub options: ProxyOptions,
    pub proxy_mode: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acl {
    pub name: String,
    pub backend: String,
    pub pattern: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpikeLimit {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sample_time: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub expiry_time: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub rate: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Frontend {
    pub name: String,
    pub mode: String,
    pub bind_port: u16,
    pub bind_ip: String,
    pub unix_sock: String,
    pub sock_protocol: String,
    pub options: ProxyOptions,
    pub default_backend: String,
    pub acls: Vec<Acl>,
    pub http_spike_limit: SpikeLimit,
    pub tcp_spike_limit: SpikeLimit,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Service {
    pub name: String,
    pub bind_port: u16,
    pub end_point: String,
    pub mode: String,
}

/// Full configuration as served on `/v1/config`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HaproxyConfig {
    pub frontends: Vec<Frontend>,
    pub backends: Vec<Backend>,
    pub services: Vec<Service>,
}

fn parse_port(port: &str) -> Result<u16, ActuatorError> {
    port.parse()
        .map_err(|_| ActuatorError::InvalidPort(port.to_owned()))
}

impl HaproxyConfig {
    pub fn frontend(&self, name: &str) -> Option<&Frontend> {
        self.frontends.iter().find(|f| f.name == name)
    }

    pub fn backend(&self, name: &str) -> Option<&Backend> {
        self.backends.iter().find(|b| b.name == name)
    }

    /// Register container `container_id` at `ip:container_port` behind a
    /// frontend bound on `host_port`. Existing backends, servers and
    /// frontends are left as they are.
    pub fn update_config(
        &mut self,
        container_id: &str,
        service: &str,
        ip: &str,
        host_port: &str,
        container_port: &str,
        traffic_type: &str,
    ) -> Result<(), ActuatorError> {
        let port = parse_port(container_port)?;
        let bind_port = parse_port(host_port)?;
        let backend_name = format!("{BACKEND_PREFIX}{service}_{container_port}_{host_port}");
        let server = BackendServer {
            name: format!("{BACKEND_SERVER_PREFIX}{container_id}"),
            host: ip.to_owned(),
            port,
            weight: 100,
            max_conn: 1000,
            check_interval: 10,
            ..Default::default()
        };

        match self.backends.iter_mut().find(|b| b.name == backend_name) {
            Some(backend) => {
                if !backend.backend_servers.iter().any(|s| s.name == server.name) {
                    backend.backend_servers.push(server);
                }
            }
            None => self.backends.push(Backend {
                name: backend_name.clone(),
                mode: traffic_type.to_owned(),
                backend_servers: vec![server],
                ..Default::default()
            }),
        }

        let frontend_name = format!("{FRONTEND_PREFIX}{service}_{container_port}_{host_port}");
        if self.frontend(&frontend_name).is_none() {
            self.frontends.push(Frontend {
                name: frontend_name,
                mode: traffic_type.to_owned(),
                bind_port,
                bind_ip: "0.0.0.0".to_owned(),
                default_backend: backend_name,
                ..Default::default()
            });
        }
        Ok(())
    }

    /// Drop the backend server of `container_id` from the first backend
    /// holding it. Returns whether one was found.
    pub fn delete_backend(&mut self, container_id: &str) -> bool {
        let name = format!("{BACKEND_SERVER_PREFIX}{container_id}");
        for backend in &mut self.backends {
            if let Some(pos) = backend.backend_servers.iter().position(|s| s.name == name) {
                backend.backend_servers.swap_remove(pos);
                return true;
            }
        }
        false
    }
}

pub trait LoadBalancerApi: Send + Sync {
    fn get_config(&self, endpoint: &HaproxyEndpoint) -> Result<HaproxyConfig, ActuatorError>;

    fn post_config(&self, endpoint: &HaproxyEndpoint, config: &HaproxyConfig) -> Result<(), ActuatorError>;

    fn delete_backend(&self, endpoint: &HaproxyEndpoint, container_id: &str) -> Result<(), ActuatorError> {
        let mut config = self.get_config(endpoint)?;
        config.delete_backend(container_id);
        self.post_config(endpoint, &config)
    }
}

pub struct HttpHaproxy {
    agent: ureq::Agent,
}

impl Default for HttpHaproxy {
    fn default() -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
        }
    }
}

impl HttpHaproxy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancerApi for HttpHaproxy {
    fn get_config(&self, endpoint: &HaproxyEndpoint) -> Result<HaproxyConfig, ActuatorError> {
        let url = format!("{}/v1/config", endpoint.base_url());
        debug!("GET {url}");
        let resp = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| ActuatorError::Http(format!("{url}: {e}")))?;
        let mut body = Vec::new();
        resp.into_body().into_reader().read_to_end(&mut body)?;
        Ok(serde_json::from_slice(&body)?)
    }

    fn post_config(&self, endpoint: &HaproxyEndpoint, config: &HaproxyConfig) -> Result<(), ActuatorError> {
        let url = format!("{}/v1/config", endpoint.base_url());
        let body = serde_json::to_vec(config)?;
        debug!("POST {url} ({} bytes)", body.len());
        self.agent
            .post(&url)
            .header("Content-Type", "application/json")
            .send(&body[..])
            .map_err(|e| ActuatorError::Http(format!("{url}: {e}")))?;
        Ok(())
    }
}
