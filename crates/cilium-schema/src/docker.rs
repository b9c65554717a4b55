//! Docker container-creation config as carried in `POST /containers/create`
//! bodies and returned by `GET /containers/{id}/json`.
//!
//! Every known field is optional so that a decoded body re-encodes to the
//! same set of keys; keys this crate does not model are kept in `extra`.

use crate::{field_merge, Labels};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub type PortBindings = BTreeMap<String, Vec<PortBinding>>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PortBinding {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host_ip: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host_port: String,
}

impl PortBinding {
    pub fn on_port(port: impl Into<String>) -> Self {
        Self {
            host_ip: String::new(),
            host_port: port.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domainname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_swap: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_shares: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpuset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attach_stdin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attach_stdout: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attach_stderr: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_specs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposed_ports: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tty: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_stdin: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdin_once: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_disabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Labels>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

field_merge!(ContainerConfig {
    hostname,
    domainname,
    user,
    memory,
    memory_swap,
    cpu_shares,
    cpuset,
    attach_stdin,
    attach_stdout,
    attach_stderr,
    port_specs,
    exposed_ports,
    tty,
    open_stdin,
    stdin_once,
    env,
    cmd,
    dns,
    image,
    volumes,
    working_dir,
    mac_address,
    entrypoint,
    network_disabled,
    labels,
    extra,
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RestartPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_retry_count: Option<i64>,
}

field_merge!(RestartPolicy {
    name,
    maximum_retry_count
});

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binds: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap_add: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap_drop: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privileged: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_bindings: Option<PortBindings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_all_ports: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_search: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_hosts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes_from: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<RestartPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_swap: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_shares: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpuset_cpus: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

field_merge!(HostConfig {
    binds,
    cap_add,
    cap_drop,
    privileged,
    port_bindings,
    links,
    publish_all_ports,
    dns,
    dns_search,
    extra_hosts,
    volumes_from,
    network_mode,
    restart_policy,
    memory,
    memory_swap,
    cpu_shares,
    cpuset_cpus,
    extra,
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerState {
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub pid: i64,
}

/// A container-creation request. `name`, `id` and `state` travel outside the
/// body: the name comes from the `?name=` query, the rest from inspect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DockerCreateConfig {
    #[serde(skip)]
    pub name: String,
    #[serde(skip)]
    pub id: String,
    #[serde(flatten)]
    pub config: ContainerConfig,
    #[serde(rename = "HostConfig", default, skip_serializing_if = "Option::is_none")]
    pub host_config: Option<HostConfig>,
    #[serde(skip)]
    pub state: ContainerState,
}

impl DockerCreateConfig {
    pub fn from_body(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    pub fn to_body(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn labels(&self) -> Labels {
        self.config.labels.clone().unwrap_or_default()
    }

    pub fn host_config_mut(&mut self) -> &mut HostConfig {
        self.host_config.get_or_insert_with(HostConfig::default)
    }

    pub fn links(&self) -> Vec<String> {
        self.host_config
            .as_ref()
            .and_then(|hc| hc.links.clone())
            .unwrap_or_default()
    }

    pub fn port_bindings(&self) -> PortBindings {
        self.host_config
            .as_ref()
            .and_then(|hc| hc.port_bindings.clone())
            .unwrap_or_default()
    }
}

/// Response of `GET /containers/{id}/json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub config: ContainerConfig,
    #[serde(default)]
    pub host_config: Option<HostConfig>,
    #[serde(default)]
    pub state: ContainerState,
}

impl ContainerInfo {
    pub fn labels(&self) -> Labels {
        self.config.labels.clone().unwrap_or_default()
    }

    pub fn into_create_config(self) -> DockerCreateConfig {
        DockerCreateConfig {
            name: self.name,
            id: self.id,
            config: self.config,
            host_config: self.host_config,
            state: self.state,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiPort {
    #[serde(rename = "IP", default)]
    pub ip: String,
    #[serde(rename = "PrivatePort", default)]
    pub private_port: i64,
    #[serde(rename = "PublicPort", default)]
    pub public_port: i64,
    #[serde(rename = "Type", default)]
    pub port_type: String,
}

/// One entry of `GET /containers/json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiContainer {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub ports: Vec<ApiPort>,
    #[serde(default)]
    pub labels: Labels,
}
