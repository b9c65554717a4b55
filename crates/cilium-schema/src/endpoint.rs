use crate::{Labels, COMPOSE_SERVICE_LABEL, SERVICE_LABEL};
use serde::{Deserialize, Serialize};

/// Network attachment of one container on one node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub container: String,
    #[serde(default)]
    pub ips: Vec<String>,
    #[serde(default)]
    pub macs: Vec<String>,
    #[serde(default)]
    pub node: String,
    #[serde(default)]
    pub interface: String,
    #[serde(default)]
    pub group: u32,
    #[serde(default)]
    pub bd: u32,
    #[serde(default)]
    pub namespace: u32,
    #[serde(default)]
    pub service: String,
}

impl Endpoint {
    pub fn is_empty(&self) -> bool {
        self.container.is_empty() && self.ips.is_empty()
    }
}

/// Service name from `com.intent.service`, falling back to the compose label.
pub fn lookup_service_name(labels: &Labels) -> String {
    labels
        .get(SERVICE_LABEL)
        .or_else(|| labels.get(COMPOSE_SERVICE_LABEL))
        .cloned()
        .unwrap_or_default()
}

/// Split a Docker link `name:alias` into (`/name`, `alias`).
pub fn split_link(link: &str) -> (String, String) {
    let parts: Vec<&str> = link.split(':').collect();
    match parts.as_slice() {
        [name, alias] => (format!("/{name}"), (*alias).to_owned()),
        [name] => (format!("/{name}"), String::new()),
        _ => (format!("/{link}"), String::new()),
    }
}
