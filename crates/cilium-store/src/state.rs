//! Serializable store contents shared by the memory and file backends.

use crate::StoreError;
use cilium_policy::{Policy, PolicySource};
use cilium_schema::{DnsEndpoint, Endpoint, HaproxyEndpoint, PortBindings, User};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct State {
    /// Users keyed by name.
    pub users: BTreeMap<String, u32>,
    /// Policies keyed by policy name; the policy carries its owner.
    pub policies: BTreeMap<String, Policy>,
    pub endpoints: BTreeMap<String, Endpoint>,
    pub ips: BTreeSet<String>,
    pub links: BTreeMap<String, Vec<String>>,
    pub temp_links: BTreeMap<String, Vec<String>>,
    pub port_bindings: BTreeMap<String, PortBindings>,
    pub temp_port_bindings: BTreeMap<String, PortBindings>,
    pub dns: Option<DnsEndpoint>,
    pub haproxy: Option<HaproxyEndpoint>,
}

impl State {
    pub fn users(&self) -> Vec<User> {
        self.users
            .iter()
            .map(|(name, id)| User::new(*id, name.clone()))
            .collect()
    }

    pub fn put_user(&mut self, name: &str) -> Result<(u32, bool), StoreError> {
        let (id, is_new) = User::next_id(&self.users(), name)?;
        if is_new {
            self.users.insert(name.to_owned(), id);
        }
        Ok((id, is_new))
    }

    /// Policies grouped by owner, owners in name order.
    pub fn policies(&self) -> Vec<PolicySource> {
        let mut by_owner: BTreeMap<&str, Vec<Policy>> = BTreeMap::new();
        for policy in self.policies.values() {
            by_owner
                .entry(policy.owner.as_str())
                .or_default()
                .push(policy.clone());
        }
        by_owner
            .into_iter()
            .map(|(owner, policies)| PolicySource {
                owner: owner.to_owned(),
                policies,
            })
            .collect()
    }

    pub fn put_policy(&mut self, source: &PolicySource) {
        let mut source = source.clone();
        source.normalize_owner();
        for policy in source.policies {
            self.policies.insert(policy.name.clone(), policy);
        }
    }

    pub fn endpoint(&self, container: &str) -> Endpoint {
        self.endpoints.get(container).cloned().unwrap_or_default()
    }

    pub fn put_endpoint(&mut self, endpoint: &Endpoint) {
        self.endpoints
            .insert(endpoint.container.clone(), endpoint.clone());
    }

    pub fn delete_endpoint(&mut self, container: &str) {
        self.endpoints.remove(container);
    }

    pub fn put_ip(&mut self, ip: &str) -> Result<(), StoreError> {
        if !self.ips.insert(ip.to_owned()) {
            return Err(StoreError::IpInUse(ip.to_owned()));
        }
        Ok(())
    }

    pub fn delete_ip(&mut self, ip: &str) {
        self.ips.remove(ip);
    }

    /// Drop configuration, keep endpoints, IPs, links and port bindings.
    pub fn flush_config(&mut self) {
        self.users.clear();
        self.policies.clear();
        self.dns = None;
        self.haproxy = None;
    }
}
