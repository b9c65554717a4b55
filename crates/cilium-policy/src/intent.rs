//! The intent domain: networking, DNS, scaling and load-balancer behaviour
//! requested for a container.
//!
//! Every leaf is optional. `Intent::with_defaults` fills each leaf from the
//! default table and the merge operators compare against that table:
//!
//! | field | default |
//! |---|---|
//! | `add-arguments` | `[]` |
//! | `add-to-dns` | `true` |
//! | `hostname-is.value-of-label` | `""` |
//! | `load-balancer` | `ha-proxy`, `http`, bind port `0` |
//! | `max-scale` | `1` |
//! | `net-conf` | `mac: auto`, group/bd/namespace `1`, the rest `""` |
//! | `net-policy.ovs-config` | empty lists |
//! | `remove-docker-links`, `remove-port-bindings` | `false` |
//! | `service-key-is.label` | `""` |

use cilium_schema::Labels;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const DEFAULT_LOAD_BALANCER: &str = "ha-proxy";
pub const DEFAULT_TRAFFIC_TYPE: &str = "http";
pub const DEFAULT_MAC: &str = "auto";
pub const DEFAULT_MAX_SCALE: u32 = 1;
pub const DEFAULT_SEGMENT: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HostnameIs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_of_label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LoadBalancer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_port: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NetConf {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub br: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gw: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bd: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<u32>,
}

/// OVS flow configuration: rule files to read plus inline rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OvsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ovs_config_files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ovs_rules: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NetPolicy {
    #[serde(default)]
    pub ovs_config: OvsConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServiceKeyIs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Intent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_arguments: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_to_dns: Option<bool>,
    #[serde(default)]
    pub hostname_is: HostnameIs,
    #[serde(default)]
    pub load_balancer: LoadBalancer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_scale: Option<u32>,
    #[serde(default)]
    pub net_conf: NetConf,
    #[serde(default)]
    pub net_policy: NetPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_docker_links: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_port_bindings: Option<bool>,
    #[serde(default)]
    pub service_key_is: ServiceKeyIs,
}

/// `theirs` wins when it is set and differs from the default.
fn take_non_default<T: Clone + PartialEq>(ours: &mut Option<T>, theirs: &Option<T>, default: &Option<T>) {
    if theirs.is_some() && theirs != default {
        ours.clone_from(theirs);
    }
}

/// `theirs` fills `ours` when `ours` is unset or holds the zero value of its
/// type (`false`, `0`, `""`, `[]`). A field explicitly set to a non-zero
/// default such as `max-scale: 1` or `add-to-dns: true` is kept.
fn fill_zero<T: Clone + Default + PartialEq>(ours: &mut Option<T>, theirs: &Option<T>) {
    if theirs.is_some() && !ours.as_ref().is_some_and(|v| *v != T::default()) {
        ours.clone_from(theirs);
    }
}

/// `theirs` wins whenever it is set.
fn take_present<T: Clone>(ours: &mut Option<T>, theirs: &Option<T>) {
    if theirs.is_some() {
        ours.clone_from(theirs);
    }
}

fn append_distinct(ours: &mut Option<Vec<String>>, theirs: &Option<Vec<String>>) {
    let Some(theirs) = theirs else {
        return;
    };
    match ours {
        None => *ours = Some(theirs.clone()),
        Some(list) if list != theirs => list.extend(theirs.iter().cloned()),
        Some(_) => {}
    }
}

fn prepend_dedup(ours: &mut Option<Vec<String>>, theirs: &Option<Vec<String>>) {
    let Some(theirs) = theirs else {
        return;
    };
    let old = ours.take().unwrap_or_default();
    let mut seen = HashSet::new();
    let merged = theirs
        .iter()
        .chain(old.iter())
        .filter(|item| seen.insert((*item).clone()))
        .cloned()
        .collect();
    *ours = Some(merged);
}

impl Intent {
    /// An intent with every field set from the default table.
    pub fn with_defaults() -> Self {
        let mut intent = Self::default();
        intent.set_defaults();
        intent
    }

    pub fn set_defaults(&mut self) {
        *self = Self {
            add_arguments: Some(Vec::new()),
            add_to_dns: Some(true),
            hostname_is: HostnameIs {
                value_of_label: Some(String::new()),
            },
            load_balancer: LoadBalancer {
                name: Some(DEFAULT_LOAD_BALANCER.to_owned()),
                traffic_type: Some(DEFAULT_TRAFFIC_TYPE.to_owned()),
                bind_port: Some(0),
            },
            max_scale: Some(DEFAULT_MAX_SCALE),
            net_conf: NetConf {
                br: Some(String::new()),
                cidr: Some(String::new()),
                mac: Some(DEFAULT_MAC.to_owned()),
                gw: Some(String::new()),
                route: Some(String::new()),
                group: Some(DEFAULT_SEGMENT),
                bd: Some(DEFAULT_SEGMENT),
                namespace: Some(DEFAULT_SEGMENT),
            },
            net_policy: NetPolicy {
                ovs_config: OvsConfig {
                    ovs_config_files: Some(Vec::new()),
                    ovs_rules: Some(Vec::new()),
                },
            },
            remove_docker_links: Some(false),
            remove_port_bindings: Some(false),
            service_key_is: ServiceKeyIs {
                label: Some(String::new()),
            },
        };
    }

    /// `other`'s fields replace ours when they differ from the default.
    pub fn merge_with_overwrite(&mut self, other: &Self) {
        let d = Self::with_defaults();
        take_non_default(&mut self.add_arguments, &other.add_arguments, &d.add_arguments);
        take_non_default(&mut self.add_to_dns, &other.add_to_dns, &d.add_to_dns);
        take_non_default(
            &mut self.hostname_is.value_of_label,
            &other.hostname_is.value_of_label,
            &d.hostname_is.value_of_label,
        );
        let (lb, olb, dlb) = (&mut self.load_balancer, &other.load_balancer, &d.load_balancer);
        take_non_default(&mut lb.name, &olb.name, &dlb.name);
        take_non_default(&mut lb.traffic_type, &olb.traffic_type, &dlb.traffic_type);
        take_non_default(&mut lb.bind_port, &olb.bind_port, &dlb.bind_port);
        take_non_default(&mut self.max_scale, &other.max_scale, &d.max_scale);
        let (nc, onc, dnc) = (&mut self.net_conf, &other.net_conf, &d.net_conf);
        take_non_default(&mut nc.br, &onc.br, &dnc.br);
        take_non_default(&mut nc.cidr, &onc.cidr, &dnc.cidr);
        take_non_default(&mut nc.mac, &onc.mac, &dnc.mac);
        take_non_default(&mut nc.gw, &onc.gw, &dnc.gw);
        take_non_default(&mut nc.route, &onc.route, &dnc.route);
        take_non_default(&mut nc.group, &onc.group, &dnc.group);
        take_non_default(&mut nc.bd, &onc.bd, &dnc.bd);
        take_non_default(&mut nc.namespace, &onc.namespace, &dnc.namespace);
        let (ovs, oovs, dovs) = (
            &mut self.net_policy.ovs_config,
            &other.net_policy.ovs_config,
            &d.net_policy.ovs_config,
        );
        take_non_default(&mut ovs.ovs_config_files, &oovs.ovs_config_files, &dovs.ovs_config_files);
        take_non_default(&mut ovs.ovs_rules, &oovs.ovs_rules, &dovs.ovs_rules);
        take_non_default(
            &mut self.remove_docker_links,
            &other.remove_docker_links,
            &d.remove_docker_links,
        );
        take_non_default(
            &mut self.remove_port_bindings,
            &other.remove_port_bindings,
            &d.remove_port_bindings,
        );
        take_non_default(
            &mut self.service_key_is.label,
            &other.service_key_is.label,
            &d.service_key_is.label,
        );
    }

    /// Additive merge: `other` only fills fields we left unset or at their
    /// zero value. `max-scale` may only shrink, and only to values above the
    /// default. OVS lists gain `other`'s items.
    pub fn merge_with(&mut self, other: &Self) {
        fill_zero(&mut self.add_arguments, &other.add_arguments);
        fill_zero(&mut self.add_to_dns, &other.add_to_dns);
        fill_zero(&mut self.hostname_is.value_of_label, &other.hostname_is.value_of_label);
        let (lb, olb) = (&mut self.load_balancer, &other.load_balancer);
        fill_zero(&mut lb.name, &olb.name);
        fill_zero(&mut lb.traffic_type, &olb.traffic_type);
        fill_zero(&mut lb.bind_port, &olb.bind_port);
        fill_zero(&mut self.max_scale, &other.max_scale);
        if let (Some(ours), Some(theirs)) = (self.max_scale.as_mut(), other.max_scale) {
            if *ours > theirs && theirs > DEFAULT_MAX_SCALE {
                *ours = theirs;
            }
        }
        let (nc, onc) = (&mut self.net_conf, &other.net_conf);
        fill_zero(&mut nc.br, &onc.br);
        fill_zero(&mut nc.cidr, &onc.cidr);
        fill_zero(&mut nc.mac, &onc.mac);
        fill_zero(&mut nc.gw, &onc.gw);
        fill_zero(&mut nc.route, &onc.route);
        fill_zero(&mut nc.group, &onc.group);
        fill_zero(&mut nc.bd, &onc.bd);
        fill_zero(&mut nc.namespace, &onc.namespace);
        let (ovs, oovs) = (&mut self.net_policy.ovs_config, &other.net_policy.ovs_config);
        append_distinct(&mut ovs.ovs_config_files, &oovs.ovs_config_files);
        append_distinct(&mut ovs.ovs_rules, &oovs.ovs_rules);
        fill_zero(&mut self.remove_docker_links, &other.remove_docker_links);
        fill_zero(&mut self.remove_port_bindings, &other.remove_port_bindings);
        fill_zero(&mut self.service_key_is.label, &other.service_key_is.label);
    }

    /// Every field `other` sets replaces ours. OVS lists become `other`'s
    /// items followed by ours, without duplicates.
    pub fn overwrite_with(&mut self, other: &Self) {
        take_present(&mut self.add_arguments, &other.add_arguments);
        take_present(&mut self.add_to_dns, &other.add_to_dns);
        take_present(
            &mut self.hostname_is.value_of_label,
            &other.hostname_is.value_of_label,
        );
        let (lb, olb) = (&mut self.load_balancer, &other.load_balancer);
        take_present(&mut lb.name, &olb.name);
        take_present(&mut lb.traffic_type, &olb.traffic_type);
        take_present(&mut lb.bind_port, &olb.bind_port);
        take_present(&mut self.max_scale, &other.max_scale);
        let (nc, onc) = (&mut self.net_conf, &other.net_conf);
        take_present(&mut nc.br, &onc.br);
        take_present(&mut nc.cidr, &onc.cidr);
        take_present(&mut nc.mac, &onc.mac);
        take_present(&mut nc.gw, &onc.gw);
        take_present(&mut nc.route, &onc.route);
        take_present(&mut nc.group, &onc.group);
        take_present(&mut nc.bd, &onc.bd);
        take_present(&mut nc.namespace, &onc.namespace);
        let (ovs, oovs) = (&mut self.net_policy.ovs_config, &other.net_policy.ovs_config);
        prepend_dedup(&mut ovs.ovs_config_files, &oovs.ovs_config_files);
        prepend_dedup(&mut ovs.ovs_rules, &oovs.ovs_rules);
        take_present(&mut self.remove_docker_links, &other.remove_docker_links);
        take_present(&mut self.remove_port_bindings, &other.remove_port_bindings);
        take_present(&mut self.service_key_is.label, &other.service_key_is.label);
    }

    /// Value of the first label whose key matches the `hostname-is` pattern.
    pub fn hostname_from_labels(&self, labels: &Labels) -> String {
        let pattern = self.hostname_is.value_of_label.as_deref().unwrap_or_default();
        if pattern.is_empty() {
            return String::new();
        }
        let Ok(regex) = Regex::new(pattern) else {
            return String::new();
        };
        labels
            .iter()
            .find(|(key, _)| regex.is_match(key))
            .map(|(_, value)| value.clone())
            .unwrap_or_default()
    }

    pub fn add_arguments(&self) -> &[String] {
        self.add_arguments.as_deref().unwrap_or_default()
    }

    pub fn add_to_dns(&self) -> bool {
        self.add_to_dns.unwrap_or(true)
    }

    pub fn max_scale(&self) -> u32 {
        self.max_scale.unwrap_or(DEFAULT_MAX_SCALE)
    }

    pub fn remove_docker_links(&self) -> bool {
        self.remove_docker_links.unwrap_or(false)
    }

    pub fn remove_port_bindings(&self) -> bool {
        self.remove_port_bindings.unwrap_or(false)
    }

    pub fn ovs_rules(&self) -> &[String] {
        self.net_policy
            .ovs_config
            .ovs_rules
            .as_deref()
            .unwrap_or_default()
    }

    pub fn load_balancer_name(&self) -> &str {
        self.load_balancer
            .name
            .as_deref()
            .unwrap_or(DEFAULT_LOAD_BALANCER)
    }

    pub fn traffic_type(&self) -> &str {
        self.load_balancer
            .traffic_type
            .as_deref()
            .unwrap_or(DEFAULT_TRAFFIC_TYPE)
    }

    pub fn bind_port(&self) -> u16 {
        self.load_balancer.bind_port.unwrap_or(0)
    }
}

impl NetConf {
    pub fn br(&self) -> &str {
        self.br.as_deref().unwrap_or_default()
    }

    pub fn cidr(&self) -> &str {
        self.cidr.as_deref().unwrap_or_default()
    }

    pub fn mac(&self) -> &str {
        self.mac.as_deref().unwrap_or(DEFAULT_MAC)
    }

    pub fn gw(&self) -> &str {
        self.gw.as_deref().unwrap_or_default()
    }

    pub fn route(&self) -> &str {
        self.route.as_deref().unwrap_or_default()
    }

    pub fn group(&self) -> u32 {
        self.group.unwrap_or(DEFAULT_SEGMENT)
    }

    pub fn bd(&self) -> u32 {
        self.bd.unwrap_or(DEFAULT_SEGMENT)
    }

    pub fn namespace(&self) -> u32 {
        self.namespace.unwrap_or(DEFAULT_SEGMENT)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentConfig {
    #[serde(default)]
    pub config: Intent,
    #[serde(default)]
    pub priority: i32,
}

impl IntentConfig {
    pub fn with_defaults() -> Self {
        Self {
            config: Intent::with_defaults(),
            priority: 0,
        }
    }

    pub fn merge_with_overwrite(&mut self, other: &Self) {
        self.priority = other.priority;
        self.config.merge_with_overwrite(&other.config);
    }

    /// Additive merge. Keeps the higher of the two priorities.
    pub fn merge_with(&mut self, other: &Self) {
        self.priority = self.priority.max(other.priority);
        self.config.merge_with(&other.config);
    }

    pub fn overwrite_with(&mut self, other: &Self) {
        self.priority = other.priority;
        self.config.overwrite_with(&other.config);
    }
}
