//! Post-start network actuation of the intent runnable.
//!
//! Steps run in order: allocate an IP, attach the container to its bridge,
//! save the endpoint, register DNS names, re-attach stashed links with OVS
//! rules towards the linked peers, push the OVS rules and register the
//! container with the load balancer. A failing step releases what the
//! earlier steps claimed; OVS and load-balancer failures are only logged.

use crate::context::NodeContext;
use crate::CoreError;
use cilium_actuator::{allocate_ip, create_bridge, create_ovs_rules, force_ovs_rules, BridgeRequest};
use cilium_policy::Intent;
use cilium_schema::{
    lookup_service_name, split_link, DnsEndpoint, DockerCreateConfig, Endpoint, HaproxyEndpoint,
    Labels, SERVICE_LABEL,
};
use std::collections::BTreeSet;
use std::net::IpAddr;
use tracing::{debug, error, info, warn};

const SHORT_ID_LEN: usize = 12;

pub(super) fn configure_network(
    ctx: &NodeContext,
    intent: &Intent,
    config: &mut DockerCreateConfig,
    labels: &Labels,
) -> Result<(), CoreError> {
    let net_conf = &intent.net_conf;
    if net_conf.cidr().is_empty() {
        return Ok(());
    }
    let db = ctx.db.as_ref();
    let (ip, net) = allocate_ip(db, net_conf.cidr())?;
    let ip_text = ip.to_string();
    let id = config.id.clone();

    let request = BridgeRequest {
        bridge: net_conf.br().to_owned(),
        pid: config.state.pid,
        container: id.clone(),
        ip,
        prefix_len: net.prefix_len(),
        gateway: net_conf.gw().to_owned(),
        group: net_conf.group(),
        bd: net_conf.bd(),
        namespace: net_conf.namespace(),
        mac: net_conf.mac().to_owned(),
        route: net_conf.route().to_owned(),
    };
    let (interface, mac) = match create_bridge(ctx.runner.as_ref(), &ctx.env.pipework, &request) {
        Ok(attached) => attached,
        Err(e) => {
            error!("failed to set up networking for container {id}: {e}");
            release_ip(ctx, &ip_text);
            return Err(e.into());
        }
    };

    let endpoint = Endpoint {
        container: id.clone(),
        ips: vec![ip_text.clone()],
        macs: vec![mac],
        node: ctx.env.host_ip.clone(),
        interface,
        group: net_conf.group(),
        bd: net_conf.bd(),
        namespace: net_conf.namespace(),
        service: lookup_service_name(labels),
    };
    if let Err(e) = db.put_endpoint(&endpoint) {
        error!("failed to save endpoint of container {id}: {e}");
        release_ip(ctx, &ip_text);
        return Err(e.into());
    }

    let peers = add_to_dns(ctx, intent, labels, &id, &endpoint.ips)
        .and_then(|()| resolve_links(ctx, intent, config, &ip));
    let link_rules = match peers {
        Ok(rules) => rules,
        Err(e) => {
            error!("failed to finish networking of container {id}: {e}");
            release_endpoint(ctx, &id);
            release_ip(ctx, &ip_text);
            return Err(e);
        }
    };

    let rules: Vec<String> = intent.ovs_rules().iter().cloned().chain(link_rules).collect();
    let applied = force_ovs_rules(ctx.runner.as_ref(), net_conf.br(), &rules);
    debug!("applied {applied} of {} OVS rules for {id}", rules.len());

    if let Err(e) = add_to_load_balancer(ctx, intent, &endpoint.ips, &id, &config.name, labels) {
        error!("failed to add container {id} to the load balancer: {e}");
    }
    Ok(())
}

fn release_ip(ctx: &NodeContext, ip: &str) {
    if let Err(e) = ctx.db.delete_ip(ip) {
        warn!("failed to release IP {ip}: {e}");
    }
}

fn release_endpoint(ctx: &NodeContext, id: &str) {
    if let Err(e) = ctx.db.delete_endpoint(id) {
        warn!("failed to delete endpoint {id}: {e}");
    }
}

fn add_to_dns(
    ctx: &NodeContext,
    intent: &Intent,
    labels: &Labels,
    id: &str,
    ips: &[String],
) -> Result<(), CoreError> {
    if !intent.add_to_dns() {
        return Ok(());
    }
    let Some(dns) = ctx.db.get_dns_config()? else {
        debug!("no DNS service registered, skipping {id}");
        return Ok(());
    };
    let mut domains = Vec::new();
    let hostname = intent.hostname_from_labels(labels);
    if !hostname.is_empty() {
        domains.push(hostname);
    }
    if let Some(short) = id.get(..SHORT_ID_LEN) {
        domains.push(short.to_owned());
    }
    if domains.is_empty() {
        return Ok(());
    }
    ctx.dns.register(&dns, &domains, ips)?;
    Ok(())
}

/// Re-attach links stashed before creation and return the OVS rules
/// connecting this container with every linked peer.
fn resolve_links(
    ctx: &NodeContext,
    intent: &Intent,
    config: &mut DockerCreateConfig,
    ip: &IpAddr,
) -> Result<Vec<String>, CoreError> {
    if !intent.remove_docker_links() {
        return Ok(Vec::new());
    }
    let links = ctx.db.get_docker_links_temp(&config.name)?;
    if links.is_empty() {
        return Ok(Vec::new());
    }
    ctx.db.put_docker_links(&config.id, &links)?;
    config.host_config_mut().links = Some(links.clone());

    let peers: BTreeSet<String> = links.iter().map(|l| split_link(l).0).collect();
    let mut peer_ips = Vec::new();
    for peer in &peers {
        let key = match ctx.docker.inspect_container(peer.trim_start_matches('/'))? {
            Some(info) => info.id,
            None => peer.clone(),
        };
        peer_ips.extend(ctx.db.get_endpoint(&key)?.ips);
    }
    Ok(create_ovs_rules(&ip.to_string(), &peer_ips))
}

fn add_to_load_balancer(
    ctx: &NodeContext,
    intent: &Intent,
    ips: &[String],
    id: &str,
    name: &str,
    labels: &Labels,
) -> Result<(), CoreError> {
    if intent.max_scale() <= 1 {
        return Ok(());
    }
    let service = lookup_service_name(labels);
    if service.is_empty() {
        return Ok(());
    }
    let lb_name = intent.load_balancer_name();
    if lb_name != "ha-proxy" {
        return Err(CoreError::UnknownLoadBalancer(lb_name.to_owned()));
    }

    let endpoint = ctx.db.get_haproxy_config()?;
    let mut lb_config = ctx.load_balancer.get_config(&endpoint)?;
    let traffic = intent.traffic_type();
    if intent.bind_port() == 0 {
        let bindings = ctx.db.get_port_bindings_temp(name)?;
        for (container_port, hosts) in &bindings {
            let Some(host) = hosts.first() else {
                continue;
            };
            let container_port = container_port.split('/').next().unwrap_or_default();
            for ip in ips {
                lb_config.update_config(id, &service, ip, &host.host_port, container_port, traffic)?;
            }
        }
        ctx.db.put_port_bindings(id, &bindings)?;
    } else {
        let port = intent.bind_port().to_string();
        for ip in ips {
            lb_config.update_config(id, &service, ip, &port, &port, traffic)?;
        }
    }
    ctx.load_balancer.post_config(&endpoint, &lb_config)?;
    info!("container {id} registered with {lb_name} for service {service}");
    Ok(())
}

/// DNS and load-balancer containers announce themselves on this node.
pub(super) fn save_service_records(ctx: &NodeContext, labels: &Labels) -> Result<(), CoreError> {
    match labels.get(SERVICE_LABEL).map(String::as_str) {
        Some("svc_dns") => {
            info!("DNS service available at {}", ctx.env.host_ip);
            ctx.db.put_dns_config(&DnsEndpoint::new(ctx.env.host_ip.clone()))?;
        }
        Some("svc_loadbalancer") => {
            info!("load balancer available at {}", ctx.env.host_ip);
            ctx.db
                .put_haproxy_config(&HaproxyEndpoint::new(ctx.env.host_ip.clone()))?;
        }
        _ => {}
    }
    Ok(())
}
