//! Docker Compose requests answered by the Kubernetes master.
//!
//! A container create becomes a ReplicationController (or a bare Pod when
//! the container must not restart), container listings become pod listings
//! by label selector, and single-container inspects go to the Docker daemon.

use super::retarget_to_docker;
use crate::context::NodeContext;
use crate::handlers::RequestTag;
use crate::runnable::Translator;
use crate::CoreError;
use cilium_actuator::kubernetes::{
    Container, ContainerPort, EnvVar, ObjectMeta, Pod, PodSpec, PodTemplateSpec,
    ReplicationController, ReplicationControllerSpec, ResourceRequirements,
};
use cilium_schema::{
    ClientRequest, DockerCreateConfig, HookType, Labels, PowerstripRequest,
    COMPOSE_PROJECT_LABEL, COMPOSE_SERVICE_LABEL,
};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, error};
use url::Url;

/// Kubernetes label values are limited to 63 characters.
const MAX_LABEL_VALUE: usize = 63;
const NAMESPACE_PATH: &str = "/api/v1/namespaces/default";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Compose2KubeRunnable;

impl Translator for Compose2KubeRunnable {
    fn translate(
        &self,
        ctx: &NodeContext,
        hook: HookType,
        tag: RequestTag,
        exchange: &mut PowerstripRequest,
    ) -> Result<(), CoreError> {
        let request = &mut exchange.client_request;
        match (hook, tag) {
            (HookType::PreHook, RequestTag::Compose2KubeCreateContainer) => create_container(request),
            (HookType::PreHook, RequestTag::Compose2KubeGetContainers) => get_containers(request),
            (HookType::PreHook, RequestTag::Compose2KubeGetContainer) => {
                retarget_to_docker(&ctx.env, request)
            }
            _ => Ok(()),
        }
    }
}

fn parse_request_url(request: &str) -> Result<Url, CoreError> {
    Ok(Url::parse("http://localhost")?.join(request)?)
}

fn create_container(request: &mut ClientRequest) -> Result<(), CoreError> {
    let container = DockerCreateConfig::from_body(&request.body)?;
    let name = parse_request_url(&request.request)?
        .query_pairs()
        .find(|(k, _)| k == "name")
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default();
    let (collection, body) = convert_container(&container, name)?;
    request.body = body;
    request.request = format!("{NAMESPACE_PATH}/{collection}");
    Ok(())
}

fn truncated_labels(labels: Labels) -> Labels {
    labels
        .into_iter()
        .map(|(k, mut v)| {
            if let Some((end, _)) = v.char_indices().nth(MAX_LABEL_VALUE) {
                v.truncate(end);
            }
            (k, v)
        })
        .collect()
}

fn pod_container(container: &DockerCreateConfig, name: &str) -> Container {
    let config = &container.config;
    let host_config = container.host_config.clone().unwrap_or_default();

    let mut limits = BTreeMap::new();
    if let Some(cpu) = host_config.cpu_shares.or(config.cpu_shares).filter(|c| *c != 0) {
        limits.insert("cpu".to_owned(), cpu.to_string());
    }
    if let Some(memory) = host_config.memory.or(config.memory).filter(|m| *m != 0) {
        limits.insert("memory".to_owned(), memory.to_string());
    }

    let env = config
        .env
        .iter()
        .flatten()
        .map(|pair| {
            let (name, value) = pair.split_once('=').unwrap_or((pair.as_str(), ""));
            EnvVar {
                name: name.to_owned(),
                value: value.to_owned(),
            }
        })
        .collect();

    let ports = config
        .port_specs
        .iter()
        .flatten()
        .filter_map(|spec| match spec.parse::<i64>() {
            Ok(port) => Some(ContainerPort {
                container_port: port,
                ..ContainerPort::default()
            }),
            Err(_) => {
                error!("invalid container port {spec} for service {name}");
                None
            }
        })
        .collect();

    Container {
        name: name.to_owned(),
        image: config.image.clone().unwrap_or_default(),
        args: config.cmd.clone().unwrap_or_default(),
        env,
        ports,
        resources: ResourceRequirements { limits },
        ..Container::default()
    }
}

/// Returns the API collection to post to and the object body.
fn convert_container(
    container: &DockerCreateConfig,
    name: String,
) -> Result<(&'static str, String), CoreError> {
    let labels = truncated_labels(container.labels());
    let name = if name.is_empty() {
        format!(
            "{}-{}",
            labels.get(COMPOSE_PROJECT_LABEL).map_or("", String::as_str),
            labels.get(COMPOSE_SERVICE_LABEL).map_or("", String::as_str)
        )
    } else {
        name
    };
    let restart = container
        .host_config
        .as_ref()
        .and_then(|hc| hc.restart_policy.as_ref())
        .and_then(|rp| rp.name.clone())
        .unwrap_or_default();
    let restart_policy = match restart.as_str() {
        "" | "always" => "Always",
        "on-failure" => "OnFailure",
        "no" | "false" => "Never",
        other => return Err(CoreError::UnknownRestartPolicy(other.to_owned())),
    };

    let spec = PodSpec {
        containers: vec![pod_container(container, &name)],
        restart_policy: restart_policy.to_owned(),
    };
    debug!("translating container {name} with restart policy {restart_policy}");

    if restart_policy == "Never" {
        let pod = Pod {
            kind: "Pod".to_owned(),
            api_version: "v1".to_owned(),
            metadata: ObjectMeta {
                name,
                labels,
                ..ObjectMeta::default()
            },
            spec,
            ..Pod::default()
        };
        return Ok(("pods", serde_json::to_string_pretty(&pod)?));
    }

    let rc = ReplicationController {
        kind: "ReplicationController".to_owned(),
        api_version: "v1".to_owned(),
        metadata: ObjectMeta {
            name,
            labels: labels.clone(),
            ..ObjectMeta::default()
        },
        spec: ReplicationControllerSpec {
            replicas: 1,
            selector: labels.clone(),
            template: PodTemplateSpec {
                metadata: ObjectMeta {
                    labels,
                    ..ObjectMeta::default()
                },
                spec,
            },
        },
    };
    Ok(("replicationcontrollers", serde_json::to_string_pretty(&rc)?))
}

/// Labels of a Docker `filters` query value: `{"label":["k=v"]}` or
/// `{"label":{"k=v":true}}`.
fn filter_labels(filters: &str) -> Option<Vec<String>> {
    let parsed: Value = serde_json::from_str(filters).ok()?;
    match parsed.get("label")? {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect(),
        ),
        Value::Object(keys) => Some(keys.keys().cloned().collect()),
        _ => None,
    }
}

fn get_containers(request: &mut ClientRequest) -> Result<(), CoreError> {
    let url = parse_request_url(&request.request)?;
    let mut target = format!("{NAMESPACE_PATH}/pods");
    let labels = url
        .query_pairs()
        .find(|(k, _)| k == "filters")
        .and_then(|(_, v)| filter_labels(&v));
    if let Some(labels) = labels {
        target.push_str("?labelSelector=");
        target.push_str(&labels.join(","));
    }
    request.request = target;
    Ok(())
}
