//! Kubernetes answers shaped like the Docker API.
//!
//! Image operations are sent to the Docker daemon untouched. Pod listings are
//! rewritten into Docker container listings, and a successful create is
//! answered with the ID of the single container Kubernetes started for it.

use super::retarget_to_docker;
use crate::context::NodeContext;
use crate::handlers::RequestTag;
use crate::runnable::Translator;
use crate::CoreError;
use cilium_actuator::kubernetes::{label_selector, Pod, PodList};
use cilium_schema::{ApiContainer, ApiPort, HookType, PowerstripRequest, ServerResponse};
use serde::Serialize;
use tracing::{debug, error, info, warn};

const DOCKER_ID_PREFIX: &str = "docker://";
const HTTP_CREATED: u16 = 201;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Kube2ComposeRunnable;

impl Translator for Kube2ComposeRunnable {
    fn translate(
        &self,
        ctx: &NodeContext,
        hook: HookType,
        tag: RequestTag,
        exchange: &mut PowerstripRequest,
    ) -> Result<(), CoreError> {
        match (hook, tag) {
            (
                HookType::PreHook,
                RequestTag::Kube2ComposeGetImage
                | RequestTag::Kube2ComposeGetImages
                | RequestTag::Kube2ComposeCreateImage,
            ) => retarget_to_docker(&ctx.env, &mut exchange.client_request),
            (HookType::PostHook, RequestTag::Kube2ComposeGetContainers) => {
                list_containers(&mut exchange.server_response)
            }
            (
                HookType::PostHook,
                RequestTag::Kube2ComposeCreateContainer | RequestTag::Kube2ComposeCreateRC,
            ) => created(ctx, &mut exchange.server_response),
            _ => Ok(()),
        }
    }
}

fn strip_docker_prefix(id: &str) -> String {
    id.replace(DOCKER_ID_PREFIX, "")
}

fn pod_to_api_containers(pod: &Pod) -> Vec<ApiContainer> {
    let created = pod
        .metadata
        .creation_timestamp
        .map_or(0, |t| t.timestamp());
    pod.spec
        .containers
        .iter()
        .enumerate()
        .map(|(i, container)| ApiContainer {
            id: pod
                .status
                .container_statuses
                .get(i)
                .map(|s| strip_docker_prefix(&s.container_id))
                .unwrap_or_default(),
            names: vec![format!("/{}", container.name)],
            image: container.image.clone(),
            command: container.command.join(" "),
            created,
            status: pod.status.phase.clone(),
            ports: container
                .ports
                .iter()
                .map(|p| ApiPort {
                    ip: p.host_ip.clone(),
                    private_port: p.container_port,
                    public_port: p.host_port,
                    port_type: p.protocol.clone(),
                })
                .collect(),
            labels: pod.metadata.labels.clone(),
        })
        .collect()
}

fn list_containers(response: &mut ServerResponse) -> Result<(), CoreError> {
    let list: PodList = serde_json::from_str(&response.body)?;
    let containers: Vec<ApiContainer> = list.items.iter().flat_map(pod_to_api_containers).collect();
    response.body = serde_json::to_string(&containers)?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct CreateResponse {
    #[serde(rename = "Id")]
    id: String,
}

/// Wait for the pods of a created Pod or ReplicationController and answer
/// with the container ID when exactly one container came up.
fn created(ctx: &NodeContext, response: &mut ServerResponse) -> Result<(), CoreError> {
    if response.code != HTTP_CREATED {
        return Ok(());
    }
    let object: Pod = serde_json::from_str(&response.body)?;
    let selector = label_selector(&object.metadata.labels);
    info!("waiting for pods with labels {selector}");

    let polled = ctx.retries.pods.run(|attempt| {
        debug!("pod lookup attempt {attempt}");
        match ctx.kubernetes.list_pods(&object.metadata.namespace, &selector) {
            Err(e) => Some(Err(e)),
            Ok(list)
                if list
                    .items
                    .first()
                    .is_some_and(|p| !p.status.container_statuses.is_empty()) =>
            {
                Some(Ok(list))
            }
            Ok(_) => None,
        }
    });
    let list = match polled {
        Some(result) => result?,
        None => {
            error!("no pods found for labels {selector}");
            return Ok(());
        }
    };

    let ids: Vec<String> = list
        .items
        .iter()
        .flat_map(pod_to_api_containers)
        .map(|c| c.id)
        .collect();
    match ids.as_slice() {
        [id] => {
            response.body = serde_json::to_string(&CreateResponse { id: id.clone() })?;
        }
        _ => warn!("expected exactly 1 container, found {}", ids.len()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_context;
    use cilium_actuator::kubernetes::{Container, ContainerStatus, ObjectMeta, PodSpec, PodStatus};
    use cilium_schema::Labels;

    fn pod(name: &str, container_id: Option<&str>) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: name.to_owned(),
                labels: Labels::from([("app".to_owned(), "web".to_owned())]),
                ..ObjectMeta::default()
            },
            spec: PodSpec {
                containers: vec![Container {
                    name: "web".to_owned(),
                    image: "nginx".to_owned(),
                    command: vec!["nginx".to_owned(), "-g".to_owned()],
                    ..Container::default()
                }],
                ..PodSpec::default()
            },
            status: PodStatus {
                phase: "Running".to_owned(),
                container_statuses: container_id
                    .map(|id| ContainerStatus {
                        container_id: format!("docker://{id}"),
                        ..ContainerStatus::default()
                    })
                    .into_iter()
                    .collect(),
            },
            ..Pod::default()
        }
    }

    fn post(code: u16, body: String) -> PowerstripRequest {
        PowerstripRequest {
            hook_type: "post-hook".to_owned(),
            powerstrip_protocol_version: 2,
            server_response: ServerResponse {
                content_type: "application/json".to_owned(),
                body,
                code,
            },
            ..PowerstripRequest::default()
        }
    }

    #[test]
    fn pod_list_becomes_container_list() {
        let (ctx, _) = test_context();
        let list = PodList {
            items: vec![pod("web-1", Some("abc"))],
        };
        let mut ex = post(200, serde_json::to_string(&list).unwrap());
        Kube2ComposeRunnable
            .translate(&ctx, HookType::PostHook, RequestTag::Kube2ComposeGetContainers, &mut ex)
            .unwrap();
        let containers: Vec<ApiContainer> =
            serde_json::from_str(&ex.server_response.body).unwrap();
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].id, "abc");
        assert_eq!(containers[0].names, vec!["/web"]);
        assert_eq!(containers[0].command, "nginx -g");
        assert_eq!(containers[0].status, "Running");
        assert_eq!(containers[0].labels["app"], "web");
    }

    #[test]
    fn create_waits_for_single_container() {
        let (ctx, mocks) = test_context();
        mocks.kubernetes.queue(PodList {
            items: vec![pod("web-1", None)],
        });
        mocks.kubernetes.queue(PodList {
            items: vec![pod("web-1", Some("abc123"))],
        });
        let mut ex = post(201, serde_json::to_string(&pod("web", None)).unwrap());
        Kube2ComposeRunnable
            .translate(&ctx, HookType::PostHook, RequestTag::Kube2ComposeCreateRC, &mut ex)
            .unwrap();
        assert_eq!(ex.server_response.body, r#"{"Id":"abc123"}"#);
        assert_eq!(mocks.kubernetes.selectors(), vec!["app=web", "app=web"]);
    }

    #[test]
    fn failed_create_is_left_alone() {
        let (ctx, mocks) = test_context();
        let body = serde_json::to_string(&pod("web", None)).unwrap();
        let mut ex = post(409, body.clone());
        Kube2ComposeRunnable
            .translate(&ctx, HookType::PostHook, RequestTag::Kube2ComposeCreateContainer, &mut ex)
            .unwrap();
        assert_eq!(ex.server_response.body, body);
        assert!(mocks.kubernetes.selectors().is_empty());
    }

    #[test]
    fn several_containers_keep_body() {
        let (ctx, mocks) = test_context();
        mocks.kubernetes.queue(PodList {
            items: vec![pod("web-1", Some("a")), pod("web-2", Some("b"))],
        });
        let body = serde_json::to_string(&pod("web", None)).unwrap();
        let mut ex = post(201, body.clone());
        Kube2ComposeRunnable
            .translate(&ctx, HookType::PostHook, RequestTag::Kube2ComposeCreateContainer, &mut ex)
            .unwrap();
        assert_eq!(ex.server_response.body, body);
    }

    #[test]
    fn image_requests_go_to_docker() {
        let (ctx, _) = test_context();
        let mut ex = post(0, String::new());
        Kube2ComposeRunnable
            .translate(&ctx, HookType::PreHook, RequestTag::Kube2ComposeGetImages, &mut ex)
            .unwrap();
        assert_eq!(ex.client_request.server_ip, "192.168.50.4");
        assert_eq!(ex.client_request.server_port, 2375);
    }
}
