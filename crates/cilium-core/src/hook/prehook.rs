use super::Dispatcher;
use crate::handlers::{RequestTag, TagDomain};
use crate::CoreError;
use cilium_policy::filter_policies_by_kubernetes_kind;
use cilium_schema::{
    ClientRequest, DockerCreateConfig, HookType, KubernetesObjRef, PowerstripRequest,
    PreHookResponse,
};
use tracing::{debug, warn};
use url::Url;

pub(super) fn handle(
    dispatcher: &Dispatcher,
    tag: RequestTag,
    request: &PowerstripRequest,
) -> Result<PreHookResponse, CoreError> {
    let mut client = request.client_request.clone();
    match tag.domain() {
        TagDomain::Docker => docker_create(dispatcher, tag, &mut client)?,
        TagDomain::Kubernetes => kubernetes_create(dispatcher, tag, &mut client)?,
        TagDomain::Translation => {
            client = dispatcher
                .translate(HookType::PreHook, tag, request)?
                .client_request;
        }
        TagDomain::Passthrough => {}
    }
    Ok(PreHookResponse::new(client))
}

/// `/` plus the `name` query parameter of a create request.
fn container_name(request: &str) -> String {
    let Ok(url) = Url::parse("http://localhost").and_then(|base| base.join(request)) else {
        return String::new();
    };
    url.query_pairs()
        .find(|(k, _)| k == "name")
        .map(|(_, v)| format!("/{v}"))
        .unwrap_or_default()
}

fn docker_create(
    dispatcher: &Dispatcher,
    tag: RequestTag,
    client: &mut ClientRequest,
) -> Result<(), CoreError> {
    let mut config = match DockerCreateConfig::from_body(&client.body) {
        Ok(config) => config,
        Err(e) => {
            warn!("unreadable container config, passing through: {e}");
            return Ok(());
        }
    };
    config.name = container_name(&client.request);
    let Some((users, policies)) = dispatcher.load_policies(&config.labels()) else {
        return Ok(());
    };
    let ctx = dispatcher.context();
    for runnable in dispatcher.resolve(&users, &policies)? {
        if let Some(exec) = runnable.docker() {
            exec.docker_exec(ctx, HookType::PreHook, tag, &mut config)?;
        }
    }
    client.body = config.to_body()?;
    debug!("modified container config of {}", config.name);
    Ok(())
}

fn kubernetes_create(
    dispatcher: &Dispatcher,
    tag: RequestTag,
    client: &mut ClientRequest,
) -> Result<(), CoreError> {
    let mut object = match KubernetesObjRef::from_body(&client.body) {
        Ok(object) => object,
        Err(e) => {
            warn!("unreadable Kubernetes object, passing through: {e}");
            return Ok(());
        }
    };
    let labels = match object.labels() {
        Ok(labels) => labels,
        Err(e) => {
            debug!("no labels for {} object: {e}", object.object_reference.kind);
            return Ok(());
        }
    };
    let Some((users, policies)) = dispatcher.load_policies(&labels) else {
        return Ok(());
    };
    let policies = filter_policies_by_kubernetes_kind(&policies, &object.object_reference.kind);
    if policies.iter().all(|s| s.policies.is_empty()) {
        debug!("no {} policies cover {labels:?}", object.object_reference.kind);
        return Ok(());
    }
    let ctx = dispatcher.context();
    for runnable in dispatcher.resolve(&users, &policies)? {
        if let Some(exec) = runnable.kubernetes() {
            exec.kubernetes_exec(ctx, HookType::PreHook, tag, &mut object)?;
        }
    }
    client.body = object.to_body()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runnable::RunnableRegistry;
    use crate::testing::test_context;
    use cilium_policy::{DockerConfig, KubernetesConfig, Policy, PolicySource};
    use cilium_schema::{Coverage, HostConfig, Labels, ObjectReference};
    use cilium_store::Db;
    use serde_json::{json, Value};

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    fn pre(request: &str, body: &str) -> PowerstripRequest {
        PowerstripRequest {
            hook_type: "pre-hook".to_owned(),
            powerstrip_protocol_version: 2,
            client_request: ClientRequest {
                method: "POST".to_owned(),
                request: request.to_owned(),
                body: body.to_owned(),
                ..ClientRequest::default()
            },
            ..PowerstripRequest::default()
        }
    }

    fn modified(dispatcher: &Dispatcher, base: &str, req: &PowerstripRequest) -> ClientRequest {
        match dispatcher.process(base, req).unwrap() {
            super::super::HookResponse::Pre(resp) => resp.modified_client_request,
            super::super::HookResponse::Post(_) => panic!("expected a pre-hook response"),
        }
    }

    #[test]
    fn name_comes_from_query() {
        assert_eq!(container_name("/v1.18/containers/create?name=web1"), "/web1");
        assert_eq!(container_name("/v1.18/containers/create"), "");
    }

    #[test]
    fn docker_policy_dns_is_merged() {
        let (ctx, mocks) = test_context();
        mocks.db.put_user("root").unwrap();
        mocks
            .db
            .put_policy(&PolicySource {
                owner: "root".to_owned(),
                policies: vec![Policy {
                    name: "dns".to_owned(),
                    owner: "root".to_owned(),
                    coverage: Coverage::new(labels(&[("com.docker.swarm.id", "123456")])),
                    docker_config: DockerConfig {
                        host_config: Some(HostConfig {
                            dns: Some(vec!["1.2.3.4".to_owned()]),
                            ..HostConfig::default()
                        }),
                        ..DockerConfig::default()
                    },
                    ..Policy::default()
                }],
            })
            .unwrap();
        let dispatcher = Dispatcher::new(ctx, RunnableRegistry::standard()).unwrap();
        let req = pre(
            "/v1.18/containers/create?name=web",
            r#"{"Hostname":"myhostname","Labels":{"com.docker.swarm.id":"123456"}}"#,
        );
        let client = modified(&dispatcher, "/docker/daemon/cilium-adapter", &req);
        let body: Value = serde_json::from_str(&client.body).unwrap();
        assert_eq!(body["HostConfig"]["Dns"], json!(["1.2.3.4"]));
        assert_eq!(body["Hostname"], "myhostname");
        assert_eq!(body["Labels"]["com.docker.swarm.id"], "123456");
    }

    #[test]
    fn service_policy_never_touches_pod() {
        let (ctx, mocks) = test_context();
        mocks.db.put_user("root").unwrap();
        let Value::Object(body_obj) = json!({"spec": {"clusterIP": "None"}}) else {
            unreachable!()
        };
        mocks
            .db
            .put_policy(&PolicySource {
                owner: "root".to_owned(),
                policies: vec![Policy {
                    name: "svc".to_owned(),
                    owner: "root".to_owned(),
                    coverage: Coverage::new(labels(&[("app", "web")])),
                    kubernetes_config: KubernetesConfig {
                        object_reference: ObjectReference {
                            kind: "Service".to_owned(),
                            ..ObjectReference::default()
                        },
                        body_obj,
                        priority: 0,
                    },
                    ..Policy::default()
                }],
            })
            .unwrap();
        let dispatcher = Dispatcher::new(ctx, RunnableRegistry::standard()).unwrap();
        let body = r#"{"kind":"Pod","metadata":{"name":"p","labels":{"app":"web"}},"spec":{}}"#;
        let req = pre("/api/v1/namespaces/default/pods", body);
        let client = modified(&dispatcher, "/kubernetes/master/cilium-adapter", &req);
        assert_eq!(client, req.client_request);
    }

    #[test]
    fn unreadable_body_passes_through() {
        let (ctx, _) = test_context();
        let dispatcher = Dispatcher::new(ctx, RunnableRegistry::standard()).unwrap();
        let req = pre("/v1.18/containers/create", "{not json");
        let client = modified(&dispatcher, "/docker/swarm/cilium-adapter", &req);
        assert_eq!(client, req.client_request);
    }
}
