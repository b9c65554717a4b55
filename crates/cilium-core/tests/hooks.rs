use cilium_actuator::mock::{MockDns, MockDocker, MockHaproxy, MockKubernetes, MockRunner};
use cilium_actuator::{NodeEnv, Retries};
use cilium_core::{Dispatcher, HookResponse, NodeContext, RunnableRegistry};
use cilium_policy::{
    resolve, DockerConfig, FoldMode, Intent, IntentConfig, KubernetesConfig, Policy, PolicySource,
};
use cilium_schema::{
    ClientRequest, Coverage, DnsEndpoint, Endpoint, HaproxyEndpoint, HostConfig, Labels,
    ObjectReference, PortBindings, PowerstripRequest, ServerResponse, User,
};
use cilium_store::{Db, MemoryStore, StoreError};
use serde_json::{json, Value};
use std::sync::Arc;

fn labels(pairs: &[(&str, &str)]) -> Labels {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

fn env() -> NodeEnv {
    NodeEnv {
        host_ip: "192.168.50.4".to_owned(),
        hostname: "node1".to_owned(),
        docker_host: "tcp://192.168.50.4:2375".to_owned(),
        ..NodeEnv::default()
    }
}

fn context(db: Arc<dyn Db>) -> NodeContext {
    NodeContext::new(db, env())
        .unwrap()
        .with_runner(Arc::new(MockRunner::new()))
        .with_docker(Arc::new(MockDocker::new()))
        .with_kubernetes(Arc::new(MockKubernetes::new()))
        .with_dns(Arc::new(MockDns::new()))
        .with_load_balancer(Arc::new(MockHaproxy::new()))
        .with_retries(Retries::immediate())
}

fn dispatcher(db: Arc<dyn Db>) -> Dispatcher {
    Dispatcher::new(context(db), RunnableRegistry::standard()).unwrap()
}

fn envelope(hook: &str, request: &str, body: &str) -> PowerstripRequest {
    PowerstripRequest {
        hook_type: hook.to_owned(),
        powerstrip_protocol_version: 2,
        client_request: ClientRequest {
            method: "POST".to_owned(),
            request: request.to_owned(),
            body: body.to_owned(),
            server_ip: "10.0.0.5".to_owned(),
            server_port: 2375,
        },
        server_response: ServerResponse {
            content_type: "application/json".to_owned(),
            body: String::new(),
            code: 204,
        },
    }
}

fn pre_body(d: &Dispatcher, base: &str, req: &PowerstripRequest) -> Value {
    match d.process(base, req).unwrap() {
        HookResponse::Pre(resp) => serde_json::from_str(&resp.modified_client_request.body).unwrap(),
        HookResponse::Post(_) => panic!("expected a pre-hook response"),
    }
}

fn dns_policy(name: &str, owner: &str, dns: &str, priority: i32) -> Policy {
    Policy {
        name: name.to_owned(),
        owner: owner.to_owned(),
        coverage: Coverage::new(labels(&[("com.docker.swarm.id", "123456")])),
        docker_config: DockerConfig {
            host_config: Some(HostConfig {
                dns: Some(vec![dns.to_owned()]),
                ..HostConfig::default()
            }),
            priority,
            ..DockerConfig::default()
        },
        ..Policy::default()
    }
}

const SWARM_BODY: &str = r#"{"Hostname":"myhostname","Labels":{"com.docker.swarm.id":"123456"}}"#;

#[test]
fn swarm_create_gets_policy_dns() {
    let db = Arc::new(MemoryStore::new());
    db.put_user("root").unwrap();
    db.put_policy(&PolicySource {
        owner: "root".to_owned(),
        policies: vec![dns_policy("dns", "root", "1.2.3.4", 0)],
    })
    .unwrap();
    let d = dispatcher(db);
    let req = envelope("pre-hook", "/v1.18/containers/create", SWARM_BODY);
    let body = pre_body(&d, "/docker/swarm/cilium-adapter", &req);
    assert_eq!(body["HostConfig"]["Dns"], json!(["1.2.3.4"]));
    assert_eq!(body["Hostname"], "myhostname");
    assert_eq!(body["Labels"], json!({"com.docker.swarm.id": "123456"}));
}

#[test]
fn lowest_user_id_has_the_last_word() {
    let db = Arc::new(MemoryStore::new());
    db.put_user("root").unwrap();
    for name in ["u1", "u2", "u3", "u4", "ops"] {
        db.put_user(name).unwrap();
    }
    let users = db.get_users().unwrap();
    assert!(users.iter().any(|u| u.name == "ops" && u.id == 5));
    db.put_policy(&PolicySource {
        owner: "root".to_owned(),
        policies: vec![dns_policy("a", "root", "1.1.1.1", 0)],
    })
    .unwrap();
    db.put_policy(&PolicySource {
        owner: "ops".to_owned(),
        policies: vec![dns_policy("b", "ops", "2.2.2.2", 0)],
    })
    .unwrap();
    let d = dispatcher(db);
    let req = envelope("pre-hook", "/v1.18/containers/create", SWARM_BODY);
    let body = pre_body(&d, "/docker/swarm/cilium-adapter", &req);
    assert_eq!(body["HostConfig"]["Dns"], json!(["1.1.1.1"]));
}

#[test]
fn higher_priority_policy_wins_within_a_user() {
    let users = vec![User::new(0, "root")];
    let sources = vec![PolicySource {
        owner: "root".to_owned(),
        policies: vec![
            dns_policy("x1", "root", "1.0.0.1", 10),
            dns_policy("x2", "root", "1.0.0.2", 5),
        ],
    }];
    let resolved: DockerConfig = resolve(&users, &sources, FoldMode::Overwrite).unwrap();
    let dns = resolved.host_config.and_then(|h| h.dns).unwrap();
    assert_eq!(dns, vec!["1.0.0.1".to_owned()]);
}

#[test]
fn service_policy_is_never_merged_into_a_pod() {
    let db = Arc::new(MemoryStore::new());
    db.put_user("root").unwrap();
    let Value::Object(body_obj) = json!({"spec": {"type": "NodePort"}}) else {
        unreachable!()
    };
    db.put_policy(&PolicySource {
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
    let d = dispatcher(db);
    let pod = r#"{"kind":"Pod","apiVersion":"v1","metadata":{"name":"web","labels":{"app":"web"}},"spec":{"containers":[]}}"#;
    let req = envelope("pre-hook", "/api/v1/namespaces/default/pods", pod);
    let HookResponse::Pre(resp) = d.process("/kubernetes/master/cilium-adapter", &req).unwrap() else {
        panic!("expected a pre-hook response");
    };
    assert_eq!(resp.modified_client_request, req.client_request);
}

/// Store whose every call fails.
struct UnreachableStore;

fn down<T>() -> Result<T, StoreError> {
    Err(StoreError::Remote("connection refused".to_owned()))
}

impl Db for UnreachableStore {
    fn get_users(&self) -> Result<Vec<User>, StoreError> {
        down()
    }
    fn put_user(&self, _name: &str) -> Result<(u32, bool), StoreError> {
        down()
    }
    fn get_policies(&self) -> Result<Vec<PolicySource>, StoreError> {
        down()
    }
    fn put_policy(&self, _source: &PolicySource) -> Result<(), StoreError> {
        down()
    }
    fn get_endpoint(&self, _container: &str) -> Result<Endpoint, StoreError> {
        down()
    }
    fn put_endpoint(&self, _endpoint: &Endpoint) -> Result<(), StoreError> {
        down()
    }
    fn delete_endpoint(&self, _container: &str) -> Result<(), StoreError> {
        down()
    }
    fn put_ip(&self, _ip: &str) -> Result<(), StoreError> {
        down()
    }
    fn delete_ip(&self, _ip: &str) -> Result<(), StoreError> {
        down()
    }
    fn get_docker_links(&self, _container: &str) -> Result<Vec<String>, StoreError> {
        down()
    }
    fn put_docker_links(&self, _container: &str, _links: &[String]) -> Result<(), StoreError> {
        down()
    }
    fn get_docker_links_temp(&self, _name: &str) -> Result<Vec<String>, StoreError> {
        down()
    }
    fn put_docker_links_temp(&self, _name: &str, _links: &[String]) -> Result<(), StoreError> {
        down()
    }
    fn get_port_bindings(&self, _container: &str) -> Result<PortBindings, StoreError> {
        down()
    }
    fn put_port_bindings(&self, _container: &str, _bindings: &PortBindings) -> Result<(), StoreError> {
        down()
    }
    fn get_port_bindings_temp(&self, _name: &str) -> Result<PortBindings, StoreError> {
        down()
    }
    fn put_port_bindings_temp(&self, _name: &str, _bindings: &PortBindings) -> Result<(), StoreError> {
        down()
    }
    fn get_dns_config(&self) -> Result<Option<DnsEndpoint>, StoreError> {
        down()
    }
    fn put_dns_config(&self, _dns: &DnsEndpoint) -> Result<(), StoreError> {
        down()
    }
    fn get_haproxy_config(&self) -> Result<HaproxyEndpoint, StoreError> {
        down()
    }
    fn put_haproxy_config(&self, _haproxy: &HaproxyEndpoint) -> Result<(), StoreError> {
        down()
    }
    fn clear(&self) -> Result<(), StoreError> {
        down()
    }
    fn flush_config(&self) -> Result<(), StoreError> {
        down()
    }
}

#[test]
fn unreachable_store_passes_requests_through_unchanged() {
    let d = dispatcher(Arc::new(UnreachableStore));
    let req = envelope("pre-hook", "/v1.18/containers/create?name=web", SWARM_BODY);
    let resp = d.process("/docker/swarm/cilium-adapter", &req).unwrap();
    let HookResponse::Pre(pre) = &resp else {
        panic!("expected a pre-hook response");
    };
    assert_eq!(pre.modified_client_request, req.client_request);
    assert_eq!(
        serde_json::to_value(&resp).unwrap(),
        json!({
            "PowerstripProtocolVersion": 2,
            "ModifiedClientRequest": {
                "Method": "POST",
                "Request": "/v1.18/containers/create?name=web",
                "Body": SWARM_BODY,
                "ServerIP": "10.0.0.5",
                "ServerPort": 2375,
            }
        })
    );

    let post = envelope(
        "post-hook",
        "/v1.18/containers/0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef/start",
        "",
    );
    let HookResponse::Post(resp) = d.process("/docker/daemon/cilium-adapter", &post).unwrap() else {
        panic!("expected a post-hook response");
    };
    assert_eq!(resp.modified_server_response, post.server_response);
}

#[test]
fn intent_defaults_apply_without_user_policies() {
    let users = vec![User::new(0, "root")];
    let resolved: IntentConfig = resolve(&users, &[], FoldMode::Overwrite).unwrap();
    assert_eq!(resolved, IntentConfig::with_defaults());
    assert_eq!(resolved.config, Intent::with_defaults());
}
