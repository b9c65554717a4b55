//! Mock-backed node context shared by the unit tests.

use crate::context::NodeContext;
use cilium_actuator::mock::{MockDns, MockDocker, MockHaproxy, MockKubernetes, MockRunner};
use cilium_actuator::{NodeEnv, Retries};
use cilium_store::MemoryStore;
use std::sync::Arc;

pub(crate) struct Mocks {
    pub db: Arc<MemoryStore>,
    pub runner: Arc<MockRunner>,
    pub docker: Arc<MockDocker>,
    pub kubernetes: Arc<MockKubernetes>,
    pub dns: Arc<MockDns>,
    pub haproxy: Arc<MockHaproxy>,
}

pub(crate) fn node_env() -> NodeEnv {
    NodeEnv {
        host_ip: "192.168.50.4".to_owned(),
        hostname: "node1".to_owned(),
        pipework: "/bin/pipework".to_owned(),
        add_endpoint: "/add-endpoint.sh".to_owned(),
        remove_endpoint: "/remove-endpoint.sh".to_owned(),
        docker_host: "tcp://192.168.50.4:2375".to_owned(),
        kubernetes_master: "http://192.168.50.4:8080".to_owned(),
    }
}

pub(crate) fn test_context_with(runner: MockRunner) -> (NodeContext, Mocks) {
    let mocks = Mocks {
        db: Arc::new(MemoryStore::new()),
        runner: Arc::new(runner),
        docker: Arc::new(MockDocker::new()),
        kubernetes: Arc::new(MockKubernetes::new()),
        dns: Arc::new(MockDns::new()),
        haproxy: Arc::new(MockHaproxy::new()),
    };
    let ctx = NodeContext::new(mocks.db.clone(), node_env())
        .unwrap()
        .with_runner(mocks.runner.clone())
        .with_docker(mocks.docker.clone())
        .with_kubernetes(mocks.kubernetes.clone())
        .with_dns(mocks.dns.clone())
        .with_load_balancer(mocks.haproxy.clone())
        .with_retries(Retries::immediate());
    (ctx, mocks)
}

pub(crate) fn test_context() -> (NodeContext, Mocks) {
    test_context_with(MockRunner::new())
}
