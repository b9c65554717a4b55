use crate::CoreError;
use cilium_actuator::{
    CommandRunner, DnsApi, DockerApi, HttpDns, HttpDocker, HttpHaproxy, HttpKubernetes,
    KubernetesApi, LoadBalancerApi, NodeEnv, Retries, ShellRunner,
};
use cilium_policy::FoldMode;
use cilium_store::Db;
use std::sync::Arc;

/// Everything a request or event handler may talk to on this node.
#[derive(Clone)]
pub struct NodeContext {
    pub db: Arc<dyn Db>,
    pub runner: Arc<dyn CommandRunner>,
    pub docker: Arc<dyn DockerApi>,
    pub kubernetes: Arc<dyn KubernetesApi>,
    pub dns: Arc<dyn DnsApi>,
    pub load_balancer: Arc<dyn LoadBalancerApi>,
    pub env: NodeEnv,
    pub retries: Retries,
    pub fold_mode: FoldMode,
}

impl NodeContext {
    /// Context with the real HTTP clients and a shell runner.
    pub fn new(db: Arc<dyn Db>, env: NodeEnv) -> Result<Self, CoreError> {
        let docker = HttpDocker::new(&env.docker_base_url()?);
        let kubernetes = HttpKubernetes::new(&env.kubernetes_master);
        Ok(Self {
            db,
            runner: Arc::new(ShellRunner),
            docker: Arc::new(docker),
            kubernetes: Arc::new(kubernetes),
            dns: Arc::new(HttpDns::new()),
            load_balancer: Arc::new(HttpHaproxy::new()),
            env,
            retries: Retries::default(),
            fold_mode: FoldMode::default(),
        })
    }

    #[must_use]
    pub fn with_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    #[must_use]
    pub fn with_docker(mut self, docker: Arc<dyn DockerApi>) -> Self {
        self.docker = docker;
        self
    }

    #[must_use]
    pub fn with_kubernetes(mut self, kubernetes: Arc<dyn KubernetesApi>) -> Self {
        self.kubernetes = kubernetes;
        self
    }

    #[must_use]
    pub fn with_dns(mut self, dns: Arc<dyn DnsApi>) -> Self {
        self.dns = dns;
        self
    }

    #[must_use]
    pub fn with_load_balancer(mut self, load_balancer: Arc<dyn LoadBalancerApi>) -> Self {
        self.load_balancer = load_balancer;
        self
    }

    #[must_use]
    pub fn with_retries(mut self, retries: Retries) -> Self {
        self.retries = retries;
        self
    }

    #[must_use]
    pub fn with_fold_mode(mut self, fold_mode: FoldMode) -> Self {
        self.fold_mode = fold_mode;
        self
    }
}
