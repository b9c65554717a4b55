//! Policy runnables and the ordered registry they are resolved from.
//!
//! Each `RunnableKind` contributes URL handlers and knows how to build its
//! `Runnable` from the users and covering policies of one request. What a
//! runnable can do is looked up per capability: container configs
//! (`DockerExec`), Kubernetes objects (`KubernetesExec`) or the raw
//! request/response exchange (`Translator`).

use crate::context::NodeContext;
use crate::handlers::{
    RequestTag, COMPOSE2KUBE_CREATE_CONTAINER, COMPOSE2KUBE_GET_CONTAINER,
    COMPOSE2KUBE_GET_CONTAINERS, DOCKER_DAEMON_CREATE, DOCKER_DAEMON_RESTART, DOCKER_DAEMON_START,
    DOCKER_SWARM_CREATE, KUBE2COMPOSE_CREATE_CONTAINER, KUBE2COMPOSE_CREATE_IMAGE,
    KUBE2COMPOSE_CREATE_RC, KUBE2COMPOSE_GET_CONTAINERS, KUBE2COMPOSE_GET_IMAGE,
    KUBE2COMPOSE_GET_IMAGES, KUBERNETES_MASTER_CREATE,
};
use crate::runnables::{
    Compose2KubeRunnable, DockerRunnable, IntentRunnable, Kube2ComposeRunnable, KubernetesRunnable,
};
use crate::CoreError;
use cilium_policy::{resolve, FoldMode, PolicySource};
use cilium_schema::{DockerCreateConfig, HookType, KubernetesObjRef, PowerstripRequest, User};
use tracing::{debug, info};

pub trait DockerExec {
    /// Rewrite a container config for one (hook, tag) pair. Pairs the
    /// runnable has no handler for leave `config` untouched.
    fn docker_exec(
        &self,
        ctx: &NodeContext,
        hook: HookType,
        tag: RequestTag,
        config: &mut DockerCreateConfig,
    ) -> Result<(), CoreError>;
}

pub trait KubernetesExec {
    fn kubernetes_exec(
        &self,
        ctx: &NodeContext,
        hook: HookType,
        tag: RequestTag,
        object: &mut KubernetesObjRef,
    ) -> Result<(), CoreError>;
}

/// Rewrites the client request (pre-hook) or the server response
/// (post-hook) between the Docker and Kubernetes APIs.
pub trait Translator {
    fn translate(
        &self,
        ctx: &NodeContext,
        hook: HookType,
        tag: RequestTag,
        exchange: &mut PowerstripRequest,
    ) -> Result<(), CoreError>;
}

type Handlers = &'static [(&'static str, RequestTag)];

const DOCKER_PRE: Handlers = &[
    (DOCKER_SWARM_CREATE, RequestTag::DockerSwarmCreate),
    (DOCKER_DAEMON_CREATE, RequestTag::DockerDaemonCreate),
];
const DOCKER_POST: Handlers = &[
    (DOCKER_DAEMON_CREATE, RequestTag::DockerDaemonCreate),
    (DOCKER_DAEMON_START, RequestTag::DockerDaemonStart),
    (DOCKER_DAEMON_RESTART, RequestTag::DockerDaemonRestart),
];
const KUBERNETES_PRE: Handlers = &[(KUBERNETES_MASTER_CREATE, RequestTag::KubernetesMasterCreate)];
const INTENT_PRE: Handlers = &[
    (DOCKER_SWARM_CREATE, RequestTag::DockerSwarmCreate),
    (DOCKER_DAEMON_CREATE, RequestTag::DockerDaemonCreate),
    (KUBERNETES_MASTER_CREATE, RequestTag::KubernetesMasterCreate),
];
const INTENT_POST: Handlers = &[
    (DOCKER_DAEMON_START, RequestTag::DockerDaemonStart),
    (DOCKER_DAEMON_RESTART, RequestTag::DockerDaemonRestart),
];
const COMPOSE2KUBE_PRE: Handlers = &[
    (COMPOSE2KUBE_CREATE_CONTAINER, RequestTag::Compose2KubeCreateContainer),
    (COMPOSE2KUBE_GET_CONTAINERS, RequestTag::Compose2KubeGetContainers),
    (COMPOSE2KUBE_GET_CONTAINER, RequestTag::Compose2KubeGetContainer),
];
const KUBE2COMPOSE_PRE: Handlers = &[
    (KUBE2COMPOSE_GET_IMAGE, RequestTag::Kube2ComposeGetImage),
    (KUBE2COMPOSE_GET_IMAGES, RequestTag::Kube2ComposeGetImages),
    (KUBE2COMPOSE_CREATE_IMAGE, RequestTag::Kube2ComposeCreateImage),
];
const KUBE2COMPOSE_POST: Handlers = &[
    (KUBE2COMPOSE_CREATE_CONTAINER, RequestTag::Kube2ComposeCreateContainer),
    (KUBE2COMPOSE_GET_CONTAINERS, RequestTag::Kube2ComposeGetContainers),
    (KUBE2COMPOSE_CREATE_RC, RequestTag::Kube2ComposeCreateRC),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunnableKind {
    Docker,
    Kubernetes,
    Intent,
    Compose2Kube,
    Kube2Compose,
}

impl RunnableKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Docker => "docker-runnable",
            Self::Kubernetes => "kubernetes-runnable",
            Self::Intent => "intent-runnable",
            Self::Compose2Kube => "compose2kube-runnable",
            Self::Kube2Compose => "kube2compose-runnable",
        }
    }

    pub fn handlers(self, hook: HookType) -> Handlers {
        match (self, hook) {
            (Self::Docker, HookType::PreHook) => DOCKER_PRE,
            (Self::Docker, HookType::PostHook) => DOCKER_POST,
            (Self::Kubernetes, HookType::PreHook) => KUBERNETES_PRE,
            (Self::Intent, HookType::PreHook) => INTENT_PRE,
            (Self::Intent, HookType::PostHook) => INTENT_POST,
            (Self::Compose2Kube, HookType::PreHook) => COMPOSE2KUBE_PRE,
            (Self::Kube2Compose, HookType::PreHook) => KUBE2COMPOSE_PRE,
            (Self::Kube2Compose, HookType::PostHook) => KUBE2COMPOSE_POST,
            (Self::Kubernetes | Self::Compose2Kube, HookType::PostHook) => &[],
        }
    }

    pub fn is_translator(self) -> bool {
        matches!(self, Self::Compose2Kube | Self::Kube2Compose)
    }

    /// Fresh runnable carrying this kind's config resolved for one request.
    pub fn runnable_from(
        self,
        users: &[User],
        sources: &[PolicySource],
        mode: FoldMode,
    ) -> Result<Runnable, CoreError> {
        let runnable = match self {
            Self::Docker => Runnable::Docker(DockerRunnable::new(resolve(users, sources, mode)?)),
            Self::Kubernetes => {
                Runnable::Kubernetes(KubernetesRunnable::new(resolve(users, sources, mode)?))
            }
            Self::Intent => Runnable::Intent(IntentRunnable::new(resolve(users, sources, mode)?)),
            Self::Compose2Kube => Runnable::Compose2Kube(Compose2KubeRunnable),
            Self::Kube2Compose => Runnable::Kube2Compose(Kube2ComposeRunnable),
        };
        debug!("resolved {}", self.name());
        Ok(runnable)
    }
}

#[derive(Debug, Clone)]
pub enum Runnable {
    Docker(DockerRunnable),
    Kubernetes(KubernetesRunnable),
    Intent(IntentRunnable),
    Compose2Kube(Compose2KubeRunnable),
    Kube2Compose(Kube2ComposeRunnable),
}

impl Runnable {
    pub fn kind(&self) -> RunnableKind {
        match self {
            Self::Docker(_) => RunnableKind::Docker,
            Self::Kubernetes(_) => RunnableKind::Kubernetes,
            Self::Intent(_) => RunnableKind::Intent,
            Self::Compose2Kube(_) => RunnableKind::Compose2Kube,
            Self::Kube2Compose(_) => RunnableKind::Kube2Compose,
        }
    }

    pub fn docker(&self) -> Option<&dyn DockerExec> {
        match self {
            Self::Docker(r) => Some(r),
            Self::Intent(r) => Some(r),
            _ => None,
        }
    }

    pub fn kubernetes(&self) -> Option<&dyn KubernetesExec> {
        match self {
            Self::Kubernetes(r) => Some(r),
            Self::Intent(r) => Some(r),
            _ => None,
        }
    }

    pub fn translator(&self) -> Option<&dyn Translator> {
        match self {
            Self::Compose2Kube(r) => Some(r),
            Self::Kube2Compose(r) => Some(r),
            _ => None,
        }
    }
}

/// Runnable kinds in execution order. Docker and Kubernetes come before
/// Intent so the intent actions see the already merged config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnableRegistry {
    kinds: Vec<RunnableKind>,
}

impl Default for RunnableRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl RunnableRegistry {
    pub fn empty() -> Self {
        Self { kinds: Vec::new() }
    }

    pub fn standard() -> Self {
        Self {
            kinds: vec![
                RunnableKind::Docker,
                RunnableKind::Kubernetes,
                RunnableKind::Intent,
                RunnableKind::Compose2Kube,
                RunnableKind::Kube2Compose,
            ],
        }
    }

    pub fn register(&mut self, kind: RunnableKind) -> Result<(), CoreError> {
        if self.kinds.contains(&kind) {
            return Err(CoreError::AlreadyRegistered(kind.name().to_owned()));
        }
        info!("registered {}", kind.name());
        self.kinds.push(kind);
        Ok(())
    }

    pub fn kinds(&self) -> &[RunnableKind] {
        &self.kinds
    }

    /// Resolve every policy-driven kind for one request.
    pub fn resolve_all(
        &self,
        users: &[User],
        sources: &[PolicySource],
        mode: FoldMode,
    ) -> Result<Vec<Runnable>, CoreError> {
        self.kinds
            .iter()
            .filter(|k| !k.is_translator())
            .map(|k| k.runnable_from(users, sources, mode))
            .collect()
    }

    pub fn translators(&self) -> Vec<Runnable> {
        self.kinds
            .iter()
            .filter(|k| k.is_translator())
            .filter_map(|k| k.runnable_from(&[], &[], FoldMode::default()).ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = RunnableRegistry::empty();
        registry.register(RunnableKind::Docker).unwrap();
        assert!(matches!(
            registry.register(RunnableKind::Docker),
            Err(CoreError::AlreadyRegistered(name)) if name == "docker-runnable"
        ));
    }

    #[test]
    fn standard_order_puts_intent_after_docker_and_kubernetes() {
        let kinds = RunnableRegistry::standard().kinds().to_vec();
        let pos = |k| kinds.iter().position(|x| *x == k).unwrap();
        assert!(pos(RunnableKind::Docker) < pos(RunnableKind::Intent));
        assert!(pos(RunnableKind::Kubernetes) < pos(RunnableKind::Intent));
    }

    #[test]
    fn capabilities_by_variant() {
        let runnables = RunnableRegistry::standard()
            .resolve_all(&[], &[], FoldMode::Overwrite)
            .unwrap();
        let kinds: Vec<RunnableKind> = runnables.iter().map(Runnable::kind).collect();
        assert_eq!(
            kinds,
            vec![RunnableKind::Docker, RunnableKind::Kubernetes, RunnableKind::Intent]
        );
        assert!(runnables[0].docker().is_some());
        assert!(runnables[0].kubernetes().is_none());
        assert!(runnables[1].docker().is_none());
        assert!(runnables[2].docker().is_some() && runnables[2].kubernetes().is_some());
        assert!(runnables.iter().all(|r| r.translator().is_none()));

        let translators = RunnableRegistry::standard().translators();
        assert_eq!(translators.len(), 2);
        assert!(translators.iter().all(|r| r.translator().is_some() && r.docker().is_none()));
    }
}
