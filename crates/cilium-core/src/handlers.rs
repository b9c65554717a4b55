//! URL classification of intercepted requests.

use crate::runnable::RunnableRegistry;
use crate::CoreError;
use cilium_schema::HookType;
use regex::Regex;
use std::fmt;
use tracing::debug;

pub const DOCKER_SWARM_CREATE: &str = r"/docker/swarm/cilium-adapter/.*/containers/create(\?.*)?";
pub const DOCKER_DAEMON_CREATE: &str = r"/docker/daemon/cilium-adapter/.*/containers/create(\?.*)?";
pub const DOCKER_DAEMON_START: &str = r"/docker/daemon/cilium-adapter/.*/containers/.*/start(\?.*)?";
pub const DOCKER_DAEMON_RESTART: &str = r"/docker/daemon/cilium-adapter/.*/containers/.*/restart(\?.*)?";
pub const KUBERNETES_MASTER_CREATE: &str =
    r"/kubernetes/master/cilium-adapter/api/v1/namespaces/.*/(pods|replicationcontrollers|services)(\?.*)?";
pub const COMPOSE2KUBE_CREATE_CONTAINER: &str =
    r"/compose2kube/master/cilium-adapter/.*/containers/create(\?.*)?";
pub const COMPOSE2KUBE_GET_CONTAINERS: &str =
    r"/compose2kube/master/cilium-adapter/.*/containers/json(\?.*)?";
pub const COMPOSE2KUBE_GET_CONTAINER: &str =
    r"/compose2kube/master/cilium-adapter/.*/containers/.*/json(\?.*)?";
pub const KUBE2COMPOSE_GET_IMAGE: &str = r"/kube2compose/master/cilium-adapter/.*/images/.*/json(\?.*)?";
pub const KUBE2COMPOSE_GET_IMAGES: &str = r"/kube2compose/master/cilium-adapter/.*/images/json(\?.*)?";
pub const KUBE2COMPOSE_CREATE_IMAGE: &str = r"/kube2compose/master/cilium-adapter/.*/images/create(\?.*)?";
pub const KUBE2COMPOSE_CREATE_CONTAINER: &str =
    r"/kube2compose/master/cilium-adapter/.*/containers/create(\?.*)?";
pub const KUBE2COMPOSE_GET_CONTAINERS: &str =
    r"/kube2compose/master/cilium-adapter/api/v1/namespaces/.*/pods(\?.*)?";
pub const KUBE2COMPOSE_CREATE_RC: &str =
    r"/kube2compose/master/cilium-adapter/api/v1/namespaces/.*/replicationcontrollers(\?.*)?";

/// Operation an intercepted request maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestTag {
    DockerSwarmCreate,
    DockerDaemonCreate,
    DockerDaemonStart,
    DockerDaemonRestart,
    KubernetesMasterCreate,
    Compose2KubeCreateContainer,
    Compose2KubeGetContainers,
    Compose2KubeGetContainer,
    Kube2ComposeGetImage,
    Kube2ComposeGetImages,
    Kube2ComposeCreateImage,
    Kube2ComposeCreateContainer,
    Kube2ComposeGetContainers,
    Kube2ComposeCreateRC,
    Default,
}

/// Which flow of the dispatcher handles a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagDomain {
    Docker,
    Kubernetes,
    Translation,
    Passthrough,
}

impl RequestTag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DockerSwarmCreate => "DockerSwarmCreate",
            Self::DockerDaemonCreate => "DockerDaemonCreate",
            Self::DockerDaemonStart => "DockerDaemonStart",
            Self::DockerDaemonRestart => "DockerDaemonRestart",
            Self::KubernetesMasterCreate => "KubernetesMasterCreate",
            Self::Compose2KubeCreateContainer => "Compose2KubeCreateContainer",
            Self::Compose2KubeGetContainers => "Compose2KubeGetContainers",
            Self::Compose2KubeGetContainer => "Compose2KubeGetContainer",
            Self::Kube2ComposeGetImage => "Kube2ComposeGetImage",
            Self::Kube2ComposeGetImages => "Kube2ComposeGetImages",
            Self::Kube2ComposeCreateImage => "Kube2ComposeCreateImage",
            Self::Kube2ComposeCreateContainer => "Kube2ComposeCreateContainer",
            Self::Kube2ComposeGetContainers => "Kube2ComposeGetContainers",
            Self::Kube2ComposeCreateRC => "Kube2ComposeCreateRC",
            Self::Default => "Default",
        }
    }

    pub fn domain(self) -> TagDomain {
        match self {
            Self::DockerSwarmCreate
            | Self::DockerDaemonCreate
            | Self::DockerDaemonStart
            | Self::DockerDaemonRestart => TagDomain::Docker,
            Self::KubernetesMasterCreate => TagDomain::Kubernetes,
            Self::Default => TagDomain::Passthrough,
            _ => TagDomain::Translation,
        }
    }
}

impl fmt::Display for RequestTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Handler {
    pattern: Regex,
    tag: RequestTag,
}

/// Pre- and post-hook handlers of every registered runnable, in registry
/// order. A pattern contributed twice keeps its first tag.
pub struct HandlerTable {
    pre: Vec<Handler>,
    post: Vec<Handler>,
}

fn collect(registry: &RunnableRegistry, hook: HookType) -> Result<Vec<Handler>, CoreError> {
    let mut handlers: Vec<Handler> = Vec::new();
    for kind in registry.kinds() {
        for (pattern, tag) in kind.handlers(hook) {
            let anchored = format!("^{pattern}");
            if handlers.iter().any(|h| h.pattern.as_str() == anchored) {
                continue;
            }
            handlers.push(Handler {
                pattern: Regex::new(&anchored)?,
                tag: *tag,
            });
        }
    }
    Ok(handlers)
}

impl HandlerTable {
    pub fn build(registry: &RunnableRegistry) -> Result<Self, CoreError> {
        Ok(Self {
            pre: collect(registry, HookType::PreHook)?,
            post: collect(registry, HookType::PostHook)?,
        })
    }

    /// Tag of `base_addr` + `request`, `Default` when nothing matches.
    pub fn classify(&self, hook: HookType, base_addr: &str, request: &str) -> RequestTag {
        let target = format!("{base_addr}{request}");
        let handlers = match hook {
            HookType::PreHook => &self.pre,
            HookType::PostHook => &self.post,
        };
        let tag = handlers
            .iter()
            .find(|h| h.pattern.is_match(&target))
            .map_or(RequestTag::Default, |h| h.tag);
        debug!("{hook} {target} -> {tag}");
        tag
    }

    pub fn len(&self, hook: HookType) -> usize {
        match hook {
            HookType::PreHook => self.pre.len(),
            HookType::PostHook => self.post.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> HandlerTable {
        HandlerTable::build(&RunnableRegistry::standard()).unwrap()
    }

    #[test]
    fn docker_routes() {
        let t = table();
        let pre = HookType::PreHook;
        assert_eq!(
            t.classify(pre, "/docker/daemon/cilium-adapter", "/v1.18/containers/create?name=web"),
            RequestTag::DockerDaemonCreate
        );
        assert_eq!(
            t.classify(pre, "/docker/swarm/cilium-adapter", "/v1.18/containers/create"),
            RequestTag::DockerSwarmCreate
        );
        let post = HookType::PostHook;
        assert_eq!(
            t.classify(post, "/docker/daemon/cilium-adapter", "/v1.18/containers/abc/start"),
            RequestTag::DockerDaemonStart
        );
        assert_eq!(
            t.classify(post, "/docker/daemon/cilium-adapter", "/v1.18/containers/abc/restart?t=5"),
            RequestTag::DockerDaemonRestart
        );
    }

    #[test]
    fn kubernetes_kinds_share_one_tag() {
        let t = table();
        for path in ["pods", "replicationcontrollers", "services"] {
            assert_eq!(
                t.classify(
                    HookType::PreHook,
                    "/kubernetes/master/cilium-adapter",
                    &format!("/api/v1/namespaces/default/{path}")
                ),
                RequestTag::KubernetesMasterCreate
            );
        }
    }

    #[test]
    fn translation_routes() {
        let t = table();
        let pre = HookType::PreHook;
        let c2k = "/compose2kube/master/cilium-adapter";
        assert_eq!(
            t.classify(pre, c2k, "/v1.18/containers/json?all=1"),
            RequestTag::Compose2KubeGetContainers
        );
        assert_eq!(
            t.classify(pre, c2k, "/v1.18/containers/abc/json"),
            RequestTag::Compose2KubeGetContainer
        );
        let k2c = "/kube2compose/master/cilium-adapter";
        assert_eq!(
            t.classify(pre, k2c, "/v1.18/images/json"),
            RequestTag::Kube2ComposeGetImages
        );
        assert_eq!(
            t.classify(HookType::PostHook, k2c, "/api/v1/namespaces/default/replicationcontrollers"),
            RequestTag::Kube2ComposeCreateRC
        );
    }

    #[test]
    fn unmatched_and_wrong_hook_are_default() {
        let t = table();
        assert_eq!(
            t.classify(HookType::PreHook, "/docker/daemon/cilium-adapter", "/v1.18/containers/abc/start"),
            RequestTag::Default
        );
        assert_eq!(
            t.classify(HookType::PreHook, "/other", "/v1.18/containers/create"),
            RequestTag::Default
        );
    }

    #[test]
    fn shared_patterns_are_deduplicated() {
        let t = table();
        assert_eq!(t.len(HookType::PreHook), 9);
        assert_eq!(t.len(HookType::PostHook), 6);
    }

    #[test]
    fn tag_domains() {
        assert_eq!(RequestTag::DockerDaemonStart.domain(), TagDomain::Docker);
        assert_eq!(RequestTag::KubernetesMasterCreate.domain(), TagDomain::Kubernetes);
        assert_eq!(RequestTag::Kube2ComposeCreateRC.domain(), TagDomain::Translation);
        assert_eq!(RequestTag::Default.domain(), TagDomain::Passthrough);
        assert_eq!(RequestTag::Compose2KubeGetContainer.to_string(), "Compose2KubeGetContainer");
    }
}
