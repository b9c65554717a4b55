//! The intent runnable: container-level actions driven by the resolved
//! intent config rather than merged into the request.

mod docker;
mod kubernetes;
mod network;

use crate::context::NodeContext;
use crate::handlers::RequestTag;
use crate::runnable::{DockerExec, KubernetesExec};
use crate::CoreError;
use cilium_policy::{Intent, IntentConfig};
use cilium_schema::{DockerCreateConfig, HookType, KubernetesObjRef};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntentRunnable {
    config: IntentConfig,
}

impl IntentRunnable {
    pub fn new(config: IntentConfig) -> Self {
        Self { config }
    }

    pub fn intent(&self) -> &Intent {
        &self.config.config
    }
}

impl DockerExec for IntentRunnable {
    fn docker_exec(
        &self,
        ctx: &NodeContext,
        hook: HookType,
        tag: RequestTag,
        config: &mut DockerCreateConfig,
    ) -> Result<(), CoreError> {
        let intent = self.intent();
        match (hook, tag) {
            (HookType::PreHook, RequestTag::DockerDaemonCreate) => {
                docker::pre_daemon_create(ctx, intent, config);
                Ok(())
            }
            (HookType::PreHook, RequestTag::DockerSwarmCreate) => {
                docker::pre_swarm_create(ctx, intent, config)
            }
            (HookType::PostHook, RequestTag::DockerDaemonStart | RequestTag::DockerDaemonRestart) => {
                docker::post_daemon_start(ctx, intent, config)
            }
            _ => {
                debug!("intent runnable has no {hook} handler for {tag}");
                Ok(())
            }
        }
    }
}

impl KubernetesExec for IntentRunnable {
    fn kubernetes_exec(
        &self,
        _ctx: &NodeContext,
        hook: HookType,
        tag: RequestTag,
        object: &mut KubernetesObjRef,
    ) -> Result<(), CoreError> {
        match (hook, tag) {
            (HookType::PreHook, RequestTag::KubernetesMasterCreate) => {
                kubernetes::pre_master_create(object)
            }
            _ => Ok(()),
        }
    }
}
