use crate::context::NodeContext;
use crate::handlers::RequestTag;
use crate::runnable::DockerExec;
use crate::CoreError;
use cilium_policy::DockerConfig;
use cilium_schema::{DockerCreateConfig, HookType};
use tracing::debug;

/// Merges the resolved Docker config into every intercepted container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DockerRunnable {
    config: DockerConfig,
}

impl DockerRunnable {
    pub fn new(config: DockerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DockerConfig {
        &self.config
    }
}

impl DockerExec for DockerRunnable {
    fn docker_exec(
        &self,
        _ctx: &NodeContext,
        hook: HookType,
        tag: RequestTag,
        config: &mut DockerCreateConfig,
    ) -> Result<(), CoreError> {
        debug!("docker runnable {hook} {tag}");
        self.config.apply_to(config);
        Ok(())
    }
}
