//! The runnables resolved per request.

pub mod compose2kube;
pub mod docker;
pub mod intent;
pub mod kube2compose;
pub mod kubernetes;

pub use compose2kube::Compose2KubeRunnable;
pub use docker::DockerRunnable;
pub use intent::IntentRunnable;
pub use kube2compose::Kube2ComposeRunnable;
pub use kubernetes::KubernetesRunnable;

use crate::CoreError;
use cilium_actuator::NodeEnv;
use cilium_schema::ClientRequest;

/// Point a client request at this node's Docker daemon.
pub(crate) fn retarget_to_docker(env: &NodeEnv, request: &mut ClientRequest) -> Result<(), CoreError> {
    let (ip, port) = env.docker_endpoint()?;
    request.server_ip = ip;
    request.server_port = port;
    Ok(())
}
