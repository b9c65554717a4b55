use crate::CoreError;
use cilium_actuator::kubernetes::{Pod, ReplicationController};
use cilium_schema::{KubernetesKind, KubernetesObjRef};
use serde_json::Value;
use tracing::info;

/// Intents have no Kubernetes actions yet; the object is only checked to
/// decode as its kind and logged.
pub(super) fn pre_master_create(object: &KubernetesObjRef) -> Result<(), CoreError> {
    let Ok(kind) = object.kind() else {
        return Ok(());
    };
    let body = Value::Object(object.body_obj.clone());
    match kind {
        KubernetesKind::Pod => {
            let pod: Pod = serde_json::from_value(body)?;
            info!("intent left pod '{}' unchanged", pod.metadata.name);
        }
        KubernetesKind::ReplicationController => {
            let rc: ReplicationController = serde_json::from_value(body)?;
            info!("intent left replication controller '{}' unchanged", rc.metadata.name);
        }
        KubernetesKind::Service => {
            info!("intent left service '{}' unchanged", object.object_reference.name);
        }
    }
    Ok(())
}
