use crate::context::NodeContext;
use crate::handlers::RequestTag;
use crate::runnable::KubernetesExec;
use crate::CoreError;
use cilium_policy::KubernetesConfig;
use cilium_schema::{HookType, KubernetesObjRef};
use tracing::debug;

/// Merges the resolved Kubernetes config into intercepted objects of the
/// same kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KubernetesRunnable {
    config: KubernetesConfig,
}

impl KubernetesRunnable {
    pub fn new(config: KubernetesConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &KubernetesConfig {
        &self.config
    }
}

impl KubernetesExec for KubernetesRunnable {
    fn kubernetes_exec(
        &self,
        _ctx: &NodeContext,
        hook: HookType,
        tag: RequestTag,
        object: &mut KubernetesObjRef,
    ) -> Result<(), CoreError> {
        debug!("kubernetes runnable {hook} {tag}");
        self.config.apply_to(object)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_context;
    use cilium_schema::ObjectReference;
    use serde_json::{json, Value};

    fn runnable(kind: &str, body: Value) -> KubernetesRunnable {
        let Value::Object(body_obj) = body else {
            panic!("body must be an object");
        };
        KubernetesRunnable::new(KubernetesConfig {
            object_reference: ObjectReference {
                kind: kind.to_owned(),
                ..ObjectReference::default()
            },
            body_obj,
            priority: 0,
        })
    }

    #[test]
    fn merges_same_kind() {
        let (ctx, _) = test_context();
        let r = runnable("Pod", json!({"spec": {"restartPolicy": "Always"}}));
        let mut pod = KubernetesObjRef::from_body(
            r#"{"kind":"Pod","metadata":{"name":"p","labels":{"app":"web"}},"spec":{}}"#,
        )
        .unwrap();
        r.kubernetes_exec(&ctx, HookType::PreHook, RequestTag::KubernetesMasterCreate, &mut pod)
            .unwrap();
        assert_eq!(pod.body_obj["spec"]["restartPolicy"], "Always");
        assert_eq!(pod.body_obj["metadata"]["name"], "p");
    }

    #[test]
    fn other_kind_is_left_alone() {
        let (ctx, _) = test_context();
        let r = runnable("Service", json!({"spec": {"clusterIP": "None"}}));
        let body = r#"{"kind":"Pod","metadata":{"name":"p"},"spec":{}}"#;
        let mut pod = KubernetesObjRef::from_body(body).unwrap();
        r.kubernetes_exec(&ctx, HookType::PreHook, RequestTag::KubernetesMasterCreate, &mut pod)
            .unwrap();
        assert_eq!(pod, KubernetesObjRef::from_body(body).unwrap());
    }
}
