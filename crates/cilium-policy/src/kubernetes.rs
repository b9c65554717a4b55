//! The Kubernetes domain: object fragments merged into intercepted API
//! objects of the same kind.

use crate::PolicyError;
use cilium_schema::{merge_json, overwrite_json, KubernetesKind, KubernetesObjRef, Merge, ObjectReference};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KubernetesConfig {
    #[serde(rename = "object-reference", default)]
    pub object_reference: ObjectReference,
    #[serde(rename = "body-obj", default)]
    pub body_obj: Map<String, Value>,
    #[serde(default)]
    pub priority: i32,
}

impl KubernetesConfig {
    pub fn kind(&self) -> &str {
        &self.object_reference.kind
    }

    /// Merge `other` into this config. Configs of two different kinds never
    /// merge; a set kind must be one the adapter supports.
    pub fn merge_with_overwrite(&mut self, other: &Self) -> Result<(), PolicyError> {
        let ours = self.object_reference.kind.as_str();
        let theirs = other.object_reference.kind.as_str();
        if !ours.is_empty() && !theirs.is_empty() && ours != theirs {
            return Ok(());
        }
        let kind = if theirs.is_empty() { ours } else { theirs }.to_owned();
        if kind.is_empty() && self.body_obj.is_empty() && other.body_obj.is_empty() {
            self.priority = other.priority;
            return Ok(());
        }
        kind.parse::<KubernetesKind>()
            .map_err(|_| PolicyError::UnsupportedKind(kind.clone()))?;

        merge_json(&mut self.body_obj, &other.body_obj);
        self.object_reference
            .merge_non_blank(&other.object_reference);
        self.object_reference.overlay_onto(&mut self.body_obj);
        self.priority = other.priority;
        Ok(())
    }

    /// Every field `other` carries replaces ours.
    pub fn overwrite_with(&mut self, other: &Self) {
        self.object_reference
            .overwrite_present(&other.object_reference);
        overwrite_json(&mut self.body_obj, &other.body_obj);
        self.priority = other.priority;
    }

    /// Merge this config into an intercepted object.
    pub fn apply_to(&self, target: &mut KubernetesObjRef) -> Result<(), PolicyError> {
        let mut merged = Self {
            object_reference: target.object_reference.clone(),
            body_obj: std::mem::take(&mut target.body_obj),
            priority: self.priority,
        };
        let result = merged.merge_with_overwrite(self);
        target.object_reference = merged.object_reference;
        target.body_obj = merged.body_obj;
        result
    }
}
