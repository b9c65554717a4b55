//! Kubernetes object references and raw object bodies.

use crate::{field_merge, merge_json, Labels, Merge, SchemaError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Object kinds the adapter knows how to merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KubernetesKind {
    Pod,
    ReplicationController,
    Service,
}

impl KubernetesKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pod => "Pod",
            Self::ReplicationController => "ReplicationController",
            Self::Service => "Service",
        }
    }
}

impl FromStr for KubernetesKind {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pod" => Ok(Self::Pod),
            "ReplicationController" => Ok(Self::ReplicationController),
            "Service" => Ok(Self::Service),
            other => Err(SchemaError::UnsupportedKind(other.to_owned())),
        }
    }
}

impl fmt::Display for KubernetesKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectReference {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
    #[serde(rename = "apiVersion", default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,
    #[serde(rename = "resourceVersion", default, skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
    #[serde(rename = "fieldPath", default, skip_serializing_if = "String::is_empty")]
    pub field_path: String,
}

field_merge!(ObjectReference {
    kind,
    namespace,
    name,
    uid,
    api_version,
    resource_version,
    field_path,
});

impl ObjectReference {
    /// Copy every non-empty reference field onto the top level of `body`.
    pub fn overlay_onto(&self, body: &mut Map<String, Value>) {
        let fields = [
            ("kind", &self.kind),
            ("namespace", &self.namespace),
            ("name", &self.name),
            ("uid", &self.uid),
            ("apiVersion", &self.api_version),
            ("resourceVersion", &self.resource_version),
            ("fieldPath", &self.field_path),
        ];
        for (key, value) in fields {
            if !value.is_empty() {
                body.insert(key.to_owned(), Value::String(value.clone()));
            }
        }
    }
}

/// An intercepted Kubernetes object: its reference plus the raw JSON body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KubernetesObjRef {
    #[serde(rename = "object-reference", default)]
    pub object_reference: ObjectReference,
    #[serde(rename = "body-obj", default)]
    pub body_obj: Map<String, Value>,
}

impl KubernetesObjRef {
    /// Parse an API request body, filling the reference from `kind`,
    /// `apiVersion` and `metadata`.
    pub fn from_body(body: &str) -> Result<Self, SchemaError> {
        let body_obj: Map<String, Value> = serde_json::from_str(body)?;
        let text = |v: Option<&Value>| v.and_then(Value::as_str).unwrap_or_default().to_owned();
        let metadata = body_obj.get("metadata");
        let object_reference = ObjectReference {
            kind: text(body_obj.get("kind")),
            api_version: text(body_obj.get("apiVersion")),
            namespace: text(metadata.and_then(|m| m.get("namespace"))),
            name: text(metadata.and_then(|m| m.get("name"))),
            uid: text(metadata.and_then(|m| m.get("uid"))),
            resource_version: text(metadata.and_then(|m| m.get("resourceVersion"))),
            field_path: String::new(),
        };
        Ok(Self {
            object_reference,
            body_obj,
        })
    }

    pub fn to_body(&self) -> Result<String, SchemaError> {
        Ok(serde_json::to_string(&self.body_obj)?)
    }

    pub fn kind(&self) -> Result<KubernetesKind, SchemaError> {
        self.object_reference.kind.parse()
    }

    /// `metadata.labels` of the body. Fails for kinds other than Pod,
    /// ReplicationController and Service.
    pub fn labels(&self) -> Result<Labels, SchemaError> {
        self.kind()?;
        let labels = self
            .body_obj
            .get("metadata")
            .and_then(|m| m.get("labels"))
            .cloned()
            .unwrap_or(Value::Null);
        if labels.is_null() {
            return Ok(Labels::new());
        }
        Ok(serde_json::from_value(labels)?)
    }

    /// Recursive merge without any kind check.
    pub fn merge_with_overwrite(&mut self, other: &Self) {
        self.object_reference
            .merge_non_blank(&other.object_reference);
        merge_json(&mut self.body_obj, &other.body_obj);
    }
}
