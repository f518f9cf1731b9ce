use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::{ClusterPhase, Condition, SecretRef};

pub const RELEASE_PREFIX: &str = "qdrant";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResourceRequirements {
    pub cpu: Option<String>,
    pub memory: Option<String>,
}

impl ResourceRequirements {
    fn is_empty(&self) -> bool {
        self.cpu.is_none() && self.memory.is_none()
    }

    fn to_values(&self) -> Value {
        let mut out = Map::new();
        if let Some(cpu) = &self.cpu {
            out.insert("cpu".into(), json!(cpu));
        }
        if let Some(memory) = &self.memory {
            out.insert("memory".into(), json!(memory));
        }
        Value::Object(out)
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Resources {
    #[serde(default)]
    pub requests: ResourceRequirements,
    #[serde(default)]
    pub limits: ResourceRequirements,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PersistenceSpec {
    #[serde(default = "default_size")]
    pub size: String,
    #[serde(rename = "storageClassName")]
    pub storage_class: Option<String>,
    #[serde(default = "default_access_modes")]
    pub access_modes: Vec<String>,
}

fn default_size() -> String {
    "10Gi".into()
}
fn default_access_modes() -> Vec<String> {
    vec!["ReadWriteOnce".into()]
}

impl Default for PersistenceSpec {
    fn default() -> Self {
        Self {
            size: default_size(),
            storage_class: None,
            access_modes: default_access_modes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSpec {
    pub name: String,
    pub namespace: String,
    pub version: String,
    pub replicas: i32,
    pub resources: Resources,
    pub persistence: PersistenceSpec,
    pub cluster_enabled: bool,
    pub api_key_secret_ref: Option<SecretRef>,
    pub metrics_enabled: bool,
}

impl ClusterSpec {
    pub fn release_name(&self) -> String {
        release_name(&self.name)
    }

    /// Image tag with a leading `v`.
    pub fn image_tag(&self) -> String {
        if self.version.starts_with('v') {
            self.version.clone()
        } else {
            format!("v{}", self.version)
        }
    }

    /// Helm values for the qdrant chart.
    pub fn chart_values(&self) -> Value {
        let mut persistence = json!({
            "size": self.persistence.size,
            "accessModes": self.persistence.access_modes,
        });
        if let Some(class) = &self.persistence.storage_class {
            persistence["storageClassName"] = json!(class);
        }

        let mut values = json!({
            "replicaCount": self.replicas,
            "image": { "tag": self.image_tag() },
            "persistence": persistence,
            "config": { "cluster": { "enabled": self.cluster_enabled } },
        });

        let mut resources = Map::new();
        if !self.resources.requests.is_empty() {
            resources.insert("requests".into(), self.resources.requests.to_values());
        }
        if !self.resources.limits.is_empty() {
            resources.insert("limits".into(), self.resources.limits.to_values());
        }
        if !resources.is_empty() {
            values["resources"] = Value::Object(resources);
        }

        if self.metrics_enabled {
            values["metrics"] = json!({ "serviceMonitor": { "enabled": true } });
        }

        if let Some(secret) = &self.api_key_secret_ref {
            values["apiKey"] = json!({
                "valueFrom": {
                    "secretKeyRef": { "name": secret.name, "key": secret.key }
                }
            });
        }

        values
    }
}

/// Deterministic release name for a cluster.
pub fn release_name(cluster: &str) -> String {
    format!("{RELEASE_PREFIX}-{cluster}")
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    pub phase: ClusterPhase,
    #[serde(default)]
    pub replicas: i32,
    #[serde(default)]
    pub ready_replicas: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub helm_release: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}
