use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::identity;
use crate::domain::{ClusterSpec, ClusterStatus, PersistenceSpec, Resources, SecretRef};
use crate::error::{Error, Result};

#[derive(CustomResource, Debug, Serialize, Deserialize, Clone, JsonSchema)]
#[kube(
    group = "qdrant.io",
    version = "v1alpha1",
    kind = "QdrantCluster",
    plural = "qdrantclusters",
    namespaced,
    status = "ClusterStatus",
    shortname = "qc",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct QdrantClusterSpec {
    /// Qdrant version, e.g. "1.12.4"
    pub version: String,
    #[serde(default = "default_replicas")]
    pub replicas: i32,
    #[serde(default)]
    pub resources: Resources,
    #[serde(default)]
    pub persistence: PersistenceSpec,
    #[serde(default)]
    pub cluster: ClusterMode,
    /// API key served by the cluster
    pub api_key: Option<ApiKeySpec>,
    #[serde(default)]
    pub metrics: MetricsSpec,
}

fn default_replicas() -> i32 {
    1
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct ClusterMode {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ClusterMode {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, JsonSchema)]
pub struct MetricsSpec {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeySpec {
    pub secret_ref: SecretKeySelector,
}

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct SecretKeySelector {
    pub name: String,
    pub key: String,
}

impl QdrantCluster {
    /// API key reference, resolved in the cluster's own namespace.
    pub fn api_key_ref(&self, namespace: &str) -> Option<SecretRef> {
        self.spec
            .api_key
            .as_ref()
            .map(|k| SecretRef::new(&k.secret_ref.name, &k.secret_ref.key, namespace))
    }
}

impl TryFrom<&QdrantCluster> for ClusterSpec {
    type Error = Error;

    fn try_from(cluster: &QdrantCluster) -> Result<Self> {
        let (name, namespace) = identity(cluster)?;
        if cluster.spec.version.trim().is_empty() {
            return Err(Error::config(format!("{name}: spec.version is required")));
        }
        let s = &cluster.spec;
        Ok(ClusterSpec {
            api_key_secret_ref: cluster.api_key_ref(&namespace),
            name,
            namespace,
            version: s.version.clone(),
            replicas: s.replicas,
            resources: s.resources.clone(),
            persistence: s.persistence.clone(),
            cluster_enabled: s.cluster.enabled,
            metrics_enabled: s.metrics.enabled,
        })
    }
}
