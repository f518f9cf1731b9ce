use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::{
    Api, Client,
    api::{DeleteParams, DynamicObject, ListParams, Patch, PatchParams, PostParams},
    core::ApiResource,
};
use serde_json::{Value, json};
use tracing::debug;

use crate::domain::SecretRef;
use crate::error::{Error, Result};
use crate::ports::{ClusterApi, ResourceKind};

pub const FIELD_MANAGER: &str = "qdrant-operator";

/// [`ClusterApi`] over the Kubernetes API server.
#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,
    service_port: u16,
}

impl KubeClusterApi {
    pub fn new(client: Client, service_port: u16) -> Self {
        Self {
            client,
            service_port,
        }
    }

    fn dynamic(&self, kind: &ResourceKind, namespace: &str) -> Api<DynamicObject> {
        let ar = ApiResource {
            group: kind.group.into(),
            version: kind.version.into(),
            api_version: kind.api_version(),
            kind: kind.kind.into(),
            plural: kind.plural.into(),
        };
        Api::namespaced_with(self.client.clone(), namespace, &ar)
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn secret_value(&self, secret: &SecretRef) -> Result<String> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &secret.namespace);
        let sec = secrets
            .get_opt(&secret.name)
            .await?
            .ok_or_else(|| Error::not_found("Secret", &secret.name, &secret.namespace))?;
        let val = sec
            .data
            .as_ref()
            .and_then(|d| d.get(&secret.key))
            .ok_or_else(|| {
                Error::not_found(
                    "Secret key",
                    &format!("{}[{}]", secret.name, secret.key),
                    &secret.namespace,
                )
            })?;
        Ok(String::from_utf8(val.0.clone())?)
    }

    async fn get_resource(
        &self,
        kind: &ResourceKind,
        name: &str,
        namespace: &str,
    ) -> Result<Option<Value>> {
        let obj = self.dynamic(kind, namespace).get_opt(name).await?;
        Ok(obj.map(serde_json::to_value).transpose()?)
    }

    async fn list_resources(
        &self,
        kind: &ResourceKind,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<Value>> {
        let mut lp = ListParams::default();
        if let Some(selector) = label_selector {
            lp = lp.labels(selector);
        }
        let list = self.dynamic(kind, namespace).list(&lp).await?;
        list.items
            .into_iter()
            .map(|o| serde_json::to_value(o).map_err(Error::from))
            .collect()
    }

    async fn create_resource(
        &self,
        kind: &ResourceKind,
        namespace: &str,
        body: &Value,
    ) -> Result<Value> {
        let obj: DynamicObject = serde_json::from_value(body.clone())?;
        let created = self
            .dynamic(kind, namespace)
            .create(&PostParams::default(), &obj)
            .await?;
        debug!(kind = kind.kind, namespace = %namespace, name = ?created.metadata.name, "resource created");
        Ok(serde_json::to_value(created)?)
    }

    async fn delete_resource(
        &self,
        kind: &ResourceKind,
        name: &str,
        namespace: &str,
    ) -> Result<()> {
        match self
            .dynamic(kind, namespace)
            .delete(name, &DeleteParams::default())
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_status(
        &self,
        kind: &ResourceKind,
        name: &str,
        namespace: &str,
        status: &Value,
    ) -> Result<()> {
        let pp = PatchParams::apply(FIELD_MANAGER);
        self.dynamic(kind, namespace)
            .patch_status(name, &pp, &Patch::Merge(json!({ "status": status })))
            .await?;
        Ok(())
    }

    async fn service_endpoint(&self, name: &str, namespace: &str) -> Result<String> {
        Ok(format!(
            "http://{name}.{namespace}.svc.cluster.local:{}",
            self.service_port
        ))
    }
}
