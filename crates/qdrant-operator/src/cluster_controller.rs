use chrono::Utc;
use kube::{
    Api, Client, ResourceExt,
    api::{Patch, PatchParams},
    runtime::controller::{Action, Controller},
};
use serde_json::json;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{error, info, warn};

use crate::{
    adapters::kubernetes::FIELD_MANAGER,
    crds::{QdrantCluster, identity},
    domain::{ClusterPhase, ClusterSpec, ClusterStatus, Condition},
    error::{Error, Result},
    usecases::{ClusterDeleter, ClusterReconciler},
};

pub const FINALIZER: &str = "qdrant.io/finalizer";

pub struct Ctx {
    pub client: Client,
    pub reconciler: ClusterReconciler,
    pub deleter: ClusterDeleter,
}

pub fn controller(client: Client) -> Controller<QdrantCluster> {
    let api: Api<QdrantCluster> = Api::all(client);
    Controller::new(api, Default::default()).shutdown_on_signal()
}

pub async fn reconcile(qc: Arc<QdrantCluster>, ctx: Arc<Ctx>) -> Result<Action> {
    let (name, ns) = identity(qc.as_ref())?;
    let spec = match ClusterSpec::try_from(qc.as_ref()) {
        Ok(spec) => spec,
        Err(e) if e.is_permanent() => {
            warn!(cluster = %name, namespace = %ns, error = %e, "invalid cluster spec");
            if qc.metadata.deletion_timestamp.is_some() {
                // Nothing can be uninstalled without a usable spec
                remove_finalizer(&ctx.client, &ns, &name).await?;
                return Ok(Action::await_change());
            }
            if qc.status.as_ref().is_some_and(|s| {
                s.phase == ClusterPhase::Failed && s.observed_generation == qc.metadata.generation
            }) {
                return Ok(Action::await_change());
            }
            persist_status(&ctx.client, &ns, &name, &invalid_status(&qc, &e)).await?;
            return Ok(Action::await_change());
        }
        Err(e) => return Err(e),
    };

    if qc.metadata.deletion_timestamp.is_some() {
        if qc.finalizers().iter().any(|f| f == FINALIZER) {
            match ctx.deleter.delete(&spec).await {
                Ok(()) => {}
                // Release already gone
                Err(Error::Helm(msg)) if msg.contains("not found") => {
                    info!(cluster = %name, namespace = %ns, "release already absent");
                }
                Err(e) => return Err(e),
            }
            remove_finalizer(&ctx.client, &ns, &name).await?;
        }
        return Ok(Action::await_change());
    }

    ensure_finalizer(&ctx.client, &ns, &name, &qc).await?;

    // Status writes trigger another reconcile; only act on spec changes.
    let generation = qc.metadata.generation;
    if let Some(status) = &qc.status
        && status.observed_generation.is_some()
        && status.observed_generation == generation
        && status.phase != ClusterPhase::Failed
    {
        return Ok(Action::requeue(Duration::from_secs(600)));
    }

    let mut status = ctx.reconciler.reconcile(&spec).await?;
    status.observed_generation = generation;
    persist_status(&ctx.client, &ns, &name, &status).await?;
    info!(cluster = %name, namespace = %ns, phase = ?status.phase, "cluster reconciled");

    Ok(Action::requeue(Duration::from_secs(600)))
}

pub fn error_policy(_qc: Arc<QdrantCluster>, err: &Error, _ctx: Arc<Ctx>) -> Action {
    error!(error = ?err, "cluster reconcile failed");
    Action::requeue(Duration::from_secs(60))
}

fn invalid_status(qc: &QdrantCluster, err: &Error) -> ClusterStatus {
    ClusterStatus {
        phase: ClusterPhase::Failed,
        replicas: qc.spec.replicas,
        conditions: vec![Condition::new(
            "Reconciling",
            false,
            "InvalidSpec",
            err.to_string(),
            Utc::now(),
        )],
        observed_generation: qc.metadata.generation,
        ..Default::default()
    }
}

async fn persist_status(client: &Client, ns: &str, name: &str, status: &ClusterStatus) -> Result<()> {
    let api: Api<QdrantCluster> = Api::namespaced(client.clone(), ns);
    let pp = PatchParams::apply(FIELD_MANAGER);
    api.patch_status(name, &pp, &Patch::Merge(json!({ "status": status })))
        .await?;
    Ok(())
}

async fn ensure_finalizer(client: &Client, ns: &str, name: &str, qc: &QdrantCluster) -> Result<()> {
    if qc.finalizers().iter().any(|f| f == FINALIZER) {
        return Ok(());
    }
    let mut finalizers = qc.finalizers().to_vec();
    finalizers.push(FINALIZER.to_string());
    let api: Api<QdrantCluster> = Api::namespaced(client.clone(), ns);
    let pp = PatchParams::apply(FIELD_MANAGER);
    let patch = json!({"metadata": {"finalizers": finalizers}});
    api.patch(name, &pp, &Patch::Merge(&patch)).await?;
    Ok(())
}

async fn remove_finalizer(client: &Client, ns: &str, name: &str) -> Result<()> {
    let api: Api<QdrantCluster> = Api::namespaced(client.clone(), ns);
    let Some(current) = api.get_opt(name).await? else {
        return Ok(());
    };
    let remaining: Vec<String> = current
        .finalizers()
        .iter()
        .filter(|f| *f != FINALIZER)
        .cloned()
        .collect();
    let pp = PatchParams::apply(FIELD_MANAGER);
    let patch = json!({"metadata": {"finalizers": remaining}});
    match api.patch(name, &pp, &Patch::Merge(&patch)).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crds::QdrantClusterSpec;

    #[test]
    fn invalid_status_records_the_error() {
        let mut qc = QdrantCluster::new(
            "vectors",
            serde_json::from_value::<QdrantClusterSpec>(json!({"version": "", "replicas": 3}))
                .unwrap(),
        );
        qc.metadata.generation = Some(4);
        let status = invalid_status(&qc, &Error::config("version must not be empty"));
        assert_eq!(status.phase, ClusterPhase::Failed);
        assert_eq!(status.replicas, 3);
        assert_eq!(status.observed_generation, Some(4));
        assert_eq!(status.conditions[0].reason, "InvalidSpec");
        assert!(status.conditions[0].message.contains("version"));
    }
}
