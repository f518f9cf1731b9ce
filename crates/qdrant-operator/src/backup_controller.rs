use chrono::Utc;
use kube::{
    Api, Client,
    api::{Patch, PatchParams},
    runtime::controller::{Action, Controller},
};
use serde_json::json;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{error, info, warn};

use crate::{
    adapters::kubernetes::FIELD_MANAGER,
    crds::{QdrantBackup, identity},
    domain::{BackupPhase, BackupSpec, BackupStatus},
    error::{Error, Result},
    ports::ClusterApi,
    usecases::{BackupExecutor, resolve_connection},
};

pub struct Ctx {
    pub client: Client,
    pub cluster_api: Arc<dyn ClusterApi>,
    pub executor: BackupExecutor,
}

pub fn controller(client: Client) -> Controller<QdrantBackup> {
    let api: Api<QdrantBackup> = Api::all(client);
    Controller::new(api, Default::default()).shutdown_on_signal()
}

/// A backup runs once. Anything past Pending is left alone.
pub async fn reconcile(backup: Arc<QdrantBackup>, ctx: Arc<Ctx>) -> Result<Action> {
    let (name, ns) = identity(backup.as_ref())?;
    let phase = backup.status.as_ref().map(|s| s.phase).unwrap_or_default();
    if phase != BackupPhase::Pending {
        return Ok(Action::await_change());
    }

    let spec = match BackupSpec::try_from(backup.as_ref()) {
        Ok(spec) => spec,
        Err(e) if e.is_permanent() => {
            warn!(backup = %name, namespace = %ns, error = %e, "invalid backup spec");
            persist_status(&ctx.client, &ns, &name, &BackupStatus::failed(&e, Utc::now())).await?;
            return Ok(Action::await_change());
        }
        Err(e) => return Err(e),
    };

    // Retried through error_policy until the cluster is reachable.
    let connection = resolve_connection(ctx.cluster_api.as_ref(), &spec.cluster_ref).await?;

    let started = Utc::now();
    persist_status(&ctx.client, &ns, &name, &BackupStatus::in_progress(started)).await?;
    let status = match ctx.executor.execute(&spec, &connection).await {
        Ok(status) => status,
        Err(e) => {
            warn!(backup = %name, namespace = %ns, error = %e, "backup aborted");
            BackupStatus {
                start_time: Some(started),
                ..BackupStatus::failed(&e, Utc::now())
            }
        }
    };
    persist_status(&ctx.client, &ns, &name, &status).await?;
    info!(backup = %name, namespace = %ns, phase = ?status.phase, size = ?status.total_size, "backup reconciled");

    Ok(Action::await_change())
}

pub fn error_policy(_backup: Arc<QdrantBackup>, err: &Error, _ctx: Arc<Ctx>) -> Action {
    error!(error = ?err, "backup reconcile failed");
    Action::requeue(Duration::from_secs(60))
}

async fn persist_status(client: &Client, ns: &str, name: &str, status: &BackupStatus) -> Result<()> {
    let api: Api<QdrantBackup> = Api::namespaced(client.clone(), ns);
    let pp = PatchParams::apply(FIELD_MANAGER);
    api.patch_status(name, &pp, &Patch::Merge(json!({ "status": status })))
        .await?;
    Ok(())
}
