use chrono::Utc;
use kube::{
    Api, Client,
    api::{Patch, PatchParams},
    runtime::controller::{Action, Controller},
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use crate::{
    adapters::kubernetes::FIELD_MANAGER,
    config::OperatorConfig,
    crds::{QdrantRestore, identity},
    domain::{RestorePhase, RestoreProgress, RestoreSpec, RestoreStatus},
    error::{Error, Result},
    factory,
    ports::ClusterApi,
    usecases::resolve_connection,
};

pub struct Ctx {
    pub client: Client,
    pub config: OperatorConfig,
    pub cluster_api: Arc<dyn ClusterApi>,
}

pub fn controller(client: Client) -> Controller<QdrantRestore> {
    let api: Api<QdrantRestore> = Api::all(client);
    Controller::new(api, Default::default()).shutdown_on_signal()
}

/// A restore runs once. Progress is written to status while it runs.
pub async fn reconcile(restore: Arc<QdrantRestore>, ctx: Arc<Ctx>) -> Result<Action> {
    let (name, ns) = identity(restore.as_ref())?;
    let phase = restore.status.as_ref().map(|s| s.phase).unwrap_or_default();
    if phase != RestorePhase::Pending {
        return Ok(Action::await_change());
    }

    let spec = match RestoreSpec::try_from(restore.as_ref()) {
        Ok(spec) => spec,
        Err(e) if e.is_permanent() => {
            warn!(restore = %name, namespace = %ns, error = %e, "invalid restore spec");
            persist_status(&ctx.client, &ns, &name, &RestoreStatus::failed(&e, Utc::now())).await?;
            return Ok(Action::await_change());
        }
        Err(e) => return Err(e),
    };

    let connection =
        resolve_connection(ctx.cluster_api.as_ref(), &spec.target_cluster_ref).await?;

    let started = Utc::now();
    persist_status(&ctx.client, &ns, &name, &RestoreStatus::downloading(started)).await?;

    let (tx, rx) = mpsc::unbounded_channel::<(RestorePhase, RestoreProgress)>();
    let reporter = tokio::spawn(report_progress(
        ctx.client.clone(),
        ns.clone(),
        name.clone(),
        started,
        rx,
    ));
    let executor = factory::restore_executor(&ctx.config, ctx.client.clone())
        .with_progress_observer(Arc::new(move |phase: RestorePhase, progress: &RestoreProgress| {
            let _ = tx.send((phase, progress.clone()));
        }));

    let result = executor.execute(&spec, &connection).await;
    // Closes the channel so the reporter drains and exits
    drop(executor);
    if let Err(e) = reporter.await {
        warn!(restore = %name, error = %e, "progress reporter stopped");
    }

    let status = match result {
        Ok(status) => status,
        Err(e) => {
            warn!(restore = %name, namespace = %ns, error = %e, "restore aborted");
            RestoreStatus {
                start_time: Some(started),
                ..RestoreStatus::failed(&e, Utc::now())
            }
        }
    };
    persist_status(&ctx.client, &ns, &name, &status).await?;
    info!(
        restore = %name,
        namespace = %ns,
        phase = ?status.phase,
        source = ?status.source_backup,
        "restore reconciled"
    );

    Ok(Action::await_change())
}

pub fn error_policy(_restore: Arc<QdrantRestore>, err: &Error, _ctx: Arc<Ctx>) -> Action {
    error!(error = ?err, "restore reconcile failed");
    Action::requeue(Duration::from_secs(60))
}

async fn report_progress(
    client: Client,
    ns: String,
    name: String,
    started: chrono::DateTime<Utc>,
    mut rx: mpsc::UnboundedReceiver<(RestorePhase, RestoreProgress)>,
) {
    while let Some((phase, progress)) = rx.recv().await {
        let status = RestoreStatus {
            phase,
            start_time: Some(started),
            progress,
            ..Default::default()
        };
        if let Err(e) = persist_status(&client, &ns, &name, &status).await {
            debug!(restore = %name, error = %e, "progress update not written");
        }
    }
}

async fn persist_status(client: &Client, ns: &str, name: &str, status: &RestoreStatus) -> Result<()> {
    let api: Api<QdrantRestore> = Api::namespaced(client.clone(), ns);
    let pp = PatchParams::apply(FIELD_MANAGER);
    api.patch_status(name, &pp, &Patch::Merge(json!({ "status": status })))
        .await?;
    Ok(())
}
