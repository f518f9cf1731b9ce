use chrono::{DateTime, Utc};
use kube::{
    Api, Client, Resource,
    api::{Patch, PatchParams},
    runtime::controller::{Action, Controller},
};
use serde_json::json;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{debug, error, warn};

use crate::{
    adapters::kubernetes::FIELD_MANAGER,
    crds::{QdrantBackup, QdrantBackupSchedule, identity},
    domain::{BackupScheduleSpec, BackupScheduleStatus, Condition, absorb_backup_outcome},
    error::{Error, Result},
    ports::{ClusterApi, QDRANT_BACKUPS},
    usecases::ScheduleProcessor,
};

pub struct Ctx {
    pub client: Client,
    pub cluster_api: Arc<dyn ClusterApi>,
    pub processor: ScheduleProcessor,
    /// Longest sleep between evaluations
    pub check_interval: Duration,
}

pub fn controller(client: Client) -> Controller<QdrantBackupSchedule> {
    let api: Api<QdrantBackupSchedule> = Api::all(client);
    Controller::new(api, Default::default()).shutdown_on_signal()
}

pub async fn reconcile(sched: Arc<QdrantBackupSchedule>, ctx: Arc<Ctx>) -> Result<Action> {
    let (name, ns) = identity(sched.as_ref())?;
    let current = sched.status.clone().unwrap_or_default();
    let prior = refresh_active_backup(ctx.cluster_api.as_ref(), &ns, &current).await?;
    let now = Utc::now();

    let outcome = match BackupScheduleSpec::try_from(sched.as_ref()) {
        Ok(spec) => ctx.processor.process(&spec, &prior, now).await,
        Err(e) => Err(e),
    };
    let status = match outcome {
        Ok(status) => status,
        Err(e) if e.is_permanent() => {
            warn!(schedule = %name, namespace = %ns, error = %e, "invalid schedule");
            let message = e.to_string();
            // Keep the original transition time while the error stands
            let condition = prior
                .conditions
                .iter()
                .find(|c| c.reason == "InvalidSchedule" && c.message == message)
                .cloned()
                .unwrap_or_else(|| Condition::new("Valid", false, "InvalidSchedule", message, now));
            let status = BackupScheduleStatus {
                next_backup_time: None,
                conditions: vec![condition],
                ..prior
            };
            if sched.status.as_ref() != Some(&status) {
                persist_status(&ctx.client, &ns, &name, &status).await?;
            }
            return Ok(Action::await_change());
        }
        Err(e) => return Err(e),
    };

    if sched.status.as_ref() != Some(&status) {
        persist_status(&ctx.client, &ns, &name, &status).await?;
    }

    let wait = requeue_after(status.next_backup_time, now, ctx.check_interval);
    debug!(schedule = %name, namespace = %ns, next = ?status.next_backup_time, wait_secs = wait.as_secs(), "schedule evaluated");
    Ok(Action::requeue(wait))
}

pub fn error_policy(_sched: Arc<QdrantBackupSchedule>, err: &Error, _ctx: Arc<Ctx>) -> Action {
    error!(error = ?err, "schedule reconcile failed");
    Action::requeue(Duration::from_secs(60))
}

/// Pulls the outcome of the backup this schedule last submitted.
async fn refresh_active_backup(
    api: &dyn ClusterApi,
    ns: &str,
    status: &BackupScheduleStatus,
) -> Result<BackupScheduleStatus> {
    let Some(active) = status.active_backup.as_deref() else {
        return Ok(status.clone());
    };
    match api.get_resource(&QDRANT_BACKUPS, active, ns).await? {
        Some(value) => {
            let backup: QdrantBackup = serde_json::from_value(value)?;
            Ok(match &backup.status {
                Some(observed) => absorb_backup_outcome(status, active, observed),
                None => status.clone(),
            })
        }
        None => {
            debug!(backup = %active, "active backup no longer exists");
            Ok(BackupScheduleStatus {
                active_backup: None,
                ..status.clone()
            })
        }
    }
}

/// Sleeps until the next run, capped by the check interval.
fn requeue_after(next: Option<DateTime<Utc>>, now: DateTime<Utc>, cap: Duration) -> Duration {
    match next {
        Some(next) => (next - now)
            .to_std()
            .map(|d| d.max(Duration::from_secs(1)))
            .unwrap_or(Duration::from_secs(1))
            .min(cap),
        None => cap,
    }
}

async fn persist_status(
    client: &Client,
    ns: &str,
    name: &str,
    status: &BackupScheduleStatus,
) -> Result<()> {
    // Server-side apply, so fields that went unset are dropped as well
    let api: Api<QdrantBackupSchedule> = Api::namespaced(client.clone(), ns);
    let pp = PatchParams::apply(FIELD_MANAGER).force();
    let patch = json!({
        "apiVersion": QdrantBackupSchedule::api_version(&()),
        "kind": QdrantBackupSchedule::kind(&()),
        "status": status,
    });
    api.patch_status(name, &pp, &Patch::Apply(&patch)).await?;
    Ok(())
}
