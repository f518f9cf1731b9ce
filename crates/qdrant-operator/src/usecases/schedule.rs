use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::crds::backup::{SCHEDULE_LABEL, SCHEDULED_FOR_ANNOTATION};
use crate::crds::{ObjectReference, QdrantBackup, QdrantBackupSpec, S3Location, StorageTarget};
use crate::domain::{
    BackupPhase, BackupScheduleSpec, BackupScheduleStatus, Condition, RecentBackup,
    SchedulePhase, next_run, object_key,
};
use crate::error::Result;
use crate::ports::{ClusterApi, QDRANT_BACKUPS};

/// Decides whether a schedule is due and, if so, asks for a new backup.
pub struct ScheduleProcessor {
    cluster_api: Arc<dyn ClusterApi>,
}

impl ScheduleProcessor {
    pub fn new(cluster_api: Arc<dyn ClusterApi>) -> Self {
        Self { cluster_api }
    }

    /// The next run is anchored at the last backup when there is one, so
    /// evaluating more often than the schedule fires never adds backups.
    /// A schedule that has not fired yet is anchored at its creation time.
    /// Either way the run is derived from the current cron expression.
    ///
    /// A backup already submitted for the due run is adopted instead of
    /// submitting another, so a lost status write does not double up.
    pub async fn process(
        &self,
        spec: &BackupScheduleSpec,
        prior: &BackupScheduleStatus,
        now: DateTime<Utc>,
    ) -> Result<BackupScheduleStatus> {
        if spec.suspend {
            return Ok(BackupScheduleStatus {
                phase: SchedulePhase::Suspended,
                next_backup_time: None,
                ..prior.clone()
            });
        }

        let from_now = next_run(&spec.schedule, now)?;
        let anchor = prior.last_backup_time.or(spec.created_at).unwrap_or(now);
        let next = next_run(&spec.schedule, anchor)?;

        if next > now {
            debug!(schedule = %spec.name, next = %next, "backup not due");
            return Ok(BackupScheduleStatus {
                phase: SchedulePhase::Active,
                next_backup_time: Some(next),
                ..prior.clone()
            });
        }

        let backup_name = match self.submitted_for(spec, next).await? {
            Some(existing) => {
                info!(schedule = %spec.name, backup = %existing, due = %next, "scheduled backup already submitted");
                existing
            }
            None => {
                let name = spec.backup_name(now);
                let body = serde_json::to_value(backup_request(spec, &name, next))?;
                self.cluster_api
                    .create_resource(&QDRANT_BACKUPS, &spec.namespace, &body)
                    .await?;
                info!(schedule = %spec.name, backup = %name, due = %next, "scheduled backup created");
                name
            }
        };

        let mut status = BackupScheduleStatus {
            phase: SchedulePhase::Active,
            last_backup_time: Some(now),
            last_backup_name: Some(backup_name.clone()),
            last_backup_status: Some(BackupPhase::Pending),
            next_backup_time: Some(from_now),
            active_backup: Some(backup_name.clone()),
            recent_backups: prior.recent_backups.clone(),
            conditions: vec![Condition::new(
                "BackupScheduled",
                true,
                "ScheduleDue",
                format!("Created backup {backup_name}"),
                now,
            )],
        };
        status.push_recent(RecentBackup {
            name: backup_name,
            creation_time: now,
            completion_time: None,
            status: BackupPhase::Pending,
            size: None,
        });
        Ok(status)
    }

    /// Name of a backup this schedule already created for the run due at `due`.
    async fn submitted_for(
        &self,
        spec: &BackupScheduleSpec,
        due: DateTime<Utc>,
    ) -> Result<Option<String>> {
        let selector = format!("{SCHEDULE_LABEL}={}", spec.name);
        let due = due.to_rfc3339();
        let backups = self
            .cluster_api
            .list_resources(&QDRANT_BACKUPS, &spec.namespace, Some(&selector))
            .await?;
        Ok(backups.iter().find_map(|backup| {
            let meta = &backup["metadata"];
            let same_run = meta["labels"][SCHEDULE_LABEL].as_str() == Some(spec.name.as_str())
                && meta["annotations"][SCHEDULED_FOR_ANNOTATION].as_str() == Some(due.as_str());
            same_run.then(|| meta["name"].as_str().map(String::from)).flatten()
        }))
    }
}

/// The `QdrantBackup` a schedule submits for the run due at `due`. Its storage
/// prefix nests under the backup name.
pub fn backup_request(
    spec: &BackupScheduleSpec,
    backup_name: &str,
    due: DateTime<Utc>,
) -> QdrantBackup {
    let mut storage = S3Location::from(&spec.storage);
    storage.prefix = object_key(&[&spec.storage.prefix, backup_name]);

    let mut backup = QdrantBackup::new(
        backup_name,
        QdrantBackupSpec {
            cluster_ref: ObjectReference::from(&spec.cluster_ref),
            storage: StorageTarget { s3: storage },
            collections: spec.collections.clone(),
            retention_days: None,
        },
    );
    backup.metadata.namespace = Some(spec.namespace.clone());
    backup.metadata.labels = Some(BTreeMap::from([(
        SCHEDULE_LABEL.to_string(),
        spec.name.clone(),
    )]));
    backup.metadata.annotations = Some(BTreeMap::from([(
        SCHEDULED_FOR_ANNOTATION.to_string(),
        due.to_rfc3339(),
    )]));
    backup
}
