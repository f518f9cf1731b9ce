mod common;

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use common::{FakeClusterApi, NS, cluster_ref, storage};
use qdrant_operator::crds::QdrantBackup;
use qdrant_operator::domain::{
    BackupPhase, BackupScheduleSpec, BackupScheduleStatus, RetentionPolicy, SchedulePhase,
};
use qdrant_operator::usecases::ScheduleProcessor;

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, h, m, 0).unwrap()
}

fn spec(suspend: bool) -> BackupScheduleSpec {
    BackupScheduleSpec {
        name: "hourly".into(),
        namespace: NS.into(),
        schedule: "0 * * * *".into(),
        cluster_ref: cluster_ref(),
        storage: storage("scheduled"),
        collections: vec!["docs".into()],
        retention_policy: RetentionPolicy::default(),
        suspend,
        created_at: Some(at(9, 30)),
    }
}

fn ran_at(time: DateTime<Utc>, name: &str) -> BackupScheduleStatus {
    BackupScheduleStatus {
        last_backup_time: Some(time),
        last_backup_name: Some(name.into()),
        last_backup_status: Some(BackupPhase::Completed),
        ..Default::default()
    }
}

#[tokio::test]
async fn suspended_schedule_never_submits() {
    let api = Arc::new(FakeClusterApi::default());
    let processor = ScheduleProcessor::new(api.clone());
    let prior = ran_at(at(1, 0), "hourly-20260314-010000");

    // days overdue
    let now = at(23, 59);
    let status = processor.process(&spec(true), &prior, now).await.unwrap();

    assert_eq!(status.phase, SchedulePhase::Suspended);
    assert_eq!(status.next_backup_time, None);
    assert_eq!(status.last_backup_name, prior.last_backup_name);
    assert_eq!(status.last_backup_time, prior.last_backup_time);
    assert!(api.created().is_empty());
}

#[tokio::test]
async fn not_due_keeps_the_last_backup() {
    let api = Arc::new(FakeClusterApi::default());
    let processor = ScheduleProcessor::new(api.clone());
    let prior = ran_at(at(10, 0), "hourly-20260314-100000");

    let status = processor.process(&spec(false), &prior, at(10, 30)).await.unwrap();

    assert_eq!(status.phase, SchedulePhase::Active);
    assert_eq!(status.next_backup_time, Some(at(11, 0)));
    assert_eq!(status.last_backup_name, prior.last_backup_name);
    assert!(api.created().is_empty());
}

#[tokio::test]
async fn due_schedule_submits_exactly_one_backup() {
    let api = Arc::new(FakeClusterApi::default());
    let processor = ScheduleProcessor::new(api.clone());
    let prior = ran_at(at(10, 0), "hourly-20260314-100000");
    let now = Utc.with_ymd_and_hms(2026, 3, 14, 11, 0, 5).unwrap();

    let status = processor.process(&spec(false), &prior, now).await.unwrap();

    assert_eq!(status.phase, SchedulePhase::Active);
    assert_eq!(status.last_backup_name.as_deref(), Some("hourly-20260314-110005"));
    assert_eq!(status.last_backup_time, Some(now));
    assert_eq!(status.last_backup_status, Some(BackupPhase::Pending));
    assert_eq!(status.active_backup, status.last_backup_name);
    // rescheduled from the actual fire time
    assert_eq!(status.next_backup_time, Some(at(12, 0)));
    assert_eq!(status.recent_backups.len(), 1);
    assert_eq!(status.conditions[0].type_, "BackupScheduled");

    let created = api.created();
    assert_eq!(created.len(), 1);
    let backup: QdrantBackup = serde_json::from_value(created[0].clone()).unwrap();
    assert_eq!(backup.metadata.name.as_deref(), Some("hourly-20260314-110005"));
    assert_eq!(backup.metadata.namespace.as_deref(), Some(NS));
    assert_eq!(
        backup.metadata.labels.unwrap().get("qdrant.io/schedule").map(String::as_str),
        Some("hourly")
    );
    assert_eq!(backup.spec.storage.s3.prefix, "scheduled/hourly-20260314-110005");
    assert_eq!(backup.spec.storage.s3.bucket, "snapshots");
    assert_eq!(backup.spec.cluster_ref.name, "vectors");
    assert_eq!(backup.spec.collections, vec!["docs"]);
    assert_eq!(
        created[0]["metadata"]["annotations"]["qdrant.io/scheduled-for"],
        "2026-03-14T11:00:00+00:00"
    );
    assert_eq!(created[0]["apiVersion"], "qdrant.io/v1alpha1");
    assert_eq!(created[0]["kind"], "QdrantBackup");
}

#[tokio::test]
async fn evaluating_often_does_not_add_backups() {
    let api = Arc::new(FakeClusterApi::default());
    let processor = ScheduleProcessor::new(api.clone());
    let mut status = BackupScheduleStatus::default();

    // first evaluation anchors at creation, nothing is due yet
    status = processor.process(&spec(false), &status, at(9, 30)).await.unwrap();
    assert!(api.created().is_empty());
    assert_eq!(status.next_backup_time, Some(at(10, 0)));

    for minute in [0u32, 1, 15, 45, 59] {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 10, minute, 30).unwrap();
        status = processor.process(&spec(false), &status, now).await.unwrap();
    }
    assert_eq!(api.created().len(), 1);
    assert_eq!(status.last_backup_name.as_deref(), Some("hourly-20260314-100030"));

    status = processor.process(&spec(false), &status, at(11, 1)).await.unwrap();
    assert_eq!(api.created().len(), 2);
    assert_eq!(status.recent_backups.len(), 2);
    assert_eq!(status.recent_backups[0].name, "hourly-20260314-110100");
}

#[tokio::test]
async fn invalid_cron_is_a_configuration_error() {
    let api = Arc::new(FakeClusterApi::default());
    let processor = ScheduleProcessor::new(api.clone());
    let bad = BackupScheduleSpec {
        schedule: "every hour".into(),
        ..spec(false)
    };

    let err = processor
        .process(&bad, &BackupScheduleStatus::default(), at(10, 0))
        .await
        .unwrap_err();
    assert!(err.is_permanent());
    assert!(api.created().is_empty());
}

#[tokio::test]
async fn cron_edit_before_first_run_takes_effect() {
    let api = Arc::new(FakeClusterApi::default());
    let processor = ScheduleProcessor::new(api.clone());
    let yearly = BackupScheduleSpec {
        schedule: "0 0 1 1 *".into(),
        ..spec(false)
    };

    let status = processor
        .process(&yearly, &BackupScheduleStatus::default(), at(9, 30))
        .await
        .unwrap();
    assert_eq!(
        status.next_backup_time,
        Some(Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap())
    );

    // switched to hourly; the 10:00 run since creation is overdue
    let status = processor.process(&spec(false), &status, at(11, 30)).await.unwrap();
    assert_eq!(api.created().len(), 1);
    assert_eq!(status.last_backup_name.as_deref(), Some("hourly-20260314-113000"));
    assert_eq!(status.next_backup_time, Some(at(12, 0)));
}

#[tokio::test]
async fn stored_next_time_does_not_drive_the_schedule() {
    let api = Arc::new(FakeClusterApi::default());
    let processor = ScheduleProcessor::new(api.clone());
    let fresh = BackupScheduleSpec {
        created_at: None,
        ..spec(false)
    };
    let prior = BackupScheduleStatus {
        next_backup_time: Some(at(0, 0)),
        ..Default::default()
    };

    let status = processor.process(&fresh, &prior, at(9, 30)).await.unwrap();
    assert!(api.created().is_empty());
    assert_eq!(status.last_backup_name, None);
    assert_eq!(status.next_backup_time, Some(at(10, 0)));
}

#[tokio::test]
async fn lost_status_write_does_not_submit_twice() {
    let api = Arc::new(FakeClusterApi::default());
    let processor = ScheduleProcessor::new(api.clone());
    let prior = ran_at(at(10, 0), "hourly-20260314-100000");

    let first = processor.process(&spec(false), &prior, at(11, 0)).await.unwrap();
    // the status above never reached the API server, so the prior is evaluated again
    let retried = processor.process(&spec(false), &prior, at(11, 1)).await.unwrap();

    assert_eq!(api.created().len(), 1);
    assert_eq!(retried.last_backup_name, first.last_backup_name);
    assert_eq!(retried.active_backup.as_deref(), Some("hourly-20260314-110000"));
    assert_eq!(retried.next_backup_time, Some(at(12, 0)));

    // the following run is a new one
    processor.process(&spec(false), &retried, at(12, 0)).await.unwrap();
    assert_eq!(api.created().len(), 2);
}
