use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{Condition, ItemStatus, ObjectRef, RestorePhase, S3StorageSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreSpec {
    pub name: String,
    pub namespace: String,
    pub target_cluster_ref: ObjectRef,
    pub backup_ref: Option<ObjectRef>,
    pub source: Option<S3StorageSpec>,
    pub collections: Vec<String>,
    /// Source collection name to target collection name.
    pub collection_mapping: BTreeMap<String, String>,
    pub wait_for_indexing: bool,
}

impl RestoreSpec {
    pub fn target_name<'a>(&'a self, collection: &'a str) -> &'a str {
        self.collection_mapping
            .get(collection)
            .map(String::as_str)
            .unwrap_or(collection)
    }
}

/// Post-recovery facts about a collection.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub points_count: Option<u64>,
    /// `green` once optimizers and indexing are done.
    pub status: Option<String>,
}

impl CollectionInfo {
    pub fn is_green(&self) -> bool {
        self.status.as_deref() == Some("green")
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RestoredCollection {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    pub status: ItemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RestoredCollection {
    fn new(source: &str, target: &str, status: ItemStatus) -> Self {
        Self {
            name: target.to_string(),
            original_name: (source != target).then(|| source.to_string()),
            status,
            ..Default::default()
        }
    }

    pub fn completed(source: &str, target: &str, points_count: Option<u64>) -> Self {
        Self {
            points_count,
            ..Self::new(source, target, ItemStatus::Completed)
        }
    }

    pub fn failed(source: &str, target: &str, error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(source, target, ItemStatus::Failed)
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RestoreProgress {
    pub collections_total: u32,
    pub collections_completed: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_collection: Option<String>,
    pub percentage: u8,
}

impl RestoreProgress {
    /// Snapshot taken just before item `index` starts.
    pub fn before(index: usize, total: usize, current: &str) -> Self {
        let percentage = if total == 0 { 0 } else { index * 100 / total };
        Self {
            collections_total: total as u32,
            collections_completed: index as u32,
            current_collection: Some(current.to_string()),
            percentage: percentage.min(100) as u8,
        }
    }

    /// Final snapshot. Percentage is 100 even when some items failed.
    pub fn finished(total: usize, failures: usize) -> Self {
        Self {
            collections_total: total as u32,
            collections_completed: total.saturating_sub(failures) as u32,
            current_collection: None,
            percentage: 100,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RestoreStatus {
    pub phase: RestorePhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_backup: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub restored_collections: Vec<RestoredCollection>,
    #[serde(default)]
    pub progress: RestoreProgress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl RestoreStatus {
    pub fn downloading(at: DateTime<Utc>) -> Self {
        Self {
            phase: RestorePhase::Downloading,
            start_time: Some(at),
            ..Default::default()
        }
    }

    pub fn failed(error: impl ToString, at: DateTime<Utc>) -> Self {
        Self {
            phase: RestorePhase::Failed,
            completion_time: Some(at),
            error: Some(error.to_string()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn running_progress_floors_percentage() {
        let p = RestoreProgress::before(1, 3, "docs");
        assert_eq!(p.percentage, 33);
        assert_eq!(p.collections_completed, 1);
        assert_eq!(p.current_collection.as_deref(), Some("docs"));
        assert_eq!(RestoreProgress::before(0, 3, "a").percentage, 0);
        assert_eq!(RestoreProgress::before(2, 3, "c").percentage, 66);
    }

    #[test]
    fn finished_progress_is_always_full() {
        let p = RestoreProgress::finished(4, 1);
        assert_eq!(p.percentage, 100);
        assert_eq!(p.collections_completed, 3);
        assert_eq!(p.current_collection, None);
        assert_eq!(RestoreProgress::finished(0, 0).percentage, 100);
    }

    #[test]
    fn original_name_only_when_remapped() {
        assert_eq!(RestoredCollection::completed("a", "a", Some(3)).original_name, None);
        assert_eq!(
            RestoredCollection::failed("a", "b", "boom").original_name.as_deref(),
            Some("a")
        );
    }

    #[test]
    fn progress_is_always_serialized() {
        assert_eq!(
            serde_json::to_value(RestoreStatus::default()).unwrap(),
            json!({
                "phase": "Pending",
                "progress": { "collectionsTotal": 0, "collectionsCompleted": 0, "percentage": 0 }
            })
        );
    }
}
