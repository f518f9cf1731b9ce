//! Wires adapters into use cases.

use std::sync::Arc;

use kube::Client;

use crate::adapters::{HelmCli, KubeClusterApi, QdrantConnector, S3ObjectStorage};
use crate::config::OperatorConfig;
use crate::ports::{ChartDeployer, ClusterApi, DatabaseConnector, ObjectStorage};
use crate::usecases::{
    BackupExecutor, ClusterDeleter, ClusterReconciler, IndexingWait, RestoreExecutor,
    ScheduleProcessor,
};

pub fn chart_deployer(config: &OperatorConfig) -> Arc<dyn ChartDeployer> {
    Arc::new(HelmCli::new(config.kubeconfig.clone(), config.helm_repo()))
}

pub fn cluster_api(config: &OperatorConfig, client: Client) -> Arc<dyn ClusterApi> {
    Arc::new(KubeClusterApi::new(client, config.service_port))
}

pub fn database_connector() -> Arc<dyn DatabaseConnector> {
    Arc::new(QdrantConnector::default())
}

pub fn object_storage() -> Arc<dyn ObjectStorage> {
    Arc::new(S3ObjectStorage::new())
}

pub fn cluster_reconciler(config: &OperatorConfig, client: Client) -> ClusterReconciler {
    ClusterReconciler::new(
        chart_deployer(config),
        cluster_api(config, client),
        config.chart.clone(),
    )
}

pub fn cluster_deleter(config: &OperatorConfig) -> ClusterDeleter {
    ClusterDeleter::new(chart_deployer(config))
}

pub fn backup_executor(config: &OperatorConfig, client: Client) -> BackupExecutor {
    BackupExecutor::new(
        database_connector(),
        object_storage(),
        cluster_api(config, client),
        config.staging_dir.clone(),
    )
}

pub fn restore_executor(config: &OperatorConfig, client: Client) -> RestoreExecutor {
    RestoreExecutor::new(
        database_connector(),
        object_storage(),
        cluster_api(config, client),
        config.staging_dir.clone(),
    )
    .with_indexing_wait(IndexingWait {
        interval: config.indexing_poll_interval,
        max_attempts: config.indexing_poll_attempts,
    })
}

pub fn schedule_processor(config: &OperatorConfig, client: Client) -> ScheduleProcessor {
    ScheduleProcessor::new(cluster_api(config, client))
}
