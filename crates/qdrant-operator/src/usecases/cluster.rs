use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::domain::{ClusterPhase, ClusterSpec, ClusterStatus, Condition};
use crate::error::Result;
use crate::ports::{ChartDeployer, ClusterApi};

/// Installs the chart release for a cluster, or upgrades it when it exists.
pub struct ClusterReconciler {
    deployer: Arc<dyn ChartDeployer>,
    cluster_api: Arc<dyn ClusterApi>,
    chart: String,
}

impl ClusterReconciler {
    pub fn new(
        deployer: Arc<dyn ChartDeployer>,
        cluster_api: Arc<dyn ClusterApi>,
        chart: impl Into<String>,
    ) -> Self {
        Self {
            deployer,
            cluster_api,
            chart: chart.into(),
        }
    }

    /// Deployer failures propagate; the caller owns retry.
    pub async fn reconcile(&self, spec: &ClusterSpec) -> Result<ClusterStatus> {
        let release = spec.release_name();
        let values = spec.chart_values();
        let version = Some(spec.version.as_str());

        let existing = self
            .deployer
            .release_status(&release, &spec.namespace)
            .await?;

        let (phase, reason) = match existing {
            None => {
                self.deployer
                    .install(&release, &spec.namespace, &self.chart, &values, version)
                    .await?;
                (ClusterPhase::Pending, "ReleaseInstalled")
            }
            Some(_) => {
                self.deployer
                    .upgrade(&release, &spec.namespace, &self.chart, &values, version)
                    .await?;
                (ClusterPhase::Upgrading, "ReleaseUpgraded")
            }
        };
        info!(release = %release, namespace = %spec.namespace, ?phase, "release applied");

        let endpoint = self
            .cluster_api
            .service_endpoint(&release, &spec.namespace)
            .await?;

        Ok(ClusterStatus {
            phase,
            replicas: spec.replicas,
            ready_replicas: 0,
            helm_release: Some(release.clone()),
            endpoint: Some(endpoint),
            version: Some(spec.version.clone()),
            conditions: vec![Condition::new(
                "Reconciling",
                true,
                reason,
                format!("Helm release {release} applied at version {}", spec.version),
                Utc::now(),
            )],
            observed_generation: None,
        })
    }
}

pub struct ClusterDeleter {
    deployer: Arc<dyn ChartDeployer>,
}

impl ClusterDeleter {
    pub fn new(deployer: Arc<dyn ChartDeployer>) -> Self {
        Self { deployer }
    }

    pub async fn delete(&self, spec: &ClusterSpec) -> Result<()> {
        let release = spec.release_name();
        self.deployer.uninstall(&release, &spec.namespace).await?;
        info!(release = %release, namespace = %spec.namespace, "release uninstalled");
        Ok(())
    }
}
