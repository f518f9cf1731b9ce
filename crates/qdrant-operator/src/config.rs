use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_CHART: &str = "qdrant/qdrant";
pub const DEFAULT_CHART_REPO: &str = "https://qdrant.github.io/qdrant-helm";
pub const DEFAULT_SERVICE_PORT: u16 = 6333;

/// Operator settings, read once from the environment at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    pub operator_namespace: String,
    /// Chart reference passed to `helm install`
    pub chart: String,
    /// Repository added under the chart's repo alias; empty disables it
    pub chart_repo: Option<String>,
    pub service_port: u16,
    pub kubeconfig: Option<PathBuf>,
    pub staging_dir: PathBuf,
    pub schedule_check_interval: Duration,
    pub indexing_poll_interval: Duration,
    pub indexing_poll_attempts: u32,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            operator_namespace: "qdrant-operator".into(),
            chart: DEFAULT_CHART.into(),
            chart_repo: Some(DEFAULT_CHART_REPO.into()),
            service_port: DEFAULT_SERVICE_PORT,
            kubeconfig: None,
            staging_dir: std::env::temp_dir().join("qdrant-operator"),
            schedule_check_interval: Duration::from_secs(60),
            indexing_poll_interval: Duration::from_secs(5),
            indexing_poll_attempts: 120,
        }
    }
}

impl OperatorConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            operator_namespace: var("OPERATOR_NAMESPACE").unwrap_or(defaults.operator_namespace),
            chart: var("QDRANT_CHART").unwrap_or(defaults.chart),
            chart_repo: match lookup("QDRANT_CHART_REPO") {
                Some(repo) if repo.trim().is_empty() => None,
                Some(repo) => Some(repo),
                None => defaults.chart_repo,
            },
            service_port: parse(&var, "QDRANT_SERVICE_PORT")?.unwrap_or(defaults.service_port),
            kubeconfig: var("HELM_KUBECONFIG").map(PathBuf::from),
            staging_dir: var("SNAPSHOT_STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.staging_dir),
            schedule_check_interval: parse(&var, "SCHEDULE_CHECK_INTERVAL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.schedule_check_interval),
            indexing_poll_interval: parse(&var, "INDEXING_POLL_INTERVAL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.indexing_poll_interval),
            indexing_poll_attempts: parse(&var, "INDEXING_POLL_ATTEMPTS")?
                .unwrap_or(defaults.indexing_poll_attempts),
        })
    }

    /// `(alias, url)` for `helm repo add`. The alias is the part of the chart
    /// reference before the slash.
    pub fn helm_repo(&self) -> Option<(String, String)> {
        let url = self.chart_repo.clone()?;
        let (alias, _) = self.chart.split_once('/')?;
        Some((alias.to_string(), url))
    }
}

fn parse<T: FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    var(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| Error::config(format!("{key}={raw:?}: {e}")))
        })
        .transpose()
}
