use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::ports::ChartDeployer;

/// Drives the `helm` binary.
#[derive(Debug, Clone)]
pub struct HelmCli {
    pub binary: String,
    pub kubeconfig: Option<PathBuf>,
    /// Chart repository as (name, url), added before install/upgrade.
    pub repo: Option<(String, String)>,
}

impl HelmCli {
    pub fn new(kubeconfig: Option<PathBuf>, repo: Option<(String, String)>) -> Self {
        Self {
            binary: "helm".into(),
            kubeconfig,
            repo,
        }
    }

    fn release_args(
        verb: &str,
        release: &str,
        namespace: &str,
        chart: &str,
        version: Option<&str>,
    ) -> Vec<String> {
        let mut args: Vec<String> = vec![
            verb.into(),
            release.into(),
            chart.into(),
            "--namespace".into(),
            namespace.into(),
        ];
        if verb == "install" {
            args.push("--create-namespace".into());
        }
        args.push("--wait".into());
        if let Some(v) = version {
            args.push("--version".into());
            args.push(v.into());
        }
        // values arrive on stdin
        args.push("--values".into());
        args.push("-".into());
        args
    }

    async fn ensure_repo(&self) -> Result<()> {
        let Some((name, url)) = &self.repo else {
            return Ok(());
        };
        // `repo add` fails when the repo is already known
        if let Err(e) = self.run(&["repo", "add", name.as_str(), url.as_str()], None).await {
            debug!(repo = %name, error = %e, "helm repo add skipped");
        }
        self.run(&["repo", "update"], None).await?;
        Ok(())
    }

    async fn apply(
        &self,
        verb: &str,
        release: &str,
        namespace: &str,
        chart: &str,
        values: &Value,
        version: Option<&str>,
    ) -> Result<String> {
        self.ensure_repo().await?;
        let args = Self::release_args(verb, release, namespace, chart, version);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&args, Some(serde_json::to_vec(values)?)).await?;
        info!(release = %release, namespace = %namespace, verb, "helm release applied");
        Ok(release.to_string())
    }

    async fn run(&self, args: &[&str], stdin: Option<Vec<u8>>) -> Result<String> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        if let Some(kubeconfig) = &self.kubeconfig {
            cmd.arg("--kubeconfig").arg(kubeconfig);
        }
        cmd.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
        debug!(cmd = %format!("{} {}", self.binary, args.join(" ")), "running helm");

        let mut child = cmd.spawn()?;
        if let Some(input) = stdin
            && let Some(mut pipe) = child.stdin.take()
        {
            pipe.write_all(&input).await?;
        }
        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            error!(args = %args.join(" "), code = ?output.status.code(), stderr = %stderr, "helm command failed");
            return Err(Error::Helm(stderr));
        }
        Ok(String::from_utf8(output.stdout)?)
    }
}

#[async_trait]
impl ChartDeployer for HelmCli {
    async fn install(
        &self,
        release: &str,
        namespace: &str,
        chart: &str,
        values: &Value,
        version: Option<&str>,
    ) -> Result<String> {
        self.apply("install", release, namespace, chart, values, version)
            .await
    }

    async fn upgrade(
        &self,
        release: &str,
        namespace: &str,
        chart: &str,
        values: &Value,
        version: Option<&str>,
    ) -> Result<String> {
        self.apply("upgrade", release, namespace, chart, values, version)
            .await
    }

    async fn uninstall(&self, release: &str, namespace: &str) -> Result<()> {
        self.run(&["uninstall", release, "--namespace", namespace], None)
            .await?;
        info!(release = %release, namespace = %namespace, "helm release uninstalled");
        Ok(())
    }

    async fn release_status(&self, release: &str, namespace: &str) -> Result<Option<Value>> {
        match self
            .run(
                &["status", release, "--namespace", namespace, "--output", "json"],
                None,
            )
            .await
        {
            Ok(stdout) => Ok(Some(serde_json::from_str(&stdout)?)),
            Err(Error::Helm(msg)) => {
                debug!(release = %release, reason = %msg, "no helm release");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
