use futures::StreamExt;
use kube::Client;
use qdrant_operator::{
    backup_controller as backup, cluster_controller as cluster, config::OperatorConfig, factory,
    restore_controller as restore, schedule_controller as schedule,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = OperatorConfig::from_env()?;
    info!(
        namespace = %config.operator_namespace,
        chart = %config.chart,
        staging = %config.staging_dir.display(),
        "qdrant-operator starting up"
    );
    tokio::fs::create_dir_all(&config.staging_dir).await?;

    let client = Client::try_default().await?;

    // Cluster controller
    let cluster_ctx = Arc::new(cluster::Ctx {
        client: client.clone(),
        reconciler: factory::cluster_reconciler(&config, client.clone()),
        deleter: factory::cluster_deleter(&config),
    });
    let cluster_controller = cluster::controller(client.clone())
        .run(cluster::reconcile, cluster::error_policy, cluster_ctx)
        .for_each(|res| async move {
            if let Err(e) = res {
                tracing::warn!(error=?e, "cluster reconcile error");
            }
        });

    // Backup controller
    let backup_ctx = Arc::new(backup::Ctx {
        client: client.clone(),
        cluster_api: factory::cluster_api(&config, client.clone()),
        executor: factory::backup_executor(&config, client.clone()),
    });
    let backup_controller = backup::controller(client.clone())
        .run(backup::reconcile, backup::error_policy, backup_ctx)
        .for_each(|res| async move {
            if let Err(e) = res {
                tracing::warn!(error=?e, "backup reconcile error");
            }
        });

    // Restore controller
    let restore_ctx = Arc::new(restore::Ctx {
        client: client.clone(),
        config: config.clone(),
        cluster_api: factory::cluster_api(&config, client.clone()),
    });
    let restore_controller = restore::controller(client.clone())
        .run(restore::reconcile, restore::error_policy, restore_ctx)
        .for_each(|res| async move {
            if let Err(e) = res {
                tracing::warn!(error=?e, "restore reconcile error");
            }
        });

    // Schedule controller
    let schedule_ctx = Arc::new(schedule::Ctx {
        client: client.clone(),
        cluster_api: factory::cluster_api(&config, client.clone()),
        processor: factory::schedule_processor(&config, client.clone()),
        check_interval: config.schedule_check_interval,
    });
    let schedule_controller = schedule::controller(client.clone())
        .run(schedule::reconcile, schedule::error_policy, schedule_ctx)
        .for_each(|res| async move {
            if let Err(e) = res {
                tracing::warn!(error=?e, "schedule reconcile error");
            }
        });

    tokio::select! {
        _ = cluster_controller => {},
        _ = backup_controller => {},
        _ = restore_controller => {},
        _ = schedule_controller => {},
        _ = tokio::signal::ctrl_c() => { info!("shutdown signal received"); }
    }
    Ok(())
}
