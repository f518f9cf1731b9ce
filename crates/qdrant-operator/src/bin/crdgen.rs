use kube::core::CustomResourceExt;
use qdrant_operator::crds::{QdrantBackup, QdrantBackupSchedule, QdrantCluster, QdrantRestore};

fn main() -> anyhow::Result<()> {
    let crds = vec![
        QdrantCluster::crd(),
        QdrantBackup::crd(),
        QdrantRestore::crd(),
        QdrantBackupSchedule::crd(),
    ];
    for (i, crd) in crds.into_iter().enumerate() {
        if i > 0 {
            println!("---");
        }
        println!("{}", serde_yaml::to_string(&crd)?);
    }
    Ok(())
}
