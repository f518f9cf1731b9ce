//! One implementation per port, talking to the real systems.

pub mod helm;
pub mod kubernetes;
pub mod qdrant;
pub mod s3;

pub use helm::HelmCli;
pub use kubernetes::KubeClusterApi;
pub use qdrant::{QdrantConnector, QdrantHttp};
pub use s3::S3ObjectStorage;
