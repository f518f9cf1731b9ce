use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The desired state cannot be acted on until the resource is corrected.
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: String,
        name: String,
        namespace: String,
    },
    #[error("helm: {0}")]
    Helm(String),
    #[error("s3: {0}")]
    S3(String),
    #[error("qdrant: {0}")]
    Qdrant(String),
    #[error(transparent)]
    Kube(#[from] kube::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn not_found(kind: &str, name: &str, namespace: &str) -> Self {
        Error::NotFound {
            kind: kind.to_string(),
            name: name.to_string(),
            namespace: namespace.to_string(),
        }
    }

    /// Retrying will not help; the resource spec has to change.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_config_errors_are_permanent() {
        assert!(Error::config("no source").is_permanent());
        assert!(!Error::not_found("Secret", "s3", "ns").is_permanent());
        assert!(!Error::S3("boom".into()).is_permanent());
    }

    #[test]
    fn not_found_message_names_the_object() {
        let err = Error::not_found("QdrantBackup", "nightly", "prod");
        assert_eq!(err.to_string(), "QdrantBackup prod/nightly not found");
    }
}
