use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Key holding the S3 secret access key, next to the access key id in the same Secret.
pub const SECRET_ACCESS_KEY_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const DEFAULT_ACCESS_KEY_ID_KEY: &str = "AWS_ACCESS_KEY_ID";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const SNAPSHOT_SUFFIX: &str = ".snapshot";

/// Points at one key of a Kubernetes Secret. Never carries the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SecretRef {
    pub name: String,
    pub key: String,
    pub namespace: String,
}

impl SecretRef {
    pub fn new(name: &str, key: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            key: key.to_string(),
            namespace: namespace.to_string(),
        }
    }

    /// Same Secret, different key.
    pub fn with_key(&self, key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3StorageSpec {
    pub bucket: String,
    pub prefix: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub force_path_style: bool,
    /// Reference to the access key id; the secret key lives beside it.
    pub credentials_secret_ref: SecretRef,
}

impl S3StorageSpec {
    /// `s3://<bucket>/<path>`
    pub fn uri(&self, path: &str) -> String {
        format!("s3://{}/{}", self.bucket, object_key(&[path]))
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct StorageCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// Joins path segments with `/`, dropping empty segments and stray slashes.
pub fn object_key(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Listing prefix for everything stored under `path` as a directory, so
/// `backups/nightly` does not also match `backups/nightly-20260314-020000`.
pub fn listing_prefix(path: &str) -> String {
    let key = object_key(&[path]);
    if key.is_empty() {
        key
    } else {
        format!("{key}/")
    }
}

/// Turns a recorded `s3://bucket/path` location into a key prefix.
pub fn strip_s3_uri(path: &str) -> String {
    match path.strip_prefix("s3://") {
        Some(rest) => rest
            .split_once('/')
            .map(|(_, key)| key.trim_matches('/').to_string())
            .unwrap_or_default(),
        None => path.trim_matches('/').to_string(),
    }
}

/// Human readable size in binary units with one decimal.
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if size < 1024.0 {
            return format!("{size:.1}{unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1}PB")
}

/// Collection names taken from the parent directory of each snapshot key,
/// deduplicated and sorted.
pub fn collections_from_keys(keys: &[String]) -> Vec<String> {
    let mut names: Vec<String> = keys
        .iter()
        .filter_map(|key| {
            let parts: Vec<&str> = key.split('/').collect();
            (parts.len() >= 2).then(|| parts[parts.len() - 2].to_string())
        })
        .collect();
    names.sort();
    names.dedup();
    names
}

/// First snapshot file stored under a `/<collection>/` directory.
pub fn find_snapshot_key<'a>(keys: &'a [String], collection: &str) -> Option<&'a str> {
    let needle = format!("/{collection}/");
    keys.iter()
        .map(String::as_str)
        .find(|key| key.contains(&needle) && key.ends_with(SNAPSHOT_SUFFIX))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_sizes_in_binary_units() {
        assert_eq!(format_size(0), "0.0B");
        assert_eq!(format_size(1023), "1023.0B");
        assert_eq!(format_size(1536), "1.5KB");
        assert_eq!(format_size(1_048_576), "1.0MB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.0GB");
        assert_eq!(format_size(1024u64.pow(5)), "1.0PB");
        assert_eq!(format_size(3 * 1024u64.pow(6)), "3072.0PB");
    }

    #[test]
    fn derives_sorted_unique_collections() {
        let keys = vec![
            "b/colB/y.snapshot".to_string(),
            "b/colA/x.snapshot".to_string(),
            "b/colA/z.snapshot".to_string(),
            "toplevel".to_string(),
        ];
        assert_eq!(collections_from_keys(&keys), vec!["colA", "colB"]);
    }

    #[test]
    fn finds_snapshot_key_by_directory() {
        let keys = vec![
            "b/colA/readme.txt".to_string(),
            "b/colAB/x.snapshot".to_string(),
            "b/colA/x.snapshot".to_string(),
        ];
        assert_eq!(find_snapshot_key(&keys, "colA"), Some("b/colA/x.snapshot"));
        assert_eq!(find_snapshot_key(&keys, "missing"), None);
    }

    #[test]
    fn joins_keys_without_empty_segments() {
        assert_eq!(object_key(&["backups", "nightly", "c", "s"]), "backups/nightly/c/s");
        assert_eq!(object_key(&["", "nightly", "c"]), "nightly/c");
        assert_eq!(object_key(&["backups/", "/nightly"]), "backups/nightly");
    }

    #[test]
    fn listing_prefix_stops_at_directory_boundary() {
        assert_eq!(listing_prefix("backups/nightly"), "backups/nightly/");
        assert_eq!(listing_prefix("/backups/nightly/"), "backups/nightly/");
        assert_eq!(listing_prefix(""), "");
        let sibling = "backups/nightly-20260314-020000/docs/a.snapshot";
        assert!(!sibling.starts_with(&listing_prefix("backups/nightly")));
    }

    #[test]
    fn strips_bucket_from_recorded_uri() {
        assert_eq!(strip_s3_uri("s3://bucket/backups/nightly"), "backups/nightly");
        assert_eq!(strip_s3_uri("s3://bucket"), "");
        assert_eq!(strip_s3_uri("backups/nightly/"), "backups/nightly");
    }

    #[test]
    fn sibling_secret_key_keeps_name_and_namespace() {
        let access = SecretRef::new("s3-creds", DEFAULT_ACCESS_KEY_ID_KEY, "prod");
        let secret = access.with_key(SECRET_ACCESS_KEY_KEY);
        assert_eq!(secret, SecretRef::new("s3-creds", SECRET_ACCESS_KEY_KEY, "prod"));
    }

    #[test]
    fn credentials_debug_hides_secret() {
        let creds = StorageCredentials {
            access_key_id: "AKIA".into(),
            secret_access_key: "hunter2".into(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
