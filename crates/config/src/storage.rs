use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use keepsake_storage::TransportHandle;
use keepsake_storage::transport::LocalTransport;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

const REDACTED: &str = "********";

/// Where uploads are stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StorageSettings {
    /// A directory on this machine, optionally served at `base_url`.
    Local {
        root: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
    /// An S3-compatible bucket. Requires the `s3` feature to connect.
    S3 {
        bucket: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix: Option<String>,
        region: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
        key_id: String,
        key_secret: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        public_url: Option<String>,
    },
}
impl Default for StorageSettings {
    fn default() -> Self {
        Self::Local {
            root: default_media_root(),
            base_url: None,
        }
    }
}

fn default_media_root() -> PathBuf {
    crate::project_dirs()
        .map(|dirs| dirs.data_dir().join("media"))
        .unwrap_or_else(|| std::env::temp_dir().join("keepsake").join("media"))
}

impl StorageSettings {
    /// Short name of the storage kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Local { .. } => "local",
            Self::S3 { .. } => "s3",
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            Self::Local { root, .. } if !root.is_absolute() => {
                exn::bail!(ErrorKind::Invalid(format!("storage.root must be absolute, got {}", root.display())))
            },
            Self::S3 { bucket, .. } if bucket.trim().is_empty() => {
                exn::bail!(ErrorKind::Invalid("storage.bucket must not be empty".to_string()))
            },
            _ => Ok(()),
        }
    }

    /// The same settings with credentials blanked out, for display.
    pub fn redacted(&self) -> Self {
        let mut redacted = self.clone();
        if let Self::S3 { key_secret, .. } = &mut redacted {
            *key_secret = REDACTED.to_string();
        }
        redacted
    }

    /// Construct the configured transport.
    pub fn connect(&self) -> Result<TransportHandle> {
        match self {
            Self::Local { root, base_url } => {
                let mut transport = LocalTransport::new(self.kind(), root).or_raise(|| ErrorKind::Storage)?;
                if let Some(base_url) = base_url {
                    transport = transport.with_base_url(base_url);
                }
                Ok(Arc::new(transport))
            },
            #[cfg(feature = "s3")]
            Self::S3 {
                bucket,
                prefix,
                region,
                endpoint,
                key_id,
                key_secret,
                public_url,
            } => {
                let mut transport = keepsake_storage::transport::S3Transport::new(
                    self.kind(),
                    bucket,
                    prefix.clone(),
                    region,
                    endpoint.clone(),
                    key_id,
                    key_secret,
                )
                .or_raise(|| ErrorKind::Storage)?;
                if let Some(public_url) = public_url {
                    transport = transport.with_public_url(public_url);
                }
                Ok(Arc::new(transport))
            },
            #[cfg(not(feature = "s3"))]
            Self::S3 { .. } => exn::bail!(ErrorKind::Unsupported("s3")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s3() -> StorageSettings {
        StorageSettings::S3 {
            bucket: "wedding-media".to_string(),
            prefix: Some("uploads".to_string()),
            region: "us-west-004".to_string(),
            endpoint: Some("https://s3.us-west-004.backblazeb2.com".to_string()),
            key_id: "id".to_string(),
            key_secret: "hunter2".to_string(),
            public_url: None,
        }
    }

    #[test]
    fn test_default_is_absolute_local() {
        let settings = StorageSettings::default();
        assert_eq!(settings.kind(), "local");
        settings.validate().unwrap();
    }

    #[test]
    fn test_relative_root_is_invalid() {
        let settings = StorageSettings::Local {
            root: PathBuf::from("media"),
            base_url: None,
        };
        let err = settings.validate().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[test]
    fn test_redacted_hides_secret() {
        let StorageSettings::S3 { key_secret, key_id, .. } = s3().redacted() else {
            panic!("kind changed");
        };
        assert_eq!(key_secret, REDACTED);
        assert_eq!(key_id, "id");
    }

    #[test]
    fn test_connect_local() {
        let temp_dir = tempfile::tempdir().unwrap();
        let settings = StorageSettings::Local {
            root: temp_dir.path().join("media"),
            base_url: Some("https://photos.example".to_string()),
        };
        let transport = settings.connect().unwrap();
        assert_eq!(transport.name(), "local");
        assert!(temp_dir.path().join("media").is_dir());
    }

    #[cfg(not(feature = "s3"))]
    #[test]
    fn test_connect_s3_without_feature() {
        let err = s3().connect().err().unwrap();
        assert!(matches!(&*err, ErrorKind::Unsupported("s3")));
    }

    #[cfg(feature = "s3")]
    #[test]
    fn test_connect_s3() {
        assert_eq!(s3().connect().unwrap().name(), "s3");
    }
}
