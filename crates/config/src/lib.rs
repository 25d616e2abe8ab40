//! Layered configuration for keepsake.
//!
//! Values are merged, later layers winning:
//!
//! 1. Built-in defaults ([`Config::default`]).
//! 2. A config file: TOML, YAML or JSON, picked by extension. Either given
//!    explicitly, or [`default_path`] if that exists.
//! 3. Environment variables prefixed `KEEPSAKE_`, nested with `__`
//!    (e.g. `KEEPSAKE_UPLOAD__MAX_ATTEMPTS=5`, `KEEPSAKE_STORAGE__KIND=s3`).
//!
//! ```toml
//! [upload]
//! retry_delay = 2000
//! chunk_size = 50
//!
//! [compression]
//! codec = "gzip"
//!
//! [storage]
//! kind = "local"
//! root = "/srv/gallery/media"
//! base_url = "https://photos.example.com/media"
//! ```

pub mod error;
mod storage;

pub use crate::storage::StorageSettings;
use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use keepsake_compress::Compression;
use keepsake_upload::{CodecCompressor, CompressOptions, Tuning, UploadBatch};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "KEEPSAKE_";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub upload: Tuning,
    pub compression: CompressionSettings,
    pub storage: StorageSettings,
}

/// Compressor settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionSettings {
    /// Byte codec applied to raw media; `none` to send everything as-is.
    pub codec: Compression,
    pub max_size_mb: f64,
    pub max_dimension: u32,
}
impl Default for CompressionSettings {
    fn default() -> Self {
        let options = CompressOptions::default();
        Self {
            codec: Compression::None,
            max_size_mb: options.max_size_mb,
            max_dimension: options.max_dimension,
        }
    }
}
impl CompressionSettings {
    pub fn options(&self) -> CompressOptions {
        CompressOptions {
            max_size_mb: self.max_size_mb,
            max_dimension: self.max_dimension,
        }
    }

    pub fn compressor(&self) -> CodecCompressor {
        CodecCompressor::new(self.codec)
    }
}

pub(crate) fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "keepsake")
}

/// Where the config file lives when none is given explicitly.
pub fn default_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

impl Config {
    /// Load and validate configuration.
    ///
    /// # Errors
    ///
    /// [`NotFound`](ErrorKind::NotFound) if `path` is given but missing,
    /// [`Load`](ErrorKind::Load) if a layer can't be parsed, and
    /// [`Invalid`](ErrorKind::Invalid) if the result fails [`validate`](Self::validate).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config: Self = Self::figment(path)?.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        tracing::debug!(storage = config.storage.kind(), codec = config.compression.codec.as_str(), "Loaded configuration");
        Ok(config)
    }

    /// The layered provider stack, before extraction.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let file = match path {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => default_path().filter(|path| path.is_file()),
        };
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = file {
            tracing::debug!(path = %file.display(), "Reading config file");
            figment = match file.extension().and_then(|ext| ext.to_str()) {
                Some("yaml" | "yml") => figment.merge(Yaml::file(file)),
                Some("json") => figment.merge(Json::file(file)),
                _ => figment.merge(Toml::file(file)),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Reject values that would parse but can't work.
    pub fn validate(&self) -> Result<()> {
        if self.upload.max_attempts == 0 {
            exn::bail!(ErrorKind::Invalid("upload.max_attempts must be at least 1".to_string()));
        }
        if self.upload.chunk_size == 0 {
            exn::bail!(ErrorKind::Invalid("upload.chunk_size must be at least 1".to_string()));
        }
        if self.upload.transfer_timeout.is_zero() {
            exn::bail!(ErrorKind::Invalid("upload.transfer_timeout must be greater than 0".to_string()));
        }
        if !(self.compression.max_size_mb.is_finite() && self.compression.max_size_mb >= 0.0) {
            exn::bail!(ErrorKind::Invalid("compression.max_size_mb must be a non-negative number".to_string()));
        }
        self.storage.validate()
    }

    /// The same configuration with credentials blanked out, for display.
    pub fn redacted(&self) -> Self {
        Self {
            storage: self.storage.redacted(),
            ..self.clone()
        }
    }

    /// An [`UploadBatch`] wired to the configured transport, compressor and tuning.
    pub fn upload_batch(&self) -> Result<UploadBatch> {
        Ok(UploadBatch::new(self.storage.connect()?)
            .with_compressor(self.compression.compressor())
            .with_compress_options(self.compression.options())
            .with_tuning(self.upload.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;
    use std::time::Duration;

    fn local(root: &str) -> StorageSettings {
        StorageSettings::Local {
            root: PathBuf::from(root),
            base_url: None,
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.upload, Tuning::default());
        assert_eq!(config.compression.codec, Compression::None);
        assert_eq!(config.compression.max_size_mb, 1.0);
        assert_eq!(config.compression.max_dimension, 1920);
        config.validate().unwrap();
    }

    #[rstest]
    #[case("config.toml", "[upload]\nmax_attempts = 5\nretry_delay = 100\n\n[storage]\nkind = \"local\"\nroot = \"/srv/media\"\n")]
    #[case("config.yaml", "upload:\n  max_attempts: 5\n  retry_delay: 100\nstorage:\n  kind: local\n  root: /srv/media\n")]
    #[case("config.json", r#"{"upload": {"max_attempts": 5, "retry_delay": 100}, "storage": {"kind": "local", "root": "/srv/media"}}"#)]
    fn test_file_formats(#[case] name: &str, #[case] contents: &str) {
        Jail::expect_with(|jail| {
            jail.create_file(name, contents)?;
            let config = Config::load(Some(Path::new(name))).unwrap();
            assert_eq!(config.upload.max_attempts, 5);
            assert_eq!(config.upload.retry_delay, Duration::from_millis(100));
            // Untouched values keep their defaults.
            assert_eq!(config.upload.chunk_size, 50);
            assert_eq!(config.storage, local("/srv/media"));
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[upload]\nmax_attempts = 5\n\n[compression]\ncodec = \"gzip\"\n")?;
            jail.set_env("KEEPSAKE_UPLOAD__MAX_ATTEMPTS", "2");
            jail.set_env("KEEPSAKE_STORAGE__KIND", "local");
            jail.set_env("KEEPSAKE_STORAGE__ROOT", "/var/lib/keepsake");
            let config = Config::load(Some(Path::new("config.toml"))).unwrap();
            assert_eq!(config.upload.max_attempts, 2);
            assert_eq!(config.compression.codec, Compression::Gzip);
            assert_eq!(config.storage, local("/var/lib/keepsake"));
            Ok(())
        });
    }

    #[test]
    fn test_s3_section() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [storage]
                kind = "s3"
                bucket = "wedding-media"
                region = "us-west-004"
                key_id = "id"
                key_secret = "secret"
                public_url = "https://media.example.com"
                "#,
            )?;
            let config = Config::load(Some(Path::new("config.toml"))).unwrap();
            let StorageSettings::S3 { bucket, prefix, public_url, .. } = &config.storage else {
                panic!("expected s3 storage");
            };
            assert_eq!(bucket, "wedding-media");
            assert_eq!(prefix, &None);
            assert_eq!(public_url.as_deref(), Some("https://media.example.com"));
            let shown = serde_json::to_string(&config.redacted()).unwrap();
            assert!(!shown.contains("\"secret\""));
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        Jail::expect_with(|_jail| {
            let err = Config::load(Some(Path::new("nope.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::NotFound(_)));
            Ok(())
        });
    }

    #[test]
    fn test_unparseable_file() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[upload]\nmax_attempts = \"lots\"\n")?;
            let err = Config::load(Some(Path::new("config.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Load));
            Ok(())
        });
    }

    #[rstest]
    #[case::zero_attempts("KEEPSAKE_UPLOAD__MAX_ATTEMPTS", "0")]
    #[case::zero_chunk("KEEPSAKE_UPLOAD__CHUNK_SIZE", "0")]
    #[case::zero_timeout("KEEPSAKE_UPLOAD__TRANSFER_TIMEOUT", "0")]
    #[case::negative_size("KEEPSAKE_COMPRESSION__MAX_SIZE_MB", "-1")]
    #[case::relative_root("KEEPSAKE_STORAGE__ROOT", "relative/media")]
    fn test_validation(#[case] key: &str, #[case] value: &str) {
        Jail::expect_with(|jail| {
            jail.set_env("KEEPSAKE_STORAGE__KIND", "local");
            jail.set_env("KEEPSAKE_STORAGE__ROOT", "/srv/media");
            jail.set_env(key, value);
            let err = Config::load(None).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Invalid(_)));
            Ok(())
        });
    }
}
