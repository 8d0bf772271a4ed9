//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::{CodecError, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Source section, or a config error naming the command that needs it.
    pub fn require_source(&self, command: &str) -> Result<&SourceConfig> {
        self.source.as_ref().ok_or_else(|| {
            CodecError::Config(format!("'{}' requires a source section", command))
        })
    }

    /// Archive section, or a config error naming the command that needs it.
    pub fn require_archive(&self, command: &str) -> Result<&ArchiveConfig> {
        self.archive.as_ref().ok_or_else(|| {
            CodecError::Config(format!("'{}' requires an archive section", command))
        })
    }

    /// SHA256 of the configuration, recorded in run summaries.
    pub fn hash(&self) -> String {
        let yaml = serde_yaml::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl SourceConfig {
    /// Connection settings for tokio-postgres.
    ///
    /// TLS is negotiated by the connector chosen from `ssl_mode`; the
    /// config itself only asks for it.
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut pg_config = tokio_postgres::Config::new();
        pg_config.host(&self.host);
        pg_config.port(self.port);
        pg_config.dbname(&self.database);
        pg_config.user(&self.user);
        pg_config.password(&self.password);
        pg_config.application_name("siard-codec");
        pg_config.connect_timeout(Duration::from_secs(self.connect_timeout_secs));
        pg_config.ssl_mode(if self.ssl_mode.eq_ignore_ascii_case("disable") {
            tokio_postgres::config::SslMode::Disable
        } else {
            tokio_postgres::config::SslMode::Require
        });
        pg_config
    }
}
