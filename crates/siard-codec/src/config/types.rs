//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::source::FetchLadder;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Live source database (required by `extract` and `health-check`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceConfig>,

    /// Archive to decode (required by `decode`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<ArchiveConfig>,

    /// Fetch-size ladder for cursor reads.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Path to the table catalog YAML.
    pub catalog: PathBuf,
}

/// Source database (PostgreSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database type (always "postgres" for now).
    #[serde(default = "default_postgres")]
    pub r#type: String,

    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// SSL mode (default: "disable").
    #[serde(default = "default_disable")]
    pub ssl_mode: String,

    /// Connect timeout in seconds (default: 30).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("type", &self.r#type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// Which generation of the archive format the content follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveProfile {
    /// No large-object metadata attributes, no fallback path.
    Siard21,
    /// Large-object length/digest attributes and fallback path resolution.
    #[default]
    Siard22,
}

impl ArchiveProfile {
    pub fn reads_lob_metadata(&self) -> bool {
        matches!(self, ArchiveProfile::Siard22)
    }

    pub fn uses_lob_fallback(&self) -> bool {
        matches!(self, ArchiveProfile::Siard22)
    }
}

/// Archive input configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Zip file or extracted folder.
    pub path: PathBuf,

    /// Container for large objects referenced with a `../` prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auxiliary: Option<PathBuf>,

    /// Format profile (default: siard22).
    #[serde(default)]
    pub profile: ArchiveProfile,

    /// Keep large-object metadata only, never opening their content.
    #[serde(default)]
    pub ignore_lobs: bool,

    /// Check content against the per-table `.xsd` when present (default: true).
    #[serde(default = "default_true")]
    pub check_schema: bool,
}

/// Fetch sizes for cursor reads. Unset values use the defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FetchConfig {
    /// First size tried (default: 1000).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_size: Option<usize>,

    /// Size tried after the default fails (default: 10).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reduced_size: Option<usize>,

    /// Last size tried (default: 1).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimal_size: Option<usize>,
}

impl FetchConfig {
    pub fn get_default_size(&self) -> usize {
        self.default_size.unwrap_or(1000)
    }

    pub fn get_reduced_size(&self) -> usize {
        self.reduced_size.unwrap_or(10)
    }

    pub fn get_minimal_size(&self) -> usize {
        self.minimal_size.unwrap_or(1)
    }

    pub fn ladder(&self) -> FetchLadder {
        FetchLadder::new(
            self.get_default_size(),
            self.get_reduced_size(),
            self.get_minimal_size(),
        )
    }
}

fn default_postgres() -> String {
    "postgres".to_string()
}

fn default_pg_port() -> u16 {
    5432
}

fn default_disable() -> String {
    "disable".to_string()
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}
