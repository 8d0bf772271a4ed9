//! Configuration validation.

use super::Config;
use crate::error::{CodecError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.catalog.as_os_str().is_empty() {
        return Err(CodecError::Config("catalog is required".into()));
    }

    if let Some(source) = &config.source {
        if source.host.is_empty() {
            return Err(CodecError::Config("source.host is required".into()));
        }
        if source.database.is_empty() {
            return Err(CodecError::Config("source.database is required".into()));
        }
        if source.user.is_empty() {
            return Err(CodecError::Config("source.user is required".into()));
        }
        if source.r#type != "postgres" {
            return Err(CodecError::Config(format!(
                "source.type must be 'postgres', got '{}'",
                source.r#type
            )));
        }
    }

    if let Some(archive) = &config.archive {
        if archive.path.as_os_str().is_empty() {
            return Err(CodecError::Config("archive.path is required".into()));
        }
    }

    // Fetch ladder - only check explicitly set values against the effective ones
    let fetch = &config.fetch;
    if fetch.get_minimal_size() == 0 {
        return Err(CodecError::Config(
            "fetch.minimal_size must be at least 1".into(),
        ));
    }
    if fetch.get_reduced_size() <= fetch.get_minimal_size() {
        return Err(CodecError::Config(format!(
            "fetch.reduced_size ({}) must be greater than fetch.minimal_size ({})",
            fetch.get_reduced_size(),
            fetch.get_minimal_size()
        )));
    }
    if fetch.get_default_size() <= fetch.get_reduced_size() {
        return Err(CodecError::Config(format!(
            "fetch.default_size ({}) must be greater than fetch.reduced_size ({})",
            fetch.get_default_size(),
            fetch.get_reduced_size()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ArchiveConfig, ArchiveProfile, FetchConfig, SourceConfig};
    use std::path::PathBuf;

    fn valid_config() -> Config {
        Config {
            source: Some(SourceConfig {
                r#type: "postgres".to_string(),
                host: "localhost".to_string(),
                port: 5432,
                database: "app".to_string(),
                user: "reader".to_string(),
                password: "password".to_string(),
                ssl_mode: "disable".to_string(),
                connect_timeout_secs: 30,
            }),
            archive: Some(ArchiveConfig {
                path: PathBuf::from("db.siard"),
                auxiliary: None,
                profile: ArchiveProfile::Siard22,
                ignore_lobs: false,
                check_schema: true,
            }),
            fetch: FetchConfig::default(),
            catalog: PathBuf::from("catalog.yaml"),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_source_host() {
        let mut config = valid_config();
        config.source.as_mut().unwrap().host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_wrong_source_type() {
        let mut config = valid_config();
        config.source.as_mut().unwrap().r#type = "mssql".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_source_is_optional() {
        let mut config = valid_config();
        config.source = None;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_fetch_sizes_must_decrease() {
        let mut config = valid_config();
        config.fetch.reduced_size = Some(5000);
        assert!(validate(&config).is_err());

        let mut config = valid_config();
        config.fetch.minimal_size = Some(0);
        assert!(validate(&config).is_err());

        let mut config = valid_config();
        config.fetch = FetchConfig {
            default_size: Some(500),
            reduced_size: Some(50),
            minimal_size: Some(5),
        };
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_source_config_debug_redacts_password() {
        let mut config = valid_config();
        config.source.as_mut().unwrap().password = "super_secret_password_123".to_string();
        let debug_output = format!("{:?}", config.source);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_123"),
            "Debug output should not contain actual password value"
        );
    }
}
