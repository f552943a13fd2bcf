use std::fs::read_to_string;

use serde::{self, Deserialize};
use tracing::{debug, error, info};

use crate::error::{DatastoreError, Result};
use crate::kv_store::WriteOptions;

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Configuration {
    pub path: Option<String>,

    pub sync_writes: bool,
    pub report_wal_size: bool,

    pub cache_capacity: Option<u64>,
    pub flush_every_ms: Option<u64>,
}

impl Configuration {
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn parse_config_file(file: &str) -> Result<Configuration> {
        info!("parsing configuration file: {}", file);

        let file_contents = read_to_string(file).inspect_err(|e| {
            error!("failed to read configuration file {}, err: {e}", file);
        })?;

        let ret = Self::parse(&file_contents)?;

        debug!("successfully parsed configuration file");
        debug!("configuration: {:?}", ret);
        Ok(ret)
    }

    /// Reads `config_file` when given, lets `path_override` replace its
    /// `path`, and validates the result.
    pub fn load(config_file: Option<&str>, path_override: Option<&str>) -> Result<Configuration> {
        let mut conf = match config_file {
            Some(file) => Self::parse_config_file(file)?,
            None => Configuration::default(),
        };
        if let Some(path) = path_override {
            info!("overriding path from command line argument: {}", path);
            conf.path = Some(path.to_string());
        }
        validate_configuration(&conf)?;
        Ok(conf)
    }

    pub fn parse(contents: &str) -> Result<Configuration> {
        toml::from_str(contents).map_err(|e| {
            error!("failed to parse configuration, err: {e}");
            DatastoreError::InvalidConfig(e.to_string())
        })
    }
}

pub fn validate_configuration(config: &Configuration) -> Result<()> {
    match config.path.as_deref() {
        None | Some("") => {
            return Err(DatastoreError::InvalidConfig("path is required".into()));
        }
        _ => {}
    }

    if config.flush_every_ms == Some(0) {
        return Err(DatastoreError::InvalidConfig(
            "flush_every_ms must be positive".into(),
        ));
    }

    Ok(())
}

/// Per-handle flags fixed when the datastore is constructed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatastoreOptions {
    pub sync_writes: bool,
    pub report_wal_size: bool,
}

impl DatastoreOptions {
    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            sync: self.sync_writes,
        }
    }
}

impl From<&Configuration> for DatastoreOptions {
    fn from(conf: &Configuration) -> Self {
        Self {
            sync_writes: conf.sync_writes,
            report_wal_size: conf.report_wal_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn test_config_parse() {
        let config_file1 = "tests/test_config/config1.toml";
        let config1 = Configuration::parse_config_file(config_file1).unwrap();

        assert_eq!(config1.path.as_deref(), Some("/var/lib/dsled"));
        assert!(config1.sync_writes);
        assert!(!config1.report_wal_size);
        assert_eq!(config1.cache_capacity, Some(64 * 1024 * 1024));
        assert_eq!(config1.flush_every_ms, Some(500));
        assert!(validate_configuration(&config1).is_ok());

        let opts = DatastoreOptions::from(&config1);
        assert!(opts.write_options().sync);
    }

    #[test]
    pub fn test_defaults() {
        let conf = Configuration::parse("path = \"/tmp/x\"").unwrap();
        assert!(!conf.sync_writes);
        assert!(!conf.report_wal_size);
        assert!(conf.cache_capacity.is_none());
        assert_eq!(DatastoreOptions::from(&conf), DatastoreOptions::default());
    }

    #[test]
    pub fn test_validation() {
        assert!(matches!(
            validate_configuration(&Configuration::default()),
            Err(DatastoreError::InvalidConfig(_))
        ));

        let mut conf = Configuration::with_path("/tmp/x");
        assert!(validate_configuration(&conf).is_ok());
        conf.flush_every_ms = Some(0);
        assert!(validate_configuration(&conf).is_err());
    }

    #[test]
    pub fn test_load_path_override() {
        let config_file1 = "tests/test_config/config1.toml";

        let conf = Configuration::load(Some(config_file1), None).unwrap();
        assert_eq!(conf.path.as_deref(), Some("/var/lib/dsled"));

        let conf = Configuration::load(Some(config_file1), Some("/tmp/override")).unwrap();
        assert_eq!(conf.path.as_deref(), Some("/tmp/override"));
        // the rest of the file still applies
        assert!(conf.sync_writes);
        assert_eq!(conf.flush_every_ms, Some(500));

        let conf = Configuration::load(None, Some("/tmp/only-path")).unwrap();
        assert_eq!(conf.path.as_deref(), Some("/tmp/only-path"));
        assert!(!conf.sync_writes);
    }

    #[test]
    pub fn test_load_requires_path() {
        assert!(matches!(
            Configuration::load(None, None),
            Err(DatastoreError::InvalidConfig(_))
        ));
        assert!(matches!(
            Configuration::load(None, Some("")),
            Err(DatastoreError::InvalidConfig(_))
        ));
        assert!(matches!(
            Configuration::load(Some("tests/test_config/missing.toml"), Some("/tmp/x")),
            Err(DatastoreError::Io(_))
        ));
    }

    #[test]
    pub fn test_bad_toml_and_missing_file() {
        assert!(matches!(
            Configuration::parse("sync_writes = \"yes\""),
            Err(DatastoreError::InvalidConfig(_))
        ));
        assert!(matches!(
            Configuration::parse_config_file("tests/test_config/missing.toml"),
            Err(DatastoreError::Io(_))
        ));
    }
}
