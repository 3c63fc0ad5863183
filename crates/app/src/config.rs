use anyhow::{bail, Result};
use config::{Config, File as ConfigFile};
use idreg_attribute::DEFAULT_EXPIRED_DELETE_LIMIT;
use idreg_storage::DEFAULT_MAX_SCAN_ENTRIES;
use std::path::PathBuf;

/// Config file picked up when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "./config/idreg.toml";
/// Prefix of environment overrides, e.g. `IDREG_DATA_DIR`.
pub const ENV_PREFIX: &str = "IDREG";

pub const DEFAULT_MIGRATION_BATCH_LIMIT: usize = 10_000;

/// Node configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub config_path: Option<PathBuf>,

    // Storage
    pub data_dir: String,
    pub db_path: String,

    // Logging
    pub log_level: String,
    pub log_format: String,

    // Per-block work caps
    pub expired_delete_limit: usize,
    pub migration_batch_limit: usize,
    pub max_scan_entries: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            data_dir: "./data".to_string(),
            db_path: "./data/db".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            expired_delete_limit: DEFAULT_EXPIRED_DELETE_LIMIT,
            migration_batch_limit: DEFAULT_MIGRATION_BATCH_LIMIT,
            max_scan_entries: DEFAULT_MAX_SCAN_ENTRIES,
        }
    }
}

/// Limits handed to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppSettings {
    pub expired_delete_limit: usize,
    pub migration_batch_limit: usize,
    pub max_scan_entries: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        AppConfig::default().settings()
    }
}

impl AppConfig {
    /// Defaults, then the config file, then `IDREG_*` environment variables.
    pub fn load(config_path_override: Option<&str>) -> Result<Self> {
        let resolved_path = match config_path_override {
            Some(path) => {
                let path = PathBuf::from(path);
                if !path.exists() {
                    bail!(
                        "Configuration file {} not found (specified via --config)",
                        path.display()
                    );
                }
                Some(path)
            }
            None => Some(PathBuf::from(DEFAULT_CONFIG_PATH)).filter(|p| p.exists()),
        };

        let mut builder = Config::builder();
        if let Some(path) = &resolved_path {
            builder = builder.add_source(ConfigFile::from(path.as_path()));
        }
        builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX));
        let config = builder.build()?;

        let defaults = Self::default();
        let data_dir = get_string_value(&config, &["data_dir", "storage.data_dir"])
            .unwrap_or(defaults.data_dir);
        let db_path = get_string_value(&config, &["db_path", "storage.db_path"])
            .unwrap_or_else(|| format!("{data_dir}/db"));

        let loaded = Self {
            config_path: resolved_path,
            data_dir,
            db_path,
            log_level: get_string_value(&config, &["log_level", "logging.level"])
                .unwrap_or(defaults.log_level),
            log_format: get_string_value(&config, &["log_format", "logging.format"])
                .unwrap_or(defaults.log_format),
            expired_delete_limit: get_usize_value(
                &config,
                &["expired_delete_limit", "limits.expired_delete_limit"],
                defaults.expired_delete_limit,
            )?,
            migration_batch_limit: get_usize_value(
                &config,
                &["migration_batch_limit", "limits.migration_batch_limit"],
                defaults.migration_batch_limit,
            )?,
            max_scan_entries: get_usize_value(
                &config,
                &["max_scan_entries", "limits.max_scan_entries"],
                defaults.max_scan_entries,
            )?,
        };
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<()> {
        if !matches!(self.log_format.as_str(), "pretty" | "json") {
            bail!("log_format must be \"pretty\" or \"json\", got {:?}", self.log_format);
        }
        for (label, value) in [
            ("expired_delete_limit", self.expired_delete_limit),
            ("migration_batch_limit", self.migration_batch_limit),
            ("max_scan_entries", self.max_scan_entries),
        ] {
            if value == 0 {
                bail!("{label} must be positive");
            }
        }
        Ok(())
    }

    pub fn settings(&self) -> AppSettings {
        AppSettings {
            expired_delete_limit: self.expired_delete_limit,
            migration_batch_limit: self.migration_batch_limit,
            max_scan_entries: self.max_scan_entries,
        }
    }
}

fn get_string_value(config: &Config, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        config
            .get_string(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

fn get_usize_value(config: &Config, keys: &[&str], default: usize) -> Result<usize> {
    match get_string_value(config, keys) {
        Some(raw) => Ok(raw.parse()?),
        None => Ok(default),
    }
}
