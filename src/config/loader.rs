//! Configuration Loader
//!
//! Environment-aware loading: base YAML file, optional per-environment
//! overlay (`scanner.<env>.yaml` next to it), then `SCANNER__*` environment
//! variables. Layering and deserialization go through the `config` crate.

use super::error::{ConfigResult, ConfigurationError};
use super::ScannerConfig;
use config::{Config, Environment, File, FileFormat};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "SCANNER_CONFIG_PATH";

/// Prefix of environment overrides, e.g. `SCANNER__LIVENESS__BACKEND=redis`
pub const ENV_OVERRIDE_PREFIX: &str = "SCANNER";

const DEFAULT_CONFIG_FILE: &str = "config/scanner.yaml";

/// Loaded, validated service configuration
#[derive(Debug)]
pub struct ConfigManager {
    config: ScannerConfig,
    environment: String,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    ///
    /// Uses `SCANNER_CONFIG_PATH` when set (the file must exist), otherwise
    /// `config/scanner.yaml` if present, otherwise defaults.
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();

        let path = match env::var(CONFIG_PATH_ENV) {
            Ok(explicit) => {
                let path = PathBuf::from(explicit);
                if !path.is_file() {
                    return Err(ConfigurationError::ConfigFileNotFound { path });
                }
                Some(path)
            }
            Err(_) => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                default.is_file().then_some(default)
            }
        };

        Self::load_with_sources(path.as_deref(), &environment, true)
    }

    /// Load configuration from a specific file
    pub fn load_from_path(path: &Path) -> ConfigResult<Arc<ConfigManager>> {
        if !path.is_file() {
            return Err(ConfigurationError::ConfigFileNotFound {
                path: path.to_path_buf(),
            });
        }
        Self::load_with_sources(Some(path), &Self::detect_environment(), true)
    }

    /// Load configuration with explicit sources
    ///
    /// Useful for tests that must not depend on process environment.
    pub fn load_with_sources(
        path: Option<&Path>,
        environment: &str,
        env_overrides: bool,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            debug!(path = %path.display(), environment, "Loading scanner configuration");
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml).required(true));

            if let Some(overlay) = Self::environment_overlay(path, environment) {
                debug!(overlay = %overlay.display(), "Applying environment overlay");
                builder =
                    builder.add_source(File::from(overlay).format(FileFormat::Yaml).required(true));
            }
        }

        if env_overrides {
            builder = builder.add_source(
                Environment::with_prefix(ENV_OVERRIDE_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let source_name = path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "defaults".to_string());

        let config: ScannerConfig = builder
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| ConfigurationError::load_error(&source_name, e))?;

        config.validate()?;

        info!(
            environment,
            source = %source_name,
            liveness_backend = ?config.liveness.backend,
            scheduler_enabled = config.scheduler.enabled,
            "Scanner configuration loaded"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_path: path.map(Path::to_path_buf),
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Detect current environment from environment variables
    pub fn detect_environment() -> String {
        env::var("SCANNER_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    /// `scanner.yaml` + `test` -> `scanner.test.yaml`, if it exists
    fn environment_overlay(base: &Path, environment: &str) -> Option<PathBuf> {
        let stem = base.file_stem()?.to_str()?;
        let extension = base.extension().and_then(|e| e.to_str()).unwrap_or("yaml");
        let overlay = base.with_file_name(format!("{stem}.{environment}.{extension}"));
        overlay.is_file().then_some(overlay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LivenessBackendKind;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults_without_file() {
        let manager = ConfigManager::load_with_sources(None, "test", false).unwrap();
        assert_eq!(manager.config().liveness.backend, LivenessBackendKind::Memory);
        assert!(manager.config_path().is_none());
        assert_eq!(manager.environment(), "test");
    }

    #[test]
    fn test_partial_file_keeps_defaults_for_missing_fields() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "scanner.yaml",
            r#"
liveness:
  backend: redis
  redis_url: "redis://localhost:6379/0"
scheduler:
  due_scans_interval_seconds: 30
"#,
        );

        let manager = ConfigManager::load_with_sources(Some(&path), "development", false).unwrap();
        let config = manager.config();
        assert_eq!(config.liveness.backend, LivenessBackendKind::Redis);
        assert_eq!(config.liveness.ttl_seconds, 15);
        assert_eq!(config.scheduler.due_scans_interval_seconds, 30);
        assert_eq!(config.scheduler.statistics_cron, "0 0 * * * *");
    }

    #[test]
    fn test_environment_overlay_is_applied() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "scanner.yaml", "scheduler:\n  enabled: true\n");
        write(&dir, "scanner.test.yaml", "scheduler:\n  enabled: false\n");

        let manager = ConfigManager::load_with_sources(Some(&path), "test", false).unwrap();
        assert!(!manager.config().scheduler.enabled);

        let manager = ConfigManager::load_with_sources(Some(&path), "production", false).unwrap();
        assert!(manager.config().scheduler.enabled);
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "scanner.yaml",
            "worker_selection:\n  max_cpu_percent: 150\n",
        );

        let err = ConfigManager::load_with_sources(Some(&path), "test", false).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidValue { .. }));
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = ConfigManager::load_from_path(Path::new("/nonexistent/scanner.yaml")).unwrap_err();
        assert!(matches!(err, ConfigurationError::ConfigFileNotFound { .. }));
    }
}
