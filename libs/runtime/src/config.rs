use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::home_dir::resolve_home_dir;

/// Subdirectory under the platform home used when `server.home_dir` is empty.
pub const DEFAULT_HOME_SUBDIR: &str = ".users-server";

/// Environment prefix for overrides, e.g. `APP__SERVER__PORT=8087`.
pub const ENV_PREFIX: &str = "APP__";

/// Application configuration: strongly-typed global sections plus a
/// per-module configuration bag.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    /// Database configuration (optional; the server refuses to start without it).
    pub database: Option<DatabaseConfig>,
    /// Logging configuration (optional, uses defaults if None).
    pub logging: Option<LoggingConfig>,
    /// Per-module configuration bag: module_name → arbitrary JSON/YAML value.
    #[serde(default)]
    pub modules: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub home_dir: String, // normalized to an absolute path on load
    pub host: String,
    pub port: u16,
    /// Per-request handler timeout; 0 means the 30s default.
    #[serde(default)]
    pub timeout_sec: u64,
    #[serde(default)]
    pub cors_enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// SQLite DSN, e.g. "sqlite://database/users.db" (relative to home_dir) or "sqlite::memory:".
    pub url: String,
    /// Maximum number of pooled connections (defaults to 10).
    pub max_conns: Option<u32>,
    /// SQLite busy timeout in milliseconds (defaults to 5000).
    pub busy_timeout_ms: Option<u32>,
}

/// Logging configuration - maps subsystem names to their logging settings.
/// Key "default" is the catch-all for targets without an explicit section.
pub type LoggingConfig = HashMap<String, Section>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Section {
    pub console_level: String, // "info", "debug", "error", "off"
    #[serde(default)]
    pub file: String, // "logs/users.log"; empty disables file output
    #[serde(default)]
    pub file_level: String,
    #[serde(default)]
    pub max_backups: Option<usize>,
    #[serde(default)]
    pub max_size_mb: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            home_dir: String::new(),
            host: "127.0.0.1".to_string(),
            port: 8087,
            timeout_sec: 0,
            cors_enabled: false,
        }
    }
}

/// Default logging: info on console, debug into a rotated JSON file.
pub fn default_logging_config() -> LoggingConfig {
    let mut logging = HashMap::new();
    logging.insert(
        "default".to_string(),
        Section {
            console_level: "info".to_string(),
            file: "logs/users-server.log".to_string(),
            file_level: "debug".to_string(),
            max_backups: Some(3),
            max_size_mb: Some(100),
        },
    );
    logging
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: Some(DatabaseConfig {
                url: "sqlite://database/users.db".to_string(),
                max_conns: Some(10),
                busy_timeout_ms: Some(5000),
            }),
            logging: Some(default_logging_config()),
            modules: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Layered loading: defaults → YAML file → `APP__*` environment variables.
    /// `server.home_dir` is normalized into an absolute, existing directory.
    pub fn load_layered<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Yaml},
            Figment,
        };

        // Optional sections stay None unless YAML/ENV provide them.
        let base = AppConfig {
            server: ServerConfig::default(),
            database: None,
            logging: None,
            modules: HashMap::new(),
        };

        let mut config: AppConfig = Figment::new()
            .merge(Serialized::defaults(base))
            .merge(Yaml::file(config_path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract config from figment")?;

        normalize_home_dir_inplace(&mut config.server)
            .context("Failed to resolve server.home_dir")?;
        Ok(config)
    }

    /// Load from `config_path` when given, otherwise use defaults.
    pub fn load_or_default<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => {
                let path = path.as_ref();
                if !path.exists() {
                    anyhow::bail!("config file not found: {}", path.display());
                }
                Self::load_layered(path)
            }
            None => {
                let mut c = Self::default();
                normalize_home_dir_inplace(&mut c.server)
                    .context("Failed to resolve server.home_dir (defaults)")?;
                Ok(c)
            }
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config to YAML")
    }

    /// Apply overrides from command line arguments.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(port) = args.port {
            self.server.port = port;
        }

        let logging = self.logging.get_or_insert_with(default_logging_config);
        if let Some(default_section) = logging.get_mut("default") {
            match args.verbose {
                0 => {}
                1 => default_section.console_level = "debug".to_string(),
                _ => default_section.console_level = "trace".to_string(),
            }
        }

        if args.mock {
            let db = self.database.get_or_insert(DatabaseConfig {
                url: String::new(),
                max_conns: None,
                busy_timeout_ms: None,
            });
            db.url = "sqlite::memory:".to_string();
        }
    }

    /// Typed view of `modules.<name>`; a missing section yields `T::default()`.
    pub fn module_config<T>(&self, name: &str) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        match self.modules.get(name) {
            Some(raw) => serde_json::from_value(raw.clone())
                .with_context(|| format!("invalid configuration for module '{name}'")),
            None => Ok(T::default()),
        }
    }

    /// Home directory as a path (already absolute after loading).
    pub fn home_dir(&self) -> PathBuf {
        PathBuf::from(&self.server.home_dir)
    }
}

/// Command line arguments relevant to configuration.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config: Option<String>,
    pub port: Option<u16>,
    pub print_config: bool,
    pub verbose: u8,
    pub mock: bool,
}

fn normalize_home_dir_inplace(server: &mut ServerConfig) -> Result<()> {
    let configured = if server.home_dir.trim().is_empty() {
        None
    } else {
        Some(server.home_dir.clone())
    };

    let resolved = resolve_home_dir(configured, DEFAULT_HOME_SUBDIR, true)
        .context("home_dir normalization failed")?;
    server.home_dir = resolved.to_string_lossy().to_string();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::fs;
    use tempfile::tempdir;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct DummyModuleCfg {
        #[serde(default)]
        page: u32,
    }

    fn write_cfg(dir: &Path, yaml: &str) -> PathBuf {
        let p = dir.join("cfg.yaml");
        fs::write(&p, yaml).unwrap();
        p
    }

    #[test]
    fn default_config_structure() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8087);
        assert_eq!(config.server.home_dir, "");

        let db = config.database.as_ref().unwrap();
        assert_eq!(db.url, "sqlite://database/users.db");
        assert_eq!(db.max_conns, Some(10));

        let logging = config.logging.as_ref().unwrap();
        assert_eq!(logging["default"].console_level, "info");
        assert!(config.modules.is_empty());
    }

    #[test]
    fn load_layered_parses_sections_and_normalizes_home() {
        let tmp = tempdir().unwrap();
        let home = tmp.path().join("home");
        let yaml = format!(
            r#"
server:
  home_dir: "{}"
  host: "0.0.0.0"
  port: 9090
  timeout_sec: 15
database:
  url: "sqlite://users.db"
  max_conns: 4
logging:
  default:
    console_level: debug
    file: ""
modules:
  users:
    page: 7
"#,
            home.to_string_lossy().replace('\\', "/")
        );
        let cfg_path = write_cfg(tmp.path(), &yaml);

        let config = AppConfig::load_layered(&cfg_path).unwrap();
        assert!(PathBuf::from(&config.server.home_dir).is_absolute());
        assert!(home.exists());
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.timeout_sec, 15);
        assert_eq!(config.database.as_ref().unwrap().max_conns, Some(4));
        assert_eq!(config.logging.as_ref().unwrap()["default"].console_level, "debug");

        let module: DummyModuleCfg = config.module_config("users").unwrap();
        assert_eq!(module, DummyModuleCfg { page: 7 });
        let missing: DummyModuleCfg = config.module_config("absent").unwrap();
        assert_eq!(missing, DummyModuleCfg::default());
    }

    #[test]
    fn minimal_yaml_keeps_optional_sections_empty() {
        let tmp = tempdir().unwrap();
        let yaml = format!(
            "server:\n  home_dir: \"{}\"\n  host: localhost\n  port: 8080\n",
            tmp.path().join("h").to_string_lossy().replace('\\', "/")
        );
        let cfg_path = write_cfg(tmp.path(), &yaml);

        let config = AppConfig::load_layered(&cfg_path).unwrap();
        assert!(config.database.is_none());
        assert!(config.logging.is_none());
        assert_eq!(config.server.timeout_sec, 0);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let tmp = tempdir().unwrap();
        let err = AppConfig::load_or_default(Some(tmp.path().join("nope.yaml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn cli_overrides_port_verbosity_and_mock() {
        let mut config = AppConfig::default();
        let args = CliArgs {
            port: Some(3000),
            verbose: 2,
            mock: true,
            ..Default::default()
        };
        config.apply_cli_overrides(&args);

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.logging.as_ref().unwrap()["default"].console_level, "trace");
        assert_eq!(config.database.as_ref().unwrap().url, "sqlite::memory:");
    }

    #[test]
    fn verbose_levels() {
        for (verbose, expected) in [(0, "info"), (1, "debug"), (2, "trace"), (3, "trace")] {
            let mut config = AppConfig::default();
            config.apply_cli_overrides(&CliArgs {
                verbose,
                ..Default::default()
            });
            assert_eq!(
                config.logging.as_ref().unwrap()["default"].console_level,
                expected
            );
        }
    }

    #[test]
    fn invalid_module_section_is_reported() {
        let mut config = AppConfig::default();
        config
            .modules
            .insert("users".into(), serde_json::json!({ "page": "not-a-number" }));
        let err = config.module_config::<DummyModuleCfg>("users").unwrap_err();
        assert!(err.to_string().contains("users"));
    }

    #[test]
    fn yaml_roundtrip() {
        let config = AppConfig::default();
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("server:"));
        let back: AppConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.server.port, config.server.port);
    }
}
