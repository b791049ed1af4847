//! Startup configuration for one server instance.
//!
//! Resolution order: `format-server.json` in the working directory (defaults
//! when absent), then `FORMAT_SERVER_*` environment variables (a `.env` file
//! next to the config is loaded first), then validation.

use crate::DEFAULT_BODY_LIMIT_BYTES;
use crate::error::config::ConfigError;
use crate::session::shutdown::{DrainMode, DrainPolicy};

use common::ErrorLocation;

use std::env;
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "format-server.json";
const DOTENV_FILE_NAME: &str = ".env";
const CONFIG_VERSION: u32 = 1;

pub const ENV_BACKEND: &str = "FORMAT_SERVER_BACKEND";
pub const ENV_INSTANCE_MODE: &str = "FORMAT_SERVER_INSTANCE_MODE";
pub const ENV_PORT_FILE_DIR: &str = "FORMAT_SERVER_PORT_FILE_DIR";
pub const ENV_NODE_PROJECT_DIR: &str = "FORMAT_SERVER_NODE_PROJECT_DIR";

/// Smallest accepted body limit; the style config endpoint alone needs a few KiB.
const MIN_BODY_LIMIT_BYTES: usize = 1024;

// ============================================
// ENUMS WITH DEFAULTS
// ============================================

/// Which formatter endpoints this instance mounts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Prettier,
    Eslint,
    TsFmt,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "prettier" => Ok(BackendKind::Prettier),
            "eslint" => Ok(BackendKind::Eslint),
            "tsfmt" => Ok(BackendKind::TsFmt),
            other => Err(format!(
                "unknown backend '{other}' (expected prettier, eslint or tsfmt)"
            )),
        }
    }
}

impl Display for BackendKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        let name = match self {
            BackendKind::Prettier => "prettier",
            BackendKind::Eslint => "eslint",
            BackendKind::TsFmt => "tsfmt",
        };
        formatter.write_str(name)
    }
}

/// Whether the instance id argument is required.
///
/// Never inferred from the arguments: in `Multi` mode a missing id must stop
/// startup instead of silently falling back to the shared `server.port`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InstanceMode {
    #[default]
    Single,
    Multi,
}

impl FromStr for InstanceMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(InstanceMode::Single),
            "multi" => Ok(InstanceMode::Multi),
            other => Err(format!(
                "unknown instance mode '{other}' (expected single or multi)"
            )),
        }
    }
}

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShutdownConfig {
    #[serde(default = "default_ack_delay_ms")]
    pub ack_delay_ms: u64,
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
    #[serde(default = "default_force")]
    pub force: bool,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            ack_delay_ms: default_ack_delay_ms(),
            grace_period_ms: default_grace_period_ms(),
            force: default_force(),
        }
    }
}

impl ShutdownConfig {
    pub fn drain_policy(&self) -> DrainPolicy {
        DrainPolicy {
            ack_delay: Duration::from_millis(self.ack_delay_ms),
            grace_period: Duration::from_millis(self.grace_period_ms),
            mode: if self.force {
                DrainMode::Force
            } else {
                DrainMode::Cooperative
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub backend: BackendKind,

    #[serde(default)]
    pub instance_mode: InstanceMode,

    /// Directory receiving the port file; the working directory when unset.
    #[serde(default)]
    pub port_file_dir: Option<PathBuf>,

    /// npm project whose `node_modules/.bin` is searched for engine executables.
    #[serde(default)]
    pub node_project_dir: Option<PathBuf>,

    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,

    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            backend: BackendKind::default(),
            instance_mode: InstanceMode::default(),
            port_file_dir: None,
            node_project_dir: None,
            body_limit_bytes: default_body_limit_bytes(),
            shutdown: ShutdownConfig::default(),
        }
    }
}

// ============================================
// RESOLUTION SOURCES
// ============================================

/// Outcome of loading the `.env` file next to the config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DotenvStatus {
    Absent,
    Loaded(PathBuf),
    /// Unparseable; nothing from it was applied.
    Invalid { path: PathBuf, reason: String },
}

/// Where a resolved [`ServerConfig`] came from.
///
/// Resolution runs before logging is set up, so it is recorded here and
/// logged afterwards with [`ConfigSources::log`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSources {
    /// `None` when the defaults were used.
    pub config_file: Option<PathBuf>,
    pub dotenv: DotenvStatus,
    pub env_overrides: Vec<&'static str>,
}

impl ConfigSources {
    pub fn log(&self) {
        match &self.dotenv {
            DotenvStatus::Absent => {}
            DotenvStatus::Loaded(path) => info!("Loaded .env from: {}", path.display()),
            DotenvStatus::Invalid { path, reason } => {
                warn!("Failed to parse .env at {}: {reason}", path.display())
            }
        }

        match &self.config_file {
            Some(path) => info!("Config loaded from {}", path.display()),
            None => info!("Config file {CONFIG_FILE_NAME} not found, using defaults"),
        }

        if !self.env_overrides.is_empty() {
            info!("Environment overrides: {}", self.env_overrides.join(", "));
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}
fn default_body_limit_bytes() -> usize {
    DEFAULT_BODY_LIMIT_BYTES
}
fn default_ack_delay_ms() -> u64 {
    200
}
fn default_grace_period_ms() -> u64 {
    5_000
}
fn default_force() -> bool {
    true
}

// ============================================
// IMPLEMENTATION
// ============================================

impl ServerConfig {
    /// Full startup resolution: `.env`, config file, environment, validation.
    pub fn resolve(working_dir: &Path) -> Result<Self, ConfigError> {
        let (config, sources) = Self::resolve_with_sources(working_dir)?;
        sources.log();
        Ok(config)
    }

    /// [`ServerConfig::resolve`] without logging; the caller logs the
    /// returned [`ConfigSources`] once its logger is installed.
    pub fn resolve_with_sources(working_dir: &Path) -> Result<(Self, ConfigSources), ConfigError> {
        let dotenv = load_dotenv(working_dir);

        let (mut config, config_file) = Self::load_from(working_dir)?;
        let env_overrides = config.apply_env_overrides()?;
        config.validate()?;

        Ok((
            config,
            ConfigSources {
                config_file,
                dotenv,
                env_overrides,
            },
        ))
    }

    /// Load config from {working_dir}/format-server.json.
    ///
    /// # Returns
    ///
    /// Returns defaults if the file is missing.
    /// Returns `Err(ConfigError)` if the file exists but is unreadable or corrupt.
    pub fn load(working_dir: &Path) -> Result<Self, ConfigError> {
        let (config, config_file) = Self::load_from(working_dir)?;
        match config_file {
            Some(path) => info!("Config loaded from {}", path.display()),
            None => info!(
                "Config file not found at {}, using defaults",
                working_dir.join(CONFIG_FILE_NAME).display()
            ),
        }
        Ok(config)
    }

    /// The config and the file it came from (`None` for defaults).
    fn load_from(working_dir: &Path) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok((Self::default(), None));
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::ReadError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        let config: ServerConfig =
            serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            })?;

        Ok((config, Some(config_path)))
    }

    /// Apply `FORMAT_SERVER_*` variables on top of the file values.
    ///
    /// Returns the names of the variables that were applied.
    pub fn apply_env_overrides(&mut self) -> Result<Vec<&'static str>, ConfigError> {
        let mut applied = Vec::new();

        if let Some(value) = read_env(ENV_BACKEND)? {
            self.backend = value.parse().map_err(|reason| ConfigError::EnvError {
                location: ErrorLocation::from(Location::caller()),
                variable: ENV_BACKEND.to_string(),
                reason,
            })?;
            applied.push(ENV_BACKEND);
        }

        if let Some(value) = read_env(ENV_INSTANCE_MODE)? {
            self.instance_mode = value.parse().map_err(|reason| ConfigError::EnvError {
                location: ErrorLocation::from(Location::caller()),
                variable: ENV_INSTANCE_MODE.to_string(),
                reason,
            })?;
            applied.push(ENV_INSTANCE_MODE);
        }

        if let Some(value) = read_env(ENV_PORT_FILE_DIR)? {
            self.port_file_dir = Some(PathBuf::from(value));
            applied.push(ENV_PORT_FILE_DIR);
        }

        if let Some(value) = read_env(ENV_NODE_PROJECT_DIR)? {
            self.node_project_dir = Some(PathBuf::from(value));
            applied.push(ENV_NODE_PROJECT_DIR);
        }

        Ok(applied)
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid version: {} (expected 1-{})",
                    self.version, CONFIG_VERSION
                ),
            });
        }

        if self.body_limit_bytes < MIN_BODY_LIMIT_BYTES {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid body limit: {} (must be at least {MIN_BODY_LIMIT_BYTES} bytes)",
                    self.body_limit_bytes
                ),
            });
        }

        if let Some(ref dir) = self.port_file_dir
            && dir.as_os_str().is_empty()
        {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "port_file_dir cannot be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Directory the port file is published into.
    pub fn port_file_dir(&self, working_dir: &Path) -> PathBuf {
        resolve_against(working_dir, self.port_file_dir.as_deref())
    }

    /// Directory containing `node_modules` for engine lookup.
    pub fn node_project_dir(&self, working_dir: &Path) -> PathBuf {
        resolve_against(working_dir, self.node_project_dir.as_deref())
    }
}

fn resolve_against(working_dir: &Path, configured: Option<&Path>) -> PathBuf {
    match configured {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => working_dir.join(path),
        None => working_dir.to_path_buf(),
    }
}

#[track_caller]
fn read_env(variable: &str) -> Result<Option<String>, ConfigError> {
    match env::var(variable) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => {
            debug!("Using {variable} override: {value}");
            Ok(Some(value))
        }
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::EnvError {
            location: ErrorLocation::from(Location::caller()),
            variable: variable.to_string(),
            reason: "contains invalid unicode".to_string(),
        }),
    }
}

fn load_dotenv(working_dir: &Path) -> DotenvStatus {
    let env_path = working_dir.join(DOTENV_FILE_NAME);
    if !env_path.exists() {
        return DotenvStatus::Absent;
    }

    match dotenvy::from_path(&env_path) {
        Ok(()) => DotenvStatus::Loaded(env_path),
        Err(e) => DotenvStatus::Invalid {
            path: env_path,
            reason: e.to_string(),
        },
    }
}
