//! Configuration system for the Syncboard client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/syncboard/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;
use std::time::Duration;

use syncboard_proto::board::{BoardId, Role};
use uuid::Uuid;

use crate::client::EngineConfig;
use crate::recon::RefetchConfig;
use crate::bridge::ReconnectConfig;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// The board id is not a valid UUID.
    #[error("invalid board id {value}: {source}")]
    InvalidBoardId {
        /// The offending value.
        value: String,
        /// Underlying parse error.
        source: uuid::Error,
    },

    /// The role string is not a known role.
    #[error(transparent)]
    InvalidRole(#[from] syncboard_proto::board::ParseEnumError),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    network: NetworkFileConfig,
    sync: SyncFileConfig,
    board: BoardFileConfig,
}

/// `[network]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct NetworkFileConfig {
    hub_url: Option<String>,
}

/// `[sync]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SyncFileConfig {
    fetch_retries: Option<u32>,
    fetch_backoff_ms: Option<u64>,
    reconnect_initial_ms: Option<u64>,
    reconnect_max_ms: Option<u64>,
    reconnect_multiplier: Option<f64>,
}

/// `[board]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct BoardFileConfig {
    board_id: Option<String>,
    role: Option<String>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for a Syncboard client application.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Syncboard synchronization client")]
pub struct CliArgs {
    /// Hub server WebSocket URL (e.g., `ws://localhost:9100/ws`).
    #[arg(long, env = "SYNCBOARD_HUB_URL")]
    pub hub_url: Option<String>,

    /// Board to synchronize (UUID).
    #[arg(long, env = "SYNCBOARD_BOARD_ID")]
    pub board_id: Option<String>,

    /// Local user's role on the board (admin, member, viewer).
    #[arg(long, env = "SYNCBOARD_ROLE")]
    pub role: Option<String>,

    /// Path to config file (default: `~/.config/syncboard/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "SYNCBOARD_LOG")]
    pub log_level: String,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    // -- Network --
    /// Hub server WebSocket URL.
    pub hub_url: String,

    // -- Sync --
    /// Retries after a failed board fetch attempt.
    pub fetch_retries: u32,
    /// Fixed delay between fetch attempts.
    pub fetch_backoff: Duration,
    /// Delay before the first hub reconnect attempt.
    pub reconnect_initial: Duration,
    /// Ceiling on the reconnect delay.
    pub reconnect_max: Duration,
    /// Multiplier applied to the reconnect delay after each failure.
    pub reconnect_multiplier: f64,

    // -- Board --
    /// Board to synchronize, if configured.
    pub board_id: Option<BoardId>,
    /// Local user's role on the board.
    pub role: Role,

    // -- Logging --
    /// Log level filter string.
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let refetch = RefetchConfig::default();
        let reconnect = ReconnectConfig::default();
        Self {
            hub_url: "ws://127.0.0.1:9100/ws".to_string(),
            fetch_retries: refetch.retries,
            fetch_backoff: refetch.backoff,
            reconnect_initial: reconnect.initial,
            reconnect_max: reconnect.max,
            reconnect_multiplier: reconnect.multiplier,
            board_id: None,
            role: Role::Member,
            log_level: "info".to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an
    /// error. If no `--config` is given, the default path is tried and a
    /// missing file is treated as empty config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed, or if a board id or role value is malformed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, &file)
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let board_id = cli
            .board_id
            .clone()
            .or_else(|| file.board.board_id.clone())
            .map(|value| {
                Uuid::parse_str(&value)
                    .map(BoardId::from_uuid)
                    .map_err(|source| ConfigError::InvalidBoardId { value, source })
            })
            .transpose()?;

        let role = cli
            .role
            .clone()
            .or_else(|| file.board.role.clone())
            .map(|value| value.parse::<Role>())
            .transpose()?
            .unwrap_or(defaults.role);

        Ok(Self {
            hub_url: cli
                .hub_url
                .clone()
                .or_else(|| file.network.hub_url.clone())
                .unwrap_or(defaults.hub_url),
            fetch_retries: file.sync.fetch_retries.unwrap_or(defaults.fetch_retries),
            fetch_backoff: file
                .sync
                .fetch_backoff_ms
                .map_or(defaults.fetch_backoff, Duration::from_millis),
            reconnect_initial: file
                .sync
                .reconnect_initial_ms
                .map_or(defaults.reconnect_initial, Duration::from_millis),
            reconnect_max: file
                .sync
                .reconnect_max_ms
                .map_or(defaults.reconnect_max, Duration::from_millis),
            reconnect_multiplier: file
                .sync
                .reconnect_multiplier
                .unwrap_or(defaults.reconnect_multiplier),
            board_id,
            role,
            log_level: cli.log_level.clone(),
        })
    }

    /// Engine tuning derived from this configuration.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            refetch: RefetchConfig {
                retries: self.fetch_retries,
                backoff: self.fetch_backoff,
            },
            reconnect: ReconnectConfig {
                initial: self.reconnect_initial,
                max: self.reconnect_max,
                multiplier: self.reconnect_multiplier,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("syncboard").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
