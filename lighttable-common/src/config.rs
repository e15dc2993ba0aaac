//! Configuration loading
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`LIGHTTABLE_*`, bound by the binary's CLI parser)
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! The TOML file is located via, in order: an explicit `--config` path,
//! `$LIGHTTABLE_CONFIG`, `./lighttable.toml`, the user config directory
//! (`~/.config/lighttable/config.toml` on Linux), and
//! `/etc/lighttable/config.toml`. A missing file is not an error; the
//! compiled defaults apply.

use crate::files::DEFAULT_MAX_UPLOAD_BYTES;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "LIGHTTABLE_CONFIG";

const CONFIG_FILE_NAME: &str = "lighttable.toml";

// ========================================
// TOML file
// ========================================

/// Contents of the TOML config file; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Root of the browsable media tree
    pub data_dir: Option<PathBuf>,
    /// JSON user directory
    pub users_file: Option<PathBuf>,
    pub bind: Option<String>,
    pub port: Option<u16>,
    /// Secret used to sign session tokens
    pub session_secret: Option<String>,
    /// Mark the session cookie `Secure`
    pub secure_cookies: Option<bool>,
    pub max_upload_bytes: Option<u64>,
    pub encoder: EncoderToml,
    pub jobs: JobsToml,
    pub logging: LoggingToml,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderToml {
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsToml {
    pub completed_retention_secs: Option<u64>,
    pub failed_retention_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingToml {
    /// Log level (trace, debug, info, warn, error)
    pub level: Option<String>,
}

/// Parse a TOML config file
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))
}

/// Candidate config file locations in lookup order
pub fn config_file_candidates(explicit: Option<&Path>) -> Vec<PathBuf> {
    if let Some(path) = explicit {
        return vec![path.to_path_buf()];
    }
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return vec![PathBuf::from(path)];
        }
    }

    let mut candidates = vec![PathBuf::from(CONFIG_FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("lighttable").join("config.toml"));
    }
    if cfg!(unix) {
        candidates.push(PathBuf::from("/etc/lighttable/config.toml"));
    }
    candidates
}

/// Locate and load the config file
///
/// An explicitly named file (argument or environment) must exist; the
/// implicit locations are optional and fall back to an empty config.
///
/// Runs before logging is set up, so it logs nothing; the caller reports the
/// returned source path once the subscriber exists.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<(TomlConfig, Option<PathBuf>)> {
    let named = explicit.is_some()
        || std::env::var(CONFIG_ENV_VAR).map(|v| !v.is_empty()).unwrap_or(false);

    for candidate in config_file_candidates(explicit) {
        if candidate.exists() {
            return Ok((read_toml_config(&candidate)?, Some(candidate)));
        }
        if named {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                candidate.display()
            )));
        }
    }

    Ok((TomlConfig::default(), None))
}

// ========================================
// Resolved settings
// ========================================

/// Compiled defaults, the lowest-priority tier
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub data_dir: PathBuf,
    pub users_file: PathBuf,
    pub bind: String,
    pub port: u16,
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
    pub completed_retention_secs: u64,
    pub failed_retention_secs: u64,
    pub log_level: String,
}

impl Default for CompiledDefaults {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            users_file: PathBuf::from("./config/users.json"),
            bind: "127.0.0.1".to_string(),
            port: 5780,
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
            completed_retention_secs: 5,
            failed_retention_secs: 30,
            log_level: "info".to_string(),
        }
    }
}

/// Values supplied on the command line or via environment variables
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_dir: Option<PathBuf>,
    pub users_file: Option<PathBuf>,
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub session_secret: Option<String>,
    pub ffmpeg: Option<PathBuf>,
    pub ffprobe: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// External encoder binaries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderSettings {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

/// How long terminal transcode jobs stay visible to polling clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSettings {
    pub completed_retention_secs: u64,
    pub failed_retention_secs: u64,
}

/// Fully resolved service settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub users_file: PathBuf,
    pub bind: String,
    pub port: u16,
    /// `None` when neither CLI, environment nor file provides one
    pub session_secret: Option<String>,
    pub secure_cookies: bool,
    pub max_upload_bytes: u64,
    pub encoder: EncoderSettings,
    pub jobs: JobSettings,
    pub log_level: String,
}

impl Settings {
    /// Merge the tiers: overrides, then file, then compiled defaults
    pub fn resolve(overrides: ConfigOverrides, file: TomlConfig, defaults: CompiledDefaults) -> Self {
        Self {
            data_dir: overrides.data_dir.or(file.data_dir).unwrap_or(defaults.data_dir),
            users_file: overrides
                .users_file
                .or(file.users_file)
                .unwrap_or(defaults.users_file),
            bind: overrides.bind.or(file.bind).unwrap_or(defaults.bind),
            port: overrides.port.or(file.port).unwrap_or(defaults.port),
            session_secret: overrides
                .session_secret
                .or(file.session_secret)
                .filter(|s| !s.is_empty()),
            secure_cookies: file.secure_cookies.unwrap_or(false),
            max_upload_bytes: file.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            encoder: EncoderSettings {
                ffmpeg: overrides
                    .ffmpeg
                    .or(file.encoder.ffmpeg)
                    .unwrap_or(defaults.ffmpeg),
                ffprobe: overrides
                    .ffprobe
                    .or(file.encoder.ffprobe)
                    .unwrap_or(defaults.ffprobe),
            },
            jobs: JobSettings {
                completed_retention_secs: file
                    .jobs
                    .completed_retention_secs
                    .unwrap_or(defaults.completed_retention_secs),
                failed_retention_secs: file
                    .jobs
                    .failed_retention_secs
                    .unwrap_or(defaults.failed_retention_secs),
            },
            log_level: overrides
                .log_level
                .or(file.logging.level)
                .unwrap_or(defaults.log_level),
        }
    }

    /// `bind:port` for the listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Generate a random session secret (64 hex characters)
///
/// Used when no secret is configured; sessions then do not survive a
/// restart.
pub fn generate_session_secret() -> String {
    use rand::Rng;

    let bytes: [u8; 32] = rand::thread_rng().gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
