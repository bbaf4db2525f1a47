//! Configuration loading and root folder resolution
//!
//! Root folder resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing TOML file is never fatal; a TOML file that exists but cannot be
//! parsed is a configuration error.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "PPFW_ROOT_FOLDER";

/// Environment variable naming an explicit config file
pub const CONFIG_FILE_ENV: &str = "PPFW_CONFIG";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "ppfw.db";

/// Photo storage directory inside the root folder
pub const PHOTO_DIR_NAME: &str = "photos";

/// Contents of `config.toml`
///
/// Every field is optional so partial files layer over compiled defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database and photo storage
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP bind address (e.g. "127.0.0.1:5740")
    #[serde(default)]
    pub bind_addr: Option<String>,

    /// Maximum accepted request body for photo uploads, in bytes
    #[serde(default)]
    pub max_upload_bytes: Option<usize>,

    /// Stage advances allowed per caller per minute (0 disables limiting)
    #[serde(default)]
    pub advance_rate_limit_per_minute: Option<u32>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }
}

/// Load the TOML config file
///
/// Looks at `explicit` first, then `PPFW_CONFIG`, then the platform locations.
/// Returns `Ok(None)` when no file exists.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<Option<TomlConfig>> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => std::env::var(CONFIG_FILE_ENV)
            .ok()
            .map(PathBuf::from)
            .or_else(default_config_path),
    };

    let Some(path) = path else {
        debug!("No config file found, using defaults");
        return Ok(None);
    };

    if !path.exists() {
        debug!("Config file {} does not exist, using defaults", path.display());
        return Ok(None);
    }

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    let config = TomlConfig::from_toml_str(&content)?;
    info!("Loaded configuration from {}", path.display());
    Ok(Some(config))
}

/// Get default configuration file path for the platform
fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("ppfw").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/ppfw/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Resolve the root folder following the priority order in the module docs
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_config: Option<&TomlConfig>,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(root) = toml_config.and_then(|c| c.root_folder.as_ref()) {
        return root.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/ppfw (or /var/lib/ppfw for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("ppfw"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/ppfw"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("ppfw"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/ppfw"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("ppfw"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\ppfw"))
    } else {
        PathBuf::from("./ppfw_data")
    }
}

/// Creates the root folder layout and derives file locations inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder and photo directory if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        std::fs::create_dir_all(self.photo_dir())?;
        Ok(())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }

    pub fn photo_dir(&self) -> PathBuf {
        self.root_folder.join(PHOTO_DIR_NAME)
    }
}
