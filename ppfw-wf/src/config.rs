//! Service configuration
//!
//! Each setting resolves command line → environment → TOML file → default.
//! clap covers the first two tiers through `env = ...` on every argument.

use clap::Parser;
use std::path::PathBuf;

use ppfw_common::config::{load_toml_config, resolve_root_folder, TomlConfig, ROOT_FOLDER_ENV};
use ppfw_common::Result;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5740";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;
pub const DEFAULT_ADVANCE_RATE_LIMIT: u32 = 30;

/// Command-line arguments for ppfw-wf
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "ppfw-wf")]
#[command(about = "PPF intervention workflow service")]
#[command(version)]
pub struct Args {
    /// Root folder holding ppfw.db and photo storage
    #[arg(long, env = "PPFW_ROOT_FOLDER")]
    pub root_folder: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "PPFW_BIND")]
    pub bind: Option<String>,

    /// Explicit config.toml
    #[arg(long, env = "PPFW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Largest accepted request body, in bytes
    #[arg(long, env = "PPFW_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: Option<usize>,

    /// Advances per caller per minute (0 disables limiting)
    #[arg(long, env = "PPFW_ADVANCE_RATE_LIMIT")]
    pub advance_rate_limit: Option<u32>,
}

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub bind_addr: String,
    pub max_upload_bytes: usize,
    pub advance_rate_limit_per_minute: u32,
    pub log_level: String,
}

impl ServiceConfig {
    /// Load the TOML tier and merge it under `args`
    pub fn resolve(args: &Args) -> Result<Self> {
        let toml = load_toml_config(args.config.as_deref())?;
        Ok(Self::merge(args, toml.as_ref()))
    }

    pub fn merge(args: &Args, toml: Option<&TomlConfig>) -> Self {
        let root_folder = resolve_root_folder(args.root_folder.as_deref(), ROOT_FOLDER_ENV, toml);

        Self {
            root_folder,
            bind_addr: args
                .bind
                .clone()
                .or_else(|| toml.and_then(|t| t.bind_addr.clone()))
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            max_upload_bytes: args
                .max_upload_bytes
                .or_else(|| toml.and_then(|t| t.max_upload_bytes))
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            advance_rate_limit_per_minute: args
                .advance_rate_limit
                .or_else(|| toml.and_then(|t| t.advance_rate_limit_per_minute))
                .unwrap_or(DEFAULT_ADVANCE_RATE_LIMIT),
            log_level: toml
                .map(|t| t.logging.level.clone())
                .unwrap_or_else(|| "info".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_wins_over_toml() {
        let toml = TomlConfig::from_toml_str(
            r#"
            root_folder = "/srv/ppfw"
            bind_addr = "0.0.0.0:9000"
            advance_rate_limit_per_minute = 5

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        let args = Args {
            root_folder: Some(PathBuf::from("/tmp/cli-root")),
            bind: Some("127.0.0.1:6000".into()),
            ..Default::default()
        };

        let config = ServiceConfig::merge(&args, Some(&toml));
        assert_eq!(config.root_folder, PathBuf::from("/tmp/cli-root"));
        assert_eq!(config.bind_addr, "127.0.0.1:6000");
        assert_eq!(config.advance_rate_limit_per_minute, 5);
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_defaults_without_toml() {
        let args = Args {
            root_folder: Some(PathBuf::from("/tmp/x")),
            ..Default::default()
        };
        let config = ServiceConfig::merge(&args, None);
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.advance_rate_limit_per_minute, DEFAULT_ADVANCE_RATE_LIMIT);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_args_parse_flags() {
        let args = Args::parse_from(["ppfw-wf", "--bind", "0.0.0.0:1", "--advance-rate-limit", "0"]);
        assert_eq!(args.bind.as_deref(), Some("0.0.0.0:1"));
        assert_eq!(args.advance_rate_limit, Some(0));
    }
}
