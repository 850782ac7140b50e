//! Optional TOML configuration supplying defaults for CLI options.
//!
//! Precedence is command line, then this file, then built-in defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::pipeline::{MAX_WORKERS, MIN_WORKERS};

/// Longest accepted per-host delay, in milliseconds.
pub const MAX_RATE_LIMIT_MS: u64 = 60_000;

/// Most retries accepted per request.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// File-backed defaults. Every key is optional; unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Download root.
    pub output_dir: Option<PathBuf>,
    /// Worker count (same range as `--workers`).
    pub workers: Option<usize>,
    /// Soft limit on pending tasks.
    pub queue_capacity: Option<usize>,
    /// Retries after the first attempt.
    pub max_retries: Option<u32>,
    /// Per-host delay in milliseconds.
    pub rate_limit: Option<u64>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// Longest idle gap between body reads, in seconds.
    pub read_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Validates values against the same ranges as the command line.
    ///
    /// # Errors
    ///
    /// Names the offending key in the error message.
    pub fn validate(&self) -> Result<()> {
        if let Some(workers) = self.workers
            && !(MIN_WORKERS..=MAX_WORKERS).contains(&workers)
        {
            bail!(
                "Invalid config value for `workers`: {workers}. Expected range: {MIN_WORKERS}..={MAX_WORKERS}"
            );
        }
        if self.queue_capacity == Some(0) {
            bail!("Invalid config value for `queue_capacity`: 0. Expected at least 1");
        }
        if let Some(max_retries) = self.max_retries
            && max_retries > MAX_RETRIES_LIMIT
        {
            bail!(
                "Invalid config value for `max_retries`: {max_retries}. Expected range: 0..={MAX_RETRIES_LIMIT}"
            );
        }
        if let Some(rate_limit) = self.rate_limit
            && rate_limit > MAX_RATE_LIMIT_MS
        {
            bail!(
                "Invalid config value for `rate_limit`: {rate_limit}. Expected range: 0..={MAX_RATE_LIMIT_MS}"
            );
        }
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Where the configuration came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Path consulted, if one could be resolved.
    pub path: Option<PathBuf>,
    /// Parsed values; default when no file exists.
    pub config: FileConfig,
    /// Whether a file was actually read.
    pub loaded_from_file: bool,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/podcatcher/config.toml`
/// 2. `$HOME/.config/podcatcher/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("podcatcher")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("podcatcher")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads configuration from `explicit` if given, else from the default path
/// when that file exists.
///
/// # Errors
///
/// Fails when an explicit file is missing, or any file cannot be read,
/// parsed or validated.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: load_file_config(path)?,
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(default_path) if default_path.exists() => {
            let config = load_file_config(default_path)?;
            Ok(LoadedConfig {
                path,
                config,
                loaded_from_file: true,
            })
        }
        _ => Ok(LoadedConfig {
            path,
            config: FileConfig::default(),
            loaded_from_file: false,
        }),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

/// Parses and validates a TOML document.
///
/// # Errors
///
/// Fails on syntax errors, unknown keys, wrong types or out-of-range values.
pub fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let cfg: FileConfig = toml::from_str(raw)?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_partial_fields() {
        let cfg = parse_config_str(
            r#"
workers = 8
output_dir = "/srv/podcasts"
"#,
        )
        .expect("partial config should parse");
        assert_eq!(cfg.workers, Some(8));
        assert_eq!(cfg.output_dir, Some(PathBuf::from("/srv/podcasts")));
        assert!(cfg.rate_limit.is_none());
    }

    #[test]
    fn test_parse_config_empty_is_default() {
        let cfg = parse_config_str("").expect("empty config should parse");
        assert_eq!(cfg, FileConfig::default());
    }

    #[test]
    fn test_parse_config_supports_comments() {
        let cfg = parse_config_str("max_retries = 5 # be patient\n").expect("should parse");
        assert_eq!(cfg.max_retries, Some(5));
    }

    #[test]
    fn test_parse_config_rejects_invalid_workers() {
        for raw in ["workers = 0", "workers = 65"] {
            let err = parse_config_str(raw).expect_err("invalid workers expected");
            assert!(err.to_string().contains("workers"), "{err}");
        }
    }

    #[test]
    fn test_parse_config_rejects_invalid_rate_limit() {
        let err = parse_config_str("rate_limit = 60001").expect_err("invalid rate_limit expected");
        assert!(err.to_string().contains("rate_limit"));
    }

    #[test]
    fn test_parse_config_rejects_zero_queue_capacity() {
        let err = parse_config_str("queue_capacity = 0").expect_err("zero capacity expected");
        assert!(err.to_string().contains("queue_capacity"));
    }

    #[test]
    fn test_parse_config_rejects_invalid_timeout_value() {
        let err = parse_config_str("connect_timeout_secs = 0").expect_err("invalid timeout");
        assert!(err.to_string().contains("connect_timeout_secs"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_keys() {
        let err = parse_config_str("unknown_key = 123").expect_err("unknown key error expected");
        assert!(err.to_string().contains("unknown_key"));
    }

    #[test]
    fn test_parse_config_rejects_wrong_type() {
        let err = parse_config_str(r#"workers = "many""#).expect_err("type error expected");
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn test_load_config_explicit_path() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("podcatcher.toml");
        fs::write(&path, "workers = 2\nrate_limit = 500\n").expect("write config");

        let loaded = load_config(Some(&path)).expect("explicit config should load");
        assert!(loaded.loaded_from_file);
        assert_eq!(loaded.config.workers, Some(2));
        assert_eq!(loaded.config.rate_limit, Some(500));
    }

    #[test]
    fn test_load_config_missing_explicit_path_fails() {
        let err = load_config(Some(Path::new("/no/such/podcatcher.toml")))
            .expect_err("missing explicit config must fail");
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
