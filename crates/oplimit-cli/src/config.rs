use anyhow::{Context, Result};
use confyg::{env, Confygery};
use oplimit_core::Limits;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for oplimit.
///
/// Configuration is loaded from multiple sources with the following priority:
/// 1. CLI arguments (highest priority)
/// 2. Environment variables (OPLIMIT_* prefix)
/// 3. Config file (~/.config/oplimit/config.toml)
/// 4. Built-in defaults (lowest priority)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Read/write operations per second.
    ///
    /// Can be set via:
    /// - CLI: --rate 20
    /// - ENV: OPLIMIT_LIMIT_RATE
    /// - Config: limit_rate = 20
    #[serde(default = "default_limit_rate")]
    pub limit_rate: u32,

    /// Operations allowed ahead of the pace. Zero means every operation
    /// waits for its turn.
    ///
    /// Can be set via:
    /// - CLI: --burst 5
    /// - ENV: OPLIMIT_MAX_BURST
    /// - Config: max_burst = 5
    #[serde(default)]
    pub max_burst: usize,

    /// Size of the buffer used per read operation, in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limit_rate: default_limit_rate(),
            max_burst: 0,
            chunk_size: default_chunk_size(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_path = config_file_path();

        let mut builder = Confygery::new().context("Failed to create config builder")?;

        if config_path.exists() {
            let path_str = config_path
                .to_str()
                .ok_or_else(|| anyhow::anyhow!("Config path contains invalid UTF-8"))?;
            builder
                .add_file(path_str)
                .context("Failed to load config file")?;
        }

        let env_opts = env::Options::with_top_level("oplimit");
        builder
            .add_env(env_opts)
            .context("Failed to load environment variables")?;

        let config: Self = builder.build().context("Failed to build configuration")?;

        Ok(config)
    }

    /// Apply CLI overrides on top of the loaded values.
    pub fn with_overrides(mut self, rate: Option<u32>, burst: Option<usize>) -> Self {
        if let Some(rate) = rate {
            self.limit_rate = rate;
        }
        if let Some(burst) = burst {
            self.max_burst = burst;
        }
        self
    }

    /// Validated limiter parameters.
    pub fn limits(&self) -> Result<Limits> {
        Limits::new(self.limit_rate, self.max_burst).context("Invalid limiter settings")
    }
}

fn default_limit_rate() -> u32 {
    10
}

fn default_chunk_size() -> usize {
    4096
}

/// Get the config file path.
///
/// Returns:
/// - Linux: ~/.config/oplimit/config.toml
/// - macOS: ~/Library/Application Support/oplimit/config.toml
/// - Windows: %APPDATA%\oplimit\config.toml
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("oplimit")
        .join("config.toml")
}

/// Get the example config file content.
pub fn example_config() -> &'static str {
    r#"# oplimit Configuration File
#
# Configuration is loaded from multiple sources with the following priority:
# 1. CLI arguments (highest priority)
# 2. Environment variables (OPLIMIT_* prefix)
# 3. This config file
# 4. Built-in defaults (lowest priority)

# Read/write operations per second.
#
# Pacing runs in cycles of floor(100 / limit_rate) seconds, so rates that
# do not divide 100 are approximated, and rates above 100 are not paced.
#
# Can also be set via:
# - CLI: oplimit --rate 20 relay
# - Environment: OPLIMIT_LIMIT_RATE=20
limit_rate = 10

# Operations allowed ahead of the pace (0 = no burst).
#
# Can also be set via:
# - CLI: oplimit --burst 5 relay
# - Environment: OPLIMIT_MAX_BURST=5
max_burst = 0

# Bytes requested per read operation.
#chunk_size = 4096
"#
}

/// Create default config file if it doesn't exist.
///
/// Returns true if a new file was created, false if it already existed.
pub fn ensure_config_file() -> Result<bool> {
    let config_path = config_file_path();

    if config_path.exists() {
        return Ok(false);
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    std::fs::write(&config_path, example_config()).context("Failed to write config file")?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.limit_rate, 10);
        assert_eq!(config.max_burst, 0);
        assert_eq!(config.chunk_size, 4096);
    }

    #[test]
    fn test_config_load() {
        // Should not fail even if config file doesn't exist
        let result = Config::load();
        assert!(result.is_ok());
    }

    #[test]
    fn test_overrides_take_priority() {
        let config = Config::default().with_overrides(Some(50), Some(8));
        assert_eq!(config.limit_rate, 50);
        assert_eq!(config.max_burst, 8);

        let config = Config::default().with_overrides(None, None);
        assert_eq!(config.limit_rate, 10);
    }

    #[test]
    fn test_zero_rate_fails_validation() {
        let config = Config::default().with_overrides(Some(0), None);
        assert!(config.limits().is_err());
    }
}
