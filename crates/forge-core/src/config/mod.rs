//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::agents::CommandRunner;
use crate::agents::command::{DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_REVIEW_TIMEOUT};
use crate::domain::locking::LockConfig;
use crate::scheduler::{DEFAULT_MAX_CONCURRENCY, GateMode, SchedulerConfig};

/// Forge configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub locking: LockingConfig,
    pub scheduler: SchedulingConfig,
    pub review: ReviewConfig,
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockingConfig {
    pub max_duration_secs: u64,
    pub retry_interval_ms: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingConfig {
    pub max_concurrency: usize,
    pub parallel: bool,
    pub pre_validate: bool,
    pub post_verify: bool,
    pub gate_mode: GateMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub timeout_secs: u64,
    pub max_output_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub timeout_secs: u64,
}

impl Default for LockingConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 15 * 60,
            retry_interval_ms: 500,
            sweep_interval_secs: 60,
        }
    }
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            parallel: true,
            pre_validate: true,
            post_verify: true,
            gate_mode: GateMode::Advisory,
        }
    }
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            command: None,
            timeout_secs: DEFAULT_REVIEW_TIMEOUT.as_secs(),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: None,
            timeout_secs: 15 * 60,
        }
    }
}

const KEYS: [&str; 13] = [
    "locking.max_duration_secs",
    "locking.retry_interval_ms",
    "locking.sweep_interval_secs",
    "scheduler.max_concurrency",
    "scheduler.parallel",
    "scheduler.pre_validate",
    "scheduler.post_verify",
    "scheduler.gate_mode",
    "review.command",
    "review.timeout_secs",
    "review.max_output_bytes",
    "agent.command",
    "agent.timeout_secs",
];

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow!("Invalid value for {}: {} ({})", key, value, e))
}

fn optional_command(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("FORGE_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("forge")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or the defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.locking.max_duration_secs == 0 {
            return Err(anyhow!("locking.max_duration_secs must be greater than zero"));
        }
        if self.locking.retry_interval_ms == 0 {
            return Err(anyhow!("locking.retry_interval_ms must be greater than zero"));
        }
        if self.locking.sweep_interval_secs == 0 {
            return Err(anyhow!("locking.sweep_interval_secs must be greater than zero"));
        }
        if self.scheduler.max_concurrency == 0 {
            return Err(anyhow!("scheduler.max_concurrency must be at least 1"));
        }
        if self.review.timeout_secs == 0 || self.agent.timeout_secs == 0 {
            return Err(anyhow!("Command timeouts must be greater than zero"));
        }
        if self.review.max_output_bytes == 0 {
            return Err(anyhow!("review.max_output_bytes must be greater than zero"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        let value = match key {
            "locking.max_duration_secs" => self.locking.max_duration_secs.to_string(),
            "locking.retry_interval_ms" => self.locking.retry_interval_ms.to_string(),
            "locking.sweep_interval_secs" => self.locking.sweep_interval_secs.to_string(),

            "scheduler.max_concurrency" => self.scheduler.max_concurrency.to_string(),
            "scheduler.parallel" => self.scheduler.parallel.to_string(),
            "scheduler.pre_validate" => self.scheduler.pre_validate.to_string(),
            "scheduler.post_verify" => self.scheduler.post_verify.to_string(),
            "scheduler.gate_mode" => self.scheduler.gate_mode.to_string(),

            "review.command" => self
                .review
                .command
                .clone()
                .unwrap_or_else(|| "(not set)".to_string()),
            "review.timeout_secs" => self.review.timeout_secs.to_string(),
            "review.max_output_bytes" => self.review.max_output_bytes.to_string(),

            "agent.command" => self
                .agent
                .command
                .clone()
                .unwrap_or_else(|| "(not set)".to_string()),
            "agent.timeout_secs" => self.agent.timeout_secs.to_string(),

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `forge config list` to see available keys.",
                    key
                ));
            }
        };
        Ok(value)
    }

    /// Set a configuration value by key
    ///
    /// The value is validated against the whole configuration; on error the
    /// configuration is left unchanged.
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut updated = self.clone();
        match key {
            "locking.max_duration_secs" => {
                updated.locking.max_duration_secs = parse_value(key, value)?
            }
            "locking.retry_interval_ms" => {
                updated.locking.retry_interval_ms = parse_value(key, value)?
            }
            "locking.sweep_interval_secs" => {
                updated.locking.sweep_interval_secs = parse_value(key, value)?
            }

            "scheduler.max_concurrency" => {
                updated.scheduler.max_concurrency = parse_value(key, value)?
            }
            "scheduler.parallel" => updated.scheduler.parallel = parse_value(key, value)?,
            "scheduler.pre_validate" => updated.scheduler.pre_validate = parse_value(key, value)?,
            "scheduler.post_verify" => updated.scheduler.post_verify = parse_value(key, value)?,
            "scheduler.gate_mode" => {
                updated.scheduler.gate_mode = value.parse().map_err(|e: String| anyhow!(e))?;
            }

            "review.command" => {
                if let Some(command) = optional_command(value) {
                    CommandRunner::parse(&command)?;
                }
                updated.review.command = optional_command(value);
            }
            "review.timeout_secs" => updated.review.timeout_secs = parse_value(key, value)?,
            "review.max_output_bytes" => updated.review.max_output_bytes = parse_value(key, value)?,

            "agent.command" => {
                if let Some(command) = optional_command(value) {
                    CommandRunner::parse(&command)?;
                }
                updated.agent.command = optional_command(value);
            }
            "agent.timeout_secs" => updated.agent.timeout_secs = parse_value(key, value)?,

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `forge config list` to see available keys.",
                    key
                ));
            }
        }
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        KEYS.iter()
            .map(|key| Ok((key.to_string(), self.get(key)?)))
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }

    /// Lock manager settings
    pub fn lock_config(&self) -> LockConfig {
        LockConfig::default()
            .with_max_duration(Duration::from_secs(self.locking.max_duration_secs))
            .with_retry_interval(Duration::from_millis(self.locking.retry_interval_ms))
            .with_sweep_interval(Duration::from_secs(self.locking.sweep_interval_secs))
    }

    /// Scheduler settings
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::default()
            .with_max_concurrency(self.scheduler.max_concurrency)
            .with_parallel(self.scheduler.parallel)
            .with_pre_validate(self.scheduler.pre_validate)
            .with_post_verify(self.scheduler.post_verify)
            .with_gate_mode(self.scheduler.gate_mode)
    }

    /// Runner for the configured review command, if any
    pub fn review_runner(&self) -> anyhow::Result<Option<CommandRunner>> {
        self.review
            .command
            .as_deref()
            .map(|command| -> anyhow::Result<CommandRunner> {
                Ok(CommandRunner::parse(command)?
                    .with_timeout(Duration::from_secs(self.review.timeout_secs))
                    .with_max_output_bytes(self.review.max_output_bytes))
            })
            .transpose()
    }

    /// Runner for the configured agent command, if any
    pub fn agent_runner(&self) -> anyhow::Result<Option<CommandRunner>> {
        self.agent
            .command
            .as_deref()
            .map(|command| -> anyhow::Result<CommandRunner> {
                Ok(CommandRunner::parse(command)?
                    .with_timeout(Duration::from_secs(self.agent.timeout_secs))
                    .with_max_output_bytes(self.review.max_output_bytes))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.locking.max_duration_secs, 900);
        assert_eq!(config.locking.retry_interval_ms, 500);
        assert_eq!(config.locking.sweep_interval_secs, 60);
        assert_eq!(config.scheduler.max_concurrency, 3);
        assert!(config.scheduler.parallel);
        assert_eq!(config.scheduler.gate_mode, GateMode::Advisory);
        assert_eq!(config.review.timeout_secs, 180);
        assert_eq!(config.review.max_output_bytes, 10 * 1024 * 1024);
        assert!(config.review.command.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_get_and_set() {
        let mut config = Config::default();

        config.set("scheduler.max_concurrency", "5").unwrap();
        config.set("scheduler.gate_mode", "blocking").unwrap();
        config.set("review.command", "reviewer --strict").unwrap();

        assert_eq!(config.get("scheduler.max_concurrency").unwrap(), "5");
        assert_eq!(config.get("scheduler.gate_mode").unwrap(), "blocking");
        assert_eq!(config.get("review.command").unwrap(), "reviewer --strict");
        assert_eq!(config.get("agent.command").unwrap(), "(not set)");

        config.set("review.command", "").unwrap();
        assert!(config.review.command.is_none());
    }

    #[test]
    fn test_invalid_set_leaves_config_unchanged() {
        let mut config = Config::default();

        assert!(config.set("scheduler.max_concurrency", "0").is_err());
        assert!(config.set("scheduler.parallel", "maybe").is_err());
        assert!(config.set("scheduler.gate_mode", "strict").is_err());
        assert!(config.set("review.command", "reviewer 'oops").is_err());
        assert!(config.set("nope.key", "1").is_err());
        assert!(config.get("nope.key").is_err());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_list_covers_every_key() {
        let keys: Vec<String> = Config::default()
            .list()
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys.len(), KEYS.len());
        assert!(keys.contains(&"locking.max_duration_secs".to_string()));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.set("locking.max_duration_secs", "60").unwrap();
        config.set("agent.command", "my-agent run").unwrap();
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[scheduler]\nparallel = false\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(!config.scheduler.parallel);
        assert_eq!(config.scheduler.max_concurrency, 3);
        assert_eq!(config.locking, LockingConfig::default());
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[scheduler]\nmax_concurrency = 0\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_runtime_configs() {
        let mut config = Config::default();
        config.set("locking.max_duration_secs", "30").unwrap();
        config.set("scheduler.parallel", "false").unwrap();

        assert_eq!(config.lock_config().max_duration, Duration::from_secs(30));
        assert!(!config.scheduler_config().parallel);
        assert!(config.review_runner().unwrap().is_none());

        config.set("review.command", "reviewer").unwrap();
        assert_eq!(config.review_runner().unwrap().unwrap().program(), "reviewer");
    }
}
