//! Configuration management
//!
//! Handles loading and validation of configuration from:
//! - TOML files
//! - CLI arguments

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod types;

pub use types::{DiscoveryConfig, JobConfig, LoggingConfig};

use crate::encode::config::preset_target_usage;
use crate::encode::job::{map_preset_name, split_option_string};
use crate::encode::JobParameters;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Adapter discovery configuration
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// Default encode job
    #[serde(default)]
    pub job: JobConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Load the file at the default path, or fall back to defaults when it
    /// does not exist
    pub fn load_or_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default_config()),
        }
    }

    /// `$XDG_CONFIG_HOME/lamco-qsv/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("lamco-qsv").join("config.toml"))
    }

    /// Create default configuration
    pub fn default_config() -> Self {
        Config {
            discovery: DiscoveryConfig::default(),
            job: JobConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if let Some(fixture) = &self.discovery.runtime_fixture {
            if !fixture.exists() {
                anyhow::bail!("Runtime fixture not found: {:?}", fixture);
            }
        }

        if let Some(quality) = self.job.quality {
            if !quality.is_finite() {
                anyhow::bail!("Invalid quality: {}", quality);
            }
        }

        if let Some(preset) = &self.job.preset {
            match preset.as_str() {
                "speed" | "balanced" | "quality" => {}
                _ => anyhow::bail!("Invalid preset: {}", preset),
            }
        }

        if self.job.frame_rate_num == 0 || self.job.frame_rate_den == 0 {
            anyhow::bail!(
                "Invalid frame rate: {}/{}",
                self.job.frame_rate_num,
                self.job.frame_rate_den
            );
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Invalid log level: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "pretty" | "compact" | "json" => {}
            _ => anyhow::bail!("Invalid log format: {}", self.logging.format),
        }

        Ok(())
    }

    /// Whether the `[job]` section asks for a rate control target
    pub fn has_job(&self) -> bool {
        self.job.quality.is_some() || self.job.bitrate_kbps.unwrap_or(0) > 0
    }

    /// Build the job described by the `[job]` section
    ///
    /// The preset becomes a leading `target-usage` option so an explicit
    /// option in `options` still wins.
    pub fn to_job_parameters(&self) -> JobParameters {
        let job = &self.job;
        let mut params = match job.quality {
            Some(quality) => JobParameters::with_quality(job.encoder, quality),
            None => JobParameters::with_bitrate(job.encoder, job.bitrate_kbps.unwrap_or(0)),
        };
        params.bitrate_kbps = job.bitrate_kbps.unwrap_or(0);
        params.profile = job.profile.clone();
        params.frame_rate_num = job.frame_rate_num;
        params.frame_rate_den = job.frame_rate_den;
        params.pic_struct = job.pic_struct;
        params.memory_type = job.memory_type;

        if let Some(tu) = job
            .preset
            .as_deref()
            .and_then(|preset| preset_target_usage(map_preset_name(Some(preset))))
        {
            params.options.push(("target-usage".to_string(), tu.to_string()));
        }
        params.options.extend(split_option_string(&job.options));
        params
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
