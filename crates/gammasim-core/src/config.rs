//! Configuration loading and typed config structures for simulation campaigns.
//!
//! A campaign is configured by one YAML file (conventionally
//! `gammasim.yaml`). Every section and field has a default except the
//! object name, which must be given explicitly before anything is sampled.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use gammasim_types::{CountMode, DomainPolicy};

use crate::run::SamplerConfig;

/// Environment variable overriding [`OutputConfig::dir`].
pub const OUTPUT_DIR_ENV: &str = "GAMMASIM_OUTPUT_DIR";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but is not usable.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level campaign configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// Sampling settings shared by every observation.
    #[serde(default)]
    pub sampling: SamplingConfig,

    /// Which inputs to simulate and how wide to fan out.
    #[serde(default)]
    pub campaign: CampaignConfig,

    /// Where event files and the observation index go.
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `GAMMASIM_OUTPUT_DIR` overrides `output.dir` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.output.apply_env_overrides();
        Ok(config)
    }

    /// Check the settings that have no usable default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the object name is missing or
    /// blank, or the parallelism is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let named = self
            .sampling
            .object_name
            .as_deref()
            .is_some_and(|name| !name.trim().is_empty());
        if !named {
            return Err(ConfigError::Invalid {
                reason: "sampling.object_name must be set".to_owned(),
            });
        }
        if self.campaign.max_parallel == 0 {
            return Err(ConfigError::Invalid {
                reason: "campaign.max_parallel must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

/// Sampling settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SamplingConfig {
    /// Name written into every event table. No default.
    #[serde(default)]
    pub object_name: Option<String>,

    /// Base seed; observation `i` of the campaign uses `seed + i`.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// How counts are realised.
    #[serde(default)]
    pub count_mode: CountMode,

    /// How kernel domain violations are handled.
    #[serde(default)]
    pub domain_policy: DomainPolicy,
}

impl SamplingConfig {
    /// Run configuration for the observation with campaign seed `seed`.
    pub fn sampler_config(&self, seed: u64) -> SamplerConfig {
        SamplerConfig {
            object_name: self.object_name.clone(),
            seed,
            count_mode: self.count_mode,
            domain_policy: self.domain_policy,
            created_at: None,
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            object_name: None,
            seed: default_seed(),
            count_mode: CountMode::default(),
            domain_policy: DomainPolicy::default(),
        }
    }
}

/// Campaign inputs and parallelism.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CampaignConfig {
    /// JSON bundle holding observations and component maps.
    #[serde(default = "default_bundle")]
    pub bundle: PathBuf,

    /// Observation ids to simulate; all observations in the bundle when empty.
    #[serde(default)]
    pub observations: Vec<u64>,

    /// Upper bound on observations sampled concurrently.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            bundle: default_bundle(),
            observations: Vec::new(),
            max_parallel: default_max_parallel(),
        }
    }
}

/// Output locations.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving one event file per observation.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// File name of the observation index inside `dir`.
    #[serde(default = "default_index_file")]
    pub index_file: String,
}

impl OutputConfig {
    /// Override the output directory from `GAMMASIM_OUTPUT_DIR` when set.
    pub fn apply_env_overrides(&mut self) {
        self.override_dir(std::env::var(OUTPUT_DIR_ENV).ok());
    }

    fn override_dir(&mut self, value: Option<String>) {
        if let Some(dir) = value.filter(|dir| !dir.is_empty()) {
            self.dir = PathBuf::from(dir);
        }
    }

    /// Full path of the observation index.
    pub fn index_path(&self) -> PathBuf {
        self.dir.join(&self.index_file)
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            index_file: default_index_file(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

const fn default_seed() -> u64 {
    42
}

fn default_bundle() -> PathBuf {
    PathBuf::from("input-bundle.json")
}

const fn default_max_parallel() -> usize {
    4
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("events")
}

fn default_index_file() -> String {
    "obs-index.json".to_owned()
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_need_an_object_name() {
        let config = SimulationConfig::default();
        assert_eq!(config.sampling.seed, 42);
        assert_eq!(config.sampling.count_mode, CountMode::Poisson);
        assert_eq!(config.sampling.domain_policy, DomainPolicy::Drop);
        assert_eq!(config.output.index_path(), PathBuf::from("events/obs-index.json"));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
sampling:
  object_name: "Crab Nebula"
  seed: 2024
  count_mode: rounded
  domain_policy: clamp

campaign:
  bundle: "data/crab-bundle.json"
  observations: [23523, 23526]
  max_parallel: 2

output:
  dir: "out"
  index_file: "index.json"

logging:
  level: "debug"
  json: true
"#;
        let mut config = SimulationConfig::parse(yaml).unwrap();
        // Pin the directory regardless of the ambient environment.
        config.output.dir = PathBuf::from("out");

        assert_eq!(config.sampling.object_name.as_deref(), Some("Crab Nebula"));
        assert_eq!(config.sampling.seed, 2024);
        assert_eq!(config.sampling.count_mode, CountMode::Rounded);
        assert_eq!(config.sampling.domain_policy, DomainPolicy::Clamp);
        assert_eq!(config.campaign.observations, vec![23523, 23526]);
        assert_eq!(config.campaign.max_parallel, 2);
        assert_eq!(config.output.index_path(), PathBuf::from("out/index.json"));
        assert!(config.logging.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = SimulationConfig::parse("sampling:\n  object_name: vela\n").unwrap();
        assert_eq!(config.sampling.seed, 42);
        assert_eq!(config.campaign, CampaignConfig::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn zero_parallelism_is_invalid() {
        let config = SimulationConfig::parse("sampling:\n  object_name: vela\ncampaign:\n  max_parallel: 0\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn output_dir_override() {
        let mut output = OutputConfig::default();
        output.override_dir(Some(String::new()));
        assert_eq!(output.dir, PathBuf::from("events"));
        output.override_dir(Some("/data/sim".to_owned()));
        assert_eq!(output.dir, PathBuf::from("/data/sim"));
    }

    #[test]
    fn sampler_config_carries_campaign_seed() {
        let config = SimulationConfig::parse("sampling:\n  object_name: vela\n").unwrap();
        let run = config.sampling.sampler_config(45);
        assert_eq!(run.seed, 45);
        assert_eq!(run.object_name.as_deref(), Some("vela"));
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        assert!(matches!(
            SimulationConfig::parse("sampling: [unclosed"),
            Err(ConfigError::Yaml { .. })
        ));
    }
}
