/// Batch configuration
use loudnorm::{check_target, NormalizeError, NormalizerSettings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file read when `LOUDNORM_CONFIG` is not set
pub const DEFAULT_CONFIG_FILE: &str = "loudnorm.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Normalizer(#[from] NormalizeError),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchConfig {
    #[serde(default)]
    pub normalizer: NormalizerSettings,

    #[serde(default = "default_batch")]
    pub batch: BatchSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchSettings {
    #[serde(default)]
    pub inputs: Vec<PathBuf>,

    #[serde(default = "default_target_lufs")]
    pub target_lufs: f64,

    #[serde(default = "default_output_folder")]
    pub output_folder: PathBuf,

    /// Where to write the JSON outcome report, if anywhere
    #[serde(default)]
    pub report_path: Option<PathBuf>,
}

impl BatchConfig {
    /// Load configuration from `LOUDNORM_CONFIG` (or `loudnorm.toml`) and environment
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var_os("LOUDNORM_CONFIG") {
            Some(path) => Self::load_from(Some(Path::new(&path))),
            None => Self::load_from(None),
        }
    }

    /// Load from an explicit file, which must then exist, or the default one if present
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path).required(true));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        // Override with environment variables, e.g. LOUDNORM_BATCH__TARGET_LUFS
        settings = settings.add_source(
            config::Environment::with_prefix("LOUDNORM")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("batch.inputs")
                .try_parsing(true),
        );

        Ok(settings.build()?.try_deserialize()?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch.inputs.is_empty() {
            return Err(ConfigError::Invalid(
                "no input files (set [batch] inputs or LOUDNORM_BATCH__INPUTS)".to_string(),
            ));
        }

        if self.batch.output_folder.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "output folder must not be empty".to_string(),
            ));
        }

        check_target(self.batch.target_lufs)?;
        self.normalizer.validate()?;

        Ok(())
    }
}

// Default values
fn default_batch() -> BatchSettings {
    BatchSettings {
        inputs: Vec::new(),
        target_lufs: default_target_lufs(),
        output_folder: default_output_folder(),
        report_path: None,
    }
}

fn default_target_lufs() -> f64 {
    -16.0
}

fn default_output_folder() -> PathBuf {
    PathBuf::from(loudnorm::DEFAULT_OUTPUT_FOLDER)
}
