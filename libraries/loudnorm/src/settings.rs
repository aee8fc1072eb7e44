/// Normalizer settings
use crate::error::{NormalizeError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Tool locations and loudnorm parameters shared by both passes
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NormalizerSettings {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// True-peak ceiling in dBTP
    #[serde(default = "default_true_peak_dbtp")]
    pub true_peak_dbtp: f64,

    /// Loudness-range target in LU
    #[serde(default = "default_loudness_range_lu")]
    pub loudness_range_lu: f64,

    /// Treat mono input as dual mono during measurement
    #[serde(default = "default_dual_mono")]
    pub dual_mono: bool,

    /// Files must be strictly longer than this
    #[serde(default = "default_min_duration_secs")]
    pub min_duration_secs: f64,

    /// Per-invocation timeout, 0 disables it
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl NormalizerSettings {
    /// Validate parameter ranges against what the loudnorm filter accepts
    pub fn validate(&self) -> Result<()> {
        if !(-9.0..=0.0).contains(&self.true_peak_dbtp) {
            return Err(NormalizeError::InvalidSettings(format!(
                "true_peak_dbtp {} must be between -9 and 0",
                self.true_peak_dbtp
            )));
        }

        if !(1.0..=50.0).contains(&self.loudness_range_lu) {
            return Err(NormalizeError::InvalidSettings(format!(
                "loudness_range_lu {} must be between 1 and 50",
                self.loudness_range_lu
            )));
        }

        if !self.min_duration_secs.is_finite() || self.min_duration_secs < 0.0 {
            return Err(NormalizeError::InvalidSettings(format!(
                "min_duration_secs {} must be a non-negative number",
                self.min_duration_secs
            )));
        }

        if self.ffmpeg_path.as_os_str().is_empty() || self.ffprobe_path.as_os_str().is_empty() {
            return Err(NormalizeError::InvalidSettings(
                "ffmpeg_path and ffprobe_path must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Timeout applied to every external invocation
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

// Default values
fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_true_peak_dbtp() -> f64 {
    crate::DEFAULT_TRUE_PEAK_DBTP
}

fn default_loudness_range_lu() -> f64 {
    crate::DEFAULT_LOUDNESS_RANGE_LU
}

fn default_dual_mono() -> bool {
    true
}

fn default_min_duration_secs() -> f64 {
    crate::MIN_DURATION_SECS
}

fn default_timeout_secs() -> u64 {
    600
}

impl Default for NormalizerSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            true_peak_dbtp: default_true_peak_dbtp(),
            loudness_range_lu: default_loudness_range_lu(),
            dual_mono: default_dual_mono(),
            min_duration_secs: default_min_duration_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}
