//! First pass: EBU R128 loudness measurement
//!
//! Runs the loudnorm filter in measurement-only mode (`-f null -`) and
//! reads the statistics it prints to stderr. The statistics are later fed
//! back into the correction pass so that it can apply a single linear gain.

use crate::error::{NormalizeError, Result, Stage};
use crate::filter::measurement_filter;
use crate::metrics::{parse_metrics, LoudnessMetrics};
use crate::settings::NormalizerSettings;
use crate::tool::{ToolInvocation, ToolRunner};
use crate::validator::Validator;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a successful first pass
///
/// Only [`Analyzer::analyze`] creates these, so holding one proves the file
/// was validated and measured.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    file: PathBuf,
    target_lufs: f64,
    metrics: LoudnessMetrics,
}

impl Analysis {
    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn target_lufs(&self) -> f64 {
        self.target_lufs
    }

    pub fn metrics(&self) -> &LoudnessMetrics {
        &self.metrics
    }

    pub fn into_metrics(self) -> LoudnessMetrics {
        self.metrics
    }

    /// Whether this analysis was made for `file` at `target_lufs`
    pub fn matches(&self, file: &Path, target_lufs: f64) -> bool {
        self.file == file && (self.target_lufs - target_lufs).abs() < f64::EPSILON
    }
}

/// Reject targets the loudnorm filter would refuse
pub fn check_target(target_lufs: f64) -> Result<()> {
    if !(crate::MIN_TARGET_LUFS..=crate::MAX_TARGET_LUFS).contains(&target_lufs) {
        return Err(NormalizeError::InvalidTarget(target_lufs));
    }
    Ok(())
}

/// Loudness analyzer (first pass)
#[derive(Clone)]
pub struct Analyzer {
    validator: Validator,
    runner: Arc<dyn ToolRunner>,
    settings: Arc<NormalizerSettings>,
}

impl Analyzer {
    pub fn new(runner: Arc<dyn ToolRunner>, settings: Arc<NormalizerSettings>) -> Self {
        Self {
            validator: Validator::new(Arc::clone(&runner), Arc::clone(&settings)),
            runner,
            settings,
        }
    }

    fn measurement_invocation(&self, file: &Path, target_lufs: f64) -> ToolInvocation {
        ToolInvocation::new(&self.settings.ffmpeg_path, Stage::Analyze)
            .args(["-hide_banner", "-nostdin", "-i"])
            .arg(file)
            .arg("-af")
            .arg(measurement_filter(target_lufs, &self.settings))
            .args(["-f", "null", "-"])
    }

    /// Validate `file` and measure its loudness against `target_lufs`
    ///
    /// # Errors
    /// - `InvalidAudioFile` if the file has no audio stream or is too short;
    ///   no measurement is run in that case
    /// - `Probe` if the duration cannot be measured
    /// - `MetricsExtraction` / `SilentAudio` if the statistics are unusable
    /// - tool errors from the runner
    pub async fn analyze(&self, file: &Path, target_lufs: f64) -> Result<Analysis> {
        check_target(target_lufs)?;

        let validation = self.validator.validate(file).await?;
        if !validation.is_audio
            || !self
                .validator
                .meets_min_duration(file, validation.duration_secs)
                .await?
        {
            warn!(file = ?file, is_audio = validation.is_audio, "Rejected input file");
            return Err(NormalizeError::InvalidAudioFile {
                file: file.to_path_buf(),
            });
        }

        let invocation = self.measurement_invocation(file, target_lufs);
        let output = self.runner.run(&invocation).await?.check(&invocation)?;

        let file_size = tokio::fs::metadata(file).await?.len();
        let metrics = parse_metrics(&output.stderr_text(), file_size).map_err(|e| {
            NormalizeError::MetricsExtraction {
                file: file.to_path_buf(),
                message: e.to_string(),
            }
        })?;

        if !metrics.input_i.is_finite() {
            return Err(NormalizeError::SilentAudio {
                file: file.to_path_buf(),
            });
        }

        debug!(file = ?file, metrics = ?metrics, "Parsed loudness statistics");
        info!(
            file = ?file,
            input_i = metrics.input_i,
            input_tp = metrics.input_tp,
            input_lra = metrics.input_lra,
            target_lufs,
            "Measured loudness"
        );

        Ok(Analysis {
            file: file.to_path_buf(),
            target_lufs,
            metrics,
        })
    }
}
