//! Input validation
//!
//! A file qualifies for normalization when ffprobe reports an audio stream
//! and its playback duration is strictly longer than the configured minimum.
//! The duration comes from the same ffprobe call; Symphonia decodes the file
//! only when ffprobe could not state one.

use crate::duration::measure_duration;
use crate::error::{NormalizeError, Result, Stage};
use crate::probe::ProbeReport;
use crate::settings::NormalizerSettings;
use crate::tool::{ToolInvocation, ToolRunner};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Outcome of the audio-type check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub file: PathBuf,
    pub is_audio: bool,
    /// Container duration reported by ffprobe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

#[derive(Clone)]
pub struct Validator {
    runner: Arc<dyn ToolRunner>,
    settings: Arc<NormalizerSettings>,
}

impl Validator {
    pub fn new(runner: Arc<dyn ToolRunner>, settings: Arc<NormalizerSettings>) -> Self {
        Self { runner, settings }
    }

    fn codec_type_invocation(&self, file: &Path) -> ToolInvocation {
        ToolInvocation::new(&self.settings.ffprobe_path, Stage::Validate)
            .args(["-loglevel", "quiet", "-i"])
            .arg(file)
            .args([
                "-select_streams",
                "a",
                "-show_entries",
                "stream=codec_type:format=duration",
                "-print_format",
                "json",
            ])
    }

    /// Check whether `file` holds an audio stream
    ///
    /// Anything ffprobe cannot make sense of (missing file, text file,
    /// unexpected JSON) is reported as `is_audio: false`. Only failures to
    /// run ffprobe at all are errors.
    pub async fn validate(&self, file: &Path) -> Result<ValidationResult> {
        let invocation = self.codec_type_invocation(file);
        let output = self.runner.run(&invocation).await?;

        let report = if output.success() {
            ProbeReport::parse(&output.stdout)
        } else {
            debug!(file = ?file, status = ?output.status, "ffprobe rejected file");
            None
        };
        let is_audio = report.as_ref().is_some_and(ProbeReport::has_audio_stream);
        let duration_secs = report.as_ref().and_then(ProbeReport::duration_secs);

        debug!(file = ?file, is_audio, duration_secs = ?duration_secs, "Audio stream check");

        Ok(ValidationResult {
            file: file.to_path_buf(),
            is_audio,
            duration_secs,
        })
    }

    /// Check whether `file` plays for longer than the minimum duration
    ///
    /// `probed_secs` is the duration ffprobe reported during [`validate`];
    /// without it the file is decoded with Symphonia.
    ///
    /// [`validate`]: Validator::validate
    pub async fn meets_min_duration(&self, file: &Path, probed_secs: Option<f64>) -> Result<bool> {
        let duration = match probed_secs {
            Some(secs) => secs,
            None => {
                let path = file.to_path_buf();
                tokio::task::spawn_blocking(move || measure_duration(&path))
                    .await
                    .map_err(|e| NormalizeError::Probe {
                        file: file.to_path_buf(),
                        message: format!("duration task failed: {}", e),
                    })??
            }
        };

        let long_enough = duration > self.settings.min_duration_secs;
        debug!(
            file = ?file,
            duration_secs = duration,
            from_ffprobe = probed_secs.is_some(),
            min_duration_secs = self.settings.min_duration_secs,
            long_enough,
            "Duration check"
        );

        Ok(long_enough)
    }
}
