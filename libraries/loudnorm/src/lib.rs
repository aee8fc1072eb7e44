//! Two-pass EBU R128 loudness normalization on top of FFmpeg
//!
//! This crate provides:
//! - Input validation (audio stream present, minimum playback duration)
//! - First-pass loudness measurement with FFmpeg's `loudnorm` filter
//! - Second-pass linear correction fed with the measured statistics
//! - Sequential batch processing with per-file outcome reports
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌───────────────┐
//! │ Audio File  │ ──► │  Validator   │ ──► │   Analyzer    │ ── ffmpeg -f null
//! └─────────────┘     └──────────────┘     └───────────────┘
//!                      ffprobe + symphonia         │
//!                                                  ▼ LoudnessMetrics
//!                                          ┌───────────────┐
//!                                          │   Corrector   │ ── ffmpeg -y <out>
//!                                          └───────────────┘
//!                                                  │
//!                                                  ▼
//!                                      <output_folder>/<name>
//! ```
//!
//! All external tools go through the [`ToolRunner`] trait; [`FfmpegRunner`]
//! is the process-backed implementation with timeout and cancellation.
//!
//! # Example
//!
//! ```ignore
//! use loudnorm::{Corrector, FfmpegRunner, NormalizationRequest, NormalizerSettings};
//! use std::sync::Arc;
//!
//! let settings = Arc::new(NormalizerSettings::default());
//! let runner = Arc::new(FfmpegRunner::from_settings(&settings));
//! let corrector = Corrector::new(runner, settings);
//!
//! let correction = corrector
//!     .correct(NormalizationRequest::new("podcast.wav", -16.0))
//!     .await?;
//! println!("Wrote {}", correction.output.display());
//! ```

#![deny(unsafe_code)]

mod analyzer;
mod batch;
mod corrector;
mod duration;
mod error;
mod filter;
mod metrics;
mod probe;
mod settings;
mod summary;
mod tool;
mod validator;

pub use analyzer::{check_target, Analysis, Analyzer};
pub use batch::{normalize_batch, BatchReport, FileOutcome, OutcomeReport};
pub use corrector::{output_path, Correction, Corrector, NormalizationRequest};
pub use duration::measure_duration;
pub use error::{NormalizeError, Result, Stage};
pub use filter::{correction_filter, measurement_filter};
pub use metrics::{
    extract_json_block, parse_metrics, LoudnessMetrics, MetricsError, NormalizationType,
};
pub use probe::{ProbeFormat, ProbeReport, ProbeStream};
pub use settings::NormalizerSettings;
pub use summary::{parse_summary, CorrectionSummary};
pub use tool::{FfmpegRunner, ToolInvocation, ToolOutput, ToolRunner};
pub use validator::{ValidationResult, Validator};

/// Default maximum true peak (dBTP)
pub const DEFAULT_TRUE_PEAK_DBTP: f64 = -1.5;

/// Default target loudness range (LU)
pub const DEFAULT_LOUDNESS_RANGE_LU: f64 = 11.0;

/// Files must play strictly longer than this to be normalized
pub const MIN_DURATION_SECS: f64 = 3.0;

/// Lowest integrated loudness target the loudnorm filter accepts
pub const MIN_TARGET_LUFS: f64 = -70.0;

/// Highest integrated loudness target the loudnorm filter accepts
pub const MAX_TARGET_LUFS: f64 = -5.0;

/// Where corrected files go unless told otherwise
pub const DEFAULT_OUTPUT_FOLDER: &str = "misc/normalized";

#[cfg(test)]
pub(crate) mod test_support {
    use crate::tool::ToolOutput;
    use std::f32::consts::PI;
    use std::path::Path;

    const SAMPLE_RATE: u32 = 44100;

    /// Write a 16-bit 440 Hz sine wave
    pub fn write_sine_wav(path: &Path, secs: f64, channels: u16, amplitude: f32) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let frames = (secs * f64::from(SAMPLE_RATE)).round() as u32;
        for n in 0..frames {
            let t = n as f32 / SAMPLE_RATE as f32;
            let sample = (amplitude * (2.0 * PI * 440.0 * t).sin() * f32::from(i16::MAX)) as i16;
            for _ in 0..channels {
                writer.write_sample(sample).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    /// What ffprobe prints for a file with one audio stream
    pub fn audio_probe_output() -> ToolOutput {
        ToolOutput {
            status: Some(0),
            stdout: br#"{"streams":[{"codec_type":"audio"}]}"#.to_vec(),
            stderr: Vec::new(),
        }
    }

    /// Same, with the container duration ffprobe prints for `format=duration`
    pub fn audio_probe_output_with_duration(duration: &str) -> ToolOutput {
        ToolOutput {
            status: Some(0),
            stdout: format!(
                r#"{{"streams":[{{"codec_type":"audio"}}],"format":{{"duration":"{}"}}}}"#,
                duration
            )
            .into_bytes(),
            stderr: Vec::new(),
        }
    }

    /// WAV file with the given `fmt ` format tag and `secs` of zeroed payload
    ///
    /// Only the header is meaningful; used for codecs Symphonia cannot read.
    pub fn write_wav_header(path: &Path, format_tag: u16, secs: u32) {
        let channels: u16 = 1;
        let byte_rate: u32 = 16_000;
        let data_size = byte_rate * secs;

        let mut wav = Vec::new();
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36 + data_size).to_le_bytes());
        wav.extend_from_slice(b"WAVE");

        wav.extend_from_slice(b"fmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&format_tag.to_le_bytes());
        wav.extend_from_slice(&channels.to_le_bytes());
        wav.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        wav.extend_from_slice(&byte_rate.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes()); // block align
        wav.extend_from_slice(&0u16.to_le_bytes()); // bits per sample

        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&data_size.to_le_bytes());
        wav.resize(wav.len() + data_size as usize, 0);

        std::fs::write(path, wav).unwrap();
    }

    /// Successful run that printed `text` to stderr
    pub fn stderr_output(text: &str) -> ToolOutput {
        ToolOutput {
            status: Some(0),
            stdout: Vec::new(),
            stderr: text.as_bytes().to_vec(),
        }
    }
}
