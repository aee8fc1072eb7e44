//! Error types for loudness normalization

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for normalization operations
pub type Result<T> = std::result::Result<T, NormalizeError>;

/// Pipeline stage an error (or a tool invocation) belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Audio-type and duration checks
    Validate,
    /// First pass (loudness measurement)
    Analyze,
    /// Second pass (gain correction)
    Correct,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validate => "validation",
            Stage::Analyze => "analysis",
            Stage::Correct => "correction",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while normalizing a file
#[derive(Error, Debug)]
pub enum NormalizeError {
    /// Not a decodable audio stream, or too short
    #[error("Invalid audio file.")]
    InvalidAudioFile { file: PathBuf },

    /// Target loudness outside what the loudnorm filter accepts
    #[error("Invalid target loudness: {0} LUFS (must be between -70 and -5)")]
    InvalidTarget(f64),

    /// Duration could not be measured
    #[error("Failed to probe {file:?}: {message}")]
    Probe { file: PathBuf, message: String },

    /// Diagnostic output did not contain usable loudness statistics
    #[error("Failed to extract loudness metrics for {file:?}: {message}")]
    MetricsExtraction { file: PathBuf, message: String },

    /// Audio is completely silent
    #[error("Audio is silent (no loudness data available): {file:?}")]
    SilentAudio { file: PathBuf },

    /// External tool missing, failed to start, or exited abnormally
    #[error("{program} failed during {stage}: {message}")]
    ToolInvocation {
        program: String,
        stage: Stage,
        message: String,
    },

    /// External tool did not finish in time
    #[error("{program} timed out after {seconds}s during {stage}")]
    Timeout {
        program: String,
        stage: Stage,
        seconds: u64,
    },

    /// Invocation cancelled by the caller
    #[error("{program} was cancelled during {stage}")]
    Cancelled { program: String, stage: Stage },

    /// Supplied first-pass analysis does not belong to this request
    #[error("Analysis of {analyzed:?} cannot be applied to {requested:?}")]
    StaleAnalysis {
        analyzed: PathBuf,
        requested: PathBuf,
    },

    /// Another input of the same batch already produced this output
    #[error("Output {output:?} was already written for another input in this batch")]
    DuplicateOutput { file: PathBuf, output: PathBuf },

    /// Settings out of range
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NormalizeError {
    /// Stage the error surfaced in, when it is tied to one
    pub fn stage(&self) -> Option<Stage> {
        match self {
            NormalizeError::InvalidAudioFile { .. } | NormalizeError::Probe { .. } => {
                Some(Stage::Validate)
            }
            NormalizeError::MetricsExtraction { .. } | NormalizeError::SilentAudio { .. } => {
                Some(Stage::Analyze)
            }
            NormalizeError::StaleAnalysis { .. } | NormalizeError::DuplicateOutput { .. } => {
                Some(Stage::Correct)
            }
            NormalizeError::ToolInvocation { stage, .. }
            | NormalizeError::Timeout { stage, .. }
            | NormalizeError::Cancelled { stage, .. } => Some(*stage),
            NormalizeError::InvalidTarget(_)
            | NormalizeError::InvalidSettings(_)
            | NormalizeError::Io(_) => None,
        }
    }

    /// Whether the error came from a cancellation request
    pub fn is_cancelled(&self) -> bool {
        matches!(self, NormalizeError::Cancelled { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_audio_file_message() {
        let err = NormalizeError::InvalidAudioFile {
            file: PathBuf::from("misc/short.wav"),
        };
        assert_eq!(err.to_string(), "Invalid audio file.");
        assert_eq!(err.stage(), Some(Stage::Validate));
    }

    #[test]
    fn test_tool_errors_carry_their_stage() {
        let err = NormalizeError::Timeout {
            program: "ffmpeg".to_string(),
            stage: Stage::Correct,
            seconds: 30,
        };
        assert_eq!(err.stage(), Some(Stage::Correct));
        assert_eq!(err.to_string(), "ffmpeg timed out after 30s during correction");

        let err = NormalizeError::Cancelled {
            program: "ffprobe".to_string(),
            stage: Stage::Validate,
        };
        assert!(err.is_cancelled());
        assert_eq!(err.stage(), Some(Stage::Validate));
    }

    #[test]
    fn test_io_error_has_no_stage() {
        let err: NormalizeError = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        assert_eq!(err.stage(), None);
    }
}
