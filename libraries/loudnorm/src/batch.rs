/// Sequential normalization of many files
use crate::corrector::{output_path, Correction, Corrector, NormalizationRequest};
use crate::error::{NormalizeError, Result, Stage};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Per-file result
#[derive(Debug)]
pub struct FileOutcome {
    pub file: PathBuf,
    pub result: Result<Correction>,
}

/// Flat, serializable view of a [`FileOutcome`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeReport {
    pub file: PathBuf,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_i: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_i: Option<f64>,
    /// Reported output loudness minus the target, in LU
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deviation_lu: Option<f64>,
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn report(&self) -> OutcomeReport {
        match &self.result {
            Ok(correction) => OutcomeReport {
                file: self.file.clone(),
                success: true,
                stage: None,
                error: None,
                output: Some(correction.output.clone()),
                input_i: Some(correction.measured.input_i),
                output_i: correction.summary.as_ref().map(|s| s.output_integrated),
                deviation_lu: correction.deviation_lu(),
            },
            Err(err) => OutcomeReport {
                file: self.file.clone(),
                success: false,
                stage: err.stage(),
                error: Some(err.to_string()),
                output: None,
                input_i: None,
                output_i: None,
                deviation_lu: None,
            },
        }
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
    /// Files not attempted because the batch was cancelled
    pub skipped: Vec<PathBuf>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn reports(&self) -> Vec<OutcomeReport> {
        self.outcomes.iter().map(FileOutcome::report).collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.reports())
    }
}

/// Normalize `files` one after another into `output_folder`
///
/// A failing file is logged and recorded; the batch moves on. Only
/// cancellation stops it early, leaving the rest in `skipped`. An input
/// whose output name was already written earlier in the batch fails with
/// `DuplicateOutput` instead of overwriting it.
pub async fn normalize_batch(
    corrector: &Corrector,
    files: &[PathBuf],
    target_lufs: f64,
    output_folder: &Path,
) -> BatchReport {
    let mut report = BatchReport::default();
    let mut written: HashSet<PathBuf> = HashSet::new();

    for (index, file) in files.iter().enumerate() {
        let result = match output_path(file, output_folder) {
            Ok(output) if written.contains(&output) => Err(NormalizeError::DuplicateOutput {
                file: file.clone(),
                output,
            }),
            _ => {
                let request =
                    NormalizationRequest::new(file, target_lufs).output_folder(output_folder);
                corrector.correct(request).await
            }
        };
        if let Ok(correction) = &result {
            written.insert(correction.output.clone());
        }

        let cancelled = matches!(&result, Err(e) if e.is_cancelled());
        match &result {
            Ok(correction) => info!(
                file = ?file,
                output = ?correction.output,
                "Normalized {}/{}",
                index + 1,
                files.len()
            ),
            Err(e) => warn!(
                file = ?file,
                stage = ?e.stage(),
                error = %e,
                "Failed to normalize {}/{}",
                index + 1,
                files.len()
            ),
        }

        report.outcomes.push(FileOutcome {
            file: file.clone(),
            result,
        });

        if cancelled {
            report.skipped = files[index + 1..].to_vec();
            warn!(skipped = report.skipped.len(), "Batch cancelled");
            break;
        }
    }

    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        skipped = report.skipped.len(),
        "Batch finished"
    );

    report
}
