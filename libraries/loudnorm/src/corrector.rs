//! Second pass: linear gain correction
//!
//! Feeds the first-pass statistics back into loudnorm (`measured_*`,
//! `offset`, `linear=true`) and writes the corrected file into the output
//! folder under the input's file name.

use crate::analyzer::{Analysis, Analyzer};
use crate::error::{NormalizeError, Result, Stage};
use crate::filter::correction_filter;
use crate::metrics::LoudnessMetrics;
use crate::settings::NormalizerSettings;
use crate::summary::{parse_summary, CorrectionSummary};
use crate::tool::{ToolInvocation, ToolRunner};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Input of the correction pass
#[derive(Debug, Clone)]
pub struct NormalizationRequest {
    pub file: PathBuf,
    pub target_lufs: f64,
    pub output_folder: PathBuf,
    /// First-pass result to reuse instead of measuring again
    pub analysis: Option<Analysis>,
}

impl NormalizationRequest {
    pub fn new(file: impl Into<PathBuf>, target_lufs: f64) -> Self {
        Self {
            file: file.into(),
            target_lufs,
            output_folder: PathBuf::from(crate::DEFAULT_OUTPUT_FOLDER),
            analysis: None,
        }
    }

    pub fn output_folder(mut self, folder: impl Into<PathBuf>) -> Self {
        self.output_folder = folder.into();
        self
    }

    pub fn with_analysis(mut self, analysis: Analysis) -> Self {
        self.analysis = Some(analysis);
        self
    }
}

/// Result of a successful correction
#[derive(Debug, Clone, Serialize)]
pub struct Correction {
    pub input: PathBuf,
    pub output: PathBuf,
    pub target_lufs: f64,
    pub measured: LoudnessMetrics,
    /// Nominal linear gain, `target - measured integrated loudness`
    pub expected_gain_db: f64,
    /// Parsed loudnorm summary, `None` if it could not be read
    pub summary: Option<CorrectionSummary>,
    pub input_size: u64,
    pub output_size: u64,
    /// Verbatim stdout and stderr of the correction command
    #[serde(skip)]
    pub tool_output: String,
}

impl Correction {
    pub fn output_grew(&self) -> bool {
        self.output_size > self.input_size
    }

    /// Reported output loudness minus the target, in LU
    pub fn deviation_lu(&self) -> Option<f64> {
        self.summary
            .as_ref()
            .map(|s| s.output_integrated - self.target_lufs)
    }
}

/// Output location for `file` inside `output_folder`: same stem, same extension
pub fn output_path(file: &Path, output_folder: &Path) -> Result<PathBuf> {
    let stem = file
        .file_stem()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| NormalizeError::InvalidAudioFile {
            file: file.to_path_buf(),
        })?;

    let mut name = stem.to_os_string();
    if let Some(ext) = file.extension() {
        name.push(".");
        name.push(ext);
    }

    Ok(output_folder.join(name))
}

/// Loudness corrector (second pass)
#[derive(Clone)]
pub struct Corrector {
    analyzer: Analyzer,
    runner: Arc<dyn ToolRunner>,
    settings: Arc<NormalizerSettings>,
}

impl Corrector {
    pub fn new(runner: Arc<dyn ToolRunner>, settings: Arc<NormalizerSettings>) -> Self {
        Self {
            analyzer: Analyzer::new(Arc::clone(&runner), Arc::clone(&settings)),
            runner,
            settings,
        }
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    fn correction_invocation(
        &self,
        file: &Path,
        target_lufs: f64,
        metrics: &LoudnessMetrics,
        output: &Path,
    ) -> ToolInvocation {
        ToolInvocation::new(&self.settings.ffmpeg_path, Stage::Correct)
            .args(["-hide_banner", "-nostdin", "-i"])
            .arg(file)
            .arg("-af")
            .arg(correction_filter(target_lufs, &self.settings, metrics))
            .arg("-y")
            .arg(output)
    }

    /// Normalize `request.file` to `request.target_lufs`
    ///
    /// Runs the first pass unless the request carries an analysis of the
    /// same file and target. The correction command only runs after a
    /// successful first pass.
    pub async fn correct(&self, request: NormalizationRequest) -> Result<Correction> {
        let NormalizationRequest {
            file,
            target_lufs,
            output_folder,
            analysis,
        } = request;

        tokio::fs::create_dir_all(&output_folder).await?;
        let output = output_path(&file, &output_folder)?;

        if same_file(&file, &output).await {
            return Err(NormalizeError::InvalidSettings(format!(
                "output {:?} would overwrite the input",
                output
            )));
        }

        let analysis = match analysis {
            Some(analysis) if analysis.matches(&file, target_lufs) => analysis,
            Some(analysis) => {
                return Err(NormalizeError::StaleAnalysis {
                    analyzed: analysis.file().to_path_buf(),
                    requested: file,
                });
            }
            None => self.analyzer.analyze(&file, target_lufs).await?,
        };
        let measured = analysis.into_metrics();

        let invocation = self.correction_invocation(&file, target_lufs, &measured, &output);
        let result = self.runner.run(&invocation).await?.check(&invocation)?;
        let tool_output = result.combined();

        let summary = parse_summary(&tool_output);
        if summary.is_none() {
            debug!(file = ?file, "Correction summary not found in tool output");
        }

        let output_size = tokio::fs::metadata(&output).await?.len();
        let correction = Correction {
            input: file,
            output,
            target_lufs,
            expected_gain_db: target_lufs - measured.input_i,
            input_size: measured.file_size,
            measured,
            summary,
            output_size,
            tool_output,
        };

        if correction.output_grew() {
            warn!(
                input = ?correction.input,
                input_size = correction.input_size,
                output_size = correction.output_size,
                "Normalized file is larger than its input"
            );
        }

        info!(
            input = ?correction.input,
            output = ?correction.output,
            expected_gain_db = correction.expected_gain_db,
            output_i = ?correction.summary.as_ref().map(|s| s.output_integrated),
            "Applied loudness correction"
        );

        Ok(correction)
    }
}

async fn same_file(a: &Path, b: &Path) -> bool {
    match (tokio::fs::canonicalize(a).await, tokio::fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
