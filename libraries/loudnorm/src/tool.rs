//! External tool invocation
//!
//! Every `ffprobe`/`ffmpeg` process goes through [`ToolRunner`]. The
//! production runner applies a per-invocation timeout and observes a
//! cancellation token; tests substitute a mock to script tool output and
//! count invocations.

use crate::error::{NormalizeError, Result, Stage};
use crate::settings::NormalizerSettings;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

/// A single external command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub stage: Stage,
}

impl ToolInvocation {
    pub fn new(program: impl Into<PathBuf>, stage: Stage) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stage,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Program name without its directory, for logs and errors
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .into_owned()
    }

    /// Arguments as lossy UTF-8
    pub fn args_lossy(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Value following `flag`, e.g. the filter graph after `-af`
    #[cfg(test)]
    pub(crate) fn value_of(&self, flag: &str) -> Option<String> {
        let args = self.args_lossy();
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1).cloned())
    }

    /// Whether the invocation targets `path` as input or output
    #[cfg(test)]
    pub(crate) fn mentions(&self, path: &std::path::Path) -> bool {
        self.args.iter().any(|a| std::path::Path::new(a) == path)
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when terminated by a signal
    pub status: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Stdout followed by stderr
    pub fn combined(&self) -> String {
        let mut text = self.stdout_text();
        text.push_str(&self.stderr_text());
        text
    }

    /// Last `lines` lines of stderr, where FFmpeg reports the actual failure
    pub fn stderr_tail(&self, lines: usize) -> String {
        let text = self.stderr_text();
        let all: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
        let start = all.len().saturating_sub(lines);
        all[start..].join("\n")
    }

    /// Turn a non-zero exit into a [`NormalizeError::ToolInvocation`]
    pub fn check(self, invocation: &ToolInvocation) -> Result<Self> {
        if self.success() {
            return Ok(self);
        }

        let status = self
            .status
            .map_or_else(|| "terminated by signal".to_string(), |c| format!("exit code {c}"));
        Err(NormalizeError::ToolInvocation {
            program: invocation.program_name(),
            stage: invocation.stage,
            message: format!("{status}: {}", self.stderr_tail(5)),
        })
    }
}

/// Runs external tools
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run `invocation` to completion and capture its output
    ///
    /// A non-zero exit is not an error here; callers decide what it means.
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput>;
}

/// Process runner backed by `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl FfmpegRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_settings(settings: &NormalizerSettings) -> Self {
        Self::new(settings.timeout())
    }

    /// Share a cancellation token with the caller
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn cancelled(invocation: &ToolInvocation) -> NormalizeError {
        NormalizeError::Cancelled {
            program: invocation.program_name(),
            stage: invocation.stage,
        }
    }

    fn failed(invocation: &ToolInvocation, err: &std::io::Error) -> NormalizeError {
        let message = if err.kind() == std::io::ErrorKind::NotFound {
            format!("executable not found at {:?}", invocation.program)
        } else {
            err.to_string()
        };
        NormalizeError::ToolInvocation {
            program: invocation.program_name(),
            stage: invocation.stage,
            message,
        }
    }
}

#[async_trait]
impl ToolRunner for FfmpegRunner {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput> {
        if self.cancel.is_cancelled() {
            return Err(Self::cancelled(invocation));
        }

        debug!(
            program = %invocation.program_name(),
            stage = %invocation.stage,
            args = ?invocation.args_lossy(),
            "Spawning external tool"
        );

        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Self::failed(invocation, &e))?;

        // Dropping the wait future kills the child (kill_on_drop)
        let finished = async {
            match self.timeout {
                Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                    Ok(result) => result.map_err(|e| Self::failed(invocation, &e)),
                    Err(_) => Err(NormalizeError::Timeout {
                        program: invocation.program_name(),
                        stage: invocation.stage,
                        seconds: limit.as_secs(),
                    }),
                },
                None => child
                    .wait_with_output()
                    .await
                    .map_err(|e| Self::failed(invocation, &e)),
            }
        };

        let output = tokio::select! {
            () = self.cancel.cancelled() => return Err(Self::cancelled(invocation)),
            result = finished => result?,
        };

        debug!(
            program = %invocation.program_name(),
            status = ?output.status.code(),
            stderr_bytes = output.stderr.len(),
            "External tool finished"
        );

        Ok(ToolOutput {
            status: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
