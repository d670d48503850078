use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

/// Fixed filename the pipeline writes its artifact to inside the output
/// directory.
pub const BUNDLE_FILENAME: &str = "PORT_BOND_BUNDLE.zip";

/// Runs the external pipeline executable against a staged input file.
///
/// The executable is an opaque collaborator: this component never inspects
/// the artifact's contents, only its presence and size.
pub struct PipelineInvoker {
    program: PathBuf,
    timeout: Duration,
}

/// A successful invocation: exit status zero and the artifact in place.
#[derive(Debug)]
pub struct PipelineSuccess {
    pub bundle_path: PathBuf,
    pub bundle_size: u64,
    pub stdout: String,
}

impl PipelineInvoker {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Invoke the pipeline on `input_path`, collecting its artifact from
    /// `output_dir`.
    ///
    /// Bounded by the configured wall-clock timeout; the subprocess is
    /// killed when the bound is exceeded. Failures are never retried.
    pub async fn run(
        &self,
        input_path: &Path,
        output_dir: &Path,
    ) -> Result<PipelineSuccess, PipelineError> {
        tokio::fs::create_dir_all(output_dir).await?;

        tracing::info!(
            program = %self.program.display(),
            input = %input_path.display(),
            output = %output_dir.display(),
            "running pipeline"
        );

        let mut cmd = Command::new(&self.program);
        cmd.arg("--input")
            .arg(input_path)
            .arg("--output")
            .arg(output_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group so the timeout tears down the pipeline rather
        // than leaving it running behind a dead relay.
        #[cfg(unix)]
        cmd.process_group(0);

        let child = cmd.spawn().map_err(PipelineError::Spawn)?;

        // kill_on_drop reaps the child when the timed-out future is dropped.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(waited) => waited?,
            Err(_) => return Err(PipelineError::TimedOut),
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            tracing::warn!(exit = ?output.status.code(), "pipeline exited non-zero");
            return Err(PipelineError::NonZeroExit { stderr, stdout });
        }

        // Exit code zero is not proof the artifact exists.
        let bundle_path = output_dir.join(BUNDLE_FILENAME);
        let bundle_size = match tokio::fs::metadata(&bundle_path).await {
            Ok(meta) => meta.len(),
            Err(_) => return Err(PipelineError::BundleMissing { stdout }),
        };

        tracing::info!(bundle_size, "pipeline completed");
        Ok(PipelineSuccess {
            bundle_path,
            bundle_size,
            stdout,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The executable exited non-zero; the message is its stderr verbatim.
    #[error("{stderr}")]
    NonZeroExit { stderr: String, stdout: String },

    /// Exit status was zero but the artifact is not where the contract
    /// places it.
    #[error("Bundle file not found after processing")]
    BundleMissing { stdout: String },

    #[error("Pipeline processing timed out")]
    TimedOut,

    #[error("failed to launch pipeline: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("pipeline I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Stdout captured before the failure, when any was produced.
    pub fn stdout(&self) -> Option<&str> {
        match self {
            Self::NonZeroExit { stdout, .. } | Self::BundleMissing { stdout } => Some(stdout),
            _ => None,
        }
    }
}
