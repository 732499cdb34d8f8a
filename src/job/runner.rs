//! External transformation process orchestration
//!
//! Spawns the configured transformer as a child process and waits for it,
//! draining stdout and stderr concurrently so a chatty tool cannot
//! deadlock on a full pipe. Exactly one child runs per job and there is
//! no cancellation once started; the job ends when the child exits.

use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{error, info, warn};

use super::{extract_metadata, JobError, JobResult, JobState, TransformationJob};
use crate::config::PipelineConfig;

/// Marker printed by the transformer when it detects a Windows host
const WINDOWS_MARKER_STDOUT: &str = "cannot run natively on Windows";
/// Compiler failure seen when the transformer builds ELF loaders on Windows
const WINDOWS_MARKER_STDERR: &str = "sys/wait.h: No such file or directory";

/// Runs transformation jobs against the configured external program
#[derive(Clone)]
pub struct JobRunner {
    command: String,
    script: Option<std::path::PathBuf>,
}

impl JobRunner {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            command: config.command.clone(),
            script: config.script.clone(),
        }
    }

    /// Run the transformer for one job.
    ///
    /// Invocation: `<command> [script] <input> -t <kind> -o <output>`.
    pub async fn run(&self, job: &mut TransformationJob) -> Result<JobResult, JobError> {
        job.advance(JobState::Running);

        info!(
            job_id = %job.id,
            kind = %job.kind,
            input = %job.input_path.display(),
            output = %job.output_path.display(),
            "starting transformation"
        );

        let mut cmd = Command::new(&self.command);
        if let Some(script) = &self.script {
            cmd.arg(script);
        }
        cmd.arg(&job.input_path)
            .arg("-t")
            .arg(job.kind.as_str())
            .arg("-o")
            .arg(&job.output_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            error!(job_id = %job.id, command = %self.command, error = %e, "failed to spawn transformer");
            JobError::Launch(e.to_string())
        })?;

        // Drain both pipes while the child runs
        let stdout_task = drain(child.stdout.take());
        let stderr_task = drain(child.stderr.take());

        let status = child.wait().await?;
        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        // Signal-terminated children have no code on Unix
        let exit_code = status.code().unwrap_or(-1);

        if !status.success() {
            job.advance(JobState::Failed);
            warn!(job_id = %job.id, exit_code, "transformation failed");

            if stdout.contains(WINDOWS_MARKER_STDOUT) || stderr.contains(WINDOWS_MARKER_STDERR) {
                return Err(JobError::PlatformUnsupported {
                    details: "The transformation tool requires a Linux environment to \
                              produce ELF binaries. Run the backend under Docker or WSL."
                        .to_string(),
                });
            }

            return Err(JobError::Failed {
                exit_code,
                stdout,
                stderr,
            });
        }

        if !job.output_path.exists() {
            job.advance(JobState::Failed);
            return Err(JobError::OutputMissing(job.output_path.clone()));
        }

        let metadata = extract_metadata(&stdout);
        job.advance(JobState::Succeeded);

        info!(
            job_id = %job.id,
            exit_code,
            elapsed_ms = job.started_at.elapsed().as_millis() as u64,
            "transformation succeeded"
        );

        Ok(JobResult {
            exit_code,
            stdout,
            stderr,
            output_path: job.output_path.clone(),
            metadata,
        })
    }
}

/// Read a child pipe to completion on its own task
fn drain<R>(pipe: Option<R>) -> tokio::task::JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(mut pipe) = pipe else {
            return String::new();
        };
        let mut buf = Vec::new();
        if pipe.read_to_end(&mut buf).await.is_err() {
            return String::new();
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::job::TransformKind;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn write_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("transform.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn runner_for(script: PathBuf) -> JobRunner {
        JobRunner {
            command: "sh".to_string(),
            script: Some(script),
        }
    }

    fn job_in(dir: &Path, kind: TransformKind) -> TransformationJob {
        let input = dir.join("input.bin");
        std::fs::write(&input, b"\x7fELF test input").unwrap();
        TransformationJob::new(input, dir.join("output.bin"), kind)
    }

    #[tokio::test]
    async fn test_successful_run_with_metadata() {
        let dir = TempDir::new().unwrap();
        // Args after the script: input -t kind -o output
        let script = write_script(
            dir.path(),
            r#"cp "$1" "$5"
echo "transforming with $3"
echo '{"algorithm": "'$3'", "rounds": 10}'"#,
        );

        let mut job = job_in(dir.path(), TransformKind::Aes);
        let result = runner_for(script).run(&mut job).await.unwrap();

        assert_eq!(result.exit_code, 0);
        assert!(result.output_path.exists());
        assert_eq!(result.metadata["algorithm"], "aes");
        assert_eq!(job.state, JobState::Succeeded);
    }

    #[tokio::test]
    async fn test_nonzero_exit_reported_with_diagnostics() {
        let dir = TempDir::new().unwrap();
        let script = write_script(dir.path(), "echo boom >&2\nexit 3");

        let mut job = job_in(dir.path(), TransformKind::Xor);
        let err = runner_for(script).run(&mut job).await.unwrap_err();

        match err {
            JobError::Failed {
                exit_code, stderr, ..
            } => {
                assert_eq!(exit_code, 3);
                assert!(stderr.contains("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(job.state, JobState::Failed);
    }

    #[tokio::test]
    async fn test_platform_marker_is_remapped() {
        let dir = TempDir::new().unwrap();
        let script = write_script(
            dir.path(),
            "echo 'ERROR: tool cannot run natively on Windows'\nexit 1",
        );

        let mut job = job_in(dir.path(), TransformKind::Rsa);
        let err = runner_for(script).run(&mut job).await.unwrap_err();

        assert!(matches!(err, JobError::PlatformUnsupported { .. }));
    }

    #[tokio::test]
    async fn test_launch_failure_is_distinct() {
        let dir = TempDir::new().unwrap();
        let runner = JobRunner {
            command: "/nonexistent/transformer".to_string(),
            script: None,
        };

        let mut job = job_in(dir.path(), TransformKind::Aes);
        let err = runner.run(&mut job).await.unwrap_err();

        assert!(matches!(err, JobError::Launch(_)));
    }

    #[tokio::test]
    async fn test_missing_output_is_an_error() {
        let dir = TempDir::new().unwrap();
        // Exits cleanly without writing the output file
        let script = write_script(dir.path(), "exit 0");

        let mut job = job_in(dir.path(), TransformKind::Aes);
        let err = runner_for(script).run(&mut job).await.unwrap_err();

        assert!(matches!(err, JobError::OutputMissing(_)));
    }
}
