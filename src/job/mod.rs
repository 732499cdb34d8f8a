//! Transformation jobs
//!
//! A job is created only for a submission that passed both admission
//! gates. The external transformation program runs as an isolated child
//! process per job; the orchestrator owns the job for its lifetime and
//! the caller owns the temporary input through a scoped guard.

pub mod runner;

use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;
use tracing::debug;
use uuid::Uuid;

pub use runner::JobRunner;

/// Transform kinds accepted from the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    Xor,
    Rsa,
    Aes,
}

/// Accepted transform kind names, surfaced in rejection responses
pub const VALID_KINDS: &[&str] = &["xor", "rsa", "aes"];

impl TransformKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformKind::Xor => "xor",
            TransformKind::Rsa => "rsa",
            TransformKind::Aes => "aes",
        }
    }
}

impl FromStr for TransformKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "xor" => Ok(TransformKind::Xor),
            "rsa" => Ok(TransformKind::Rsa),
            "aes" => Ok(TransformKind::Aes),
            _ => Err(()),
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Received,
    FormatChecked,
    SignatureChecked,
    Running,
    Succeeded,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Received => "received",
            JobState::FormatChecked => "format_checked",
            JobState::SignatureChecked => "signature_checked",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One admitted submission being transformed
pub struct TransformationJob {
    pub id: Uuid,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub kind: TransformKind,
    pub state: JobState,
    pub started_at: Instant,
}

impl TransformationJob {
    pub fn new(input_path: PathBuf, output_path: PathBuf, kind: TransformKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            input_path,
            output_path,
            kind,
            state: JobState::Received,
            started_at: Instant::now(),
        }
    }

    /// Move to the next lifecycle state
    pub fn advance(&mut self, next: JobState) {
        debug!(job_id = %self.id, from = %self.state, to = %next, "job state transition");
        self.state = next;
    }
}

/// Result of a completed transformation
#[derive(Debug)]
pub struct JobResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub output_path: PathBuf,
    /// Open key/value fragment echoed by the external program, if any
    pub metadata: Map<String, Value>,
}

/// Orchestration failures, all mapped to HTTP 500
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("failed to start transformation process: {0}")]
    Launch(String),

    #[error("transformation process exited with status {exit_code}")]
    Failed {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    /// The external tool reported it cannot run on this host
    #[error("transformation tool cannot run on this host")]
    PlatformUnsupported { details: String },

    #[error("transformation reported success but produced no output at {0}")]
    OutputMissing(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extract a trailing `{...}` JSON fragment from captured stdout.
///
/// The external program may print diagnostics before the fragment; parse
/// failures are non-fatal and yield an empty map.
pub fn extract_metadata(stdout: &str) -> Map<String, Value> {
    let Some(start) = stdout.find('{') else {
        return Map::new();
    };
    let Some(end) = stdout.rfind('}') else {
        return Map::new();
    };
    if end < start {
        return Map::new();
    }

    match serde_json::from_str::<Value>(&stdout[start..=end]) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("aes".parse::<TransformKind>(), Ok(TransformKind::Aes));
        assert_eq!("XOR".parse::<TransformKind>(), Ok(TransformKind::Xor));
        assert_eq!("Rsa".parse::<TransformKind>(), Ok(TransformKind::Rsa));
        assert!("des".parse::<TransformKind>().is_err());
        assert!("".parse::<TransformKind>().is_err());
    }

    #[test]
    fn test_metadata_extraction() {
        let stdout = "Processing...\n{\"algorithm\": \"aes\", \"rounds\": 10}\n";
        let map = extract_metadata(stdout);
        assert_eq!(map["algorithm"], "aes");
        assert_eq!(map["rounds"], 10);
    }

    #[test]
    fn test_metadata_absent() {
        assert!(extract_metadata("no json here").is_empty());
        assert!(extract_metadata("").is_empty());
    }

    #[test]
    fn test_metadata_parse_failure_is_empty() {
        assert!(extract_metadata("oops {not json}").is_empty());
        // A JSON value that is not an object is ignored too
        assert!(extract_metadata("} {").is_empty());
    }

    #[test]
    fn test_job_state_transitions() {
        let mut job = TransformationJob::new(
            PathBuf::from("/tmp/in"),
            PathBuf::from("/tmp/out"),
            TransformKind::Aes,
        );
        assert_eq!(job.state, JobState::Received);

        job.advance(JobState::FormatChecked);
        job.advance(JobState::SignatureChecked);
        job.advance(JobState::Running);
        job.advance(JobState::Succeeded);
        assert_eq!(job.state, JobState::Succeeded);
    }
}
