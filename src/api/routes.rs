//! API handlers and error-to-response mapping

use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Instant;
use tracing::{info, warn};

use super::SharedState;
use crate::admission::{check_elf_magic, AdmissionError};
use crate::job::{JobError, JobState, TransformKind, TransformationJob, VALID_KINDS};
use crate::storage::{sanitize_filename, unique_filename, ScopedTempFile};
use crate::verify::{verify_signature, ValidationVerdict};

/// Structured error body: `error` is machine-checkable, the rest is
/// supplementary detail for humans.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_types: Option<Vec<&'static str>>,
}

impl ErrorBody {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
            hint: None,
            exit_code: None,
            valid_types: None,
        }
    }
}

/// Request-terminal failures
#[derive(Debug)]
pub enum ApiError {
    Admission(AdmissionError),
    /// Signature supplied but invalid; never downgraded to unauthenticated
    InvalidSignature,
    Processing(JobError),
    /// Unknown artifact name on retrieval
    NotFound,
    Internal(String),
}

impl From<AdmissionError> for ApiError {
    fn from(e: AdmissionError) -> Self {
        ApiError::Admission(e)
    }
}

impl From<JobError> for ApiError {
    fn from(e: JobError) -> Self {
        ApiError::Processing(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Admission(e) => admission_body(e),
            ApiError::InvalidSignature => (
                StatusCode::FORBIDDEN,
                ErrorBody {
                    details: Some(
                        "File signature verification failed. Upload rejected for security reasons."
                            .to_string(),
                    ),
                    ..ErrorBody::new("Invalid digital signature")
                },
            ),
            ApiError::Processing(e) => processing_body(e),
            ApiError::NotFound => (StatusCode::NOT_FOUND, ErrorBody::new("File not found")),
            ApiError::Internal(details) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody {
                    details: Some(details),
                    ..ErrorBody::new("Internal server error")
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}

fn admission_body(e: AdmissionError) -> (StatusCode, ErrorBody) {
    let body = match e {
        AdmissionError::MissingFile => ErrorBody::new("No file uploaded"),
        AdmissionError::MissingKind => ErrorBody::new("Encryption type is required"),
        AdmissionError::InvalidKind(kind) => ErrorBody {
            details: Some(format!("Unknown encryption type: {kind}")),
            valid_types: Some(VALID_KINDS.to_vec()),
            ..ErrorBody::new("Invalid encryption type")
        },
        AdmissionError::InvalidFormat { found } => ErrorBody {
            details: Some(format!(
                "File starts with: {found}, expected: 0x7f 0x45 0x4c 0x46"
            )),
            hint: Some(
                "Make sure you are uploading a Linux ELF executable or shared library, \
                 not a Windows PE file (.exe/.dll) or other format."
                    .to_string(),
            ),
            ..ErrorBody::new("Invalid file format")
        },
        AdmissionError::TooLarge { max_bytes } => ErrorBody {
            details: Some(format!("Maximum {} bytes allowed", max_bytes)),
            ..ErrorBody::new("File size too large")
        },
    };
    (StatusCode::BAD_REQUEST, body)
}

fn processing_body(e: JobError) -> (StatusCode, ErrorBody) {
    let body = match e {
        JobError::Launch(details) => ErrorBody {
            details: Some(details),
            ..ErrorBody::new("Failed to start obfuscation process")
        },
        JobError::PlatformUnsupported { details } => ErrorBody {
            details: Some(details),
            hint: Some("Easiest solution: run the backend in a Linux container.".to_string()),
            ..ErrorBody::new("Unsupported host environment")
        },
        JobError::Failed {
            exit_code,
            stdout,
            stderr,
        } => {
            let details = if !stderr.trim().is_empty() {
                stderr
            } else if !stdout.trim().is_empty() {
                stdout
            } else {
                "Unknown error occurred".to_string()
            };
            ErrorBody {
                details: Some(details),
                exit_code: Some(exit_code),
                ..ErrorBody::new("Obfuscation failed")
            }
        }
        JobError::OutputMissing(path) => ErrorBody {
            details: Some(format!("Expected output at {}", path.display())),
            ..ErrorBody::new("Obfuscation failed")
        },
        JobError::Io(e) => ErrorBody {
            details: Some(e.to_string()),
            ..ErrorBody::new("Internal server error")
        },
    };
    (StatusCode::INTERNAL_SERVER_ERROR, body)
}

/// Successful transformation response
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObfuscateResponse {
    pub success: bool,
    pub message: String,
    pub download_url: String,
    pub encryption_type: String,
    pub processing_time: String,
    pub original_file: String,
    pub obfuscated_file: String,
    pub file_size: usize,
    pub signature_verified: bool,
    /// Open fragment echoed from the external program
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

/// POST /api/obfuscate
pub async fn obfuscate(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<ObfuscateResponse>, ApiError> {
    let started = Instant::now();

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut kind_text: Option<String> = None;
    let mut signature: Option<String> = None;
    let mut public_key: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(&state, e))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let original = field.file_name().unwrap_or("upload.bin").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(&state, e))?;
                file = Some((original, bytes.to_vec()));
            }
            "encryptionType" => {
                kind_text = non_empty(field.text().await.map_err(|e| multipart_error(&state, e))?)
            }
            "signature" => {
                signature = non_empty(field.text().await.map_err(|e| multipart_error(&state, e))?)
            }
            "publicKey" => {
                public_key = non_empty(field.text().await.map_err(|e| multipart_error(&state, e))?)
            }
            _ => {}
        }
    }

    let (original_name, bytes) = file.ok_or(AdmissionError::MissingFile)?;
    let kind_text = kind_text.ok_or(AdmissionError::MissingKind)?;

    // Persist the input under a unique name; the guard releases it on
    // every exit path once the request is done with it.
    let stored_name = unique_filename(&original_name);
    let input_path = state.config.storage.upload_dir.join(&stored_name);
    let temp_input = ScopedTempFile::create(input_path, &bytes)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    // Gate 1: container format
    let format_check = check_elf_magic(&bytes);
    let mut verdict = ValidationVerdict {
        format_valid: format_check.is_ok(),
        signature_present: false,
        signature_valid: false,
    };
    format_check?;

    // Gate 2: signature, independent of the format gate

    match (&signature, &public_key) {
        (Some(sig), Some(key)) => {
            verdict.signature_present = true;
            verdict.signature_valid = verify_signature(key, sig, &bytes);
            if !verdict.signature_valid {
                warn!(file = %original_name, "digital signature verification failed");
                return Err(ApiError::InvalidSignature);
            }
            info!(file = %original_name, "digital signature verified");
        }
        (sig, _) => {
            // Half-supplied credentials are treated like none at all
            warn!(
                file = %original_name,
                missing = if sig.is_none() { "signature" } else { "publicKey" },
                "no usable digital signature provided, processing unauthenticated"
            );
        }
    }

    let kind: TransformKind = kind_text
        .parse()
        .map_err(|_| AdmissionError::InvalidKind(kind_text.clone()))?;

    let output_name = format!("obfuscated_{stored_name}");
    let output_path = state.config.storage.output_dir.join(&output_name);

    let mut job = TransformationJob::new(temp_input.path().to_path_buf(), output_path, kind);
    job.advance(JobState::FormatChecked);
    job.advance(JobState::SignatureChecked);

    let result = state.runner.run(&mut job).await?;

    let encryption_type = result
        .metadata
        .get("encryption_type")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| kind.as_str().to_uppercase());

    Ok(Json(ObfuscateResponse {
        success: true,
        message: "Obfuscation completed successfully".to_string(),
        download_url: format!("/api/download/{output_name}"),
        encryption_type,
        processing_time: format!("{:.2}s", started.elapsed().as_secs_f64()),
        original_file: original_name,
        obfuscated_file: output_name,
        file_size: bytes.len(),
        signature_verified: verdict.authenticated(),
        metadata: result.metadata,
    }))
}

/// GET /api/download/:filename
pub async fn download(
    State(state): State<SharedState>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    // Exact-name lookup only; anything path-like is not a known artifact
    if sanitize_filename(&filename) != filename {
        return Err(ApiError::NotFound);
    }

    let path = state.config.storage.output_dir.join(&filename);

    let content = match tokio::fs::read(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(ApiError::NotFound),
        Err(e) => return Err(ApiError::Internal(format!("Error downloading file: {e}"))),
    };

    let headers = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ),
    ];

    Ok((headers, content).into_response())
}

/// GET /api/health
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn multipart_error(state: &SharedState, e: axum::extract::multipart::MultipartError) -> ApiError {
    // The body limit trips while a field is being read and surfaces as 413
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::Admission(AdmissionError::TooLarge {
            max_bytes: state.config.server.max_upload_bytes,
        });
    }
    ApiError::Internal(e.body_text())
}
