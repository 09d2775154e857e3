use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("an identity with identifier '{identifier}' is already enrolled")]
    DuplicateIdentifier { identifier: String },

    #[error(
        "captured face matches already-enrolled identity '{identifier}' (distance {distance:.4})"
    )]
    DuplicateFace { identifier: String, distance: f64 },

    #[error("no usable face detected after {attempts} capture attempt(s)")]
    NoFaceDetected { attempts: u32 },

    #[error("no identity enrolled under identifier '{identifier}'")]
    IdentityNotFound { identifier: String },

    #[error(
        "captured face does not match identity '{identifier}' (distance {distance:.4}, threshold {threshold})"
    )]
    FaceMismatch {
        identifier: String,
        distance: f64,
        threshold: f64,
    },

    #[error("embedding length mismatch: expected {expected} values, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("cannot aggregate an empty sample set")]
    InsufficientSamples,

    #[error("capture cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },

    #[error("failed to read registry entry {path}: {source}")]
    RegistryRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write registry entry {path}: {source}")]
    RegistryWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("registry entry {path} is invalid: {message}")]
    InvalidRecord { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to read frame file {path}: {source}")]
    FrameRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("frame file {path} is invalid: {message}")]
    InvalidFrameFile { path: PathBuf, message: String },
}

impl AppError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            AppError::InvalidInput(_) => ExitCode::from(2),
            AppError::DimensionMismatch { .. } => ExitCode::from(2),
            AppError::InsufficientSamples => ExitCode::from(2),
            AppError::FrameRead { .. } => ExitCode::from(2),
            AppError::InvalidFrameFile { .. } => ExitCode::from(2),
            AppError::DuplicateIdentifier { .. } => ExitCode::from(3),
            AppError::DuplicateFace { .. } => ExitCode::from(3),
            AppError::NoFaceDetected { .. } => ExitCode::from(4),
            AppError::FaceMismatch { .. } => ExitCode::from(4),
            AppError::IdentityNotFound { .. } => ExitCode::from(4),
            AppError::Cancelled { .. } => ExitCode::from(5),
            AppError::RegistryRead { .. } => ExitCode::from(6),
            AppError::RegistryWrite { .. } => ExitCode::from(6),
            AppError::InvalidRecord { .. } => ExitCode::from(6),
            _ => ExitCode::from(1),
        }
    }

    pub fn human_message(&self) -> String {
        self.to_string()
    }

    /// Whether the failure is an expected outcome the user can retry
    /// (better lighting, re-frame the face) rather than an integration defect.
    pub fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::NoFaceDetected { .. }
                | AppError::FaceMismatch { .. }
                | AppError::DuplicateFace { .. }
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;
