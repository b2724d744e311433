//! Error types for the productload ingestion pipeline.
//!
//! One enum per layer, from the narrowest scope to the widest:
//!
//! - [`InputError`] - the seed file cannot be read at all (fatal, before any work)
//! - [`RowParseError`] - one seed row or synthesized variant is invalid (skipped)
//! - [`EncryptionError`] - one prompt, or the whole encryptor, failed
//! - [`SinkError`] - a bulk write was rejected
//! - [`ConfigError`] - operational parameters are unusable
//! - [`PipelineError`] - terminal errors returned to the caller of a run
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Input Errors
// =============================================================================

/// Errors that prevent the seed file from being read.
#[derive(Debug, Error)]
pub enum InputError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// The file has no content at all.
    #[error("CSV file is empty")]
    EmptyFile,

    /// The file name does not end with `.csv`.
    #[error("File must be CSV format: {0}")]
    WrongExtension(String),

    /// The CSV reader hit a syntax or I/O error.
    #[error("Invalid CSV format: {0}")]
    Csv(#[from] csv::Error),

    /// No header row found.
    #[error("No header row found in CSV")]
    NoHeader,
}

// =============================================================================
// Row Parse Errors
// =============================================================================

/// Errors scoped to a single CSV row or synthesized variant.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowParseError {
    #[error("Line {line}: Invalid number of columns. Expected at least {expected}, but got {actual}")]
    TooFewColumns {
        line: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Line {line}: {field} cannot be empty")]
    EmptyField { field: &'static str, line: usize },

    #[error("Line {line}: Invalid {field} format: {value}")]
    InvalidFormat {
        field: &'static str,
        line: usize,
        value: String,
    },
}

impl RowParseError {
    /// Line number the error refers to.
    pub fn line(&self) -> usize {
        match self {
            Self::TooFewColumns { line, .. }
            | Self::EmptyField { line, .. }
            | Self::InvalidFormat { line, .. } => *line,
        }
    }
}

// =============================================================================
// Encryption Errors
// =============================================================================

/// Errors from the prompt encryptor.
#[derive(Debug, Clone, Error)]
pub enum EncryptionError {
    /// The encryptor cannot serve any request.
    #[error("Encryption subsystem unavailable: {0}")]
    Unavailable(String),

    /// A single value could not be encrypted.
    #[error("Encryption failed for value {index}: {message}")]
    Failed { index: usize, message: String },

    /// A ciphertext could not be decrypted.
    #[error("Decryption failed: {0}")]
    Decrypt(String),
}

// =============================================================================
// Sink Errors
// =============================================================================

/// Errors from the persistence sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sink IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sink JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The backend refused the write.
    #[error("Sink rejected write: {0}")]
    Rejected(String),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Invalid operational parameters.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: &'static str, message: String },

    #[error("Missing {0} environment variable")]
    MissingEnv(&'static str),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Terminal errors of an ingestion run.
///
/// Row and record level problems never surface here; they are counted in
/// the [`crate::IngestReport`] instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The seed file could not be read.
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// Operational parameters were rejected.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// A whole batch could not produce results. The run stops and the
    /// `discarded` products generated by earlier batches but not yet
    /// flushed are lost.
    #[error("Batch {batch} failed, {discarded} generated records were discarded: {source}")]
    BatchFailed {
        batch: usize,
        discarded: usize,
        #[source]
        source: EncryptionError,
    },

    /// A flush to the sink failed; the records in that flush are lost.
    #[error("Ingestion failed, {lost} records in the failed flush were not stored: {source}")]
    IngestionFailed {
        lost: usize,
        #[source]
        source: SinkError,
    },

    /// The worker pool no longer accepts batches.
    #[error("Worker pool is shut down")]
    PoolClosed,

    /// A batch was cancelled before it completed.
    #[error("Batch {batch} was cancelled before completion")]
    Cancelled { batch: usize },

    /// The run was interrupted. Batches finished within the grace period
    /// were stored; `cancelled` batches lost their products.
    #[error("Run interrupted: {ingested} records stored, {cancelled} batches cancelled")]
    Interrupted { ingested: usize, cancelled: usize },

    /// A worker task panicked.
    #[error("Worker task failed: {0}")]
    Join(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for input operations.
pub type InputResult<T> = Result<T, InputError>;

/// Result type for row parsing.
pub type RowResult<T> = Result<T, RowParseError>;

/// Result type for encryption operations.
pub type EncryptionResult<T> = Result<T, EncryptionError>;

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
