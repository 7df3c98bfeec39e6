/*!
 * Error types for the lingodoc client library.
 *
 * This module contains custom error types for the different parts of the
 * client, using the thiserror crate for ergonomic error definitions.
 */

use std::path::PathBuf;

use thiserror::Error;

use crate::document::DocumentHandle;

/// Errors that can occur when talking to the translation service
#[derive(Error, Debug)]
pub enum TranslationError {
    /// Network-level failure (timeout, reset, DNS), surfaced after retries
    #[error("Connection error: {0}")]
    Connection(String),

    /// The service rejected the credentials (HTTP 401/403)
    #[error("Authorization failure: {0}")]
    AuthorizationFailure(String),

    /// The requested resource does not exist (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// A glossary-scoped call referenced an unknown glossary (HTTP 404)
    #[error("Glossary not found: {0}")]
    GlossaryNotFound(String),

    /// The translation quota for this billing period is exhausted (HTTP 456)
    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    /// Rate limited and retries disabled or exhausted (HTTP 429)
    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    /// The request was malformed (HTTP 400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A document download was attempted before translation finished
    #[error("Document not ready: {0}")]
    DocumentNotReady(String),

    /// The service reported a terminal error state for a document job
    #[error("Document translation failed: {0}")]
    DocumentFailed(String),

    /// The caller-supplied cancellation signal fired
    #[error("Operation cancelled")]
    Cancelled,

    /// Any other status code the taxonomy does not classify
    #[error("Service responded with error: {status_code} - {message}")]
    Api {
        /// HTTP status code
        status_code: u16,
        /// Error message from the service, if one could be extracted
        message: String,
    },

    /// A local filesystem operation failed
    #[error("File error: {0}")]
    Io(#[from] std::io::Error),

    /// Archive minification or restoration failed
    #[error("Minification error: {0}")]
    Minify(#[from] MinifyError),

    /// The caller passed input the client cannot send
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Error returned by the single-call document workflow.
///
/// Carries the `DocumentHandle` when the upload succeeded before the failure,
/// so the caller can resume polling or investigate the job out-of-band.
#[derive(Error, Debug)]
#[error("Document translation failed: {source}")]
pub struct DocumentError {
    /// Handle of the in-flight job, if the upload got that far
    pub handle: Option<DocumentHandle>,

    /// The underlying failure
    #[source]
    pub source: TranslationError,
}

/// Errors raised while stripping or restoring embedded media in a
/// zip-based office document
#[derive(Error, Debug)]
pub enum MinifyError {
    /// Unzipping the source archive failed
    #[error("Failed to extract {archive:?} into {dest:?}: {source}")]
    Extract {
        archive: PathBuf,
        dest: PathBuf,
        source: std::io::Error,
    },

    /// Moving a media file into the backup directory failed
    #[error("Failed to back up media file {path:?}: {source}")]
    BackupMedia {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Moving a backed-up media file back into the document failed
    #[error("Failed to restore media file {path:?}: {source}")]
    RestoreMedia {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Creating a directory inside the working tree failed
    #[error("Failed to create directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Re-zipping the working tree into an archive failed
    #[error("Failed to build archive {path:?}: {source}")]
    Archive {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Deleting a stale file standing in the way of an output failed
    #[error("Failed to replace existing file {path:?}: {source}")]
    ReplaceOutput {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Validation errors for glossary entry tables.
///
/// These are always local and synchronous; entry blobs are never sent to the
/// service for validation.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum GlossaryError {
    /// The table or blob contains no entries
    #[error("Glossary contains no entries")]
    NoEntries,

    /// A non-blank line has no source/target delimiter
    #[error("Missing delimiter on line {line}")]
    MissingDelimiter { line: usize },

    /// The target value contains the delimiter, making the row ambiguous
    #[error("Ambiguous row on line {line}: delimiter occurs in target term")]
    AmbiguousRow { line: usize },

    /// The same source term appears on more than one line
    #[error("Duplicate source term {term:?} on line {line}")]
    DuplicateSource { line: usize, term: String },

    /// A term failed validation
    #[error("Invalid term {term:?}: {reason}")]
    InvalidTerm { term: String, reason: String },
}

// Utility conversions for error wrapping
impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        Self::Connection(error.to_string())
    }
}

impl TranslationError {
    /// True for failures the request pipeline is allowed to retry
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::TooManyRequests(_) => true,
            Self::Api { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }
}
