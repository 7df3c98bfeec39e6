/*!
 * Tests for error types and conversions
 */

use lingodoc::errors::{DocumentError, GlossaryError, MinifyError, TranslationError};
use lingodoc::DocumentHandle;

#[test]
fn test_translationError_connection_shouldDisplayCorrectly() {
    let error = TranslationError::Connection("Connection timeout".to_string());
    let display = format!("{}", error);
    assert!(display.contains("Connection error"));
    assert!(display.contains("Connection timeout"));
}

#[test]
fn test_translationError_authorizationFailure_shouldDisplayCorrectly() {
    let error = TranslationError::AuthorizationFailure("HTTP 403".to_string());
    let display = format!("{}", error);
    assert!(display.contains("Authorization failure"));
    assert!(display.contains("403"));
}

#[test]
fn test_translationError_quotaExceeded_shouldDisplayCorrectly() {
    let error = TranslationError::QuotaExceeded("HTTP 456: Quota exhausted".to_string());
    let display = format!("{}", error);
    assert!(display.contains("Quota exceeded"));
    assert!(display.contains("456"));
}

#[test]
fn test_translationError_api_shouldDisplayStatusAndMessage() {
    let error = TranslationError::Api {
        status_code: 418,
        message: "teapot".to_string(),
    };
    let display = format!("{}", error);
    assert!(display.contains("418"));
    assert!(display.contains("teapot"));
}

#[test]
fn test_translationError_cancelled_shouldBeDistinctFromConnection() {
    let cancelled = TranslationError::Cancelled;
    let timeout = TranslationError::Connection("Attempt timed out after 5.0s".to_string());
    assert_ne!(format!("{}", cancelled), format!("{}", timeout));
    assert!(format!("{}", cancelled).contains("cancelled"));
}

#[test]
fn test_translationError_isRetryable_shouldMatchTaxonomy() {
    assert!(TranslationError::Connection("reset".to_string()).is_retryable());
    assert!(TranslationError::TooManyRequests("HTTP 429".to_string()).is_retryable());
    assert!(!TranslationError::BadRequest("HTTP 400".to_string()).is_retryable());
    assert!(!TranslationError::Cancelled.is_retryable());
}

#[test]
fn test_translationError_fromIoError_shouldWrapAsFileError() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
    let error: TranslationError = io_error.into();
    let display = format!("{}", error);
    assert!(display.contains("File error"));
    assert!(display.contains("File not found"));
}

#[test]
fn test_documentError_withHandle_shouldExposeHandleAndCause() {
    let error = DocumentError {
        handle: Some(DocumentHandle {
            document_id: "D1".to_string(),
            document_key: "K1".to_string(),
        }),
        source: TranslationError::DocumentFailed("source text too large".to_string()),
    };

    assert_eq!(error.handle.as_ref().unwrap().document_id, "D1");
    let display = format!("{}", error);
    assert!(display.contains("Document translation failed"));
}

#[test]
fn test_minifyError_extract_shouldNamePaths() {
    let error = MinifyError::Extract {
        archive: "/tmp/in.pptx".into(),
        dest: "/tmp/work/extracted".into(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, "not a zip"),
    };
    let display = format!("{}", error);
    assert!(display.contains("in.pptx"));
    assert!(display.contains("extracted"));
    assert!(display.contains("not a zip"));
}

#[test]
fn test_glossaryError_duplicateSource_shouldNameLineAndTerm() {
    let error = GlossaryError::DuplicateSource {
        line: 3,
        term: "hello".to_string(),
    };
    let display = format!("{}", error);
    assert!(display.contains("line 3"));
    assert!(display.contains("hello"));
}

#[test]
fn test_translationError_debug_shouldBeImplemented() {
    let error = TranslationError::NotFound("HTTP 404".to_string());
    let debug = format!("{:?}", error);
    assert!(debug.contains("NotFound"));
}
