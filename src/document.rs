/*!
 * Document translation workflow.
 *
 * Drives one document job from submission to a translated output file. The
 * three-step API (`upload_document`, `document_status`, `download_document`)
 * lets callers persist a `DocumentHandle` and resume across process
 * restarts; `translate_document` hides the whole upload / poll / download
 * protocol behind a single call, with optional archive minification wrapped
 * around it.
 */

use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures_util::StreamExt;
use log::{debug, warn};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::client::Translator;
use crate::errors::{DocumentError, TranslationError};
use crate::minifier::DocumentMinifier;
use crate::pipeline::{ErrorScope, RequestDescriptor};

/// Opaque identifiers returned by a successful upload.
///
/// Both fields are required for every follow-up call; the pair acts as a
/// capability for the in-flight job. Serializable so callers can persist it
/// and resume polling after a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentHandle {
    /// Server-assigned identifier of the document job
    pub document_id: String,

    /// Secret key paired with the identifier
    pub document_key: String,
}

/// Lifecycle state of a document job as reported by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentState {
    /// Waiting for a translation worker
    Queued,
    /// Translation in progress
    Translating,
    /// Translation finished, result ready for download
    Done,
    /// Translation failed server-side
    Error,
}

impl DocumentState {
    /// True for states the poll loop can leave
    pub fn is_terminal(self) -> bool {
        matches!(self, DocumentState::Done | DocumentState::Error)
    }
}

/// One status poll result; superseded by the next poll, never merged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentStatus {
    /// Identifier of the document job
    pub document_id: String,

    /// Current lifecycle state
    #[serde(rename = "status")]
    pub state: DocumentState,

    /// Service estimate of remaining translation time. Explicitly unreliable;
    /// the poll loop never uses it for scheduling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds_remaining: Option<u64>,

    /// Characters billed for the job, reported once it is done
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billed_characters: Option<u64>,

    /// Service-supplied failure description when the state is Error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Translation parameters for one document job
#[derive(Debug, Clone, Default)]
pub struct DocumentOptions {
    /// Target language code
    pub target_lang: String,

    /// Source language code; the service detects it when omitted
    pub source_lang: Option<String>,

    /// Glossary to apply during translation
    pub glossary_id: Option<String>,

    /// Strip large embedded media before upload and restore it afterwards
    pub minify_large_documents: bool,
}

impl DocumentOptions {
    /// Options targeting the given language
    pub fn new(target_lang: impl Into<String>) -> Self {
        DocumentOptions {
            target_lang: target_lang.into(),
            ..Default::default()
        }
    }

    /// Set the source language
    pub fn source_lang(mut self, source_lang: impl Into<String>) -> Self {
        self.source_lang = Some(source_lang.into());
        self
    }

    /// Apply a glossary during translation
    pub fn glossary_id(mut self, glossary_id: impl Into<String>) -> Self {
        self.glossary_id = Some(glossary_id.into());
        self
    }

    /// Enable minification for oversized office documents
    pub fn minify_large_documents(mut self, enabled: bool) -> Self {
        self.minify_large_documents = enabled;
        self
    }

    /// Form fields shared by the upload endpoint
    fn to_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![("target_lang".to_string(), self.target_lang.clone())];
        if let Some(source_lang) = &self.source_lang {
            fields.push(("source_lang".to_string(), source_lang.clone()));
        }
        if let Some(glossary_id) = &self.glossary_id {
            fields.push(("glossary_id".to_string(), glossary_id.clone()));
        }
        fields
    }
}

impl Translator {
    /// Upload a document for translation.
    ///
    /// Returns the handle identifying the job; nothing is returned on failure
    /// because there is nothing to resume.
    pub async fn upload_document(
        &self,
        content: Bytes,
        filename: impl Into<String>,
        options: &DocumentOptions,
        cancel: &CancellationToken,
    ) -> Result<DocumentHandle, TranslationError> {
        let request = RequestDescriptor::new(Method::POST, self.endpoint(&["document"])?)
            .file_upload("file", filename, content, options.to_fields());

        let response = self.pipeline.execute(&request, cancel).await?;
        Ok(response.json::<DocumentHandle>().await?)
    }

    /// Upload a document from a file on disk
    pub async fn upload_document_file(
        &self,
        path: &Path,
        options: &DocumentOptions,
        cancel: &CancellationToken,
    ) -> Result<DocumentHandle, TranslationError> {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .ok_or_else(|| {
                TranslationError::InvalidInput(format!("{:?} has no file name", path))
            })?;
        let content = Bytes::from(tokio::fs::read(path).await?);
        self.upload_document(content, filename, options, cancel).await
    }

    /// Fetch the current status of a document job
    pub async fn document_status(
        &self,
        handle: &DocumentHandle,
        cancel: &CancellationToken,
    ) -> Result<DocumentStatus, TranslationError> {
        let request =
            RequestDescriptor::new(Method::POST, self.endpoint(&["document", &handle.document_id])?)
                .form(vec![("document_key".to_string(), handle.document_key.clone())]);

        let response = self.pipeline.execute(&request, cancel).await?;
        Ok(response.json::<DocumentStatus>().await?)
    }

    /// Poll a document job until it reaches a terminal state.
    ///
    /// Non-terminal states sleep a fixed configured interval between polls;
    /// the service's remaining-time hint is documented as unreliable and is
    /// ignored for scheduling. An Error state fails with the service-supplied
    /// message when one is present.
    pub async fn wait_for_document(
        &self,
        handle: &DocumentHandle,
        cancel: &CancellationToken,
    ) -> Result<DocumentStatus, TranslationError> {
        loop {
            let status = self.document_status(handle, cancel).await?;
            match status.state {
                DocumentState::Done => return Ok(status),
                DocumentState::Error => {
                    let message = status
                        .error_message
                        .unwrap_or_else(|| "service reported an unspecified error".to_string());
                    return Err(TranslationError::DocumentFailed(message));
                }
                DocumentState::Queued | DocumentState::Translating => {
                    debug!(
                        "Document {} is {:?}, polling again in {:.1}s",
                        handle.document_id,
                        status.state,
                        self.poll_interval.as_secs_f64()
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(TranslationError::Cancelled),
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
            }
        }
    }

    /// Download the translated result of a finished job into `output`.
    ///
    /// Fails with `DocumentNotReady` while the job is still translating. A
    /// partially written new file is removed on failure so a retry does not
    /// collide with it.
    pub async fn download_document(
        &self,
        handle: &DocumentHandle,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), TranslationError> {
        let existed_before = output.exists();
        let result = self.download_document_inner(handle, output, cancel).await;

        if result.is_err() && !existed_before {
            remove_partial_output(output);
        }
        result
    }

    async fn download_document_inner(
        &self,
        handle: &DocumentHandle,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), TranslationError> {
        let request = RequestDescriptor::new(
            Method::POST,
            self.endpoint(&["document", &handle.document_id, "result"])?,
        )
        .form(vec![("document_key".to_string(), handle.document_key.clone())])
        .scope(ErrorScope::DocumentDownload);

        let response = self.pipeline.execute(&request, cancel).await?;

        let mut file = tokio::fs::File::create(output).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            if cancel.is_cancelled() {
                return Err(TranslationError::Cancelled);
            }
            let chunk = chunk.map_err(|error| {
                TranslationError::Connection(format!("Download stream failed: {}", error))
            })?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }

    /// Translate one document end-to-end: upload, poll until done, download.
    ///
    /// With minification enabled and a supported input type, embedded media
    /// is stripped before upload and restored into the downloaded result.
    /// Any failure is wrapped in a `DocumentError` carrying the handle when
    /// the upload succeeded, so the caller can resume or investigate.
    pub async fn translate_document(
        &self,
        input: &Path,
        output: &Path,
        options: &DocumentOptions,
        cancel: &CancellationToken,
    ) -> Result<(), DocumentError> {
        let existed_before = output.exists();
        let mut handle = None;

        let result = self
            .translate_document_inner(input, output, options, cancel, &mut handle)
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(source) => {
                if !existed_before {
                    remove_partial_output(output);
                }
                Err(DocumentError { handle, source })
            }
        }
    }

    async fn translate_document_inner(
        &self,
        input: &Path,
        output: &Path,
        options: &DocumentOptions,
        cancel: &CancellationToken,
        handle_slot: &mut Option<DocumentHandle>,
    ) -> Result<(), TranslationError> {
        let minify = options.minify_large_documents && DocumentMinifier::can_minify(input);

        let (upload_path, workspace) = if minify {
            let workspace = tempfile::tempdir()?;
            let minifier = DocumentMinifier::new(workspace.path());
            let minified = minifier.minify(input, true)?;
            (minified, Some((workspace, minifier)))
        } else {
            (input.to_path_buf(), None)
        };

        let handle = self
            .upload_document_file(&upload_path, options, cancel)
            .await?;
        *handle_slot = Some(handle.clone());

        let status = self.wait_for_document(&handle, cancel).await?;
        debug!(
            "Document {} done, billed characters: {:?}",
            handle.document_id, status.billed_characters
        );

        match workspace {
            Some((workspace, minifier)) => {
                let translated = translated_scratch_path(workspace.path(), input);
                self.download_document(&handle, &translated, cancel).await?;
                minifier.deminify(&translated, output, false)?;
                // workspace drops here and removes the scratch tree
            }
            None => {
                self.download_document(&handle, output, cancel).await?;
            }
        }

        Ok(())
    }
}

/// Scratch path for the translated, still-minified download
fn translated_scratch_path(workspace: &Path, input: &Path) -> PathBuf {
    let extension = input
        .extension()
        .map(|ext| ext.to_string_lossy().to_string())
        .unwrap_or_else(|| "zip".to_string());
    workspace.join(format!("translatedDoc.{}", extension))
}

/// Best-effort removal of a partially written destination file
fn remove_partial_output(output: &Path) {
    if output.exists() {
        if let Err(error) = std::fs::remove_file(output) {
            warn!("Failed to remove partial output {:?}: {}", output, error);
        }
    }
}
