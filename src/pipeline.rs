/*!
 * Resilient request pipeline.
 *
 * Executes one logical HTTP call against the translation service with
 * automatic retry, per-attempt and overall deadlines, and cancellation.
 * Transport failures and status codes are translated into the
 * `TranslationError` taxonomy exactly once, on the terminal outcome.
 */

use std::time::Duration;

use bytes::Bytes;
use log::{debug, warn};
use reqwest::{Client, Method, StatusCode, multipart};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::errors::TranslationError;
use crate::retry::RetryPolicy;

/// How status codes should be mapped for the call being executed.
///
/// Most calls use `General`; glossary-scoped calls turn 404 into a glossary
/// error, and document downloads turn 503 into a not-ready error instead of
/// retrying it as a server failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorScope {
    General,
    Glossary,
    DocumentDownload,
}

/// Body of a request descriptor.
///
/// Bodies are stored as plain data so every retry attempt can rebuild the
/// request from scratch; a reqwest multipart form cannot be reused once sent.
#[derive(Debug, Clone)]
pub(crate) enum RequestBody {
    Empty,
    Form(Vec<(String, String)>),
    FileUpload {
        field: String,
        filename: String,
        content: Bytes,
        fields: Vec<(String, String)>,
    },
}

/// One logical call: everything needed to build any number of attempts
#[derive(Debug, Clone)]
pub(crate) struct RequestDescriptor {
    pub method: Method,
    pub url: Url,
    pub body: RequestBody,
    pub scope: ErrorScope,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: Url) -> Self {
        RequestDescriptor {
            method,
            url,
            body: RequestBody::Empty,
            scope: ErrorScope::General,
        }
    }

    pub fn form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = RequestBody::Form(fields);
        self
    }

    pub fn scope(mut self, scope: ErrorScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn file_upload(
        mut self,
        field: impl Into<String>,
        filename: impl Into<String>,
        content: Bytes,
        fields: Vec<(String, String)>,
    ) -> Self {
        self.body = RequestBody::FileUpload {
            field: field.into(),
            filename: filename.into(),
            content,
            fields,
        };
        self
    }
}

/// Outcome of a single attempt, consumed immediately by the retry loop
enum AttemptOutcome {
    Success(reqwest::Response),
    Retryable(TranslationError),
    Fatal(TranslationError),
}

/// Owns the transport handle and the retry policy.
///
/// Safe for concurrent use: the only shared state is the pooled reqwest
/// client and the immutable policy.
pub(crate) struct HttpPipeline {
    client: Client,
    policy: RetryPolicy,
    auth_header: String,
}

impl HttpPipeline {
    pub fn new(client: Client, policy: RetryPolicy, auth_header: String) -> Self {
        HttpPipeline {
            client,
            policy,
            auth_header,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute one logical call, retrying transient failures under the policy.
    ///
    /// The cancellation token always takes precedence: it is checked before
    /// each attempt, raced against the in-flight request, and raced against
    /// every backoff sleep.
    pub async fn execute(
        &self,
        request: &RequestDescriptor,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, TranslationError> {
        let started = Instant::now();
        let mut last_error = TranslationError::Connection("no attempt was made".to_string());

        for attempt in 1..=self.policy.max_attempts.max(1) {
            if cancel.is_cancelled() {
                return Err(TranslationError::Cancelled);
            }

            match self.run_attempt(request, cancel).await? {
                AttemptOutcome::Success(response) => return Ok(response),
                AttemptOutcome::Fatal(error) => return Err(error),
                AttemptOutcome::Retryable(error) => {
                    debug!(
                        "Attempt {}/{} for {} failed: {}",
                        attempt, self.policy.max_attempts, request.url, error
                    );
                    last_error = error;
                }
            }

            if attempt == self.policy.max_attempts.max(1) {
                break;
            }

            let delay = self.policy.jittered_delay(attempt);
            if self.past_deadline(started, delay) {
                warn!("Overall deadline exceeded for {}, giving up", request.url);
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(TranslationError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        Err(last_error)
    }

    /// True when sleeping `delay` would push the call past the overall deadline
    fn past_deadline(&self, started: Instant, delay: Duration) -> bool {
        match self.policy.overall_timeout {
            Some(total) => started.elapsed() + delay > total,
            None => false,
        }
    }

    async fn run_attempt(
        &self,
        request: &RequestDescriptor,
        cancel: &CancellationToken,
    ) -> Result<AttemptOutcome, TranslationError> {
        let send_future = self.build_request(request).send();

        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(TranslationError::Cancelled),
            result = tokio::time::timeout(self.policy.attempt_timeout, send_future) => result,
        };

        let response = match result {
            Err(_) => {
                return Ok(AttemptOutcome::Retryable(TranslationError::Connection(
                    format!(
                        "Attempt timed out after {:.1}s",
                        self.policy.attempt_timeout.as_secs_f64()
                    ),
                )));
            }
            Ok(Err(error)) => {
                let message = format!("Request to {} failed: {}", request.url, error);
                // Timeouts, refused connections and resets are transient;
                // only a request we could not even build is a terminal failure.
                return Ok(if error.is_builder() {
                    AttemptOutcome::Fatal(TranslationError::Connection(message))
                } else {
                    AttemptOutcome::Retryable(TranslationError::Connection(message))
                });
            }
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        if status.is_success() {
            return Ok(AttemptOutcome::Success(response));
        }

        // A 503 from the result endpoint means the document is not ready
        // yet, not a server failure; it is terminal for this call.
        let not_ready = request.scope == ErrorScope::DocumentDownload
            && status == StatusCode::SERVICE_UNAVAILABLE;
        let retryable =
            !not_ready && (status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error());

        let error = map_status_error(status, read_error_message(response).await, request.scope);
        Ok(if retryable {
            AttemptOutcome::Retryable(error)
        } else {
            AttemptOutcome::Fatal(error)
        })
    }

    /// Rebuild the reqwest request for one attempt from the descriptor
    fn build_request(&self, request: &RequestDescriptor) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .header(reqwest::header::AUTHORIZATION, &self.auth_header);

        match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Form(fields) => builder.form(fields),
            RequestBody::FileUpload {
                field,
                filename,
                content,
                fields,
            } => {
                let part =
                    multipart::Part::bytes(content.to_vec()).file_name(filename.clone());
                let mut form = multipart::Form::new().part(field.clone(), part);
                for (key, value) in fields {
                    form = form.text(key.clone(), value.clone());
                }
                builder.multipart(form)
            }
        }
    }
}

/// Pull a human-readable message out of an error response body.
///
/// The service usually returns `{"message": "..."}`, sometimes with an extra
/// `detail` field. Parse failures are swallowed; classification never depends
/// on the body.
async fn read_error_message(response: reqwest::Response) -> Option<String> {
    let body = response.text().await.ok()?;
    let value: serde_json::Value = serde_json::from_str(&body).ok()?;

    let message = value.get("message").and_then(|v| v.as_str());
    let detail = value.get("detail").and_then(|v| v.as_str());
    match (message, detail) {
        (Some(message), Some(detail)) => Some(format!("{}, {}", message, detail)),
        (Some(message), None) => Some(message.to_string()),
        (None, Some(detail)) => Some(detail.to_string()),
        (None, None) => None,
    }
}

/// Map a terminal status code into the error taxonomy, exactly once per call
fn map_status_error(
    status: StatusCode,
    service_message: Option<String>,
    scope: ErrorScope,
) -> TranslationError {
    let message = match &service_message {
        Some(detail) => format!("HTTP {}: {}", status.as_u16(), detail),
        None => format!("HTTP {}", status.as_u16()),
    };

    match status.as_u16() {
        401 | 403 => TranslationError::AuthorizationFailure(message),
        404 if scope == ErrorScope::Glossary => TranslationError::GlossaryNotFound(message),
        404 => TranslationError::NotFound(message),
        456 => TranslationError::QuotaExceeded(message),
        429 => TranslationError::TooManyRequests(message),
        400 => TranslationError::BadRequest(message),
        503 if scope == ErrorScope::DocumentDownload => {
            TranslationError::DocumentNotReady(message)
        }
        code => TranslationError::Api {
            status_code: code,
            message: service_message.unwrap_or_else(|| "no details in response".to_string()),
        },
    }
}
