/*!
 * Translator client and configuration.
 *
 * The `Translator` owns one pooled HTTP transport and one request pipeline;
 * it is cheap to share across tasks and safe for concurrent calls. All
 * network-bound methods take a `CancellationToken` that wins over any
 * in-flight I/O or sleep.
 */

use std::time::Duration;

use log::debug;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::errors::TranslationError;
use crate::glossary::GlossaryEntries;
use crate::pipeline::{ErrorScope, HttpPipeline, RequestDescriptor};
use crate::retry::RetryPolicy;

/// Scheme used in the Authorization header, as defined by the service
const AUTH_SCHEME: &str = "MT-Auth-Key";

/// Client configuration, created once and handed to `Translator::new`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    /// API key for authentication
    pub auth_key: String,

    /// Base URL of the translation service
    pub server_url: String,

    /// Retry and deadline policy for the request pipeline
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Fixed sleep between document status polls
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

impl TranslatorConfig {
    /// Configuration with default retry and polling behavior
    pub fn new(auth_key: impl Into<String>, server_url: impl Into<String>) -> Self {
        TranslatorConfig {
            auth_key: auth_key.into(),
            server_url: server_url.into(),
            retry: RetryPolicy::default(),
            poll_interval: default_poll_interval(),
        }
    }

    /// Replace the retry policy
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the document poll interval
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}

/// One translated text with the language the service detected
#[derive(Debug, Clone, Deserialize)]
pub struct TextTranslation {
    /// Source language detected by the service
    #[serde(default)]
    pub detected_source_language: Option<String>,

    /// Translated text
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct TextTranslationResponse {
    translations: Vec<TextTranslation>,
}

/// Account usage as reported by the service
#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    /// Characters translated in the current billing period
    pub character_count: u64,

    /// Character allowance of the current billing period
    pub character_limit: u64,
}

impl Usage {
    /// True when the current period's allowance is used up
    pub fn limit_reached(&self) -> bool {
        self.character_count >= self.character_limit
    }
}

/// Glossary metadata returned by the glossary endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct GlossaryInfo {
    /// Server-assigned glossary identifier
    pub glossary_id: String,

    /// Caller-supplied display name
    pub name: String,

    /// Source language of the entries
    pub source_lang: String,

    /// Target language of the entries
    pub target_lang: String,

    /// Number of entries the service accepted
    #[serde(default)]
    pub entry_count: u64,
}

/// Translation parameters for text requests
#[derive(Debug, Clone, Default)]
pub struct TextOptions {
    /// Target language code
    pub target_lang: String,

    /// Source language code; the service detects it when omitted
    pub source_lang: Option<String>,

    /// Glossary to apply during translation
    pub glossary_id: Option<String>,

    /// Formality preference, where the target language supports one
    pub formality: Option<String>,
}

impl TextOptions {
    /// Options targeting the given language
    pub fn new(target_lang: impl Into<String>) -> Self {
        TextOptions {
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

    /// Set the formality preference
    pub fn formality(mut self, formality: impl Into<String>) -> Self {
        self.formality = Some(formality.into());
        self
    }

    fn to_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![("target_lang".to_string(), self.target_lang.clone())];
        if let Some(source_lang) = &self.source_lang {
            fields.push(("source_lang".to_string(), source_lang.clone()));
        }
        if let Some(glossary_id) = &self.glossary_id {
            fields.push(("glossary_id".to_string(), glossary_id.clone()));
        }
        if let Some(formality) = &self.formality {
            fields.push(("formality".to_string(), formality.clone()));
        }
        fields
    }
}

/// Client for the remote machine-translation service
pub struct Translator {
    pub(crate) pipeline: HttpPipeline,
    pub(crate) base_url: Url,
    pub(crate) poll_interval: Duration,
}

impl Translator {
    /// Create a client from the given configuration.
    ///
    /// Builds one pooled transport shared by all calls on this instance.
    pub fn new(config: TranslatorConfig) -> Result<Self, TranslationError> {
        if config.auth_key.trim().is_empty() {
            return Err(TranslationError::InvalidInput(
                "auth_key must not be empty".to_string(),
            ));
        }
        let base_url = Url::parse(&config.server_url).map_err(|error| {
            TranslationError::InvalidInput(format!(
                "Invalid server URL {:?}: {}",
                config.server_url, error
            ))
        })?;

        let client = Client::builder()
            // Keep connections alive across retries and polls
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .map_err(|error| {
                TranslationError::Connection(format!("Failed to build HTTP client: {}", error))
            })?;

        let auth_header = format!("{} {}", AUTH_SCHEME, config.auth_key);
        Ok(Translator {
            pipeline: HttpPipeline::new(client, config.retry, auth_header),
            base_url,
            poll_interval: config.poll_interval,
        })
    }

    /// Retry policy this client was built with
    pub fn retry_policy(&self) -> &RetryPolicy {
        self.pipeline.policy()
    }

    /// Translate one or more texts.
    ///
    /// The returned vector matches the input order.
    pub async fn translate_text(
        &self,
        texts: &[&str],
        options: &TextOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<TextTranslation>, TranslationError> {
        if texts.is_empty() {
            return Err(TranslationError::InvalidInput(
                "no texts to translate".to_string(),
            ));
        }

        let mut fields = options.to_fields();
        for text in texts {
            fields.push(("text".to_string(), (*text).to_string()));
        }

        let request =
            RequestDescriptor::new(Method::POST, self.endpoint(&["translate"])?).form(fields);
        let response = self.pipeline.execute(&request, cancel).await?;
        let parsed = response.json::<TextTranslationResponse>().await?;
        Ok(parsed.translations)
    }

    /// Fetch account usage for the current billing period
    pub async fn usage(&self, cancel: &CancellationToken) -> Result<Usage, TranslationError> {
        let request = RequestDescriptor::new(Method::GET, self.endpoint(&["usage"])?);
        let response = self.pipeline.execute(&request, cancel).await?;
        Ok(response.json::<Usage>().await?)
    }

    /// Create a glossary from a validated entry table
    pub async fn create_glossary(
        &self,
        name: impl Into<String>,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
        entries: &GlossaryEntries,
        cancel: &CancellationToken,
    ) -> Result<GlossaryInfo, TranslationError> {
        let blob = entries
            .to_tsv()
            .map_err(|error| TranslationError::InvalidInput(error.to_string()))?;
        let fields = vec![
            ("name".to_string(), name.into()),
            ("source_lang".to_string(), source_lang.into()),
            ("target_lang".to_string(), target_lang.into()),
            ("entries".to_string(), blob),
            ("entries_format".to_string(), "tsv".to_string()),
        ];

        let request = RequestDescriptor::new(Method::POST, self.endpoint(&["glossaries"])?)
            .form(fields)
            .scope(ErrorScope::Glossary);
        let response = self.pipeline.execute(&request, cancel).await?;
        let info = response.json::<GlossaryInfo>().await?;
        debug!("Created glossary {} ({})", info.name, info.glossary_id);
        Ok(info)
    }

    /// Fetch glossary metadata
    pub async fn glossary_info(
        &self,
        glossary_id: &str,
        cancel: &CancellationToken,
    ) -> Result<GlossaryInfo, TranslationError> {
        let request =
            RequestDescriptor::new(Method::GET, self.endpoint(&["glossaries", glossary_id])?)
                .scope(ErrorScope::Glossary);
        let response = self.pipeline.execute(&request, cancel).await?;
        Ok(response.json::<GlossaryInfo>().await?)
    }

    /// Fetch the entries of a glossary.
    ///
    /// The service returns data it already validated, so term checks are
    /// skipped when re-parsing the blob.
    pub async fn glossary_entries(
        &self,
        glossary_id: &str,
        cancel: &CancellationToken,
    ) -> Result<GlossaryEntries, TranslationError> {
        let request = RequestDescriptor::new(
            Method::GET,
            self.endpoint(&["glossaries", glossary_id, "entries"])?,
        )
        .scope(ErrorScope::Glossary);
        let response = self.pipeline.execute(&request, cancel).await?;
        let blob = response.text().await?;

        GlossaryEntries::parse(&blob, crate::glossary::TSV_DELIMITER, true)
            .map_err(|error| TranslationError::InvalidInput(error.to_string()))
    }

    /// Delete a glossary
    pub async fn delete_glossary(
        &self,
        glossary_id: &str,
        cancel: &CancellationToken,
    ) -> Result<(), TranslationError> {
        let request =
            RequestDescriptor::new(Method::DELETE, self.endpoint(&["glossaries", glossary_id])?)
                .scope(ErrorScope::Glossary);
        self.pipeline.execute(&request, cancel).await?;
        Ok(())
    }

    /// Absolute URL for an API endpoint under `/v2/`
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, TranslationError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                TranslationError::InvalidInput(format!(
                    "Server URL {} cannot be a base",
                    self.base_url
                ))
            })?;
            path.pop_if_empty();
            path.push("v2");
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }
}
