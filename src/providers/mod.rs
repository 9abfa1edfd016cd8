/*!
 * Machine translation providers.
 *
 * - `aws`: Amazon Translate over its JSON 1.1 protocol
 * - `gcp`: Google Cloud Translation v2 REST
 * - `azure`: Azure Translator v3 REST
 * - `mock`: scripted translator for tests
 *
 * Every provider caps the size of a single request. `translate_long` keeps
 * requests under that cap by splitting long texts into chunks.
 */

use async_trait::async_trait;
use log::{debug, warn};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::ProviderConfig;
use crate::database::models::ProviderId;
use crate::errors::ProviderError;

pub mod aws;
pub mod azure;
pub mod gcp;
pub mod mock;

/// Headroom kept below a provider's request limit when chunking
pub const CHUNK_MARGIN: usize = 500;

/// How a provider measures request size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeUnit {
    /// UTF-8 bytes
    Bytes,
    /// Unicode scalar values
    Chars,
}

impl SizeUnit {
    /// Size of `text` in this unit
    pub fn measure(&self, text: &str) -> usize {
        match self {
            SizeUnit::Bytes => text.len(),
            SizeUnit::Chars => text.chars().count(),
        }
    }

    /// Split `text` into pieces of at most `max` units each
    pub fn split<'a>(&self, text: &'a str, max: usize) -> Vec<&'a str> {
        match self {
            SizeUnit::Bytes => split_by_bytes(text, max),
            SizeUnit::Chars => split_by_chars(text, max),
        }
    }
}

impl ProviderId {
    /// Unit the provider's request limit is expressed in
    pub fn size_unit(&self) -> SizeUnit {
        match self {
            ProviderId::Aws => SizeUnit::Bytes,
            ProviderId::Gcp | ProviderId::Azure => SizeUnit::Chars,
        }
    }
}

/// Split on UTF-8 boundaries into pieces of at most `max_bytes` bytes
///
/// A character wider than `max_bytes` becomes a piece of its own.
pub fn split_by_bytes(text: &str, max_bytes: usize) -> Vec<&str> {
    let max_bytes = max_bytes.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_bytes).min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        if end == start {
            end = start + 1;
            while !text.is_char_boundary(end) {
                end += 1;
            }
        }
        chunks.push(&text[start..end]);
        start = end;
    }

    chunks
}

/// Split into pieces of at most `max_chars` characters
pub fn split_by_chars(text: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    for (count, (idx, _)) in text.char_indices().enumerate() {
        if count > 0 && count % max_chars == 0 {
            chunks.push(&text[start..idx]);
            start = idx;
        }
    }
    if start < text.len() {
        chunks.push(&text[start..]);
    }

    chunks
}

/// A machine translation service
#[async_trait]
pub trait Translator: Send + Sync + Debug {
    /// Provider this translator talks to
    fn provider(&self) -> ProviderId;

    /// Largest text accepted by one request, in `size_unit()`
    fn max_request_size(&self) -> usize {
        self.provider().max_request_size()
    }

    /// Unit of `max_request_size()`
    fn size_unit(&self) -> SizeUnit {
        self.provider().size_unit()
    }

    /// Translate one piece of text that fits in a single request
    async fn translate(&self, text: &str, from: &str, to: &str) -> Result<String, ProviderError>;
}

/// Translate `text` of any length
///
/// Text over the provider limit is split into chunks of the limit minus
/// [`CHUNK_MARGIN`], translated in order and concatenated. A request the
/// provider rejects as too large is retried the same way.
pub async fn translate_long(
    translator: &dyn Translator,
    text: &str,
    from: &str,
    to: &str,
) -> Result<String, ProviderError> {
    if text.is_empty() {
        return Ok(String::new());
    }

    let unit = translator.size_unit();
    let limit = translator.max_request_size();

    if unit.measure(text) <= limit {
        match translator.translate(text, from, to).await {
            Err(ProviderError::TextSizeLimitExceeded(message)) => {
                warn!("{} rejected text as too large, chunking: {}", translator.provider(), message);
            }
            other => return other,
        }
    }

    let chunk_size = limit.saturating_sub(CHUNK_MARGIN).max(1);
    let chunks = unit.split(text, chunk_size);
    debug!("Translating {} chunks with {}", chunks.len(), translator.provider());

    let mut translated = String::with_capacity(text.len());
    for chunk in chunks {
        translated.push_str(&translator.translate(chunk, from, to).await?);
    }
    Ok(translated)
}

/// Map a non-success provider response to an error
pub(crate) async fn error_from_response(response: reqwest::Response) -> ProviderError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if body.contains("TextSizeLimitExceeded") || status == reqwest::StatusCode::PAYLOAD_TOO_LARGE {
        return ProviderError::TextSizeLimitExceeded(body);
    }
    match status.as_u16() {
        401 | 403 => ProviderError::AuthenticationError(body),
        code => ProviderError::ApiError {
            status_code: code,
            message: body,
        },
    }
}

pub(crate) fn http_client(config: &ProviderConfig) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs.max(1)))
        .build()
        .map_err(|e| ProviderError::Configuration(format!("Failed to build HTTP client: {}", e)))
}

pub(crate) fn parse_endpoint(config: &ProviderConfig) -> Result<url::Url, ProviderError> {
    url::Url::parse(&config.endpoint).map_err(|e| {
        ProviderError::Configuration(format!(
            "Invalid endpoint '{}' for {}: {}",
            config.endpoint, config.provider_type, e
        ))
    })
}

/// Build the client for a configured provider
pub fn build_translator(config: &ProviderConfig) -> Result<Arc<dyn Translator>, ProviderError> {
    let translator: Arc<dyn Translator> = match config.provider_type {
        ProviderId::Aws => Arc::new(aws::AwsTranslate::new(config)?),
        ProviderId::Gcp => Arc::new(gcp::GoogleTranslate::new(config)?),
        ProviderId::Azure => Arc::new(azure::AzureTranslator::new(config)?),
    };
    Ok(translator)
}
