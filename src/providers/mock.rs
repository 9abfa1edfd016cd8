/*!
 * Mock translator for tests.
 *
 * - `MockTranslator::working()` - always succeeds with `[<to>] <text>`
 * - `MockTranslator::intermittent()` - fails every Nth request
 * - `MockTranslator::failing()` - always fails
 * - `MockTranslator::size_limited()` - rejects texts over a size
 */

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::database::models::ProviderId;
use crate::errors::ProviderError;
use crate::providers::Translator;

/// Behavior mode for the mock translator
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds
    Working,
    /// Fails every Nth request
    Intermittent { fail_every: usize },
    /// Always fails with an API error
    Failing,
    /// Rejects texts longer than `max` units as too large
    SizeLimited { max: usize },
}

/// Scripted translator that counts its requests
#[derive(Debug, Clone)]
pub struct MockTranslator {
    provider: ProviderId,
    behavior: MockBehavior,
    max_request_size: Option<usize>,
    request_count: Arc<AtomicUsize>,
}

impl MockTranslator {
    /// Create a mock for `provider` with the given behavior
    pub fn new(provider: ProviderId, behavior: MockBehavior) -> Self {
        Self {
            provider,
            behavior,
            max_request_size: None,
            request_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn working(provider: ProviderId) -> Self {
        Self::new(provider, MockBehavior::Working)
    }

    pub fn intermittent(provider: ProviderId, fail_every: usize) -> Self {
        Self::new(provider, MockBehavior::Intermittent { fail_every: fail_every.max(1) })
    }

    pub fn failing(provider: ProviderId) -> Self {
        Self::new(provider, MockBehavior::Failing)
    }

    pub fn size_limited(provider: ProviderId, max: usize) -> Self {
        Self::new(provider, MockBehavior::SizeLimited { max })
    }

    /// Advertise a different request limit than the real provider
    pub fn with_max_request_size(mut self, max: usize) -> Self {
        self.max_request_size = Some(max);
        self
    }

    /// Requests made so far, shared between clones
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    fn render(text: &str, to: &str) -> String {
        format!("[{}] {}", to, text)
    }
}

#[async_trait]
impl Translator for MockTranslator {
    fn provider(&self) -> ProviderId {
        self.provider
    }

    fn max_request_size(&self) -> usize {
        self.max_request_size.unwrap_or_else(|| self.provider.max_request_size())
    }

    async fn translate(&self, text: &str, _from: &str, to: &str) -> Result<String, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);

        match self.behavior {
            MockBehavior::Working => Ok(Self::render(text, to)),

            MockBehavior::Intermittent { fail_every } => {
                if count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        status_code: 503,
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                    })
                } else {
                    Ok(Self::render(text, to))
                }
            }

            MockBehavior::Failing => Err(ProviderError::ApiError {
                status_code: 500,
                message: "Simulated provider failure".to_string(),
            }),

            MockBehavior::SizeLimited { max } => {
                if self.size_unit().measure(text) > max {
                    Err(ProviderError::TextSizeLimitExceeded(format!(
                        "Input text size exceeds limit. Max length of request text allowed is {}",
                        max
                    )))
                } else {
                    Ok(Self::render(text, to))
                }
            }
        }
    }
}
