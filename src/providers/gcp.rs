use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::app_config::ProviderConfig;
use crate::database::models::ProviderId;
use crate::errors::ProviderError;
use crate::providers::{Translator, error_from_response, http_client, parse_endpoint};

/// Google Cloud Translation v2 client
#[derive(Debug)]
pub struct GoogleTranslate {
    client: Client,
    endpoint: url::Url,
    max_request_size: usize,
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Debug, Deserialize)]
struct TranslateData {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

impl GoogleTranslate {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let mut endpoint = parse_endpoint(config)?;
        if !config.api_key.is_empty() {
            endpoint.query_pairs_mut().append_pair("key", &config.api_key);
        }

        Ok(Self {
            client: http_client(config)?,
            endpoint,
            max_request_size: config.effective_max_request_size(),
        })
    }
}

#[async_trait]
impl Translator for GoogleTranslate {
    fn provider(&self) -> ProviderId {
        ProviderId::Gcp
    }

    fn max_request_size(&self) -> usize {
        self.max_request_size
    }

    async fn translate(&self, text: &str, from: &str, to: &str) -> Result<String, ProviderError> {
        let body = TranslateRequest {
            q: text,
            source: from,
            target: to,
            format: "text",
        };

        debug!("GCP translate {} -> {} ({} chars)", from, to, text.chars().count());
        let response = self.client.post(self.endpoint.clone()).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let parsed: TranslateResponse = response.json().await?;
        parsed
            .data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or_else(|| ProviderError::ParseError("Response contained no translations".to_string()))
    }
}
