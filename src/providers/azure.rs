use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::app_config::ProviderConfig;
use crate::database::models::ProviderId;
use crate::errors::ProviderError;
use crate::providers::{Translator, error_from_response, http_client, parse_endpoint};

/// Azure Translator v3 client
#[derive(Debug)]
pub struct AzureTranslator {
    client: Client,
    translate_url: url::Url,
    api_key: String,
    region: String,
    max_request_size: usize,
}

#[derive(Debug, Serialize)]
struct RequestItem<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ResponseItem {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    text: String,
}

impl AzureTranslator {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let mut translate_url = parse_endpoint(config)?;
        translate_url
            .path_segments_mut()
            .map_err(|_| ProviderError::Configuration(format!("Invalid Azure endpoint: {}", config.endpoint)))?
            .pop_if_empty()
            .push("translate");

        Ok(Self {
            client: http_client(config)?,
            translate_url,
            api_key: config.api_key.clone(),
            region: config.region.clone(),
            max_request_size: config.effective_max_request_size(),
        })
    }

    fn request_url(&self, from: &str, to: &str) -> url::Url {
        let mut url = self.translate_url.clone();
        url.query_pairs_mut()
            .append_pair("api-version", "3.0")
            .append_pair("from", from)
            .append_pair("to", to);
        url
    }
}

#[async_trait]
impl Translator for AzureTranslator {
    fn provider(&self) -> ProviderId {
        ProviderId::Azure
    }

    fn max_request_size(&self) -> usize {
        self.max_request_size
    }

    async fn translate(&self, text: &str, from: &str, to: &str) -> Result<String, ProviderError> {
        let mut request = self
            .client
            .post(self.request_url(from, to))
            .header("Ocp-Apim-Subscription-Key", &self.api_key)
            .header("X-ClientTraceId", uuid::Uuid::new_v4().to_string())
            .json(&[RequestItem { text }]);
        if !self.region.is_empty() {
            request = request.header("Ocp-Apim-Subscription-Region", &self.region);
        }

        debug!("Azure translate {} -> {} ({} chars)", from, to, text.chars().count());
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let parsed: Vec<ResponseItem> = response.json().await?;
        parsed
            .into_iter()
            .next()
            .and_then(|item| item.translations.into_iter().next())
            .map(|t| t.text)
            .ok_or_else(|| ProviderError::ParseError("Response contained no translations".to_string()))
    }
}
