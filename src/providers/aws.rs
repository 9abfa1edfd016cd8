use async_trait::async_trait;
use log::debug;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};

use crate::app_config::ProviderConfig;
use crate::database::models::ProviderId;
use crate::errors::ProviderError;
use crate::providers::{Translator, error_from_response, http_client, parse_endpoint};

const TARGET: &str = "AWSShineFrontendService_20170701.TranslateText";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Amazon Translate client speaking the JSON 1.1 protocol
///
/// The configured `api_key`, when set, is sent verbatim as the
/// `Authorization` header. Signing is left to whatever fronts the endpoint.
#[derive(Debug)]
pub struct AwsTranslate {
    client: Client,
    endpoint: url::Url,
    authorization: Option<String>,
    max_request_size: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct TranslateTextRequest<'a> {
    text: &'a str,
    source_language_code: &'a str,
    target_language_code: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TranslateTextResponse {
    translated_text: String,
}

impl AwsTranslate {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Ok(Self {
            client: http_client(config)?,
            endpoint: parse_endpoint(config)?,
            authorization: Some(config.api_key.clone()).filter(|k| !k.is_empty()),
            max_request_size: config.effective_max_request_size(),
        })
    }
}

#[async_trait]
impl Translator for AwsTranslate {
    fn provider(&self) -> ProviderId {
        ProviderId::Aws
    }

    fn max_request_size(&self) -> usize {
        self.max_request_size
    }

    async fn translate(&self, text: &str, from: &str, to: &str) -> Result<String, ProviderError> {
        let body = TranslateTextRequest {
            text,
            source_language_code: from,
            target_language_code: to,
        };

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header(header::CONTENT_TYPE, CONTENT_TYPE)
            .header("X-Amz-Target", TARGET)
            .json(&body);
        if let Some(auth) = &self.authorization {
            request = request.header(header::AUTHORIZATION, auth);
        }

        debug!("AWS TranslateText {} -> {} ({} bytes)", from, to, text.len());
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let parsed: TranslateTextResponse = response.json().await?;
        Ok(parsed.translated_text)
    }
}
