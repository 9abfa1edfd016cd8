/*!
 * Provider client tests against local fake translation services
 *
 * Each test starts an axum server on an ephemeral port that speaks just
 * enough of the provider's API, so no external requests are made.
 */

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use mtdock::app_config::ProviderConfig;
use mtdock::database::models::ProviderId;
use mtdock::errors::ProviderError;
use mtdock::providers::{build_translator, translate_long};

/// What the fake service saw
#[derive(Clone, Default)]
struct Recorder {
    requests: Arc<AtomicUsize>,
    last_headers: Arc<Mutex<Option<HeaderMap>>>,
    last_query: Arc<Mutex<HashMap<String, String>>>,
    status: Option<StatusCode>,
}

impl Recorder {
    fn failing_with(status: StatusCode) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    fn record(&self, headers: HeaderMap, query: HashMap<String, String>) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        *self.last_headers.lock().unwrap() = Some(headers);
        *self.last_query.lock().unwrap() = query;
    }

    fn header(&self, name: &str) -> Option<String> {
        self.last_headers
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|h| h.get(name))
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    fn query(&self, name: &str) -> Option<String> {
        self.last_query.lock().unwrap().get(name).cloned()
    }

    fn count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

async fn spawn_fake(app: Router) -> Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{}", addr))
}

fn provider_config(provider: ProviderId, endpoint: String) -> ProviderConfig {
    let mut config = ProviderConfig::new(provider);
    config.endpoint = endpoint;
    config.api_key = "secret".to_string();
    config.timeout_secs = 5;
    config
}

// ===== AWS =====

/// Largest text the fake AWS endpoint accepts, in bytes
const FAKE_AWS_LIMIT: usize = 300;

async fn fake_aws(
    State(recorder): State<Recorder>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: String,
) -> Response {
    recorder.record(headers, query);
    let request: serde_json::Value = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };
    let text = request["Text"].as_str().unwrap_or_default();

    if text.len() > FAKE_AWS_LIMIT {
        let error = serde_json::json!({
            "__type": "com.amazonaws.translate.model#TextSizeLimitExceededException",
            "message": "Input text size exceeds limit."
        });
        return (StatusCode::BAD_REQUEST, Json(error)).into_response();
    }

    Json(serde_json::json!({
        "TranslatedText": text.to_uppercase(),
        "SourceLanguageCode": request["SourceLanguageCode"],
        "TargetLanguageCode": request["TargetLanguageCode"],
    }))
    .into_response()
}

#[tokio::test]
async fn test_aws_translate_shouldSendJsonProtocolHeaders() -> Result<()> {
    let recorder = Recorder::default();
    let endpoint = spawn_fake(Router::new().route("/", post(fake_aws)).with_state(recorder.clone())).await?;
    let translator = build_translator(&provider_config(ProviderId::Aws, endpoint))?;

    let translated = translator.translate("hello", "en", "es").await?;
    assert_eq!(translated, "HELLO");
    assert_eq!(
        recorder.header("x-amz-target").as_deref(),
        Some("AWSShineFrontendService_20170701.TranslateText")
    );
    assert_eq!(recorder.header("content-type").as_deref(), Some("application/x-amz-json-1.1"));
    assert_eq!(recorder.header("authorization").as_deref(), Some("secret"));
    Ok(())
}

#[tokio::test]
async fn test_aws_translateLong_afterSizeLimitRejection_shouldChunk() -> Result<()> {
    let recorder = Recorder::default();
    let endpoint = spawn_fake(Router::new().route("/", post(fake_aws)).with_state(recorder.clone())).await?;
    let mut config = provider_config(ProviderId::Aws, endpoint);
    config.max_request_size = 600;
    let translator = build_translator(&config)?;

    // 550 bytes: within the configured limit but over what the service accepts
    let text = "ab".repeat(275);
    let translated = translate_long(translator.as_ref(), &text, "en", "de").await?;

    assert_eq!(translated, text.to_uppercase());
    // one rejected attempt, then 100 byte chunks
    assert_eq!(recorder.count(), 1 + 6);
    Ok(())
}

// ===== GCP =====

async fn fake_gcp(
    State(recorder): State<Recorder>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Json(request): Json<serde_json::Value>,
) -> Response {
    recorder.record(headers, query);
    if let Some(status) = recorder.status {
        return (status, Json(serde_json::json!({"error": {"code": status.as_u16()}}))).into_response();
    }

    let translated = format!("{}:{}", request["target"].as_str().unwrap_or_default(), request["q"].as_str().unwrap_or_default());
    Json(serde_json::json!({
        "data": {"translations": [{"translatedText": translated, "detectedSourceLanguage": "en"}]}
    }))
    .into_response()
}

#[tokio::test]
async fn test_gcp_translate_shouldPassKeyAndParseResponse() -> Result<()> {
    let recorder = Recorder::default();
    let app = Router::new()
        .route("/language/translate/v2", post(fake_gcp))
        .with_state(recorder.clone());
    let endpoint = spawn_fake(app).await?;
    let translator = build_translator(&provider_config(
        ProviderId::Gcp,
        format!("{}/language/translate/v2", endpoint),
    ))?;

    let translated = translator.translate("hola", "es", "en").await?;
    assert_eq!(translated, "en:hola");
    assert_eq!(recorder.query("key").as_deref(), Some("secret"));
    Ok(())
}

#[tokio::test]
async fn test_gcp_translate_withForbidden_shouldBeAuthenticationError() -> Result<()> {
    let recorder = Recorder::failing_with(StatusCode::FORBIDDEN);
    let app = Router::new()
        .route("/language/translate/v2", post(fake_gcp))
        .with_state(recorder.clone());
    let endpoint = spawn_fake(app).await?;
    let translator = build_translator(&provider_config(
        ProviderId::Gcp,
        format!("{}/language/translate/v2", endpoint),
    ))?;

    let result = translator.translate("hola", "es", "en").await;
    assert!(matches!(result, Err(ProviderError::AuthenticationError(_))));
    Ok(())
}

// ===== Azure =====

async fn fake_azure(
    State(recorder): State<Recorder>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Json(request): Json<Vec<serde_json::Value>>,
) -> Response {
    let to = query.get("to").cloned().unwrap_or_default();
    recorder.record(headers, query);
    if let Some(status) = recorder.status {
        return (status, "service unavailable").into_response();
    }

    let translations: Vec<serde_json::Value> = request
        .iter()
        .map(|item| {
            serde_json::json!({
                "translations": [{"text": format!("<{}>", item["text"].as_str().unwrap_or_default()), "to": to}]
            })
        })
        .collect();
    Json(translations).into_response()
}

#[tokio::test]
async fn test_azure_translate_shouldSendSubscriptionHeaders() -> Result<()> {
    let recorder = Recorder::default();
    let endpoint = spawn_fake(
        Router::new()
            .route("/translate", post(fake_azure))
            .with_state(recorder.clone()),
    )
    .await?;
    let translator = build_translator(&provider_config(ProviderId::Azure, endpoint))?;

    let translated = translator.translate("hello", "en", "fr").await?;
    assert_eq!(translated, "<hello>");
    assert_eq!(recorder.header("ocp-apim-subscription-key").as_deref(), Some("secret"));
    assert_eq!(recorder.header("ocp-apim-subscription-region").as_deref(), Some("westus"));
    assert!(recorder.header("x-clienttraceid").is_some());
    assert_eq!(recorder.query("api-version").as_deref(), Some("3.0"));
    assert_eq!(recorder.query("from").as_deref(), Some("en"));
    assert_eq!(recorder.query("to").as_deref(), Some("fr"));
    Ok(())
}

#[tokio::test]
async fn test_azure_translate_withServerError_shouldBeApiError() -> Result<()> {
    let recorder = Recorder::failing_with(StatusCode::SERVICE_UNAVAILABLE);
    let endpoint = spawn_fake(
        Router::new()
            .route("/translate", post(fake_azure))
            .with_state(recorder.clone()),
    )
    .await?;
    let translator = build_translator(&provider_config(ProviderId::Azure, endpoint))?;

    match translator.translate("hello", "en", "fr").await {
        Err(ProviderError::ApiError { status_code, message }) => {
            assert_eq!(status_code, 503);
            assert_eq!(message, "service unavailable");
        }
        other => panic!("expected an API error, got {:?}", other),
    }
    Ok(())
}
