/*!
 * HTTP surface.
 *
 * An axum router exposing the pipeline handlers. Handlers answer JSON;
 * failures use the `{"error": "..."}` envelope with the status carried by
 * `HandlerError`.
 */

use anyhow::{Context, Result};
use axum::{
    Form, Json, Router,
    extract::{
        Path, Query, Request, State,
        rejection::{FormRejection, PathRejection, QueryRejection},
    },
    http::{HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use log::{error, info, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;

use crate::dashboard::{ReviewForm, ReviewResponse};
use crate::database::models::{ProviderId, StatusRow};
use crate::errors::HandlerError;
use crate::pipeline::{
    ArticleResponse, DeleteParams, FinalParams, FinalResponse, FirstParams, FirstResponse, LookupParams,
    MessageResponse, PipelineService, PushParams, PushResponse, StoredTranslationResponse, TranslationParams,
};

const ALLOWED_METHODS: &str = "OPTIONS,POST,GET,PUT,DELETE";
const ALLOWED_HEADERS: &str = "Content-Type";

/// A handler error rendered as `{"error": "..."}`
#[derive(Debug)]
pub struct ApiError(pub HandlerError);

impl From<HandlerError> for ApiError {
    fn from(error: HandlerError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// A record, or `{}` when the lookup found nothing
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum OrEmpty<T> {
    Found(T),
    Empty {},
}

impl<T> From<Option<T>> for OrEmpty<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(OrEmpty::Empty {}, OrEmpty::Found)
    }
}

/// Parse a JSON body, reporting failures in the error envelope
fn parse_body<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body)
        .map_err(|e| ApiError(HandlerError::BadRequest(format!("[ERROR]: Invalid request body: {}", e))))
}

fn rejected(detail: String) -> ApiError {
    ApiError(HandlerError::BadRequest(format!("[ERROR]: Invalid request: {}", detail)))
}

/// Query parameters, reporting failures in the error envelope
fn query<T>(extracted: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    extracted.map(|Query(params)| params).map_err(|e| rejected(e.body_text()))
}

// ===== Handlers =====

async fn health(State(pipeline): State<PipelineService>) -> Json<serde_json::Value> {
    let providers: Vec<ProviderId> = pipeline.config().enabled_providers();
    Json(serde_json::json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "providers": providers,
    }))
}

async fn get_article(
    State(pipeline): State<PipelineService>,
    params: Result<Query<LookupParams>, QueryRejection>,
) -> ApiResult<OrEmpty<ArticleResponse>> {
    Ok(Json(pipeline.get_article(query(params)?).await?.into()))
}

async fn get_status(State(pipeline): State<PipelineService>) -> ApiResult<Vec<StatusRow>> {
    Ok(Json(pipeline.get_status().await?))
}

async fn get_translation(
    State(pipeline): State<PipelineService>,
    params: Result<Query<TranslationParams>, QueryRejection>,
) -> ApiResult<OrEmpty<StoredTranslationResponse>> {
    Ok(Json(pipeline.get_translation(query(params)?).await?.into()))
}

async fn get_first(
    State(pipeline): State<PipelineService>,
    params: Result<Query<FirstParams>, QueryRejection>,
) -> ApiResult<FirstResponse> {
    Ok(Json(pipeline.get_first(query(params)?).await?))
}

async fn get_final(
    State(pipeline): State<PipelineService>,
    params: Result<Query<FinalParams>, QueryRejection>,
) -> ApiResult<FinalResponse> {
    Ok(Json(pipeline.get_final(query(params)?).await?))
}

async fn put_first_translation(State(pipeline): State<PipelineService>, body: String) -> ApiResult<MessageResponse> {
    let submission = parse_body(&body)?;
    Ok(Json(pipeline.put_first_translation(submission).await?))
}

async fn put_final_translation(State(pipeline): State<PipelineService>, body: String) -> ApiResult<MessageResponse> {
    let submission = parse_body(&body)?;
    Ok(Json(pipeline.put_final_translation(submission).await?))
}

async fn delete_translation(
    State(pipeline): State<PipelineService>,
    params: Result<Query<DeleteParams>, QueryRejection>,
) -> ApiResult<MessageResponse> {
    Ok(Json(pipeline.delete_translation(query(params)?).await?))
}

async fn push_to_queue_get(
    State(pipeline): State<PipelineService>,
    params: Result<Query<PushParams>, QueryRejection>,
) -> ApiResult<PushResponse> {
    Ok(Json(pipeline.push_to_queue(query(params)?).await?))
}

/// JSON body when present, query string otherwise
async fn push_to_queue_post(
    State(pipeline): State<PipelineService>,
    params: Result<Query<PushParams>, QueryRejection>,
    body: String,
) -> ApiResult<PushResponse> {
    let params = if body.trim().is_empty() { query(params)? } else { parse_body(&body)? };
    Ok(Json(pipeline.push_to_queue(params).await?))
}

async fn submit_translation(
    State(pipeline): State<PipelineService>,
    form: Result<Form<ReviewForm>, FormRejection>,
) -> ApiResult<ReviewResponse> {
    let Form(form) = form.map_err(|e| rejected(e.body_text()))?;
    Ok(Json(pipeline.submit_review(form).await?))
}

async fn remove_from_queue(
    State(pipeline): State<PipelineService>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<MessageResponse> {
    let Path(id) = id.map_err(|e| rejected(e.body_text()))?;
    Ok(Json(pipeline.remove_from_queue(id).await?))
}

/// Add CORS headers to every response and answer preflight requests
async fn cors(State(origin): State<HeaderValue>, request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOWED_METHODS));
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOWED_HEADERS));
    response
}

/// Build the router for `pipeline`
pub fn router(pipeline: PipelineService) -> Router {
    let allowed_origin = &pipeline.config().server.allowed_origin;
    let origin = HeaderValue::from_str(allowed_origin).unwrap_or_else(|_| {
        warn!("Invalid allowed_origin '{}', using '*'", allowed_origin);
        HeaderValue::from_static("*")
    });

    Router::new()
        .route("/health", get(health))
        .route("/get-article", get(get_article))
        .route("/get-status", get(get_status))
        .route("/get_status", get(get_status))
        .route("/get-translation", get(get_translation))
        .route("/get-first", get(get_first))
        .route("/get-final", get(get_final))
        .route("/put-first-translation", post(put_first_translation))
        .route("/put-final-translation", post(put_final_translation))
        .route("/delete-translation", delete(delete_translation))
        .route("/push-to-queue", get(push_to_queue_get).post(push_to_queue_post))
        .route("/submit_translation", post(submit_translation))
        .route("/remove_from_queue/:id", delete(remove_from_queue))
        .layer(middleware::from_fn_with_state(origin, cors))
        .with_state(pipeline)
}

/// Serve the router until `shutdown` resolves
pub async fn serve<F>(pipeline: PipelineService, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!(
        "{}:{}",
        pipeline.config().server.bind_address,
        pipeline.config().server.port
    );
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(pipeline))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;

    info!("HTTP server stopped");
    Ok(())
}
