//! HTTP surface — intake, health, and service descriptor.
//!
//! Three routes, all non-blocking with respect to pipeline work:
//! - `POST /process`: validate, enqueue, answer 202 immediately
//! - `GET /health`: liveness plus current queue depth
//! - `GET /`: service descriptor
//!
//! Callers only ever see 202 or 400 from intake; every downstream
//! failure surfaces through the `error` field of the delivered results.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::{AppConfig, SERVICE_NAME, SERVICE_VERSION};
use crate::pipeline::error::ValidationError;
use crate::pipeline::queue::BatchQueue;
use crate::pipeline::types::{Batch, Prospect};

/// Shared request-handler state. The queue is the only link to the
/// worker; handlers never touch pipeline stages.
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<BatchQueue>,
    pub default_max_selected: usize,
    pub default_min_score: u8,
}

impl AppState {
    pub fn new(queue: Arc<BatchQueue>, config: &AppConfig) -> Self {
        Self {
            queue,
            default_max_selected: config.max_selected,
            default_min_score: config.min_score_threshold,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/process", post(process))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequest {
    #[serde(default)]
    items: Vec<serde_json::Map<String, Value>>,
    #[serde(default)]
    callback_target: Option<String>,
    #[serde(default)]
    number_of_results: Option<usize>,
    #[serde(default)]
    min_score_threshold: Option<u8>,
}

#[derive(Debug, Serialize)]
struct QueuedResponse {
    status: &'static str,
    company: String,
    employees: usize,
    queue_position: usize,
    message: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    queue_size: usize,
}

#[derive(Debug, Serialize)]
struct IndexResponse {
    service: &'static str,
    version: &'static str,
    endpoints: Vec<&'static str>,
    queue_size: usize,
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn index(State(state): State<AppState>) -> Json<IndexResponse> {
    Json(IndexResponse {
        service: SERVICE_NAME,
        version: SERVICE_VERSION,
        endpoints: vec!["GET /health", "POST /process"],
        queue_size: state.queue.size(),
    })
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        queue_size: state.queue.size(),
    })
}

/// Intake. Validates the request, enqueues the batch, and answers 202
/// without waiting for any pipeline work.
async fn process(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<QueuedResponse>), ValidationError> {
    let request: ProcessRequest =
        serde_json::from_value(body).map_err(|e| ValidationError::MalformedBody(e.to_string()))?;

    let batch = build_batch(
        request,
        state.default_max_selected,
        state.default_min_score,
    )?;

    let company = batch.company.clone();
    let employees = batch.prospects.len();
    let batch_id = batch.id;
    let queue_position = state.queue.enqueue(batch);

    tracing::info!(
        batch_id = %batch_id,
        company = %company,
        prospects = employees,
        queue_position,
        "Batch accepted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(QueuedResponse {
            status: "queued",
            company: company.clone(),
            employees,
            queue_position,
            message: format!("Batch for {company} queued at position {queue_position}"),
        }),
    ))
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Turn a validated intake request into an immutable batch. A request
/// that fails any check here is never enqueued.
fn build_batch(
    request: ProcessRequest,
    default_max_selected: usize,
    default_min_score: u8,
) -> Result<Batch, ValidationError> {
    if request.items.is_empty() {
        return Err(ValidationError::EmptyItems);
    }

    let callback_url = match request.callback_target.as_deref().map(str::trim) {
        None | Some("") => return Err(ValidationError::MissingCallback),
        Some(raw) => {
            let url = reqwest::Url::parse(raw)
                .map_err(|_| ValidationError::InvalidCallback(raw.to_string()))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ValidationError::InvalidCallback(raw.to_string()));
            }
            url.to_string()
        }
    };

    let max_selected = match request.number_of_results {
        Some(0) => return Err(ValidationError::ZeroResults),
        Some(n) => n,
        None => default_max_selected,
    };

    let mut prospects = Vec::with_capacity(request.items.len());
    for (index, item) in request.items.into_iter().enumerate() {
        let id = match item.get("id").and_then(Value::as_str) {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => return Err(ValidationError::MissingItemId(index)),
        };

        let mut fields = BTreeMap::new();
        for (key, value) in item {
            if key == "id" {
                continue;
            }
            let text = match value {
                Value::String(s) => s,
                Value::Null => continue,
                other => other.to_string(),
            };
            fields.insert(key, text);
        }
        prospects.push(Prospect::new(id, fields));
    }

    let company = prospects
        .iter()
        .map(|p| p.company())
        .find(|c| !c.trim().is_empty())
        .unwrap_or("Unknown")
        .to_string();

    Ok(Batch {
        id: Uuid::new_v4(),
        company,
        prospects,
        callback_url,
        max_selected,
        min_score_threshold: request.min_score_threshold.unwrap_or(default_min_score),
    })
}
