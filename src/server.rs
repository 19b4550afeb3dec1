//! HTTP API.
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | `GET` | `/healthz` | `{"ok": true}` |
//! | `GET` | `/v1/templates` | `{"templates": [{name, version, description}]}` |
//! | `POST` | `/v1/ask` | [`AskResponse`] |
//!
//! Every response carries an `x-request-id` header, echoed from the request
//! or freshly generated; `/v1/ask` also returns it in the body.
//!
//! Errors use one shape:
//!
//! ```json
//! { "error": { "code": "validation_error", "message": "top_k must be between 1 and 20" } }
//! ```
//!
//! | Error | Status | Code |
//! |-------|--------|------|
//! | `Validation` | 422 | `validation_error` |
//! | `Upstream` | 502 | `upstream_error` |
//! | `Configuration`, `DataCorruption`, `Io` | 500 | `internal_error` |

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use knowledge_assistant_core::Error;

use crate::ask::{AskRequest, AskResponse, Assistant};
use crate::config::Config;
use crate::llm::{create_embedder, create_generator};
use crate::prompts::{list_templates, TemplateInfo};
use crate::retriever::Retriever;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
struct AppState {
    assistant: Arc<Assistant>,
}

/// Request id assigned by [`request_id_middleware`].
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Build providers from configuration, warm the index and serve until the
/// process is terminated. Used by `ka serve`.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let embedder = create_embedder(&config.embedding)?;
    let generator = create_generator(&config.generation)?;
    let retriever = Arc::new(Retriever::new(embedder, &config.corpus, &config.chunking));
    let assistant = Arc::new(Assistant::new(config, retriever, generator));
    run_server_with_assistant(config, assistant).await
}

/// Serve a pre-built [`Assistant`].
///
/// The index is warmed before the listener is bound so the first request
/// does not pay for loading or building it.
pub async fn run_server_with_assistant(
    config: &Config,
    assistant: Arc<Assistant>,
) -> anyhow::Result<()> {
    assistant.retriever().warmup().await?;

    let app = router(assistant, &config.server.cors_origins)?;
    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %listener.local_addr()?, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Assemble routes and middleware.
pub fn router(assistant: Arc<Assistant>, cors_origins: &str) -> anyhow::Result<Router> {
    let state = AppState { assistant };

    Ok(Router::new()
        .route("/healthz", get(handle_health))
        .route("/v1/templates", get(handle_templates))
        .route("/v1/ask", post(handle_ask))
        .layer(cors_layer(cors_origins)?)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state))
}

/// `"*"` allows any origin; otherwise a comma-separated list.
fn cors_layer(origins: &str) -> anyhow::Result<CorsLayer> {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.trim() == "*" {
        return Ok(cors.allow_origin(Any));
    }

    let list = origins
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(|o| {
            HeaderValue::from_str(o).map_err(|_| anyhow::anyhow!("invalid CORS origin: '{o}'"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(cors.allow_origin(AllowOrigin::list(list)))
}

async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        let (status, code) = match &err {
            Error::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            Error::Upstream { .. } => (StatusCode::BAD_GATEWAY, "upstream_error"),
            Error::Configuration(_) | Error::DataCorruption(_) | Error::Io(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
            }
        };
        if status.is_server_error() {
            error!(code, error = %err, "request failed");
        }
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            code: "validation_error",
            message: rejection.body_text(),
        }
    }
}

// ============ Handlers ============

async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

#[derive(Serialize)]
struct TemplatesResponse {
    templates: Vec<TemplateInfo>,
}

async fn handle_templates() -> Json<TemplatesResponse> {
    Json(TemplatesResponse {
        templates: list_templates(),
    })
}

async fn handle_ask(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let Json(req) = payload?;
    let response = state.assistant.ask(&request_id, req).await?;
    Ok(Json(response))
}
