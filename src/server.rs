// HTTP surface of the inference service.
//
//   GET  /                         -> redirect to /docs
//   GET  /docs                     -> endpoint description
//   GET  /health                   -> {"status":"ok","model":"ready"|"unloaded"}
//   POST /ask_model/?question=...  -> {"probs":{"yes":p,"no":1-p}}

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::errors::ServeError;
use crate::inference::{Answer, Oracle, ServiceState};

const DOCS_PAGE: &str = r#"<!doctype html>
<html>
  <head><title>lucky-ai</title></head>
  <body>
    <h1>lucky-ai question classifier</h1>
    <h2>POST /ask_model/?question=...</h2>
    <p>Returns the probability that the answer to <code>question</code> is yes or no.</p>
    <pre>{"probs": {"yes": 0.73, "no": 0.27}}</pre>
    <p>Any text is scored. A question the tokenizer turns into no tokens at all
       is rejected with 422, a missing one with 400.
       While no model is loaded the endpoint answers 503.</p>
    <h2>GET /health</h2>
    <pre>{"status": "ok", "model": "ready"}</pre>
  </body>
</html>
"#;

#[derive(Debug, Deserialize)]
pub struct AskParams {
    pub question: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub probs: Answer,
}

/// Error body `{"error": "..."}` with a status chosen per failure.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<ServeError> for ApiError {
    fn from(err: ServeError) -> Self {
        let status = match err {
            ServeError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            ServeError::NoTokens => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub fn router<B: Backend>(oracle: Arc<Oracle<B>>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/docs", get(docs))
        .route("/health", get(health::<B>))
        .route("/ask_model/", post(ask_model::<B>))
        .with_state(oracle)
}

async fn root() -> Redirect {
    Redirect::temporary("/docs")
}

async fn docs() -> Html<&'static str> {
    Html(DOCS_PAGE)
}

async fn health<B: Backend>(State(oracle): State<Arc<Oracle<B>>>) -> Json<serde_json::Value> {
    let model = match oracle.state() {
        ServiceState::Ready => "ready",
        ServiceState::Unloaded => "unloaded",
    };
    Json(json!({ "status": "ok", "model": model }))
}

async fn ask_model<B: Backend>(
    State(oracle): State<Arc<Oracle<B>>>,
    Query(params): Query<AskParams>,
) -> Result<Json<AskResponse>, ApiError> {
    let question = params
        .question
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "missing 'question' query parameter"))?;

    // Scoring is CPU/GPU bound, keep it off the async workers.
    let answer = tokio::task::spawn_blocking(move || oracle.ask(&question))
        .await
        .map_err(|err| {
            error!("inference task failed: {err}");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "inference task failed")
        })??;

    Ok(Json(AskResponse { probs: answer }))
}

/// Serves until ctrl-c, then unloads the model.
pub async fn serve<B: Backend>(oracle: Arc<Oracle<B>>, bind_addr: &str) -> Result<(), ServeError> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(oracle.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    oracle.unload();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(err) => {
            warn!("cannot listen for ctrl-c, serving until killed: {err}");
            std::future::pending::<()>().await;
        }
    }
}
