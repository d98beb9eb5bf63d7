//! HTTP surface: router, error mapping, and the serve loop.

use crate::error::RelayError;
use crate::handler::{GenerateHandler, GenerateRequest, GenerateResponse};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Liveness message served on `GET /`.
pub const LIVENESS_MESSAGE: &str = "LLM relay is running.";

/// Build the application router.
pub fn router(handler: Arc<GenerateHandler>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/generate", post(generate))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(handler)
}

async fn root() -> Json<Value> {
    Json(json!({ "message": LIVENESS_MESSAGE }))
}

async fn generate(
    State(handler): State<Arc<GenerateHandler>>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let response = handler.handle(&request).await?;
    Ok(Json(response))
}

/// A failed generation, rendered as `500 {"detail": "Generation failed: ..."}`.
#[derive(Debug)]
pub struct ApiError(pub RelayError);

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(kind = %self.0.kind(), error = %self.0, "generation failed");
        let body = json!({ "detail": format!("Generation failed: {}", self.0) });
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

/// Bind `addr` and serve `app` until `shutdown` resolves.
pub async fn serve<S>(addr: SocketAddr, app: Router, shutdown: S) -> crate::error::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!("server stopped");
    Ok(())
}
