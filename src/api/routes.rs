//! API route definitions

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use super::types::*;
use crate::bridge::Bridge;
use crate::question::SessionError;
use crate::tally::Tally;

/// Create the API router with all endpoints
pub fn create_router(bridge: Arc<Bridge>) -> Router {
    Router::new()
        .route("/questions/start/:type", post(start_question))
        .route("/questions/stop", post(stop_question))
        .route("/test/:index/:val", post(inject_answer))
        .route("/status", get(status_handler))
        .with_state(bridge)
}

/// Session calls that write to the link block until the write lands, so they
/// run on the blocking pool.
async fn run_blocking<T, F>(f: F) -> Result<T, ApiFailure>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, SessionError> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(session_failure),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(format!("Request task failed: {}", e))),
        )),
    }
}

fn parse_param(name: &str, raw: &str) -> Result<i64, ApiFailure> {
    raw.parse::<i64>()
        .map_err(|_| unprocessable(format!("Bad {}: {}", name, raw)))
}

// ============================================================================
// Questions
// ============================================================================

async fn start_question(
    State(bridge): State<Arc<Bridge>>,
    Path(mode): Path<String>,
) -> ApiResult<StartResponse> {
    let session = bridge.session().clone();
    let kind = run_blocking(move || session.start(&mode)).await?;

    Ok(Json(StartResponse {
        status: "started",
        question_mode: kind.code(),
    }))
}

async fn stop_question(State(bridge): State<Arc<Bridge>>) -> ApiResult<Tally> {
    let session = bridge.session().clone();
    let tally = run_blocking(move || session.stop()).await?;
    Ok(Json(tally))
}

// ============================================================================
// Test injection
// ============================================================================

async fn inject_answer(
    State(bridge): State<Arc<Bridge>>,
    Path((index, val)): Path<(String, String)>,
) -> ApiResult<InjectResponse> {
    let from = parse_param("index", &index)?;
    let value = parse_param("val", &val)?;

    let status = bridge
        .session()
        .inject(from, value)
        .map_err(session_failure)?;

    Ok(Json(InjectResponse {
        value,
        from,
        status,
    }))
}

// ============================================================================
// Status
// ============================================================================

async fn status_handler(State(bridge): State<Arc<Bridge>>) -> Json<StatusResponse> {
    let snapshot = bridge.session().snapshot();
    Json(StatusResponse {
        link: bridge.link_status(),
        mode: snapshot.mode,
        answered: snapshot.answered,
        devices: snapshot.devices,
    })
}
