//! API request and response types

use axum::{http::StatusCode, Json};
use serde::Serialize;

use crate::io::link::LinkStatus;
use crate::question::{InjectOutcome, QuestionMode, SessionError};

/// Error body: `{"status":"error","msg":...}`
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub status: &'static str,
    pub msg: String,
}

impl ApiError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            status: "error",
            msg: msg.into(),
        }
    }
}

pub type ApiFailure = (StatusCode, Json<ApiError>);

pub type ApiResult<T> = Result<Json<T>, ApiFailure>;

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        ApiError::new(err.to_string())
    }
}

/// Bad input is 422; link failures (in practice only shutdown) are 503.
pub fn session_failure(err: SessionError) -> ApiFailure {
    let status = match &err {
        SessionError::InvalidMode(_)
        | SessionError::AddressOutOfRange { .. }
        | SessionError::InvalidValue(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SessionError::Link(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(ApiError::from(err)))
}

pub fn unprocessable(msg: impl Into<String>) -> ApiFailure {
    (StatusCode::UNPROCESSABLE_ENTITY, Json(ApiError::new(msg)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub status: &'static str,
    /// 2 for yes/no, 3 for multiple choice
    pub question_mode: u8,
}

#[derive(Debug, Serialize)]
pub struct InjectResponse {
    pub value: i64,
    pub from: i64,
    pub status: InjectOutcome,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub link: LinkStatus,
    pub mode: QuestionMode,
    pub answered: usize,
    pub devices: usize,
}
