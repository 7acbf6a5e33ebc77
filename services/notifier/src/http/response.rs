//! Uniform JSON error envelope for the admin surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::fmt::Display;

#[derive(Debug, Serialize)]
pub struct HttpErrorEnvelope {
    pub code: String,
    pub message: String,
}

pub type HttpResult<T> = Result<T, Response>;

fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> Response {
    (status, Json(HttpErrorEnvelope { code: code.to_owned(), message: message.into() })).into_response()
}

pub fn bad_request(message: impl Into<String>) -> Response {
    json_error(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
}

pub fn not_found(message: impl Display) -> Response {
    json_error(StatusCode::NOT_FOUND, "NOT_FOUND", message.to_string())
}

pub fn conflict(message: impl Display) -> Response {
    json_error(StatusCode::CONFLICT, "CONFLICT", message.to_string())
}
