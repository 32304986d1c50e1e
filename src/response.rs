use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::error::{AppError, Result};

#[derive(Serialize)]
struct DataBody<'a, T: Serialize> {
    data: &'a T,
}

#[derive(Serialize)]
struct MessageBody<'a> {
    message: &'a str,
}

/// Serializes `body` with sonic-rs into a JSON response.
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Result<Response> {
    let json = sonic_rs::to_string(body)
        .map_err(|e| AppError::Internal(format!("Response serialization failed: {}", e)))?;
    Ok((status, [(header::CONTENT_TYPE, "application/json")], json).into_response())
}

/// `{"data": ...}` envelope used by every successful API response.
pub fn data_response<T: Serialize>(status: StatusCode, data: &T) -> Result<Response> {
    json_response(status, &DataBody { data })
}

/// `{"message": ...}` for calls with nothing else to return.
pub fn message_response(status: StatusCode, message: &str) -> Result<Response> {
    json_response(status, &MessageBody { message })
}
