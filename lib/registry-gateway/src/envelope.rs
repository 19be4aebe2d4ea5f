//! JSON response bodies and the gateway error envelope
//!
//! Failures are rendered as `{"code": <grpc code>, "message": "...",
//! "details": []}` with the HTTP status derived from the gRPC code.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use tonic::{Code, Status};
use tracing::warn;

const JSON: &str = "application/json";

/// Error body returned to HTTP callers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub details: Vec<serde_json::Value>,
}

impl From<&Status> for ErrorEnvelope {
    fn from(status: &Status) -> Self {
        Self {
            code: status.code() as i32,
            message: status.message().to_string(),
            details: Vec::new(),
        }
    }
}

/// HTTP status for a gRPC code
pub fn http_status(code: Code) -> StatusCode {
    match code {
        Code::Ok => StatusCode::OK,
        // Client Closed Request
        Code::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::REQUEST_TIMEOUT),
        Code::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        Code::InvalidArgument => StatusCode::BAD_REQUEST,
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists => StatusCode::CONFLICT,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        Code::FailedPrecondition => StatusCode::BAD_REQUEST,
        Code::Aborted => StatusCode::CONFLICT,
        Code::OutOfRange => StatusCode::BAD_REQUEST,
        Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        Code::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        Code::DataLoss => StatusCode::INTERNAL_SERVER_ERROR,
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
    }
}

fn with_body(status: StatusCode, content_type: &'static str, body: Bytes) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Render a failed call
pub fn error_response(status: &Status) -> Response<Full<Bytes>> {
    let envelope = ErrorEnvelope::from(status);
    let body = match serde_json::to_vec(&envelope) {
        Ok(body) => Bytes::from(body),
        Err(e) => {
            warn!("Failed to encode error envelope: {}", e);
            Bytes::from_static(br#"{"code":13,"message":"internal error","details":[]}"#)
        }
    };
    with_body(http_status(status.code()), JSON, body)
}

/// Render a successful call
pub fn json_response<T: Serialize>(message: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(message) {
        Ok(body) => with_body(StatusCode::OK, JSON, Bytes::from(body)),
        Err(e) => error_response(&Status::internal(format!("failed to encode response: {}", e))),
    }
}

/// Render a plain text body
pub fn text_response(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    with_body(status, content_type, body.into())
}
