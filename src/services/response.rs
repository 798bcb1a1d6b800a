//! HTTP response building helpers
//!
//! Keeps status codes and the `{ "error": ... }` body consistent across handlers.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{header, Response, StatusCode};
use serde::Serialize;
use tracing::error;

use crate::error::RegistryError;

/// Build a JSON response with the given status code
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    response
}

/// 200 OK
pub fn ok<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, body)
}

/// 201 Created
pub fn created<T: Serialize>(body: &T) -> Response<Full<Bytes>> {
    json_response(StatusCode::CREATED, body)
}

pub fn not_found(message: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({ "error": message }),
    )
}

pub fn method_not_allowed() -> Response<Full<Bytes>> {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &serde_json::json!({ "error": "Method not allowed" }),
    )
}

/// Convert a RegistryError to an appropriate HTTP response
pub fn error_response(error: RegistryError) -> Response<Full<Bytes>> {
    let (status, message) = match &error {
        RegistryError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
        RegistryError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        RegistryError::Json(e) => (StatusCode::BAD_REQUEST, format!("JSON error: {}", e)),
        _ => {
            error!(error = %error, "Request failed");
            (StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
        }
    };

    json_response(status, &serde_json::json!({ "error": message }))
}

/// Result type alias for handlers
pub type HandlerResult = Result<Response<Full<Bytes>>, RegistryError>;

/// Wrap a service result into an HTTP response
pub fn from_result<T: Serialize>(result: Result<T, RegistryError>) -> Response<Full<Bytes>> {
    match result {
        Ok(value) => ok(&value),
        Err(e) => error_response(e),
    }
}

/// Wrap an optional service result; `None` becomes 404
pub fn from_option<T: Serialize>(
    result: Result<Option<T>, RegistryError>,
    not_found_msg: &str,
) -> Response<Full<Bytes>> {
    match result {
        Ok(Some(value)) => ok(&value),
        Ok(None) => not_found(not_found_msg),
        Err(e) => error_response(e),
    }
}

/// Wrap a create result into 201 Created
pub fn from_create_result<T: Serialize>(result: Result<T, RegistryError>) -> Response<Full<Bytes>> {
    match result {
        Ok(value) => created(&value),
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_response() {
        let resp = ok(&serde_json::json!({"test": true}));
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn test_error_response_not_found() {
        let resp = error_response(RegistryError::NotFound("fixture".into()));
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_error_response_invalid_input() {
        let resp = error_response(RegistryError::InvalidInput("bad field".into()));
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_response_internal() {
        let resp = error_response(RegistryError::Internal("boom".into()));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_option_none_is_404() {
        let resp = from_option::<String>(Ok(None), "missing");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
