use actix_web::http::StatusCode;
use actix_web::{HttpResponse, HttpResponseBuilder};
use log::error;
use serde::Serialize;
use serde_json::Value;

use crate::types::response::{ErrorCode, ErrorResponse, MIME_JSON};

use super::router::Method;

pub const HANDLER_ERROR: &str = "Request handling failed";

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Json(Value),
    Binary { mime: String, data: Vec<u8> },
}

/// A response under construction. Listeners can inspect and replace it until
/// it is sent, only then it becomes an actix response.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Body,
}

impl Response {
    pub fn ok() -> Self {
        Self::new(StatusCode::OK, Body::Empty)
    }

    pub fn json<T: Serialize>(data: &T) -> Self {
        Self::json_with_status(StatusCode::OK, data)
    }

    pub fn created<T: Serialize>(data: &T) -> Self {
        Self::json_with_status(StatusCode::CREATED, data)
    }

    pub fn binary(mime: impl Into<String>, data: Vec<u8>) -> Self {
        Self::new(
            StatusCode::OK,
            Body::Binary {
                mime: mime.into(),
                data,
            },
        )
    }

    pub fn not_found(message: impl AsRef<str>) -> Self {
        Self::err_response(StatusCode::NOT_FOUND, None, message.as_ref())
    }

    pub fn bad_request(message: impl AsRef<str>) -> Self {
        let message = format!("Bad request: {}", message.as_ref());
        Self::err_response(StatusCode::BAD_REQUEST, None, &message)
    }

    /// A rejected request: authentication or authorization failed.
    pub fn denied(code: ErrorCode, message: impl AsRef<str>) -> Self {
        Self::err_response(StatusCode::BAD_REQUEST, Some(code), message.as_ref())
    }

    pub fn method_not_allowed(allowed: &[Method]) -> Self {
        let allow = allowed
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Self::err_response(StatusCode::METHOD_NOT_ALLOWED, None, "Method not allowed")
            .with_header("Allow", allow)
    }

    pub fn conflict(message: impl AsRef<str>) -> Self {
        Self::err_response(StatusCode::CONFLICT, None, message.as_ref())
    }

    pub fn unsupported_media_type(message: impl AsRef<str>) -> Self {
        Self::err_response(StatusCode::UNSUPPORTED_MEDIA_TYPE, None, message.as_ref())
    }

    /// An error response with any status.
    pub fn failure(status: StatusCode, message: impl AsRef<str>) -> Self {
        Self::err_response(status, None, message.as_ref())
    }

    pub fn service_unavailable<T: Serialize>(data: &T) -> Self {
        Self::json_with_status(StatusCode::SERVICE_UNAVAILABLE, data)
    }

    pub fn error(message: &str) -> Self {
        let message = format!("Server error: {message}");
        Self::err_response(StatusCode::INTERNAL_SERVER_ERROR, None, &message)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Replaces any header with the same (case-insensitive) name.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn json_body(&self) -> Option<&Value> {
        match self.body {
            Body::Json(ref value) => Some(value),
            _ => None,
        }
    }

    pub fn error_code(&self) -> Option<u64> {
        self.json_body()?.get("error_code")?.as_u64()
    }

    /// Drops the body, keeping status and headers. Used for HEAD requests.
    pub fn strip_body(&mut self) {
        let length = match self.body {
            Body::Empty => 0,
            Body::Json(ref value) => value.to_string().len(),
            Body::Binary { ref data, .. } => data.len(),
        };
        if length > 0 {
            self.set_header("X-Imgstore-Content-Length", length.to_string());
        }
        self.body = Body::Empty;
    }

    fn new(status: StatusCode, body: Body) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body,
        }
    }

    fn json_with_status<T: Serialize>(status: StatusCode, data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self::new(status, Body::Json(value)),
            Err(err) => {
                error!("Encode response json failed: {err:#}");
                Self::error("encode json")
            }
        }
    }

    fn err_response(status: StatusCode, code: Option<ErrorCode>, message: &str) -> Self {
        let resp = ErrorResponse {
            code: status.as_u16(),
            error_code: code.map(|c| c.code()),
            message: message.to_string(),
        };
        let value = serde_json::to_value(resp).unwrap_or(Value::Null);
        let mut resp = Self::new(status, Body::Json(value));
        if let Some(code) = code {
            resp.set_header("X-Imgstore-Error-Code", code.code().to_string());
        }
        resp
    }
}

impl From<Response> for HttpResponse {
    fn from(val: Response) -> Self {
        let mut builder = HttpResponseBuilder::new(val.status);
        for (key, value) in val.headers {
            builder.insert_header((key, value));
        }
        match val.body {
            Body::Empty => builder.finish(),
            Body::Json(value) => builder
                .content_type(MIME_JSON)
                .body(value.to_string()),
            Body::Binary { mime, data } => builder.content_type(mime).body(data),
        }
    }
}
