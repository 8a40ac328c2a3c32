use serde::{Deserialize, Serialize};

pub const MIME_JSON: &str = "application/json";

/// Machine readable reason of a rejected request, carried in the
/// `error_code` field of error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    UnknownPublicKey,
    MissingAuthParam,
    InvalidTimestamp,
    SignatureMismatch,
    TimestampExpired,
    MissingAccessToken,
    IncorrectAccessToken,
    PermissionDenied,
}

impl ErrorCode {
    pub fn code(&self) -> u16 {
        match self {
            Self::UnknownPublicKey => 100,
            Self::MissingAuthParam => 101,
            Self::InvalidTimestamp => 102,
            Self::SignatureMismatch => 103,
            Self::TimestampExpired => 104,
            Self::MissingAccessToken => 105,
            Self::IncorrectAccessToken => 106,
            Self::PermissionDenied => 107,
        }
    }
}

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    /// HTTP status code
    pub code: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u16>,

    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        let resp = ErrorResponse {
            code: 400,
            error_code: Some(ErrorCode::PermissionDenied.code()),
            message: String::from("Permission denied"),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"code": 400, "error_code": 107, "message": "Permission denied"})
        );

        let resp = ErrorResponse {
            code: 404,
            error_code: None,
            message: String::from("Image not found"),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("error_code"), "unset error code is omitted: {json}");
    }
}
