use hmac::{Hmac, Mac};
use log::debug;
use sha2::Sha256;

use crate::server::request::Request;
use crate::time::{current_timestamp, parse_request_time};
use crate::types::response::ErrorCode;

pub const HEADER_SIGNATURE: &str = "x-imgstore-authenticate-signature";
pub const HEADER_TIMESTAMP: &str = "x-imgstore-authenticate-timestamp";

pub const QUERY_SIGNATURE: &str = "signature";
pub const QUERY_TIMESTAMP: &str = "timestamp";
pub const QUERY_ACCESS_TOKEN: &str = "accessToken";

type HmacSha256 = Hmac<Sha256>;

/// Why a request failed authentication.
#[derive(Debug, Clone, PartialEq)]
pub struct Denial {
    pub code: ErrorCode,
    pub message: String,
}

impl Denial {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Proves that a request was made by the holder of a private key.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, private_key: &str, public_key: &str, req: &Request) -> Result<(), Denial>;
}

/// HMAC-SHA256 request authentication.
///
/// Writes carry a signature over `METHOD|URL|PUBLIC_KEY|TIMESTAMP`, where the
/// url excludes the authentication parameters and the timestamp must be
/// within `max_skew_secs` of the server time. Reads carry an access token,
/// the HMAC of the url without the `accessToken` parameter, when
/// `require_access_token` is set.
pub struct HmacSignatureVerifier {
    max_skew_secs: u64,
    require_access_token: bool,
}

impl HmacSignatureVerifier {
    pub fn new(max_skew_secs: u64, require_access_token: bool) -> Self {
        Self {
            max_skew_secs,
            require_access_token,
        }
    }

    fn verify_signature(
        &self,
        private_key: &str,
        public_key: &str,
        req: &Request,
    ) -> Result<(), Denial> {
        let signature = req
            .header(HEADER_SIGNATURE)
            .or_else(|| req.query(QUERY_SIGNATURE));
        let timestamp = req
            .header(HEADER_TIMESTAMP)
            .or_else(|| req.query(QUERY_TIMESTAMP));
        let (signature, timestamp) = match (signature, timestamp) {
            (Some(signature), Some(timestamp)) => (signature, timestamp),
            _ => {
                return Err(Denial::new(
                    ErrorCode::MissingAuthParam,
                    "Missing authentication timestamp or signature",
                ))
            }
        };

        let request_time = match parse_request_time(timestamp) {
            Ok(time) => time,
            Err(_) => {
                return Err(Denial::new(
                    ErrorCode::InvalidTimestamp,
                    format!("Invalid timestamp '{timestamp}'"),
                ))
            }
        };
        let now = current_timestamp();
        if now.abs_diff(request_time) > self.max_skew_secs {
            return Err(Denial::new(
                ErrorCode::TimestampExpired,
                "Timestamp has expired",
            ));
        }

        let url = req.url_without(&[QUERY_SIGNATURE, QUERY_TIMESTAMP, QUERY_ACCESS_TOKEN]);
        let data = signature_data(req.method().as_str(), &url, public_key, timestamp);
        if !verify_hmac(private_key, &data, signature) {
            debug!("Signature mismatch for '{public_key}', signed data: {data}");
            return Err(Denial::new(
                ErrorCode::SignatureMismatch,
                "Signature mismatch",
            ));
        }
        Ok(())
    }

    fn verify_access_token(&self, private_key: &str, req: &Request) -> Result<(), Denial> {
        let token = match req.query(QUERY_ACCESS_TOKEN) {
            Some(token) => token,
            None => {
                return Err(Denial::new(
                    ErrorCode::MissingAccessToken,
                    "Missing access token",
                ))
            }
        };

        let url = req.url_without(&[QUERY_ACCESS_TOKEN]);
        if !verify_hmac(private_key, &url, token) {
            return Err(Denial::new(
                ErrorCode::IncorrectAccessToken,
                "Incorrect access token",
            ));
        }
        Ok(())
    }
}

impl SignatureVerifier for HmacSignatureVerifier {
    fn verify(&self, private_key: &str, public_key: &str, req: &Request) -> Result<(), Denial> {
        if req.method().is_write() {
            return self.verify_signature(private_key, public_key, req);
        }
        if self.require_access_token {
            return self.verify_access_token(private_key, req);
        }
        Ok(())
    }
}

/// Signature of a write request, hex encoded.
pub fn sign_request(
    private_key: &str,
    method: &str,
    url: &str,
    public_key: &str,
    timestamp: &str,
) -> String {
    hmac_hex(private_key, &signature_data(method, url, public_key, timestamp))
}

/// Access token of a read request url, hex encoded.
pub fn access_token(private_key: &str, url: &str) -> String {
    hmac_hex(private_key, url)
}

fn signature_data(method: &str, url: &str, public_key: &str, timestamp: &str) -> String {
    format!("{method}|{url}|{public_key}|{timestamp}")
}

fn new_mac(key: &str, data: &str) -> HmacSha256 {
    let mut mac = match HmacSha256::new_from_slice(key.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => unreachable!("hmac key length is unrestricted"),
    };
    mac.update(data.as_bytes());
    mac
}

fn hmac_hex(key: &str, data: &str) -> String {
    format!("{:x}", new_mac(key, data).finalize().into_bytes())
}

fn verify_hmac(key: &str, data: &str, expect_hex: &str) -> bool {
    let expect = match decode_hex(expect_hex) {
        Some(expect) => expect,
        None => return false,
    };
    new_mac(key, data).verify_slice(&expect).is_ok()
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}
