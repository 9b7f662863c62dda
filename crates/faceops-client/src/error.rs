use crate::config::ConfigError;
use crate::session::SessionError;
use faceops_core::FrameError;
use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("login rejected: {0}")]
    LoginRejected(String),
    #[error("not logged in; run `faceops login` first")]
    NotAuthenticated,
    #[error("session rejected by server ({0}); log in again")]
    Unauthorized(String),
    #[error("{detail} (HTTP {status})")]
    Api { status: StatusCode, detail: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("bulk progress stream: {0}")]
    Frame(#[from] FrameError),
    #[error("bulk progress stream ended without a completion frame ({frames} frames received)")]
    IncompleteStream { frames: u64 },
    #[error("operation cancelled")]
    Cancelled,
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("session storage: {0}")]
    Session(#[from] SessionError),
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Pull a human-readable reason out of an error body.
///
/// Understands `{"detail": "..."}` and the validation-error list form
/// `{"detail": [{"msg": "..."}, ...]}`. Returns `None` for bodies that are
/// not JSON or carry no `detail`.
pub fn detail_from_body(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let detail = value.get("detail")?;
    match detail {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Array(items) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .collect();
            (!msgs.is_empty()).then(|| msgs.join("; "))
        }
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Turn a non-success response into a [`ClientError`], preferring the
/// server's `detail` over `fallback`.
pub(crate) async fn error_from_response(resp: reqwest::Response, fallback: &str) -> ClientError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let detail = detail_from_body(&body).unwrap_or_else(|| fallback.to_string());
    tracing::debug!(%status, %detail, "request failed");
    if status == StatusCode::UNAUTHORIZED {
        return ClientError::Unauthorized(detail);
    }
    ClientError::Api { status, detail }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_string() {
        assert_eq!(
            detail_from_body(r#"{"detail":"이미 등록된 사용자 이름입니다: kim"}"#).as_deref(),
            Some("이미 등록된 사용자 이름입니다: kim")
        );
    }

    #[test]
    fn test_detail_validation_list() {
        let body = r#"{"detail":[{"loc":["body","name"],"msg":"field required","type":"value_error.missing"},{"loc":["body","file"],"msg":"field required"}]}"#;
        assert_eq!(
            detail_from_body(body).as_deref(),
            Some("field required; field required")
        );
    }

    #[test]
    fn test_detail_absent_or_not_json() {
        assert_eq!(detail_from_body("Internal Server Error"), None);
        assert_eq!(detail_from_body(r#"{"error":"x"}"#), None);
        assert_eq!(detail_from_body(r#"{"detail":null}"#), None);
    }

    #[test]
    fn test_api_error_display() {
        let err = ClientError::Api {
            status: StatusCode::BAD_REQUEST,
            detail: "Bulk registration failed".into(),
        };
        assert_eq!(err.to_string(), "Bulk registration failed (HTTP 400 Bad Request)");
    }
}
