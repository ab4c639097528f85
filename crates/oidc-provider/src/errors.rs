//! The OAuth 2.0 / OIDC protocol error triple and its HTTP rendering.

use serde::Serialize;
use thiserror::Error;

/// `error` values used across this crate. Not exhaustive — providers may
/// construct [`OidcError`] with any string via [`OidcError::new`].
pub mod codes {
    pub const INVALID_REQUEST: &str = "invalid_request";
    pub const INVALID_CLIENT: &str = "invalid_client";
    pub const INVALID_GRANT: &str = "invalid_grant";
    pub const INVALID_SCOPE: &str = "invalid_scope";
    pub const UNAUTHORIZED_CLIENT: &str = "unauthorized_client";
    pub const UNSUPPORTED_GRANT_TYPE: &str = "unsupported_grant_type";
    pub const UNSUPPORTED_RESPONSE_TYPE: &str = "unsupported_response_type";
    pub const ACCESS_DENIED: &str = "access_denied";
    pub const SERVER_ERROR: &str = "server_error";
    pub const TEMPORARILY_UNAVAILABLE: &str = "temporarily_unavailable";
}

/// The `(error, error_description, error_uri)` triple from RFC 6749 §5.2 /
/// OIDC Core §3.1.2.6, carried as a first-class type rather than three
/// loose strings so every endpoint renders it the same way.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{error}: {}", error_description.clone().unwrap_or_default())]
pub struct OidcError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_uri: Option<String>,
    /// `true` for conditions that are bugs in this server or its
    /// configuration rather than a caller error; rendered as HTTP 500
    /// instead of 400.
    #[serde(skip)]
    pub fatal: bool,
}

impl OidcError {
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            error_description: None,
            error_uri: None,
            fatal: false,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.error_description = Some(description.into());
        self
    }

    #[must_use]
    pub fn fatal(mut self) -> Self {
        self.error = codes::SERVER_ERROR.to_owned();
        self.fatal = true;
        self
    }

    #[must_use]
    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::new(codes::INVALID_REQUEST).with_description(description)
    }

    #[must_use]
    pub fn invalid_client(description: impl Into<String>) -> Self {
        Self::new(codes::INVALID_CLIENT).with_description(description)
    }

    #[must_use]
    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::new(codes::INVALID_GRANT).with_description(description)
    }

    #[must_use]
    pub fn unsupported_grant_type() -> Self {
        Self::new(codes::UNSUPPORTED_GRANT_TYPE)
    }

    #[must_use]
    pub fn unsupported_response_type() -> Self {
        Self::new(codes::UNSUPPORTED_RESPONSE_TYPE)
    }

    #[must_use]
    pub fn server_error(description: impl Into<String>) -> Self {
        Self::new(codes::SERVER_ERROR).with_description(description).fatal()
    }

    #[must_use]
    pub fn http_status(&self) -> http::StatusCode {
        if self.fatal {
            http::StatusCode::INTERNAL_SERVER_ERROR
        } else {
            http::StatusCode::BAD_REQUEST
        }
    }
}

#[cfg(feature = "axum-ext")]
impl axum::response::IntoResponse for OidcError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::header;
        use axum::response::Json;

        let status = self.http_status();
        let mut response = (status, Json(&self)).into_response();
        let headers = response.headers_mut();
        headers.insert(header::CACHE_CONTROL, "no-cache".parse().expect("static header value"));
        headers.insert(header::PRAGMA, "no-cache".parse().expect("static header value"));
        headers.insert(header::EXPIRES, "-1".parse().expect("static header value"));
        response
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn invalid_request_is_bad_request() {
        let err = OidcError::invalid_request("missing redirect_uri");
        assert_eq!(err.http_status(), http::StatusCode::BAD_REQUEST);
        assert_eq!(err.error, codes::INVALID_REQUEST);
    }

    #[test]
    fn fatal_is_internal_server_error() {
        let err = OidcError::server_error("no signing credentials configured");
        assert_eq!(err.http_status(), http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error, codes::SERVER_ERROR);
        assert!(err.fatal);
    }
}
