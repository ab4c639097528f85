//! Response-mode writers (§4.9): `query`, `fragment`, and `form_post`.
//!
//! Each writer turns an [`OpenIdConnectMessage`] (success payload or error
//! triple) plus a validated `redirect_uri` into an HTTP response. They are
//! pure functions: the authorization handler decides *when* to call one,
//! these decide *how*.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{Html, IntoResponse, Json, Response};

use crate::message::OpenIdConnectMessage;

/// The `response_mode` values this server understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    Query,
    Fragment,
    FormPost,
}

impl ResponseMode {
    #[must_use]
    pub fn parse(value: Option<&str>, response_types: &[&str]) -> Self {
        match value {
            Some("query") => ResponseMode::Query,
            Some("fragment") => ResponseMode::Fragment,
            Some("form_post") => ResponseMode::FormPost,
            // Per OAuth 2.0 Multiple Response Type Encoding Practices:
            // implicit/hybrid response types default to fragment.
            _ if response_types.iter().any(|rt| *rt != "code") => ResponseMode::Fragment,
            _ => ResponseMode::Query,
        }
    }
}

/// Render a successful (or error) authorization response by the given
/// mode. `redirect_uri` has already been validated as trusted for this
/// client by the caller.
#[must_use]
pub fn write(mode: ResponseMode, redirect_uri: &str, message: &OpenIdConnectMessage) -> Response {
    match mode {
        ResponseMode::Query => write_query(redirect_uri, message),
        ResponseMode::Fragment => write_fragment(redirect_uri, message),
        ResponseMode::FormPost => write_form_post(redirect_uri, message),
    }
}

fn write_query(redirect_uri: &str, message: &OpenIdConnectMessage) -> Response {
    let query = message.to_query_string();
    let separator = if redirect_uri.contains('?') { '&' } else { '?' };
    let location = format!("{redirect_uri}{separator}{query}");
    redirect(&location)
}

fn write_fragment(redirect_uri: &str, message: &OpenIdConnectMessage) -> Response {
    let fragment = message.to_query_string();
    let location = format!("{redirect_uri}#{fragment}");
    redirect(&location)
}

fn redirect(location: &str) -> Response {
    let mut response = StatusCode::FOUND.into_response();
    if let Ok(value) = HeaderValue::from_str(location) {
        response.headers_mut().insert(header::LOCATION, value);
    }
    response
}

/// A plain redirect with no query/fragment payload attached, used by the
/// logout endpoint's post-logout-redirect.
#[must_use]
pub fn redirect_to(location: &str) -> Response {
    redirect(location)
}

fn write_form_post(redirect_uri: &str, message: &OpenIdConnectMessage) -> Response {
    let inputs: String = message
        .iter()
        .map(|(name, value)| {
            format!(
                r#"<input type="hidden" name="{}" value="{}"/>"#,
                html_escape(name),
                html_escape(value)
            )
        })
        .collect();

    let body = format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Submit</title></head>
<body onload="document.forms[0].submit()">
<form method="post" action="{}">
{}
<noscript><input type="submit" value="Continue"/></noscript>
</form>
</body>
</html>"#,
        html_escape(redirect_uri),
        inputs
    );

    Html(body).into_response()
}

/// Renders a request a provider marked `request_completed` on: the
/// provider already populated `context.response` and wants it sent as-is,
/// bypassing whatever this crate's own handler would otherwise produce.
#[must_use]
pub fn render_request_completed(message: &OpenIdConnectMessage) -> Response {
    Json(message.clone().into_json()).into_response()
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn query_mode_appends_params() {
        let mut message = OpenIdConnectMessage::new();
        message.set("code", "abc123");
        let response = write(ResponseMode::Query, "https://client.example.com/cb", &message);
        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
        assert!(location.starts_with("https://client.example.com/cb?"));
        assert!(location.contains("code=abc123"));
    }

    #[test]
    fn fragment_mode_uses_hash() {
        let mut message = OpenIdConnectMessage::new();
        message.set("access_token", "xyz");
        let response = write(ResponseMode::Fragment, "https://client.example.com/cb", &message);
        let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
        assert!(location.contains("#access_token=xyz"));
    }

    #[test]
    fn default_mode_for_code_only_is_query() {
        let mode = ResponseMode::parse(None, &["code"]);
        assert_eq!(mode, ResponseMode::Query);
    }

    #[test]
    fn default_mode_for_token_response_type_is_fragment() {
        let mode = ResponseMode::parse(None, &["token"]);
        assert_eq!(mode, ResponseMode::Fragment);
    }

    #[test]
    fn form_post_escapes_values() {
        let mut message = OpenIdConnectMessage::new();
        message.set("state", "\"><script>");
        let response = write(ResponseMode::FormPost, "https://client.example.com/cb", &message);
        assert_eq!(response.status(), StatusCode::OK);
    }
}
