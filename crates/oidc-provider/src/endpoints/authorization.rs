//! The authorization endpoint state machine (§4.4).
//!
//! Parse → validate `redirect_uri`/`response_type`/`response_mode` →
//! `ValidateAuthorizationRequest` → `HandleAuthorizationRequest` (the
//! provider resolves or denies the end-user, e.g. via its own sign-in UI)
//! → issue the tokens implied by `response_type` → `ApplyAuthorizationResponse`
//! → emit via the response-mode-specific writer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::response::{Html, IntoResponse, Response};
use tracing::{error, warn};

use crate::errors::OidcError;
use crate::message::{OpenIdConnectMessage, params};
use crate::notifications::{HookResult, NotificationContext};
use crate::options::Options;
use crate::response_mode::{self, ResponseMode};
use crate::token_service;

/// Set immediately before the response-mode writer produces bytes (§5).
/// If teardown is reached after this fired, something upstream already
/// streamed a response; we log and abort instead of writing twice.
#[derive(Debug, Default)]
pub struct HeaderSentGuard(AtomicBool);

impl HeaderSentGuard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn mark(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }
}

pub async fn handle(options: &Options, request: OpenIdConnectMessage) -> Response {
    let guard = HeaderSentGuard::new();
    let redirect_uri = request.get(params::REDIRECT_URI).map(str::to_owned);

    let Some(redirect_uri) = redirect_uri.filter(|uri| is_valid_redirect_uri(uri, options)) else {
        return render_error_page(OidcError::invalid_request("redirect_uri is missing or invalid"));
    };

    let response_types = request.response_types();
    if response_types.is_empty() || !response_types.iter().all(|rt| is_known_response_type(rt)) {
        let error = OidcError::unsupported_response_type();
        return render_redirect_error(&guard, options, &redirect_uri, &request, error);
    }

    let response_mode = ResponseMode::parse(request.get(params::RESPONSE_MODE), &response_types);

    let wants_identity_token = response_types.contains(&"id_token");
    if wants_identity_token && !options.has_signing_credentials() {
        let error = OidcError::server_error("identity tokens requested but no signing credentials configured");
        return render_redirect_error(&guard, options, &redirect_uri, &request, error);
    }
    if wants_identity_token && !request.scopes().contains(&"openid") {
        let error = OidcError::invalid_request("id_token response type requires the openid scope");
        return render_redirect_error(&guard, options, &redirect_uri, &request, error);
    }

    let mut context = NotificationContext::new(request.clone());

    let provider = Arc::clone(options.provider());
    provider.validate_client_redirect_uri(&mut context).await;
    if let HookResult::Rejected(err) = context.resolve() {
        let error = err.cloned().unwrap_or_else(|| OidcError::invalid_request("redirect_uri is not registered for this client"));
        return render_error_page(error);
    }

    provider.validate_authorization_request(&mut context).await;
    match context.resolve() {
        HookResult::HandledResponse => return mark_and_render_handled(&guard, context.response),
        HookResult::Skipped | HookResult::Proceed => {}
        HookResult::Rejected(err) => {
            let error = err.cloned().unwrap_or_else(|| OidcError::invalid_request("rejected by provider"));
            return render_redirect_error(&guard, options, &redirect_uri, &request, error);
        }
    }

    provider.handle_authorization_request(&mut context).await;
    if context.is_request_completed() {
        return mark_and_render_handled(&guard, context.response);
    }
    match context.resolve() {
        HookResult::HandledResponse => return mark_and_render_handled(&guard, context.response),
        HookResult::Rejected(err) => {
            let error = err.cloned().unwrap_or_else(|| OidcError::new(crate::errors::codes::ACCESS_DENIED));
            return render_redirect_error(&guard, options, &redirect_uri, &request, error);
        }
        HookResult::Skipped | HookResult::Proceed => {}
    }

    let Some(mut ticket) = context.ticket.clone() else {
        let error = OidcError::server_error("provider did not resolve a ticket for the signed-in user");
        return render_redirect_error(&guard, options, &redirect_uri, &request, error);
    };

    // Bind the ticket to the requesting client/redirect_uri pair (§8
    // invariant #6): the token endpoint verifies this at code redemption
    // time to reject a code replayed by a different client.
    if let Some(client_id) = request.get(params::CLIENT_ID) {
        ticket.properties.set(params::CLIENT_ID, client_id);
    }
    ticket.properties.set(params::REDIRECT_URI, redirect_uri.clone());

    let mut response = OpenIdConnectMessage::new();
    if let Some(state) = request.get(params::STATE) {
        response.set(params::STATE, state);
    }

    let mut issued_code = None;
    let mut issued_access_token = None;

    if response_types.contains(&"code") {
        match token_service::create_authorization_code(options, &mut context, &ticket).await {
            Ok(Some(issued)) => {
                response.set(params::CODE, issued.value.clone());
                issued_code = Some(issued.value);
            }
            Ok(None) => {}
            Err(error) => return render_redirect_error(&guard, options, &redirect_uri, &request, error),
        }
    }

    if response_types.contains(&"token") {
        let resource = request.get(params::RESOURCE);
        match token_service::create_access_token(options, &mut context, &ticket, resource).await {
            Ok(Some(issued)) => {
                response.set(params::ACCESS_TOKEN, issued.value.clone());
                response.set(params::TOKEN_TYPE, "Bearer");
                response.set(
                    params::EXPIRES_IN,
                    (issued.expires_utc - time::OffsetDateTime::now_utc())
                        .whole_seconds()
                        .max(0)
                        .to_string(),
                );
                issued_access_token = Some(issued.value);
            }
            Ok(None) => {}
            Err(error) => return render_redirect_error(&guard, options, &redirect_uri, &request, error),
        }
    }

    if wants_identity_token {
        let nonce = request.get(params::NONCE);
        let client_id = request.get(params::CLIENT_ID);
        match token_service::create_identity_token(
            options,
            &mut context,
            &ticket,
            nonce,
            issued_code.as_deref(),
            issued_access_token.as_deref(),
            client_id,
        )
        .await
        {
            Ok(Some(issued)) => response.set(params::ID_TOKEN, issued.value),
            Ok(None) => {}
            Err(error) => return render_redirect_error(&guard, options, &redirect_uri, &request, error),
        }
    }

    context.response = response;
    provider.apply_authorization_response(&mut context).await;
    if let HookResult::HandledResponse = context.resolve() {
        return mark_and_render_handled(&guard, context.response);
    }

    if !guard.mark() {
        error!("authorization response already sent; aborting to avoid double-write");
        return axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    response_mode::write(response_mode, &redirect_uri, &context.response)
}

fn mark_and_render_handled(guard: &HeaderSentGuard, response: OpenIdConnectMessage) -> Response {
    if !guard.mark() {
        error!("authorization response already sent; aborting to avoid double-write");
        return axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    Html(format!("{response:?}")).into_response()
}

fn render_redirect_error(
    guard: &HeaderSentGuard,
    _options: &Options,
    redirect_uri: &str,
    request: &OpenIdConnectMessage,
    error: OidcError,
) -> Response {
    warn!(error = %error.error, "authorization request failed");
    if !guard.mark() {
        error!("authorization error response already sent; aborting to avoid double-write");
        return axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    let mut message = OpenIdConnectMessage::new();
    message.set(params::ERROR, error.error.clone());
    if let Some(description) = &error.error_description {
        message.set(params::ERROR_DESCRIPTION, description.clone());
    }
    if let Some(state) = request.get(params::STATE) {
        message.set(params::STATE, state);
    }
    let response_types = request.response_types();
    let mode = ResponseMode::parse(request.get(params::RESPONSE_MODE), &response_types);
    response_mode::write(mode, redirect_uri, &message)
}

fn render_error_page(error: OidcError) -> Response {
    let status = error.http_status();
    let body = format!("{}: {}", error.error, error.error_description.unwrap_or_default());
    (status, body).into_response()
}

fn is_known_response_type(response_type: &str) -> bool {
    matches!(response_type, "code" | "token" | "id_token")
}

fn is_valid_redirect_uri(uri: &str, options: &Options) -> bool {
    let Ok(parsed) = url::Url::parse(uri) else {
        return false;
    };
    if parsed.cannot_be_a_base() || parsed.fragment().is_some() {
        return false;
    }
    parsed.scheme() == "https" || options.allow_insecure_http()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn request(pairs: &[(&str, &str)]) -> OpenIdConnectMessage {
        OpenIdConnectMessage::from_form_pairs(
            pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())),
        )
    }

    #[tokio::test]
    async fn missing_redirect_uri_renders_error_page_not_redirect() {
        let options = Options::builder("https://auth.example.com").build().unwrap();
        let response = handle(
            &options,
            request(&[(params::CLIENT_ID, "client-1"), (params::RESPONSE_TYPE, "code")]),
        )
        .await;
        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unsupported_response_type_redirects_with_error() {
        let options = Options::builder("https://auth.example.com").build().unwrap();
        let response = handle(
            &options,
            request(&[
                (params::CLIENT_ID, "client-1"),
                (params::REDIRECT_URI, "https://client.example.com/cb"),
                (params::RESPONSE_TYPE, "unsupported"),
            ]),
        )
        .await;
        assert_eq!(response.status(), axum::http::StatusCode::FOUND);
        let location = response.headers().get(axum::http::header::LOCATION).unwrap().to_str().unwrap();
        assert!(location.contains("error=unsupported_response_type"));
    }

    #[tokio::test]
    async fn id_token_without_signing_credentials_is_server_error_redirect() {
        let options = Options::builder("https://auth.example.com").build().unwrap();
        let response = handle(
            &options,
            request(&[
                (params::CLIENT_ID, "client-1"),
                (params::REDIRECT_URI, "https://client.example.com/cb"),
                (params::RESPONSE_TYPE, "id_token"),
                (params::RESPONSE_MODE, "fragment"),
            ]),
        )
        .await;
        assert_eq!(response.status(), axum::http::StatusCode::FOUND);
        let location = response.headers().get(axum::http::header::LOCATION).unwrap().to_str().unwrap();
        assert!(location.contains("error=server_error"));
    }

    #[tokio::test]
    async fn id_token_without_openid_scope_is_invalid_request_redirect() {
        const TEST_RSA_PEM: &[u8] = include_bytes!("../../tests/fixtures/test_rsa_key.pem");
        let key = crate::cache::SigningKeyEntry {
            kid: "test-key-1".to_owned(),
            algorithm: "RS256".to_owned(),
            encoding_key_pem: TEST_RSA_PEM.to_vec(),
            n: String::new(),
            e: "AQAB".to_owned(),
            certificate: None,
        };
        let options = Options::builder("https://auth.example.com")
            .signing_key("RS256", key)
            .build()
            .unwrap();
        let response = handle(
            &options,
            request(&[
                (params::CLIENT_ID, "client-1"),
                (params::REDIRECT_URI, "https://client.example.com/cb"),
                (params::RESPONSE_TYPE, "id_token"),
                (params::RESPONSE_MODE, "fragment"),
                (params::SCOPE, "profile"),
            ]),
        )
        .await;
        assert_eq!(response.status(), axum::http::StatusCode::FOUND);
        let location = response.headers().get(axum::http::header::LOCATION).unwrap().to_str().unwrap();
        assert!(location.contains("error=invalid_request"));
    }

    #[tokio::test]
    async fn no_provider_ticket_is_server_error_redirect() {
        let options = Options::builder("https://auth.example.com").build().unwrap();
        let response = handle(
            &options,
            request(&[
                (params::CLIENT_ID, "client-1"),
                (params::REDIRECT_URI, "https://client.example.com/cb"),
                (params::RESPONSE_TYPE, "code"),
            ]),
        )
        .await;
        assert_eq!(response.status(), axum::http::StatusCode::FOUND);
        let location = response.headers().get(axum::http::header::LOCATION).unwrap().to_str().unwrap();
        assert!(location.contains("error=server_error"));
    }
}
