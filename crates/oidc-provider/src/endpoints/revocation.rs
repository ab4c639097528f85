//! The token revocation endpoint (§4.11, RFC 7009).
//!
//! Always answers HTTP 200, even for a token this server has never seen —
//! RFC 7009 §2.2 treats an unknown token as already revoked, not an error.
//! The only failure mode that reaches the caller is client authentication
//! itself failing.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::errors::OidcError;
use crate::message::{OpenIdConnectMessage, params};
use crate::notifications::{HookResult, NotificationContext};
use crate::options::{Options, TokenFormat};

pub async fn handle(options: &Options, request: OpenIdConnectMessage) -> Response {
    let mut context = NotificationContext::new(request.clone());
    let provider = Arc::clone(options.provider());

    provider.validate_client_authentication(&mut context).await;
    if let HookResult::Rejected(err) = context.resolve() {
        let error = err
            .cloned()
            .unwrap_or_else(|| OidcError::invalid_client("revocation client authentication failed"));
        return error.into_response();
    }

    if let Some(token) = request.get(params::TOKEN) {
        if let TokenFormat::Opaque = options.access_token_format() {
            // Best-effort local resolution so the hook can see who it's revoking;
            // an unseal failure just means an unrecognized or already-dead token.
            context.ticket = crate::token_service::unseal_access_token(options, token)
                .ok()
                .or_else(|| crate::token_service::unseal_refresh_token_for_revocation(options, token));
        }
    }

    provider.handle_revocation_request(&mut context).await;
    if let HookResult::Rejected(err) = context.resolve() {
        let error = err.cloned().unwrap_or_else(|| OidcError::invalid_client("revocation rejected"));
        return error.into_response();
    }

    StatusCode::OK.into_response()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn options() -> Options {
        Options::builder("https://auth.example.com").build().unwrap()
    }

    fn request(pairs: &[(&str, &str)]) -> OpenIdConnectMessage {
        OpenIdConnectMessage::from_form_pairs(pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())))
    }

    #[tokio::test]
    async fn unknown_token_is_still_ok() {
        let options = options();
        let response = handle(&options, request(&[(params::TOKEN, "never-issued")])).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_token_is_ok() {
        let options = options();
        let response = handle(&options, request(&[])).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
