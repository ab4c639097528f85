//! The JWKS (`.well-known/jwks`) endpoint (§4.3): publishes this server's
//! own signing and encrypting public keys, the mirror image of a client
//! that fetches a remote JWKS.

use std::sync::Arc;

use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::warn;

use crate::crypto::{self, JsonWebKey, KeyUse};
use crate::errors::OidcError;
use crate::message::OpenIdConnectMessage;
use crate::notifications::{HookResult, NotificationContext};
use crate::options::Options;
use crate::response_mode;

#[derive(Debug, Serialize)]
pub struct JwksDocument {
    pub keys: Vec<JsonWebKey>,
}

/// Builds the published key set from both signing and encrypting
/// credentials. A key whose algorithm isn't in [`crypto::build_jwk`]'s
/// allow-list is logged and skipped rather than silently omitted, since a
/// misconfigured algorithm usually means a deployment mistake worth
/// surfacing in logs.
#[must_use]
pub fn build(options: &Options) -> JwksDocument {
    let mut keys = Vec::new();

    for entry in options.signing_keys().values() {
        match crypto::build_jwk(&entry.kid, &entry.algorithm, KeyUse::Sig, &entry.n, &entry.e, entry.certificate.as_ref()) {
            Some(jwk) => keys.push(jwk),
            None => warn!(kid = %entry.kid, algorithm = %entry.algorithm, "skipping signing key with unpublishable algorithm"),
        }
    }

    for credential in options.encrypting_credentials() {
        match crypto::build_jwk(
            &credential.kid,
            &credential.algorithm,
            KeyUse::Enc,
            &credential.n,
            &credential.e,
            credential.certificate.as_ref(),
        ) {
            Some(jwk) => keys.push(jwk),
            None => warn!(kid = %credential.kid, algorithm = %credential.algorithm, "skipping encrypting credential with unpublishable algorithm"),
        }
    }

    JwksDocument { keys }
}

/// `ValidateCryptographyRequest` → `HandleCryptographyRequest` →
/// `ApplyCryptographyResponse`, mirroring `discovery::handle`'s
/// handled-response-or-default pattern.
pub async fn handle(options: &Options) -> Response {
    let mut context = NotificationContext::new(OpenIdConnectMessage::new());
    let provider = Arc::clone(options.provider());

    provider.validate_cryptography_request(&mut context).await;
    match context.resolve() {
        HookResult::HandledResponse => return response_mode::render_request_completed(&context.response),
        HookResult::Rejected(err) => {
            let error = err.cloned().unwrap_or_else(|| OidcError::invalid_request("jwks request rejected"));
            return error.into_response();
        }
        HookResult::Skipped | HookResult::Proceed => {}
    }

    provider.handle_cryptography_request(&mut context).await;
    if let HookResult::HandledResponse = context.resolve() {
        return response_mode::render_request_completed(&context.response);
    }

    provider.apply_cryptography_response(&mut context).await;
    if let HookResult::HandledResponse = context.resolve() {
        return response_mode::render_request_completed(&context.response);
    }

    Json(build(options)).into_response()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn empty_key_registry_yields_empty_jwks() {
        let options = Options::builder("https://auth.example.com").build().unwrap();
        assert!(build(&options).keys.is_empty());
    }

    #[tokio::test]
    async fn handle_answers_with_the_default_document() {
        let options = Options::builder("https://auth.example.com").build().unwrap();
        let response = handle(&options).await;
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
