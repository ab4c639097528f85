//! The discovery (`.well-known/openid-configuration`) endpoint (§4.2).

use std::sync::Arc;

use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::errors::OidcError;
use crate::message::OpenIdConnectMessage;
use crate::notifications::{HookResult, NotificationContext};
use crate::options::Options;
use crate::response_mode;

#[derive(Debug, Serialize)]
pub struct DiscoveryDocument {
    pub issuer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub introspection_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revocation_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,
    pub response_types_supported: Vec<&'static str>,
    pub response_modes_supported: Vec<&'static str>,
    pub grant_types_supported: Vec<&'static str>,
    pub subject_types_supported: Vec<&'static str>,
    pub id_token_signing_alg_values_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<&'static str>,
    pub scopes_supported: Vec<&'static str>,
    pub claims_supported: Vec<&'static str>,
}

fn endpoint_url(issuer: &str, path: Option<&str>) -> Option<String> {
    path.map(|path| format!("{issuer}{path}"))
}

/// Derives `grant_types_supported`/`response_types_supported`/
/// `response_modes_supported` from which endpoints are *enabled*, not from
/// [`crate::options::EnabledGrants`]: an authorization endpoint with no
/// token endpoint can only support the implicit flow regardless of which
/// grants the token endpoint would otherwise dispatch to, and a token
/// endpoint with no authorization endpoint can only be reached via grants
/// that never involve a browser redirect.
#[must_use]
pub fn build(options: &Options) -> DiscoveryDocument {
    let issuer = options.issuer().as_str().trim_end_matches('/').to_owned();
    let endpoint_paths = options.endpoint_paths();
    let authorization_enabled = endpoint_paths.authorization_enabled();
    let token_enabled = endpoint_paths.token_enabled();

    let mut grant_types_supported = Vec::new();
    if authorization_enabled {
        grant_types_supported.push("implicit");
    }
    if authorization_enabled && token_enabled {
        grant_types_supported.push("authorization_code");
    }
    if token_enabled {
        grant_types_supported.push("refresh_token");
    }
    if token_enabled && !authorization_enabled {
        grant_types_supported.push("client_credentials");
        grant_types_supported.push("password");
    }

    let response_types_supported = if authorization_enabled {
        vec![
            "code",
            "token",
            "id_token",
            "code token",
            "code id_token",
            "token id_token",
            "code token id_token",
        ]
    } else {
        Vec::new()
    };

    let response_modes_supported = if authorization_enabled {
        vec!["form_post", "fragment", "query"]
    } else {
        Vec::new()
    };

    let id_token_signing_alg_values_supported = vec!["RS256".to_owned()];

    DiscoveryDocument {
        authorization_endpoint: endpoint_url(&issuer, endpoint_paths.authorization.as_deref()),
        token_endpoint: endpoint_url(&issuer, endpoint_paths.token.as_deref()),
        userinfo_endpoint: endpoint_url(&issuer, endpoint_paths.userinfo.as_deref()),
        jwks_uri: endpoint_url(&issuer, endpoint_paths.jwks.as_deref()),
        introspection_endpoint: endpoint_url(&issuer, endpoint_paths.introspection.as_deref()),
        revocation_endpoint: endpoint_url(&issuer, endpoint_paths.revocation.as_deref()),
        end_session_endpoint: endpoint_url(&issuer, endpoint_paths.logout.as_deref()),
        issuer,
        response_types_supported,
        response_modes_supported,
        grant_types_supported,
        subject_types_supported: vec!["public"],
        id_token_signing_alg_values_supported,
        token_endpoint_auth_methods_supported: vec!["client_secret_basic", "client_secret_post"],
        scopes_supported: vec!["openid", "profile", "email", "offline_access"],
        claims_supported: vec!["sub", "iss", "aud", "exp", "iat", "name", "email"],
    }
}

/// `ValidateConfigurationRequest` → `HandleConfigurationRequest` →
/// `ApplyConfigurationResponse`, any of which may answer the request
/// outright via `context.outcome.handle_response()`; otherwise this
/// endpoint's own default document is returned unmodified. The hooks
/// exist so a deployment can gate discovery (maintenance mode, per-tenant
/// metadata) without this crate needing a partial-field-merge mechanism
/// its flat `OpenIdConnectMessage` response type doesn't support.
pub async fn handle(options: &Options) -> Response {
    let mut context = NotificationContext::new(OpenIdConnectMessage::new());
    let provider = Arc::clone(options.provider());

    provider.validate_configuration_request(&mut context).await;
    match context.resolve() {
        HookResult::HandledResponse => return response_mode::render_request_completed(&context.response),
        HookResult::Rejected(err) => {
            let error = err.cloned().unwrap_or_else(|| OidcError::invalid_request("discovery request rejected"));
            return error.into_response();
        }
        HookResult::Skipped | HookResult::Proceed => {}
    }

    provider.handle_configuration_request(&mut context).await;
    if let HookResult::HandledResponse = context.resolve() {
        return response_mode::render_request_completed(&context.response);
    }

    provider.apply_configuration_response(&mut context).await;
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
    fn discovery_document_derives_grants_from_endpoint_enablement() {
        let options = Options::builder("https://auth.example.com").build().unwrap();
        let doc = build(&options);
        assert_eq!(doc.issuer, "https://auth.example.com");
        assert_eq!(doc.grant_types_supported, vec!["implicit", "authorization_code", "refresh_token"]);
        assert_eq!(doc.response_modes_supported, vec!["form_post", "fragment", "query"]);
        assert_eq!(doc.jwks_uri.as_deref(), Some("https://auth.example.com/.well-known/jwks"));
    }

    #[test]
    fn token_only_deployment_supports_credentials_and_password_grants() {
        use crate::options::EndpointPaths;

        let paths = EndpointPaths {
            authorization: None,
            ..EndpointPaths::default()
        };
        let options = Options::builder("https://auth.example.com")
            .endpoint_paths(paths)
            .build()
            .unwrap();
        let doc = build(&options);
        assert_eq!(doc.grant_types_supported, vec!["refresh_token", "client_credentials", "password"]);
        assert!(doc.authorization_endpoint.is_none());
        assert!(doc.response_types_supported.is_empty());
    }

    #[tokio::test]
    async fn handle_answers_with_the_default_document() {
        let options = Options::builder("https://auth.example.com").build().unwrap();
        let response = handle(&options).await;
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
