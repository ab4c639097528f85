//! The token endpoint state machine (§4.5).
//!
//! Client authentication → grant-type dispatch table (each grant has its
//! own ticket-source hook and a default error when it can't resolve one) →
//! issuance (`TokenEndpoint`-equivalent hooks via the four token creators)
//! → JSON response with `Cache-Control: no-cache`, `Pragma: no-cache`.

use std::sync::Arc;

use axum::Json;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::errors::OidcError;
use crate::message::{OpenIdConnectMessage, params};
use crate::notifications::{HookResult, NotificationContext};
use crate::options::Options;
use crate::ticket::AuthenticationTicket;
use crate::token_service;

#[derive(Debug, Default, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

pub async fn handle(options: &Options, request: OpenIdConnectMessage) -> Response {
    let mut context = NotificationContext::new(request.clone());
    let provider = Arc::clone(options.provider());

    provider.validate_client_authentication(&mut context).await;
    match context.resolve() {
        HookResult::HandledResponse => return no_cache(render_raw(context.response)),
        HookResult::Rejected(err) => {
            let error = err.cloned().unwrap_or_else(|| OidcError::invalid_client("client authentication failed"));
            return no_cache(error.into_response());
        }
        HookResult::Skipped | HookResult::Proceed => {}
    }

    let grant_type = request.get(params::GRANT_TYPE).unwrap_or_default();
    let ticket = match resolve_ticket_for_grant(options, &mut context, grant_type, &request).await {
        Ok(ticket) => ticket,
        Err(error) => return no_cache(error.into_response()),
    };

    provider.handle_token_request(&mut context).await;
    if let HookResult::HandledResponse = context.resolve() {
        return no_cache(render_raw(context.response));
    }
    if let HookResult::Rejected(err) = context.resolve() {
        let error = err.cloned().unwrap_or_else(|| OidcError::invalid_grant("token issuance rejected"));
        return no_cache(error.into_response());
    }

    match issue_tokens(options, &mut context, &ticket, &request).await {
        Ok(response) => no_cache(Json(response).into_response()),
        Err(error) => no_cache(error.into_response()),
    }
}

async fn resolve_ticket_for_grant(
    options: &Options,
    context: &mut NotificationContext,
    grant_type: &str,
    request: &OpenIdConnectMessage,
) -> Result<AuthenticationTicket, OidcError> {
    let provider = Arc::clone(options.provider());
    let grants = options.grants();

    match grant_type {
        "authorization_code" if grants.authorization_code => {
            let code = request
                .get(params::CODE)
                .ok_or_else(|| OidcError::invalid_request("code is required"))?;
            let resolved = token_service::consume_authorization_code(options, code).await?;
            if let Some(ticket) = &resolved {
                verify_code_binding(ticket, context, request)?;
            }
            provider.receive_authorization_code(context, resolved.as_ref()).await;
            take_ticket_or_default(context, resolved, OidcError::invalid_grant("authorization code is invalid or expired"))
        }
        "refresh_token" if grants.refresh_token => {
            let refresh_token = request
                .get(params::REFRESH_TOKEN)
                .ok_or_else(|| OidcError::invalid_request("refresh_token is required"))?;
            let resolved = token_service::consume_refresh_token(options, refresh_token).await;
            let resolved = match resolved {
                Ok(ticket) => Some(ticket),
                Err(_) => None,
            };
            provider.receive_refresh_token(context, resolved.as_ref()).await;
            take_ticket_or_default(context, resolved, OidcError::invalid_grant("refresh token is invalid or expired"))
        }
        "password" if grants.password => {
            provider.grant_resource_owner_credentials(context).await;
            ticket_from_hook_outcome(context, OidcError::invalid_grant("invalid resource owner credentials"))
        }
        "client_credentials" if grants.client_credentials => {
            provider.grant_client_credentials(context).await;
            ticket_from_hook_outcome(context, OidcError::invalid_client("client is not authorized for client_credentials"))
        }
        "" => Err(OidcError::invalid_request("grant_type is required")),
        _ => {
            provider.grant_custom_extension(context).await;
            ticket_from_hook_outcome(context, OidcError::unsupported_grant_type())
        }
    }
}

/// Anti-code-injection binding check (§8 invariant #6): the `client_id` the
/// authorization endpoint stamped on the ticket at issuance must match the
/// client redeeming it here, and if a `redirect_uri` was stamped too it must
/// match exactly — otherwise an attacker who captures a code meant for one
/// client/redirect pair could redeem it through a different one.
fn verify_code_binding(
    ticket: &AuthenticationTicket,
    context: &NotificationContext,
    request: &OpenIdConnectMessage,
) -> Result<(), OidcError> {
    let authenticated_client = context.client_id.as_deref().or_else(|| request.get(params::CLIENT_ID));
    if ticket.properties.get(params::CLIENT_ID) != authenticated_client {
        return Err(OidcError::invalid_grant("authorization code was not issued to this client"));
    }
    if let Some(bound_redirect_uri) = ticket.properties.get(params::REDIRECT_URI) {
        if Some(bound_redirect_uri) != request.get(params::REDIRECT_URI) {
            return Err(OidcError::invalid_grant("redirect_uri does not match the authorization request"));
        }
    }
    Ok(())
}

fn take_ticket_or_default(
    context: &mut NotificationContext,
    resolved: Option<AuthenticationTicket>,
    default_error: OidcError,
) -> Result<AuthenticationTicket, OidcError> {
    if let HookResult::Rejected(err) = context.resolve() {
        return Err(err.cloned().unwrap_or(default_error));
    }
    if let Some(ticket) = context.ticket.take() {
        return Ok(ticket);
    }
    resolved.ok_or(default_error)
}

fn ticket_from_hook_outcome(
    context: &mut NotificationContext,
    default_error: OidcError,
) -> Result<AuthenticationTicket, OidcError> {
    if let HookResult::Rejected(err) = context.resolve() {
        return Err(err.cloned().unwrap_or(default_error));
    }
    context.ticket.take().ok_or(default_error)
}

async fn issue_tokens(
    options: &Options,
    context: &mut NotificationContext,
    ticket: &AuthenticationTicket,
    request: &OpenIdConnectMessage,
) -> Result<TokenResponse, OidcError> {
    let resource = request.get(params::RESOURCE);
    let access = token_service::create_access_token(options, context, ticket, resource)
        .await?
        .ok_or_else(|| OidcError::server_error("no access token was produced"))?;

    let mut response = TokenResponse {
        access_token: access.value.clone(),
        token_type: "Bearer",
        expires_in: (access.expires_utc - time::OffsetDateTime::now_utc()).whole_seconds().max(0),
        ..TokenResponse::default()
    };

    if options.grants().refresh_token {
        if let Some(refresh) = token_service::create_refresh_token(options, context, ticket).await? {
            response.refresh_token = Some(refresh.value);
        }
    }

    let wants_identity_token = request
        .get(params::SCOPE)
        .is_some_and(|scope| scope.split_whitespace().any(|s| s == "openid"));
    if wants_identity_token {
        let client_id = request.get(params::CLIENT_ID);
        if let Some(identity) =
            token_service::create_identity_token(options, context, ticket, None, None, Some(&access.value), client_id)
                .await?
        {
            response.id_token = Some(identity.value);
        }
    }

    Ok(response)
}

fn no_cache(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, "no-cache".parse().expect("static header value"));
    headers.insert(header::PRAGMA, "no-cache".parse().expect("static header value"));
    headers.insert(header::EXPIRES, "-1".parse().expect("static header value"));
    response
}

fn render_raw(message: OpenIdConnectMessage) -> Response {
    Json(message.into_json()).into_response()
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
    async fn missing_grant_type_is_invalid_request() {
        let options = Options::builder("https://auth.example.com").build().unwrap();
        let response = handle(&options, request(&[])).await;
        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_grant_type_is_unsupported_grant_type() {
        let options = Options::builder("https://auth.example.com").build().unwrap();
        let response = handle(&options, request(&[(params::GRANT_TYPE, "urn:custom:unknown")])).await;
        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_code_for_authorization_code_grant_is_invalid_request() {
        let options = Options::builder("https://auth.example.com").build().unwrap();
        let response = handle(&options, request(&[(params::GRANT_TYPE, "authorization_code")])).await;
        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn replayed_authorization_code_is_rejected() {
        use crate::ticket::{Claim, Identity, TicketProperties};

        let options = Options::builder("https://auth.example.com").build().unwrap();
        let mut identity = Identity::new("test");
        identity.add_claim(Claim::new(crate::standard_claims::StandardClaim::SUB, "user-1"));
        let ticket = AuthenticationTicket::new(identity, TicketProperties::default());

        let mut context = NotificationContext::new(OpenIdConnectMessage::new());
        let issued = token_service::create_authorization_code(&options, &mut context, &ticket)
            .await
            .unwrap()
            .unwrap();

        let first = handle(
            &options,
            request(&[(params::GRANT_TYPE, "authorization_code"), (params::CODE, &issued.value)]),
        )
        .await;
        assert_eq!(first.status(), axum::http::StatusCode::OK);

        let second = handle(
            &options,
            request(&[(params::GRANT_TYPE, "authorization_code"), (params::CODE, &issued.value)]),
        )
        .await;
        assert_eq!(second.status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
