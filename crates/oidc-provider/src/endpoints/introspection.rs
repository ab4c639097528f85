//! The token introspection endpoint (§4.10, RFC 7662).
//!
//! Unlike every other endpoint, an unresolvable token is never an error:
//! RFC 7662 §2.2 mandates `{"active": false}` for anything this server
//! can't vouch for, so a client can't distinguish "expired" from "unknown"
//! from "malformed" by probing.

use std::sync::Arc;

use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::message::{OpenIdConnectMessage, params};
use crate::notifications::{HookResult, NotificationContext};
use crate::options::{Options, TokenFormat};
use crate::standard_claims::StandardClaim;
use crate::ticket::AuthenticationTicket;

#[derive(Debug, Default, Serialize)]
pub struct IntrospectionResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<&'static str>,
}

pub async fn handle(options: &Options, request: OpenIdConnectMessage) -> Response {
    let mut context = NotificationContext::new(request.clone());
    let provider = Arc::clone(options.provider());

    provider.validate_introspection_request(&mut context).await;
    if let HookResult::Rejected(err) = context.resolve() {
        let error = err
            .cloned()
            .unwrap_or_else(|| crate::errors::OidcError::invalid_client("introspection client authentication failed"));
        return error.into_response();
    }

    let Some(token) = request.get(params::TOKEN) else {
        return Json(IntrospectionResponse::default()).into_response();
    };

    let ticket = resolve_ticket(options, token);
    context.ticket = ticket.clone();

    provider.handle_introspection_request(&mut context).await;
    if let HookResult::HandledResponse = context.resolve() {
        return Json(context.response.into_json()).into_response();
    }

    let response = match context.ticket.clone().or(ticket) {
        Some(ticket) if !is_expired(&ticket) => active_response(&ticket),
        _ => IntrospectionResponse::default(),
    };

    provider.apply_introspection_response(&mut context).await;
    if let HookResult::HandledResponse = context.resolve() {
        return Json(context.response.into_json()).into_response();
    }

    Json(response).into_response()
}

fn resolve_ticket(options: &Options, token: &str) -> Option<AuthenticationTicket> {
    match options.access_token_format() {
        TokenFormat::Opaque => crate::token_service::unseal_access_token(options, token).ok(),
        TokenFormat::Jwt => None,
    }
}

fn is_expired(ticket: &AuthenticationTicket) -> bool {
    ticket
        .properties
        .expires_utc
        .is_some_and(|expires| expires <= time::OffsetDateTime::now_utc())
}

fn active_response(ticket: &AuthenticationTicket) -> IntrospectionResponse {
    IntrospectionResponse {
        active: true,
        sub: ticket.subject().map(str::to_owned),
        exp: ticket.properties.expires_utc.map(time::OffsetDateTime::unix_timestamp),
        iat: ticket.properties.issued_utc.map(time::OffsetDateTime::unix_timestamp),
        client_id: ticket.properties.get("client_id").map(str::to_owned),
        token_type: Some("Bearer"),
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::ticket::{Claim, Identity, TicketProperties};

    fn options() -> Options {
        Options::builder("https://auth.example.com").build().unwrap()
    }

    fn request(pairs: &[(&str, &str)]) -> OpenIdConnectMessage {
        OpenIdConnectMessage::from_form_pairs(pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())))
    }

    #[tokio::test]
    async fn missing_token_is_inactive_not_an_error() {
        let options = options();
        let response = handle(&options, request(&[])).await;
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn garbage_token_is_inactive_not_an_error() {
        let options = options();
        let response = handle(&options, request(&[(params::TOKEN, "garbage")])).await;
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn valid_token_reports_active() {
        let options = options();
        let mut identity = Identity::new("test");
        identity.add_claim(Claim::new(StandardClaim::SUB, "user-1"));
        let mut context = NotificationContext::new(OpenIdConnectMessage::new());
        let ticket = AuthenticationTicket::new(identity, TicketProperties::default());
        let issued = crate::token_service::create_access_token(&options, &mut context, &ticket, None)
            .await
            .unwrap()
            .unwrap();

        let response = handle(&options, request(&[(params::TOKEN, &issued.value)])).await;
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
