//! The userinfo endpoint (§4.6): resolves a bearer access token back into
//! claims. Accepts whichever `access_token_format` this deployment issues
//! (opaque envelope or JWT) and returns them as a flat JSON claim set.

use std::sync::Arc;

use axum::Json;
use axum::response::{IntoResponse, Response};
use serde_json::{Map, Value};

use crate::errors::OidcError;
use crate::message::OpenIdConnectMessage;
use crate::notifications::{HookResult, NotificationContext};
use crate::options::{Options, TokenFormat};
use crate::standard_claims::StandardClaim;
use crate::ticket::AuthenticationTicket;

pub async fn handle(options: &Options, bearer_token: Option<&str>) -> Response {
    let Some(bearer_token) = bearer_token else {
        return invalid_grant("missing bearer token");
    };

    let ticket = match resolve_ticket(options, bearer_token) {
        Ok(ticket) => ticket,
        Err(response) => return response,
    };

    let mut context = NotificationContext::new(OpenIdConnectMessage::new());
    context.ticket = Some(ticket);

    let provider = Arc::clone(options.provider());
    provider.validate_userinfo_request(&mut context).await;
    if let HookResult::Rejected(err) = context.resolve() {
        let error = err.cloned().unwrap_or_else(|| OidcError::invalid_grant("userinfo request rejected"));
        return error.into_response();
    }

    provider.handle_userinfo_request(&mut context).await;
    match context.resolve() {
        HookResult::HandledResponse => Json(context.response.into_json()).into_response(),
        HookResult::Rejected(err) => {
            let error = err.cloned().unwrap_or_else(|| OidcError::invalid_grant("userinfo request rejected"));
            error.into_response()
        }
        HookResult::Skipped | HookResult::Proceed => {
            let Some(ticket) = context.ticket else {
                return invalid_grant("access token did not resolve to a user");
            };
            Json(claims_json(&ticket)).into_response()
        }
    }
}

fn resolve_ticket(options: &Options, bearer_token: &str) -> Result<AuthenticationTicket, Response> {
    let ticket = match options.access_token_format() {
        TokenFormat::Opaque => crate::token_service::unseal_access_token(options, bearer_token)
            .map_err(|_err| invalid_grant("access token is invalid or expired"))?,
        TokenFormat::Jwt => {
            return Err(invalid_grant("JWT access token introspection requires a local resolver"));
        }
    };

    if let Some(expires) = ticket.properties.expires_utc {
        if expires <= time::OffsetDateTime::now_utc() {
            return Err(invalid_grant("Expired token."));
        }
    }

    Ok(ticket)
}

fn claims_json(ticket: &AuthenticationTicket) -> Value {
    let mut map = Map::new();
    for claim in &ticket.identity.claims {
        map.insert(claim.claim_type.clone(), Value::String(claim.value.clone()));
    }
    if !map.contains_key(StandardClaim::SUB) {
        if let Some(sub) = ticket.subject() {
            map.insert(StandardClaim::SUB.to_owned(), Value::String(sub.to_owned()));
        }
    }
    Value::Object(map)
}

/// A missing, malformed, or expired bearer token is reported as
/// `invalid_grant` (HTTP 400), not `invalid_token`/401 + `WWW-Authenticate`:
/// this crate always resolves a bearer token the same way an access token
/// is redeemed elsewhere, so the same grant-failure vocabulary applies.
fn invalid_grant(description: &str) -> Response {
    OidcError::invalid_grant(description).into_response()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::notifications::NotificationContext as Ctx;
    use crate::ticket::{Claim, Identity, TicketProperties};

    fn options() -> Options {
        Options::builder("https://auth.example.com").build().unwrap()
    }

    #[tokio::test]
    async fn missing_bearer_token_is_invalid_grant() {
        let options = options();
        let response = handle(&options, None).await;
        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn malformed_bearer_token_is_invalid_grant() {
        let options = options();
        let response = handle(&options, Some("not-a-real-token")).await;
        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn expired_access_token_reports_expired_token_as_invalid_grant() {
        let options = options();
        let mut identity = Identity::new("test");
        identity.add_claim(Claim::new(StandardClaim::SUB, "user-1"));
        let mut ticket = AuthenticationTicket::new(identity, TicketProperties::default());
        ticket.properties.issued_utc = Some(time::OffsetDateTime::now_utc() - time::Duration::hours(2));
        ticket.properties.expires_utc = Some(time::OffsetDateTime::now_utc() - time::Duration::seconds(1));

        let mut context = Ctx::new(OpenIdConnectMessage::new());
        let sealed = crate::token_service::seal_access_token_for_test(&options, &mut context, &ticket);

        let response = handle(&options, Some(&sealed)).await;
        assert_eq!(response.status(), axum::http::StatusCode::BAD_REQUEST);
        assert!(response.headers().get(axum::http::header::WWW_AUTHENTICATE).is_none());

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "invalid_grant");
        assert_eq!(json["error_description"], "Expired token.");
    }
}
