//! Path-matching request dispatcher (§4.1).
//!
//! Maps incoming requests to the eight endpoint handlers by path and
//! method, parsing the body/query into an [`OpenIdConnectMessage`] before
//! handing off. A request whose path matches none of the well-known
//! endpoints is not our concern; the caller should pass it through to
//! whatever it wraps.

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::extract::Request;
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::errors::OidcError;
use crate::message::OpenIdConnectMessage;
use crate::notifications::{HookResult, NotificationContext};
use crate::options::Options;
use crate::response_mode;

/// Default paths this server answers on. An application wiring this crate
/// into its own router is free to mount it anywhere; these are simply
/// what `dispatch` matches against and what `discovery::build` advertises.
pub mod paths {
    pub const DISCOVERY: &str = "/.well-known/openid-configuration";
    pub const JWKS: &str = "/.well-known/jwks";
    pub const AUTHORIZATION: &str = "/connect/authorize";
    pub const TOKEN: &str = "/connect/token";
    pub const USERINFO: &str = "/connect/userinfo";
    pub const INTROSPECTION: &str = "/connect/introspect";
    pub const REVOCATION: &str = "/connect/revocation";
    pub const LOGOUT: &str = "/connect/logout";
}

/// The maximum size this dispatcher will buffer for a form-encoded
/// request body; requests the endpoints accept are small parameter bags,
/// never file uploads.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// The eight well-known endpoints, resolved from a request's path/method
/// against this deployment's [`crate::options::EndpointPaths`] rather than
/// the hardcoded [`paths`] constants, so an application that remounted (or
/// disabled) an endpoint is routed correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Discovery,
    Jwks,
    Authorization,
    Token,
    Userinfo,
    Introspection,
    Revocation,
    Logout,
}

fn classify(options: &Options, path: &str, method: &Method) -> Option<Endpoint> {
    let endpoint_paths = options.endpoint_paths();
    if endpoint_paths.discovery.as_deref() == Some(path) && *method == Method::GET {
        return Some(Endpoint::Discovery);
    }
    if endpoint_paths.jwks.as_deref() == Some(path) && *method == Method::GET {
        return Some(Endpoint::Jwks);
    }
    if endpoint_paths.authorization.as_deref() == Some(path) && matches!(*method, Method::GET | Method::POST) {
        return Some(Endpoint::Authorization);
    }
    if endpoint_paths.token.as_deref() == Some(path) && *method == Method::POST {
        return Some(Endpoint::Token);
    }
    if endpoint_paths.userinfo.as_deref() == Some(path) && matches!(*method, Method::GET | Method::POST) {
        return Some(Endpoint::Userinfo);
    }
    if endpoint_paths.introspection.as_deref() == Some(path) && *method == Method::POST {
        return Some(Endpoint::Introspection);
    }
    if endpoint_paths.revocation.as_deref() == Some(path) && *method == Method::POST {
        return Some(Endpoint::Revocation);
    }
    if endpoint_paths.logout.as_deref() == Some(path) && matches!(*method, Method::GET | Method::POST) {
        return Some(Endpoint::Logout);
    }
    None
}

/// Whether `path`/`method` names one of this crate's endpoints. Callers
/// that wrap [`dispatch`] in something that can't cheaply reconstruct a
/// consumed request body (e.g. a `tower::Service`) should check this
/// *before* calling `dispatch`, since `dispatch` consumes the request.
#[must_use]
pub fn is_known_route(options: &Options, path: &str, method: &Method) -> bool {
    let path = path.trim_end_matches('/');
    let path = if path.is_empty() { "/" } else { path };
    classify(options, path, method).is_some()
}

/// Handle `request` as one of the well-known OIDC endpoints. The caller
/// must have already confirmed [`is_known_route`] for this request's path
/// and method; an unmatched path falls through to `StatusCode::NOT_FOUND`
/// rather than panicking, since matching is re-derived from the same
/// request this function consumes.
pub async fn dispatch(options: &Options, request: Request<Body>) -> Response {
    let path = request.uri().path().trim_end_matches('/').to_owned();
    let path = if path.is_empty() { "/".to_owned() } else { path };
    let method = request.method().clone();

    if !is_secure(&request, options) {
        return OidcError::invalid_request("this endpoint requires https").into_response();
    }

    let Some(endpoint) = classify(options, &path, &method) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let mut match_context = NotificationContext::new(OpenIdConnectMessage::new());
    let provider = Arc::clone(options.provider());
    provider.match_endpoint(&mut match_context).await;
    if match_context.is_request_completed() {
        return response_mode::render_request_completed(&match_context.response);
    }

    match endpoint {
        Endpoint::Discovery => crate::endpoints::discovery::handle(options).await,
        Endpoint::Jwks => crate::endpoints::jwks::handle(options).await,
        Endpoint::Authorization => {
            let message = match parse_request(request).await {
                Ok(message) => message,
                Err(response) => return response,
            };
            crate::endpoints::authorization::handle(options, message).await
        }
        Endpoint::Token => {
            let message = match parse_request(request).await {
                Ok(message) => message,
                Err(response) => return response,
            };
            crate::endpoints::token::handle(options, message).await
        }
        Endpoint::Userinfo => {
            let bearer = bearer_token(request.headers()).map(str::to_owned);
            crate::endpoints::userinfo::handle(options, bearer.as_deref()).await
        }
        Endpoint::Introspection => {
            let message = match parse_request(request).await {
                Ok(message) => message,
                Err(response) => return response,
            };
            crate::endpoints::introspection::handle(options, message).await
        }
        Endpoint::Revocation => {
            let message = match parse_request(request).await {
                Ok(message) => message,
                Err(response) => return response,
            };
            crate::endpoints::revocation::handle(options, message).await
        }
        Endpoint::Logout => {
            let message = match parse_request(request).await {
                Ok(message) => message,
                Err(response) => return response,
            };
            crate::endpoints::logout::handle(options, message).await
        }
    }
}

fn bearer_token(headers: &header::HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Parses query parameters (always) plus, for a form-encoded POST body,
/// the form fields too — later fields win on conflict, matching how most
/// OAuth libraries merge query and body parameters for GET-with-query or
/// POST-with-both requests.
async fn parse_request(request: Request<Body>) -> Result<OpenIdConnectMessage, Response> {
    let query = request.uri().query().unwrap_or_default().to_owned();
    let mut message = OpenIdConnectMessage::from_form_pairs(
        serde_urlencoded::from_str::<Vec<(String, String)>>(&query).unwrap_or_default(),
    );

    if request.method() == Method::POST {
        let body = to_bytes(request.into_body(), MAX_BODY_BYTES)
            .await
            .map_err(|_err| OidcError::invalid_request("request body too large or unreadable").into_response())?;
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(&body)
            .map_err(|_err| OidcError::invalid_request("malformed form body").into_response())?;
        for (key, value) in pairs {
            message.set(key, value);
        }
    }

    Ok(message)
}

/// Checks the reverse-proxy-reported transport for this request. Absence
/// of `X-Forwarded-Proto` is treated as secure (TLS terminated upstream of
/// any proxying this crate can see); an explicit `http` value is rejected
/// unless the deployment opted into insecure transport.
fn is_secure(request: &Request<Body>, options: &Options) -> bool {
    if options.allow_insecure_http() {
        return true;
    }
    match request.headers().get("x-forwarded-proto").and_then(|v| v.to_str().ok()) {
        Some(proto) => proto.eq_ignore_ascii_case("https"),
        None => true,
    }
}

#[must_use]
pub fn method_not_allowed() -> Response {
    StatusCode::METHOD_NOT_ALLOWED.into_response()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn options() -> Options {
        Options::builder("https://auth.example.com").build().unwrap()
    }

    #[tokio::test]
    async fn unmatched_path_is_not_a_known_route() {
        assert!(!is_known_route(&options(), "/not-ours", &Method::GET));
    }

    #[tokio::test]
    async fn unmatched_path_yields_not_found() {
        let options = options();
        let request = Request::builder().uri("/not-ours").body(Body::empty()).unwrap();
        let response = dispatch(&options, request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn discovery_path_is_handled() {
        let options = options();
        assert!(is_known_route(&options, paths::DISCOVERY, &Method::GET));
        let request = Request::builder()
            .uri(paths::DISCOVERY)
            .body(Body::empty())
            .unwrap();
        let response = dispatch(&options, request).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn insecure_proto_header_is_rejected_without_opt_in() {
        let options = options();
        let request = Request::builder()
            .uri(paths::DISCOVERY)
            .header("x-forwarded-proto", "http")
            .body(Body::empty())
            .unwrap();
        let response = dispatch(&options, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
