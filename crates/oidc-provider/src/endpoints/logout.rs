//! The logout / end-session endpoint (§4.12).
//!
//! Accepts `id_token_hint` and `post_logout_redirect_uri`, dispatches
//! `ValidateLogoutRequest`/`HandleLogoutRequest`, and redirects either to
//! the requested `post_logout_redirect_uri` or to the issuer root.

use std::sync::Arc;

use axum::response::{IntoResponse, Response};

use crate::message::{OpenIdConnectMessage, params};
use crate::notifications::{HookResult, NotificationContext};
use crate::options::Options;
use crate::response_mode;

pub async fn handle(options: &Options, request: OpenIdConnectMessage) -> Response {
    let mut context = NotificationContext::new(request.clone());
    let provider = Arc::clone(options.provider());

    provider.validate_logout_request(&mut context).await;
    match context.resolve() {
        HookResult::HandledResponse => return render(&context.response),
        HookResult::Rejected(err) => {
            let error = err
                .cloned()
                .unwrap_or_else(|| crate::errors::OidcError::invalid_request("logout request rejected"));
            return error.into_response();
        }
        HookResult::Skipped | HookResult::Proceed => {}
    }

    provider.handle_logout_request(&mut context).await;
    if context.is_request_completed() {
        return response_mode::render_request_completed(&context.response);
    }
    if let HookResult::HandledResponse = context.resolve() {
        return render(&context.response);
    }

    let destination = request
        .get(params::POST_LOGOUT_REDIRECT_URI)
        .filter(|uri| is_valid_post_logout_redirect(uri, options))
        .map(str::to_owned)
        .unwrap_or_else(|| options.issuer().to_string());

    response_mode::redirect_to(&destination)
}

fn render(message: &OpenIdConnectMessage) -> Response {
    axum::response::Json(message.clone().into_json()).into_response()
}

fn is_valid_post_logout_redirect(uri: &str, options: &Options) -> bool {
    let Ok(parsed) = url::Url::parse(uri) else {
        return false;
    };
    !parsed.cannot_be_a_base() && (parsed.scheme() == "https" || options.allow_insecure_http())
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
    async fn no_redirect_uri_falls_back_to_issuer() {
        let options = options();
        let response = handle(&options, request(&[])).await;
        assert_eq!(response.status(), axum::http::StatusCode::FOUND);
        let location = response.headers().get(axum::http::header::LOCATION).unwrap().to_str().unwrap();
        assert!(location.starts_with("https://auth.example.com"));
    }

    #[tokio::test]
    async fn valid_post_logout_redirect_uri_is_honored() {
        let options = options();
        let response = handle(
            &options,
            request(&[(params::POST_LOGOUT_REDIRECT_URI, "https://client.example.com/logged-out")]),
        )
        .await;
        assert_eq!(response.status(), axum::http::StatusCode::FOUND);
        let location = response.headers().get(axum::http::header::LOCATION).unwrap().to_str().unwrap();
        assert_eq!(location, "https://client.example.com/logged-out");
    }

    #[tokio::test]
    async fn insecure_post_logout_redirect_uri_falls_back_to_issuer() {
        let options = options();
        let response = handle(
            &options,
            request(&[(params::POST_LOGOUT_REDIRECT_URI, "http://client.example.com/logged-out")]),
        )
        .await;
        let location = response.headers().get(axum::http::header::LOCATION).unwrap().to_str().unwrap();
        assert!(location.starts_with("https://auth.example.com"));
    }
}
