//! `OpenIdConnectMessage`: the loosely-typed, extensible parameter bag every
//! endpoint parses its request into and every response is rendered from.
//!
//! Mirrors the wire shape of an OAuth/OIDC form or query string: mostly
//! string-valued parameters plus a handful that are conventionally
//! space-delimited lists (`scope`) or arrays (`response_type`).

use std::collections::BTreeMap;

use serde_json::Value;

/// Well-known parameter names, collected so handlers never repeat string
/// literals across the authorization/token/discovery code paths.
pub mod params {
    pub const CLIENT_ID: &str = "client_id";
    pub const CLIENT_SECRET: &str = "client_secret";
    pub const RESPONSE_TYPE: &str = "response_type";
    pub const RESPONSE_MODE: &str = "response_mode";
    pub const REDIRECT_URI: &str = "redirect_uri";
    pub const SCOPE: &str = "scope";
    pub const STATE: &str = "state";
    pub const NONCE: &str = "nonce";
    pub const GRANT_TYPE: &str = "grant_type";
    pub const CODE: &str = "code";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const USERNAME: &str = "username";
    pub const PASSWORD: &str = "password";
    pub const ERROR: &str = "error";
    pub const ERROR_DESCRIPTION: &str = "error_description";
    pub const ERROR_URI: &str = "error_uri";
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const TOKEN_TYPE: &str = "token_type";
    pub const EXPIRES_IN: &str = "expires_in";
    pub const ID_TOKEN: &str = "id_token";
    pub const TOKEN: &str = "token";
    pub const TOKEN_TYPE_HINT: &str = "token_type_hint";
    pub const POST_LOGOUT_REDIRECT_URI: &str = "post_logout_redirect_uri";
    pub const ID_TOKEN_HINT: &str = "id_token_hint";
    pub const RESOURCE: &str = "resource";
}

/// A parsed (or in-progress, being built for a response) OIDC message.
///
/// Backed by an ordered string map so both `application/x-www-form-urlencoded`
/// request bodies and `application/json` discovery/token responses can be
/// produced from the same structure.
#[derive(Debug, Clone, Default)]
pub struct OpenIdConnectMessage {
    parameters: BTreeMap<String, String>,
}

impl OpenIdConnectMessage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_form_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            parameters: pairs.into_iter().collect(),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parameters.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.parameters.remove(name)
    }

    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.get(params::SCOPE)
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn response_types(&self) -> Vec<&str> {
        self.get(params::RESPONSE_TYPE)
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.parameters.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.parameters.contains_key(params::ERROR)
    }

    #[must_use]
    pub fn into_json(self) -> Value {
        Value::Object(
            self.parameters
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect(),
        )
    }

    #[must_use]
    pub fn to_query_string(&self) -> String {
        serde_urlencoded::to_string(&self.parameters).unwrap_or_default()
    }
}
