//! Frozen, validated server configuration.
//!
//! `Options` is built once via [`OptionsBuilder::build`], which performs
//! every invariant check eagerly — a misconfigured server fails to start
//! rather than failing unpredictably on the first request.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::{
    CodeCache, EncryptingCredential, InMemoryCodeCache, NullProtector, SigningKeyRegistry, TicketProtector,
};
use crate::config_error::ConfigError;
use crate::provider::{NoopProvider, Provider};

/// Duration-valued settings, deserializable from humantime strings
/// (`"1h"`, `"15m"`) via `oidc_authserver_utils::humantime_serde` when an
/// application builds its `Options` from a config file rather than code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lifetimes {
    #[serde(with = "oidc_authserver_utils::humantime_serde")]
    pub authorization_code: Duration,
    #[serde(with = "oidc_authserver_utils::humantime_serde")]
    pub access_token: Duration,
    #[serde(with = "oidc_authserver_utils::humantime_serde")]
    pub identity_token: Duration,
    #[serde(with = "oidc_authserver_utils::humantime_serde")]
    pub refresh_token: Duration,
}

impl Default for Lifetimes {
    fn default() -> Self {
        Self {
            authorization_code: Duration::from_secs(300),
            access_token: Duration::from_secs(3600),
            identity_token: Duration::from_secs(3600),
            refresh_token: Duration::from_secs(14 * 24 * 3600),
        }
    }
}

/// Which grant types the token endpoint will dispatch to.
#[derive(Debug, Clone)]
pub struct EnabledGrants {
    pub authorization_code: bool,
    pub password: bool,
    pub client_credentials: bool,
    pub refresh_token: bool,
}

impl Default for EnabledGrants {
    fn default() -> Self {
        Self {
            authorization_code: true,
            password: false,
            client_credentials: true,
            refresh_token: true,
        }
    }
}

impl EnabledGrants {
    fn any_enabled(&self) -> bool {
        self.authorization_code || self.password || self.client_credentials || self.refresh_token
    }
}

/// Token serialization format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenFormat {
    /// Opaque, AEAD-sealed ticket envelope (see `crate::ticket`/`crate::cache`).
    Opaque,
    /// Signed JWT via `jsonwebtoken`.
    Jwt,
}

/// Which path each endpoint is mounted at, and whether it is enabled at
/// all (`None` disables it: the dispatcher refuses to route to it and
/// discovery omits the corresponding metadata). Defaults mirror
/// `crate::dispatcher::paths`.
///
/// Discovery's `grant_types_supported`/`response_types_supported`/
/// `response_modes_supported` (§4.2) are derived from which of
/// `authorization`/`token` are enabled here, not from [`EnabledGrants`]:
/// an authorization endpoint with no token endpoint can only support the
/// implicit flow, regardless of which grants the token endpoint would
/// otherwise dispatch to.
#[derive(Debug, Clone)]
pub struct EndpointPaths {
    pub authorization: Option<String>,
    pub token: Option<String>,
    pub userinfo: Option<String>,
    pub jwks: Option<String>,
    pub discovery: Option<String>,
    pub introspection: Option<String>,
    pub revocation: Option<String>,
    pub logout: Option<String>,
}

impl Default for EndpointPaths {
    fn default() -> Self {
        Self {
            authorization: Some(crate::dispatcher::paths::AUTHORIZATION.to_owned()),
            token: Some(crate::dispatcher::paths::TOKEN.to_owned()),
            userinfo: Some(crate::dispatcher::paths::USERINFO.to_owned()),
            jwks: Some(crate::dispatcher::paths::JWKS.to_owned()),
            discovery: Some(crate::dispatcher::paths::DISCOVERY.to_owned()),
            introspection: Some(crate::dispatcher::paths::INTROSPECTION.to_owned()),
            revocation: Some(crate::dispatcher::paths::REVOCATION.to_owned()),
            logout: Some(crate::dispatcher::paths::LOGOUT.to_owned()),
        }
    }
}

impl EndpointPaths {
    #[must_use]
    pub fn authorization_enabled(&self) -> bool {
        self.authorization.is_some()
    }

    #[must_use]
    pub fn token_enabled(&self) -> bool {
        self.token.is_some()
    }
}

/// The fully validated, immutable server configuration. Cheap to clone
/// (wraps an `Arc`ed inner struct), safe to share across request tasks.
#[derive(Clone)]
pub struct Options(pub(crate) Arc<OptionsInner>);

pub(crate) struct OptionsInner {
    pub issuer: Url,
    pub allow_insecure_http: bool,
    pub lifetimes: Lifetimes,
    pub grants: EnabledGrants,
    pub access_token_format: TokenFormat,
    pub signing_algorithm: Option<String>,
    pub signing_keys: SigningKeyRegistry,
    pub encrypting_credentials: Vec<EncryptingCredential>,
    pub endpoint_paths: EndpointPaths,
    pub code_cache: Arc<dyn CodeCache>,
    pub ticket_protector: Arc<dyn TicketProtector>,
    pub provider: Arc<dyn Provider>,
    pub application_can_display_errors: bool,
}

impl Options {
    #[must_use]
    pub fn builder(issuer: impl AsRef<str>) -> OptionsBuilder {
        OptionsBuilder::new(issuer)
    }

    #[must_use]
    pub fn issuer(&self) -> &Url {
        &self.0.issuer
    }

    #[must_use]
    pub fn allow_insecure_http(&self) -> bool {
        self.0.allow_insecure_http
    }

    #[must_use]
    pub fn lifetimes(&self) -> &Lifetimes {
        &self.0.lifetimes
    }

    #[must_use]
    pub fn grants(&self) -> &EnabledGrants {
        &self.0.grants
    }

    #[must_use]
    pub fn access_token_format(&self) -> TokenFormat {
        self.0.access_token_format
    }

    #[must_use]
    pub fn signing_algorithm(&self) -> Option<&str> {
        self.0.signing_algorithm.as_deref()
    }

    #[must_use]
    pub fn signing_keys(&self) -> &SigningKeyRegistry {
        &self.0.signing_keys
    }

    #[must_use]
    pub fn encrypting_credentials(&self) -> &[EncryptingCredential] {
        &self.0.encrypting_credentials
    }

    #[must_use]
    pub fn endpoint_paths(&self) -> &EndpointPaths {
        &self.0.endpoint_paths
    }

    #[must_use]
    pub fn code_cache(&self) -> &Arc<dyn CodeCache> {
        &self.0.code_cache
    }

    #[must_use]
    pub fn ticket_protector(&self) -> &Arc<dyn TicketProtector> {
        &self.0.ticket_protector
    }

    #[must_use]
    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.0.provider
    }

    #[must_use]
    pub fn application_can_display_errors(&self) -> bool {
        self.0.application_can_display_errors
    }

    #[must_use]
    pub fn has_signing_credentials(&self) -> bool {
        self.0.signing_algorithm.is_some() && self.0.signing_keys.first().is_some()
    }
}

/// Builder for [`Options`]. Mirrors the validated-construction pattern this
/// server's configuration layer uses throughout: every setter is
/// infallible, all checks happen in [`Self::build`].
pub struct OptionsBuilder {
    issuer: String,
    allow_insecure_http: bool,
    lifetimes: Lifetimes,
    grants: EnabledGrants,
    access_token_format: TokenFormat,
    signing_algorithm: Option<String>,
    signing_keys: SigningKeyRegistry,
    encrypting_credentials: Vec<EncryptingCredential>,
    endpoint_paths: EndpointPaths,
    code_cache: Option<Arc<dyn CodeCache>>,
    ticket_protector: Option<Arc<dyn TicketProtector>>,
    provider: Option<Arc<dyn Provider>>,
    application_can_display_errors: bool,
}

impl OptionsBuilder {
    fn new(issuer: impl AsRef<str>) -> Self {
        Self {
            issuer: issuer.as_ref().to_owned(),
            allow_insecure_http: false,
            lifetimes: Lifetimes::default(),
            grants: EnabledGrants::default(),
            access_token_format: TokenFormat::Opaque,
            signing_algorithm: None,
            signing_keys: SigningKeyRegistry::new(),
            encrypting_credentials: Vec::new(),
            endpoint_paths: EndpointPaths::default(),
            code_cache: None,
            ticket_protector: None,
            provider: None,
            application_can_display_errors: false,
        }
    }

    #[must_use]
    pub fn allow_insecure_http(mut self, allow: bool) -> Self {
        self.allow_insecure_http = allow;
        self
    }

    #[must_use]
    pub fn lifetimes(mut self, lifetimes: Lifetimes) -> Self {
        self.lifetimes = lifetimes;
        self
    }

    #[must_use]
    pub fn grants(mut self, grants: EnabledGrants) -> Self {
        self.grants = grants;
        self
    }

    #[must_use]
    pub fn access_token_format(mut self, format: TokenFormat) -> Self {
        self.access_token_format = format;
        self
    }

    #[must_use]
    pub fn signing_key(mut self, algorithm: impl Into<String>, key: crate::cache::SigningKeyEntry) -> Self {
        self.signing_algorithm = Some(algorithm.into());
        self.signing_keys.insert(key);
        self
    }

    #[must_use]
    pub fn encrypting_credential(mut self, credential: EncryptingCredential) -> Self {
        self.encrypting_credentials.push(credential);
        self
    }

    #[must_use]
    pub fn endpoint_paths(mut self, paths: EndpointPaths) -> Self {
        self.endpoint_paths = paths;
        self
    }

    #[must_use]
    pub fn code_cache(mut self, cache: Arc<dyn CodeCache>) -> Self {
        self.code_cache = Some(cache);
        self
    }

    #[must_use]
    pub fn ticket_protector(mut self, protector: Arc<dyn TicketProtector>) -> Self {
        self.ticket_protector = Some(protector);
        self
    }

    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn application_can_display_errors(mut self, value: bool) -> Self {
        self.application_can_display_errors = value;
        self
    }

    /// Validate and freeze the configuration.
    ///
    /// Identity tokens are always JWTs and always require signing
    /// credentials, but that requirement is only fatal at the moment an
    /// identity token is actually requested (an `openid`-scope
    /// authorization request) — see `crate::token_service` — since a
    /// deployment that never issues identity tokens need not configure
    /// signing credentials at all.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] for any invariant violation: a missing or
    /// non-absolute issuer, an insecure issuer scheme without
    /// `allow_insecure_http`, a JWT access-token format with no signing
    /// credentials, an unmapped signing algorithm, or no grant type enabled.
    pub fn build(self) -> Result<Options, ConfigError> {
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::MissingIssuer);
        }
        let issuer = Url::parse(&self.issuer)
            .map_err(|_err| ConfigError::IssuerNotAbsolute(self.issuer.clone()))?;
        if issuer.cannot_be_a_base() {
            return Err(ConfigError::IssuerNotAbsolute(self.issuer.clone()));
        }
        if issuer.scheme() != "https" && !self.allow_insecure_http {
            return Err(ConfigError::InsecureIssuerScheme(self.issuer.clone()));
        }

        if !self.grants.any_enabled() {
            return Err(ConfigError::NoGrantTypesEnabled);
        }

        let has_signing_credentials =
            self.signing_algorithm.is_some() && self.signing_keys.first().is_some();

        if self.access_token_format == TokenFormat::Jwt && !has_signing_credentials {
            return Err(ConfigError::MissingSigningCredentialsForJwt);
        }
        if let Some(alg) = &self.signing_algorithm {
            crate::crypto::digest_for_signing_algorithm(alg)?;
        }

        Ok(Options(Arc::new(OptionsInner {
            issuer,
            allow_insecure_http: self.allow_insecure_http,
            lifetimes: self.lifetimes,
            grants: self.grants,
            access_token_format: self.access_token_format,
            signing_algorithm: self.signing_algorithm,
            signing_keys: self.signing_keys,
            encrypting_credentials: self.encrypting_credentials,
            endpoint_paths: self.endpoint_paths,
            code_cache: self
                .code_cache
                .unwrap_or_else(|| Arc::new(InMemoryCodeCache::new())),
            ticket_protector: self
                .ticket_protector
                .unwrap_or_else(|| Arc::new(NullProtector::new())),
            provider: self.provider.unwrap_or_else(|| Arc::new(NoopProvider)),
            application_can_display_errors: self.application_can_display_errors,
        })))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn missing_issuer_fails() {
        let err = Options::builder("").build().unwrap_err();
        assert!(matches!(err, ConfigError::MissingIssuer));
    }

    #[test]
    fn insecure_issuer_without_opt_in_fails() {
        let err = Options::builder("http://auth.example.com").build().unwrap_err();
        assert!(matches!(err, ConfigError::InsecureIssuerScheme(_)));
    }

    #[test]
    fn insecure_issuer_with_opt_in_succeeds() {
        let options = Options::builder("http://auth.example.com")
            .allow_insecure_http(true)
            .build()
            .unwrap();
        assert_eq!(options.issuer().scheme(), "http");
    }

    #[test]
    fn jwt_access_token_without_signing_key_fails() {
        let err = Options::builder("https://auth.example.com")
            .access_token_format(TokenFormat::Jwt)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingSigningCredentialsForJwt));
    }

    #[test]
    fn no_grants_enabled_fails() {
        let grants = EnabledGrants {
            authorization_code: false,
            password: false,
            client_credentials: false,
            refresh_token: false,
        };
        let err = Options::builder("https://auth.example.com")
            .grants(grants)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::NoGrantTypesEnabled));
    }

    #[test]
    fn default_options_build_without_signing_credentials() {
        let options = Options::builder("https://auth.example.com").build().unwrap();
        assert!(!options.has_signing_credentials());
    }
}
