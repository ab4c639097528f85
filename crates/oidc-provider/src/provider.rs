//! The provider contract: one async hook per decision point in the
//! authorization/token/userinfo/introspection/revocation/logout state
//! machines, plus the four token-creation hooks.
//!
//! Every hook receives a `&mut NotificationContext` and returns `()`: it
//! communicates back to the handler entirely through `context.outcome` and
//! `context.response`/`context.ticket`. Hooks default to doing nothing,
//! which resolves to [`crate::notifications::HookResult::Proceed`] — a
//! provider overrides only the hooks relevant to it, per Design Notes in
//! the source specification for this server.

use async_trait::async_trait;

use crate::notifications::NotificationContext;
use crate::ticket::AuthenticationTicket;

/// The full provider contract. Implement the subset of hooks your
/// application needs; everything else is inert.
#[async_trait]
pub trait Provider: Send + Sync {
    // ---- Authorization endpoint ----

    async fn validate_authorization_request(&self, _context: &mut NotificationContext) {}

    /// Whether `redirect_uri` is registered to the requesting `client_id`.
    /// The dispatcher already rejected anything syntactically unsafe (no
    /// fragment, absolute, https-unless-opted-out); this hook is where an
    /// application restricts the set of URIs a given client may redirect to.
    /// A provider that never implements this hook accepts any
    /// syntactically valid `redirect_uri` for any client.
    async fn validate_client_redirect_uri(&self, _context: &mut NotificationContext) {}

    async fn handle_authorization_request(&self, _context: &mut NotificationContext) {}

    async fn apply_authorization_response(&self, _context: &mut NotificationContext) {}

    // ---- Token endpoint ----

    async fn validate_client_authentication(&self, _context: &mut NotificationContext) {}

    /// Resolve the ticket for an `authorization_code` grant from the
    /// already-consumed code. `ticket` is `None` if the code could not be
    /// found or was already used.
    async fn receive_authorization_code(
        &self,
        _context: &mut NotificationContext,
        _ticket: Option<&AuthenticationTicket>,
    ) {
    }

    /// Resolve the ticket for a `refresh_token` grant from the
    /// already-consumed refresh token.
    async fn receive_refresh_token(
        &self,
        _context: &mut NotificationContext,
        _ticket: Option<&AuthenticationTicket>,
    ) {
    }

    /// Resolve a ticket for the `password` (resource owner) grant: the
    /// provider is responsible for validating `username`/`password`
    /// against its own store and populating `context.ticket`.
    async fn grant_resource_owner_credentials(&self, _context: &mut NotificationContext) {}

    /// Resolve a ticket for the `client_credentials` grant.
    async fn grant_client_credentials(&self, _context: &mut NotificationContext) {}

    /// Resolve a ticket for a grant type this crate does not know about.
    async fn grant_custom_extension(&self, _context: &mut NotificationContext) {}

    async fn handle_token_request(&self, _context: &mut NotificationContext) {}

    // ---- Userinfo endpoint ----

    async fn validate_userinfo_request(&self, _context: &mut NotificationContext) {}

    async fn handle_userinfo_request(&self, _context: &mut NotificationContext) {}

    // ---- Introspection endpoint ----

    async fn validate_introspection_request(&self, _context: &mut NotificationContext) {}

    async fn handle_introspection_request(&self, _context: &mut NotificationContext) {}

    async fn apply_introspection_response(&self, _context: &mut NotificationContext) {}

    // ---- Revocation endpoint ----

    async fn handle_revocation_request(&self, _context: &mut NotificationContext) {}

    // ---- Logout endpoint ----

    async fn validate_logout_request(&self, _context: &mut NotificationContext) {}

    async fn handle_logout_request(&self, _context: &mut NotificationContext) {}

    // ---- Discovery (`.well-known/openid-configuration`) ----

    async fn validate_configuration_request(&self, _context: &mut NotificationContext) {}

    async fn handle_configuration_request(&self, _context: &mut NotificationContext) {}

    async fn apply_configuration_response(&self, _context: &mut NotificationContext) {}

    // ---- Cryptography (`.well-known/jwks`) ----

    async fn validate_cryptography_request(&self, _context: &mut NotificationContext) {}

    async fn handle_cryptography_request(&self, _context: &mut NotificationContext) {}

    async fn apply_cryptography_response(&self, _context: &mut NotificationContext) {}

    // ---- Dispatcher ----

    /// Called once a request has been matched to one of this server's
    /// well-known endpoints, before the endpoint-specific handler runs. A
    /// provider that calls `context.outcome.complete_request()` here (after
    /// writing `context.response`) answers the request itself, bypassing
    /// this crate's own handler entirely — useful for a maintenance mode or
    /// an endpoint-wide rate limit.
    async fn match_endpoint(&self, _context: &mut NotificationContext) {}

    // ---- Token creation (§4.7) ----

    /// Called after the default access-token ticket has been cloned and
    /// stamped; may replace `context.ticket` to change its contents, or
    /// set `outcome.skip()` to suppress access-token issuance entirely.
    async fn create_access_token(&self, _context: &mut NotificationContext) {}

    async fn create_identity_token(&self, _context: &mut NotificationContext) {}

    async fn create_refresh_token(&self, _context: &mut NotificationContext) {}

    async fn create_authorization_code(&self, _context: &mut NotificationContext) {}
}

/// A `Provider` that overrides nothing; every hook behaves per its
/// trait default. Useful as a base for applications that only care about
/// one or two hooks, and as the provider used by this crate's own
/// dispatcher tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProvider;

#[async_trait]
impl Provider for NoopProvider {}
