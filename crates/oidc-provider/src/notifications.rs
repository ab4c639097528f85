//! The notification/outcome protocol.
//!
//! Every provider hook receives a context carrying the ambient request
//! state plus a mutable [`Outcome`]. A handler checks `handled_response`
//! first (the provider already wrote the response), then `skipped`
//! (fall through to default behavior), then `rejected` (stop, render the
//! error), only proceeding past all three when the hook neither objected
//! nor took over.

use crate::message::OpenIdConnectMessage;
use crate::ticket::AuthenticationTicket;

/// The four outcome bits a provider hook can set. They are not mutually
/// exclusive in representation, but the dispatch order above makes only
/// one of them meaningful at a time: a hook that calls `reject` after
/// already calling `handle_response` has its rejection ignored, since
/// `handled_response` always wins.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    validated: bool,
    rejected: bool,
    handled_response: bool,
    skipped: bool,
    request_completed: bool,
    error: Option<crate::errors::OidcError>,
}

impl Outcome {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&mut self) {
        self.validated = true;
    }

    pub fn reject(&mut self, error: crate::errors::OidcError) {
        self.rejected = true;
        self.error = Some(error);
    }

    pub fn handle_response(&mut self) {
        self.handled_response = true;
    }

    pub fn skip(&mut self) {
        self.skipped = true;
    }

    /// Marks the whole request as finished: the provider already wrote
    /// everything the caller needs, and no further protocol processing
    /// (including any later hook in the same handler) should run.
    pub fn complete_request(&mut self) {
        self.request_completed = true;
    }

    #[must_use]
    pub fn is_validated(&self) -> bool {
        self.validated
    }

    #[must_use]
    pub fn is_request_completed(&self) -> bool {
        self.request_completed
    }

    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.rejected
    }

    #[must_use]
    pub fn is_handled_response(&self) -> bool {
        self.handled_response
    }

    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    #[must_use]
    pub fn take_error(self) -> Option<crate::errors::OidcError> {
        self.error
    }

    #[must_use]
    pub fn error(&self) -> Option<&crate::errors::OidcError> {
        self.error.as_ref()
    }
}

/// Shared context passed to every `Validate*`/`Handle*`/`Apply*` hook for a
/// single request. Holds the in-flight request message, an optional
/// response message under construction, and the ticket once one has been
/// produced or resolved.
#[derive(Debug)]
pub struct NotificationContext {
    pub request: OpenIdConnectMessage,
    pub response: OpenIdConnectMessage,
    pub ticket: Option<AuthenticationTicket>,
    pub client_id: Option<String>,
    pub outcome: Outcome,
}

impl NotificationContext {
    #[must_use]
    pub fn new(request: OpenIdConnectMessage) -> Self {
        Self {
            request,
            response: OpenIdConnectMessage::new(),
            ticket: None,
            client_id: None,
            outcome: Outcome::new(),
        }
    }

    /// Whether the provider marked the entire request as already answered.
    /// Checked explicitly at the handful of call sites where a hook may
    /// finish the request outright (`MatchEndpoint`, `HandleAuthorizationRequest`,
    /// `HandleLogoutRequest`) rather than folded into [`Self::resolve`], since
    /// it short-circuits the whole handler rather than just the next step.
    #[must_use]
    pub fn is_request_completed(&self) -> bool {
        self.outcome.is_request_completed()
    }

    /// Resolve the outcome in hook-dispatch order: `handled_response` beats
    /// `skipped` beats `rejected`. Returns `None` when none of the three
    /// fired, meaning the caller should proceed with default behavior.
    #[must_use]
    pub fn resolve(&self) -> HookResult<'_> {
        if self.outcome.is_handled_response() {
            HookResult::HandledResponse
        } else if self.outcome.is_skipped() {
            HookResult::Skipped
        } else if self.outcome.is_rejected() {
            HookResult::Rejected(self.outcome.error())
        } else {
            HookResult::Proceed
        }
    }
}

/// The resolved outcome of a hook invocation, in dispatch-priority order.
#[derive(Debug)]
pub enum HookResult<'a> {
    HandledResponse,
    Skipped,
    Rejected(Option<&'a crate::errors::OidcError>),
    Proceed,
}
