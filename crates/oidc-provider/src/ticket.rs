//! The authentication ticket data model.
//!
//! A ticket is the unit of identity that flows through every endpoint: it is
//! what the authorization endpoint hands to the token endpoint via an
//! authorization code, what the token endpoint turns into an access/identity
//! token, and what the userinfo endpoint resolves a bearer token back into.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A single OAuth/OIDC claim.
///
/// `destinations` controls which issued tokens embed this claim (see
/// [`Destination`]); a claim with no destinations is dropped from every
/// signed/opaque token but remains available to `userinfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    #[serde(rename = "type")]
    pub claim_type: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destinations: Vec<Destination>,
}

impl Claim {
    #[must_use]
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
            value_type: None,
            issuer: None,
            original_issuer: None,
            destinations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destinations.push(destination);
        self
    }

    #[must_use]
    pub fn has_destination(&self, destination: Destination) -> bool {
        self.destinations.contains(&destination)
    }
}

/// Where a claim is allowed to be embedded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    /// Embed this claim in the access token.
    Token,
    /// Embed this claim in the identity token.
    IdToken,
}

/// A set of claims plus the authentication scheme that produced them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Identity {
    pub authentication_scheme: String,
    pub claims: Vec<Claim>,
}

impl Identity {
    #[must_use]
    pub fn new(authentication_scheme: impl Into<String>) -> Self {
        Self {
            authentication_scheme: authentication_scheme.into(),
            claims: Vec::new(),
        }
    }

    #[must_use]
    pub fn find_first(&self, claim_type: &str) -> Option<&Claim> {
        self.claims.iter().find(|c| c.claim_type == claim_type)
    }

    pub fn add_claim(&mut self, claim: Claim) {
        self.claims.push(claim);
    }
}

/// Non-identity metadata attached to a ticket: issued/expiry timestamps and
/// an opaque string dictionary for anything an application wants to stash
/// (e.g. the original `redirect_uri`, requested scopes, PKCE verifier hash).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TicketProperties {
    #[serde(default)]
    pub items: BTreeMap<String, String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub issued_utc: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_utc: Option<OffsetDateTime>,
}

impl TicketProperties {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.items.insert(key.into(), value.into());
    }
}

/// The unit of identity carried through the server. A ticket may delegate
/// to another ticket via `actor`; the actor is owned (boxed), never a
/// back-reference, so recursive serialization always terminates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationTicket {
    pub identity: Identity,
    pub properties: TicketProperties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<Box<AuthenticationTicket>>,
}

impl AuthenticationTicket {
    #[must_use]
    pub fn new(identity: Identity, properties: TicketProperties) -> Self {
        Self {
            identity,
            properties,
            actor: None,
        }
    }

    /// Clones just the claim/property data, dropping any cache-assigned
    /// timestamps — the four token creators each start from a fresh clone
    /// of the caller's ticket and stamp their own `issued_utc`/`expires_utc`.
    #[must_use]
    pub fn clone_identity_only(&self) -> Self {
        let mut properties = self.properties.clone();
        properties.issued_utc = None;
        properties.expires_utc = None;
        Self {
            identity: self.identity.clone(),
            properties,
            actor: self.actor.clone(),
        }
    }

    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.identity
            .find_first(crate::standard_claims::StandardClaim::SUB)
            .map(|c| c.value.as_str())
    }
}
