#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(warnings)]

//! An OpenID Connect 1.0 / OAuth 2.0 authorization server core: endpoint
//! dispatcher, authorization/token state machines, token lifecycle, and
//! discovery/JWKS metadata, all driven by an application-supplied
//! [`Provider`](provider::Provider).
//!
//! This crate does not run an HTTP server, render a sign-in UI, or store
//! users/clients — it is middleware an application wires its own router,
//! persistence, and sign-in flow into via the `Provider` trait and the
//! [`Options`](options::Options) it is constructed with.

pub mod cache;
pub mod config_error;
pub mod crypto;
pub mod dispatcher;
pub mod endpoints;
pub mod errors;
pub mod message;
pub mod notifications;
pub mod options;
pub mod provider;
pub mod response_mode;
pub mod standard_claims;
pub mod ticket;
pub mod token_service;

#[cfg(feature = "axum-ext")]
pub mod axum_ext;

pub use config_error::ConfigError;
pub use errors::OidcError;
pub use message::OpenIdConnectMessage;
pub use notifications::{HookResult, NotificationContext, Outcome};
pub use options::{EnabledGrants, Lifetimes, Options, OptionsBuilder, TokenFormat};
pub use provider::{NoopProvider, Provider};
pub use standard_claims::StandardClaim;
pub use ticket::{AuthenticationTicket, Claim, Destination, Identity, TicketProperties};

#[cfg(feature = "axum-ext")]
pub use axum_ext::{OidcAuthServerLayer, OidcAuthServerService};
