//! Errors surfaced while building [`crate::options::Options`].
//!
//! These are construction-time failures, never rendered to a client:
//! `Options::build` fails the process before the dispatcher ever accepts a
//! request.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("issuer must be set")]
    MissingIssuer,

    #[error("issuer {0:?} is not an absolute URL")]
    IssuerNotAbsolute(String),

    #[error("issuer {0:?} uses an insecure scheme (set allow_insecure_http to permit http://)")]
    InsecureIssuerScheme(String),

    #[error("identity tokens are enabled but no signing credentials were configured")]
    MissingSigningCredentialsForIdToken,

    #[error(
        "a JWT access/identity token format was requested but no signing credentials were configured"
    )]
    MissingSigningCredentialsForJwt,

    #[error("unknown signing algorithm {0:?}: no digest mapping is defined for c_hash/at_hash")]
    UnknownSigningAlgorithm(String),

    #[error("at least one grant type must be enabled")]
    NoGrantTypesEnabled,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn display_is_human_readable() {
        let err = ConfigError::IssuerNotAbsolute("not-a-url".to_owned());
        assert!(err.to_string().contains("not-a-url"));
    }
}
