//! The token service: the four token creators (access, identity, refresh,
//! authorization code) and the two consumption paths (code redemption,
//! refresh-token redemption).
//!
//! Every creator follows the same shape: clone the caller's ticket's
//! identity (dropping any previous `issued_utc`/`expires_utc`), stamp
//! fresh timestamps, run the matching `Create*Token` provider hook (which
//! may replace the ticket or skip issuance outright), then apply this
//! service's own default serialization.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bytes::Bytes;
use jsonwebtoken::{EncodingKey, Header};
use rand::RngCore;
use serde::Serialize;
use time::OffsetDateTime;

use crate::crypto::left_half_hash;
use crate::errors::OidcError;
use crate::notifications::{HookResult, NotificationContext};
use crate::options::{Options, TokenFormat};
use crate::standard_claims::StandardClaim;
use crate::ticket::{AuthenticationTicket, Destination, TicketProperties};

/// A token handed back to the caller: its wire value plus, for the
/// authorization code, the cache key it was stored under (needed by the
/// authorization endpoint to build the redirect, and by the token endpoint
/// to redeem it).
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub value: String,
    pub expires_utc: OffsetDateTime,
}

/// Namespaces the AEAD purpose tuple passed to `TicketProtector`, and the
/// envelope format version. Bumping `ENVELOPE_VERSION` is a breaking change
/// for any opaque token minted under the previous version — this service
/// never attempts to read an envelope of an unknown version.
const ENVELOPE_VERSION: i32 = 3;

#[derive(Debug, Serialize, serde::Deserialize)]
struct TicketEnvelope {
    version: i32,
    ticket: AuthenticationTicket,
}

fn purpose_tuple(kind: &str) -> [&'static str; 3] {
    match kind {
        "code" => ["oidc-authserver", "code", "v3"],
        "refresh_token" => ["oidc-authserver", "refresh_token", "v3"],
        "access_token" => ["oidc-authserver", "access_token", "v3"],
        _ => ["oidc-authserver", "opaque", "v3"],
    }
}

fn seal_ticket(options: &Options, kind: &str, ticket: &AuthenticationTicket) -> Result<String, OidcError> {
    let envelope = TicketEnvelope {
        version: ENVELOPE_VERSION,
        ticket: ticket.clone(),
    };
    let plaintext = serde_json::to_vec(&envelope)
        .map_err(|err| OidcError::server_error(format!("failed to serialize ticket: {err}")))?;
    let sealed = options.ticket_protector().seal(&purpose_tuple(kind), &plaintext);
    Ok(URL_SAFE_NO_PAD.encode(sealed))
}

fn unseal_ticket(options: &Options, kind: &str, token: &str) -> Result<AuthenticationTicket, OidcError> {
    let sealed = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_err| OidcError::invalid_grant("token is not validly encoded"))?;
    let plaintext = options
        .ticket_protector()
        .unseal(&purpose_tuple(kind), &sealed)
        .map_err(|_err| OidcError::invalid_grant("token could not be unsealed"))?;
    let envelope: TicketEnvelope = serde_json::from_slice(&plaintext)
        .map_err(|_err| OidcError::invalid_grant("token payload is malformed"))?;
    if envelope.version != ENVELOPE_VERSION {
        return Err(OidcError::invalid_grant("token envelope version is unsupported"));
    }
    Ok(envelope.ticket)
}

fn random_key() -> String {
    let mut bytes = [0_u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Run a `Create*Token` hook, returning the (possibly provider-replaced)
/// ticket unless the provider rejected or skipped issuance.
async fn run_create_hook(
    context: &mut NotificationContext,
    hook: impl AsyncFnOnce(&mut NotificationContext),
) -> Result<Option<AuthenticationTicket>, OidcError> {
    hook(context).await;
    match context.resolve() {
        HookResult::Rejected(Some(err)) => Err(err.clone()),
        HookResult::Rejected(None) => Err(OidcError::server_error("provider rejected without an error")),
        HookResult::Skipped => Ok(None),
        HookResult::HandledResponse | HookResult::Proceed => {
            Ok(context.ticket.clone())
        }
    }
}

/// Creates an opaque or JWT access token (§4.7).
///
/// Claim filtering: `sub`/name-identifier claims are always kept. For a
/// JWT access token with no encrypting credentials, only claims whose
/// `destinations` include [`Destination::Token`] are kept; for an opaque
/// access token, claims with *no* declared destination are kept, and
/// claims whose destinations are non-empty but lack [`Destination::Token`]
/// are dropped.
pub async fn create_access_token(
    options: &Options,
    context: &mut NotificationContext,
    source_ticket: &AuthenticationTicket,
    resource: Option<&str>,
) -> Result<Option<IssuedToken>, OidcError> {
    let mut ticket = source_ticket.clone_identity_only();
    let issued = OffsetDateTime::now_utc();
    let expires = issued + options.lifetimes().access_token;
    ticket.properties.issued_utc = Some(issued);
    ticket.properties.expires_utc = Some(expires);
    context.ticket = Some(ticket);

    let provider = Arc::clone(options.provider());
    let resolved = run_create_hook(context, async |ctx| provider.create_access_token(ctx).await).await?;
    let Some(mut ticket) = resolved else {
        return Ok(None);
    };

    filter_claims_for_access_token(&mut ticket, options);

    let value = match options.access_token_format() {
        TokenFormat::Opaque => seal_ticket(options, "access_token", &ticket)?,
        TokenFormat::Jwt if options.encrypting_credentials().is_empty() => {
            encode_access_token_jwt(options, &ticket, resource)?
        }
        // With encrypting credentials configured the access token would be
        // a JWE, which this crate does not implement (see `cache::EncryptingCredential`);
        // fall back to the opaque envelope rather than issuing a JWT that
        // skips the encryption a deployment asked for.
        TokenFormat::Jwt => seal_ticket(options, "access_token", &ticket)?,
    };

    Ok(Some(IssuedToken {
        value,
        expires_utc: expires,
    }))
}

/// §4.7 claim filtering. `options` (rather than a bare [`TokenFormat`]) so
/// a deployment with encrypting credentials configured is filtered the same
/// as an opaque token even when `access_token_format` is `Jwt`, since that
/// combination falls back to the opaque envelope (see [`create_access_token`]).
fn filter_claims_for_access_token(ticket: &mut AuthenticationTicket, options: &Options) {
    let treat_as_jwt = options.access_token_format() == TokenFormat::Jwt && options.encrypting_credentials().is_empty();
    ticket.identity.claims.retain(|claim| {
        if claim.claim_type == StandardClaim::SUB {
            return true;
        }
        if treat_as_jwt {
            claim.has_destination(Destination::Token)
        } else {
            claim.destinations.is_empty() || claim.has_destination(Destination::Token)
        }
    });
}

fn encode_access_token_jwt(
    options: &Options,
    ticket: &AuthenticationTicket,
    resource: Option<&str>,
) -> Result<String, OidcError> {
    let alg = options
        .signing_algorithm()
        .ok_or_else(|| OidcError::server_error("no signing credentials configured"))?;
    let key_entry = options
        .signing_keys()
        .first()
        .ok_or_else(|| OidcError::server_error("no signing credentials configured"))?;
    encode_jwt(options, ticket, alg, key_entry, resource)
}

/// Creates an identity token (§4.7). Always a JWT; requires signing
/// credentials, which is a fatal `server_error` if missing rather than a
/// silently-issued unsigned token.
///
/// Appends `iat`, `nonce` (if present on the request), `c_hash` (if an
/// authorization code was issued alongside), and `at_hash` (if an access
/// token was issued alongside) on top of the filtered claim set.
pub async fn create_identity_token(
    options: &Options,
    context: &mut NotificationContext,
    source_ticket: &AuthenticationTicket,
    nonce: Option<&str>,
    code: Option<&str>,
    access_token: Option<&str>,
    client_id: Option<&str>,
) -> Result<Option<IssuedToken>, OidcError> {
    let alg = options
        .signing_algorithm()
        .ok_or_else(|| OidcError::server_error("no signing credentials configured for identity tokens"))?;
    let key_entry = options
        .signing_keys()
        .first()
        .ok_or_else(|| OidcError::server_error("no signing credentials configured for identity tokens"))?;

    let mut ticket = source_ticket.clone_identity_only();
    let issued = OffsetDateTime::now_utc();
    let expires = issued + options.lifetimes().identity_token;
    ticket.properties.issued_utc = Some(issued);
    ticket.properties.expires_utc = Some(expires);
    context.ticket = Some(ticket);

    let provider = Arc::clone(options.provider());
    let resolved = run_create_hook(context, async |ctx| provider.create_identity_token(ctx).await).await?;
    let Some(mut ticket) = resolved else {
        return Ok(None);
    };

    ticket
        .identity
        .claims
        .retain(|claim| claim.claim_type == StandardClaim::SUB || claim.has_destination(Destination::IdToken));

    let digest_alg = crate::crypto::digest_for_signing_algorithm(alg)?;
    ticket.identity.add_claim(crate::ticket::Claim::new(
        StandardClaim::IAT,
        issued.unix_timestamp().to_string(),
    ));
    if let Some(nonce) = nonce {
        ticket
            .identity
            .add_claim(crate::ticket::Claim::new("nonce", nonce));
    }
    if let Some(code) = code {
        ticket
            .identity
            .add_claim(crate::ticket::Claim::new("c_hash", left_half_hash(code, digest_alg)));
    }
    if let Some(access_token) = access_token {
        ticket
            .identity
            .add_claim(crate::ticket::Claim::new("at_hash", left_half_hash(access_token, digest_alg)));
    }

    let value = encode_jwt(options, &ticket, alg, key_entry, client_id)?;
    Ok(Some(IssuedToken {
        value,
        expires_utc: expires,
    }))
}

/// `aud` is supplied by the caller rather than read off the ticket: §4.7
/// requires the access token's `aud` to come from the request's `resource`
/// parameter and the identity token's `aud` to always be the request's
/// `client_id`, and a single ticket may back either kind of token.
fn encode_jwt(
    options: &Options,
    ticket: &AuthenticationTicket,
    alg: &str,
    key_entry: &crate::cache::SigningKeyEntry,
    aud: Option<&str>,
) -> Result<String, OidcError> {
    let algorithm = parse_algorithm(alg)?;
    let mut header = Header::new(algorithm);
    header.kid = Some(key_entry.kid.clone());

    let mut claims = serde_json::Map::new();
    for claim in &ticket.identity.claims {
        claims.insert(claim.claim_type.clone(), serde_json::Value::String(claim.value.clone()));
    }
    let issued = ticket.properties.issued_utc.unwrap_or_else(OffsetDateTime::now_utc);
    let expires = ticket
        .properties
        .expires_utc
        .unwrap_or_else(|| issued + options.lifetimes().identity_token);
    claims.insert(
        StandardClaim::ISS.to_owned(),
        serde_json::Value::String(format!("{}/", options.issuer())),
    );
    if let Some(aud) = aud {
        claims.insert(StandardClaim::AUD.to_owned(), serde_json::Value::String(aud.to_owned()));
    }
    claims.insert(StandardClaim::NBF.to_owned(), serde_json::Value::Number(issued.unix_timestamp().into()));
    claims.insert(StandardClaim::EXP.to_owned(), serde_json::Value::Number(expires.unix_timestamp().into()));

    let encoding_key = EncodingKey::from_rsa_pem(&key_entry.encoding_key_pem)
        .or_else(|_err| EncodingKey::from_ec_pem(&key_entry.encoding_key_pem))
        .map_err(|err| OidcError::server_error(format!("invalid signing key material: {err}")))?;

    jsonwebtoken::encode(&header, &serde_json::Value::Object(claims), &encoding_key)
        .map_err(|err| OidcError::server_error(format!("failed to sign token: {err}")))
}

fn parse_algorithm(alg: &str) -> Result<jsonwebtoken::Algorithm, OidcError> {
    match alg {
        "RS256" => Ok(jsonwebtoken::Algorithm::RS256),
        "RS384" => Ok(jsonwebtoken::Algorithm::RS384),
        "RS512" => Ok(jsonwebtoken::Algorithm::RS512),
        "ES256" => Ok(jsonwebtoken::Algorithm::ES256),
        "ES384" => Ok(jsonwebtoken::Algorithm::ES384),
        "PS256" => Ok(jsonwebtoken::Algorithm::PS256),
        "PS384" => Ok(jsonwebtoken::Algorithm::PS384),
        "PS512" => Ok(jsonwebtoken::Algorithm::PS512),
        other => Err(OidcError::server_error(format!("unsupported signing algorithm {other:?}"))),
    }
}

/// Creates an opaque, unfiltered refresh token.
pub async fn create_refresh_token(
    options: &Options,
    context: &mut NotificationContext,
    source_ticket: &AuthenticationTicket,
) -> Result<Option<IssuedToken>, OidcError> {
    let mut ticket = source_ticket.clone_identity_only();
    let issued = OffsetDateTime::now_utc();
    let expires = issued + options.lifetimes().refresh_token;
    ticket.properties.issued_utc = Some(issued);
    ticket.properties.expires_utc = Some(expires);
    context.ticket = Some(ticket);

    let provider = Arc::clone(options.provider());
    let resolved = run_create_hook(context, async |ctx| provider.create_refresh_token(ctx).await).await?;
    let Some(ticket) = resolved else {
        return Ok(None);
    };

    let value = seal_ticket(options, "refresh_token", &ticket)?;
    Ok(Some(IssuedToken {
        value,
        expires_utc: expires,
    }))
}

/// Creates an opaque, unfiltered authorization code: a cryptographically
/// random 256-bit base64url key under which the sealed ticket is stored in
/// the injected [`crate::cache::CodeCache`] with the configured TTL.
pub async fn create_authorization_code(
    options: &Options,
    context: &mut NotificationContext,
    source_ticket: &AuthenticationTicket,
) -> Result<Option<IssuedToken>, OidcError> {
    let mut ticket = source_ticket.clone_identity_only();
    let issued = OffsetDateTime::now_utc();
    let expires = issued + options.lifetimes().authorization_code;
    ticket.properties.issued_utc = Some(issued);
    ticket.properties.expires_utc = Some(expires);
    context.ticket = Some(ticket);

    let provider = Arc::clone(options.provider());
    let resolved =
        run_create_hook(context, async |ctx| provider.create_authorization_code(ctx).await).await?;
    let Some(ticket) = resolved else {
        return Ok(None);
    };

    let key = random_key();
    let sealed = seal_ticket(options, "code", &ticket)?;
    options
        .code_cache()
        .set(key.clone(), Bytes::from(sealed.into_bytes()), options.lifetimes().authorization_code)
        .await;

    Ok(Some(IssuedToken {
        value: key,
        expires_utc: expires,
    }))
}

/// Redeems an authorization code: atomically removes it from the cache
/// (one-shot, regardless of what the caller does with the result
/// afterward) and unseals the ticket it named, if any.
pub async fn consume_authorization_code(
    options: &Options,
    code: &str,
) -> Result<Option<AuthenticationTicket>, OidcError> {
    let Some(sealed) = options.code_cache().take(code).await else {
        return Ok(None);
    };
    let token = String::from_utf8(sealed.to_vec())
        .map_err(|_err| OidcError::invalid_grant("authorization code payload is malformed"))?;
    let ticket = unseal_ticket(options, "code", &token)?;
    Ok(Some(ticket))
}

/// Redeems a refresh token: unseals it without removing anything from the
/// cache (refresh tokens are bearer-opaque, not cache-backed, unless a
/// provider chooses to track them itself via `receive_refresh_token`).
pub async fn consume_refresh_token(
    options: &Options,
    refresh_token: &str,
) -> Result<AuthenticationTicket, OidcError> {
    let ticket = unseal_ticket(options, "refresh_token", refresh_token)?;
    if let Some(expires) = ticket.properties.expires_utc {
        if expires <= OffsetDateTime::now_utc() {
            return Err(OidcError::invalid_grant("refresh token has expired"));
        }
    }
    Ok(ticket)
}

/// Resolves an opaque access token back into the ticket it was sealed from.
/// Userinfo is the only caller; expiry is checked by the caller since an
/// expired-but-well-formed token should still describe *why* it failed.
pub fn unseal_access_token(options: &Options, access_token: &str) -> Result<AuthenticationTicket, OidcError> {
    unseal_ticket(options, "access_token", access_token)
}

/// Best-effort resolution of a refresh token for revocation bookkeeping
/// only; unlike `consume_refresh_token`, an expired result is still
/// returned since revoking an already-expired token is harmless.
pub fn unseal_refresh_token_for_revocation(options: &Options, refresh_token: &str) -> Option<AuthenticationTicket> {
    unseal_ticket(options, "refresh_token", refresh_token).ok()
}

#[cfg(test)]
pub(crate) fn seal_access_token_for_test(
    options: &Options,
    _context: &mut NotificationContext,
    ticket: &AuthenticationTicket,
) -> String {
    seal_ticket(options, "access_token", ticket).expect("sealing a test ticket never fails")
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::message::OpenIdConnectMessage;
    use crate::ticket::{Claim, Identity};

    fn options() -> Options {
        Options::builder("https://auth.example.com").build().unwrap()
    }

    fn ticket_with_sub(sub: &str) -> AuthenticationTicket {
        let mut identity = Identity::new("test");
        identity.add_claim(Claim::new(StandardClaim::SUB, sub));
        identity.add_claim(
            Claim::new("email", "user@example.com").with_destination(Destination::IdToken),
        );
        AuthenticationTicket::new(identity, TicketProperties::default())
    }

    #[tokio::test]
    async fn authorization_code_round_trips_through_cache() {
        let options = options();
        let mut context = NotificationContext::new(OpenIdConnectMessage::new());
        let ticket = ticket_with_sub("user-1");

        let issued = create_authorization_code(&options, &mut context, &ticket)
            .await
            .unwrap()
            .unwrap();

        let redeemed = consume_authorization_code(&options, &issued.value).await.unwrap().unwrap();
        assert_eq!(redeemed.subject(), Some("user-1"));

        // one-shot: a second redemption attempt must fail.
        let second = consume_authorization_code(&options, &issued.value).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn access_token_jwt_drops_claims_without_token_destination() {
        let mut options_builder = Options::builder("https://auth.example.com")
            .access_token_format(TokenFormat::Jwt);
        options_builder = options_builder.signing_key(
            "RS256",
            test_signing_key(),
        );
        let options = options_builder.build().unwrap();

        let mut context = NotificationContext::new(OpenIdConnectMessage::new());
        let ticket = ticket_with_sub("user-1");
        let issued = create_access_token(&options, &mut context, &ticket, None).await.unwrap();
        assert!(issued.is_some());
    }

    fn test_signing_key() -> crate::cache::SigningKeyEntry {
        // A throwaway 2048-bit RSA test key (not used anywhere outside tests).
        const TEST_RSA_PEM: &[u8] = include_bytes!("../tests/fixtures/test_rsa_key.pem");
        crate::cache::SigningKeyEntry {
            kid: "test-key-1".to_owned(),
            algorithm: "RS256".to_owned(),
            encoding_key_pem: TEST_RSA_PEM.to_vec(),
            n: String::new(),
            e: "AQAB".to_owned(),
            certificate: None,
        }
    }

    #[tokio::test]
    async fn refresh_token_consumption_rejects_expired() {
        let options = options();
        let mut ticket = ticket_with_sub("user-1");
        ticket.properties.issued_utc = Some(OffsetDateTime::now_utc() - time::Duration::hours(2));
        ticket.properties.expires_utc = Some(OffsetDateTime::now_utc() - time::Duration::seconds(1));
        let sealed = seal_ticket(&options, "refresh_token", &ticket).unwrap();

        let result = consume_refresh_token(&options, &sealed).await;
        assert!(result.is_err());
    }
}
