//! Signing-algorithm-to-digest mapping and the `c_hash`/`at_hash` derivation,
//! plus the JSON Web Key shape published by the JWKS endpoint.
//!
//! OIDC Core §3.1.3.6 defines `at_hash`/`c_hash` as "the base64url encoding
//! of the left-most half of the hash of the octets of the ASCII
//! representation of the [token], where the hash algorithm used is the
//! hash algorithm used in the `alg` header parameter of the ID Token's JOSE
//! header". The spec text does not say what to do for an algorithm with no
//! obvious hash (e.g. `none`, or a future algorithm) — we resolve that
//! through an explicit table and fail loudly rather than guessing.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::config_error::ConfigError;

/// Digest algorithms this server knows how to derive `at_hash`/`c_hash`
/// with. Kept distinct from `jsonwebtoken::Algorithm` so the mapping table
/// in [`digest_for_signing_algorithm`] is the single place that needs to
/// change when a new signing algorithm is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    fn digest(self, input: &[u8]) -> Vec<u8> {
        match self {
            DigestAlgorithm::Sha256 => Sha256::digest(input).to_vec(),
            DigestAlgorithm::Sha384 => Sha384::digest(input).to_vec(),
            DigestAlgorithm::Sha512 => Sha512::digest(input).to_vec(),
        }
    }
}

/// Resolve the digest algorithm to use for `at_hash`/`c_hash` from the JWT
/// `alg` header value. Returns an error for any algorithm not in this
/// table instead of silently defaulting to SHA-256, per this crate's
/// resolution of the upstream Open Question on unspecified digest choice.
///
/// # Errors
/// Returns [`ConfigError::UnknownSigningAlgorithm`] if `alg` has no known
/// digest mapping.
pub fn digest_for_signing_algorithm(alg: &str) -> Result<DigestAlgorithm, ConfigError> {
    match alg {
        "RS256" | "ES256" | "PS256" | "HS256" => Ok(DigestAlgorithm::Sha256),
        "RS384" | "ES384" | "PS384" | "HS384" => Ok(DigestAlgorithm::Sha384),
        "RS512" | "ES512" | "PS512" | "HS512" => Ok(DigestAlgorithm::Sha512),
        other => Err(ConfigError::UnknownSigningAlgorithm(other.to_owned())),
    }
}

/// Compute `at_hash`/`c_hash`: base64url(left half of digest(ASCII bytes of
/// `token`)).
#[must_use]
pub fn left_half_hash(token: &str, alg: DigestAlgorithm) -> String {
    let digest = alg.digest(token.as_bytes());
    let half = &digest[..digest.len() / 2];
    URL_SAFE_NO_PAD.encode(half)
}

/// A published public key, rendered at the JWKS endpoint. `kty` is not a
/// field here — it comes solely from [`JsonWebKeyMaterial`]'s own
/// `#[serde(tag = "kty")]`, since a second top-level `kty` field would
/// collide with the flattened enum's tag and serialize the key twice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonWebKey {
    #[serde(rename = "use")]
    pub key_use: String,
    pub kid: String,
    pub alg: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub key_ops: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x5t: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x5c: Option<Vec<String>>,
    #[serde(flatten)]
    pub material: JsonWebKeyMaterial,
}

/// Algorithm-specific public key fields. RSA is the only variant modeled
/// today since it is what `jsonwebtoken`'s `EncodingKey::from_rsa_pem` and
/// friends exercise; more variants extend this enum without touching
/// callers that only match on `JsonWebKey` as a whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kty")]
pub enum JsonWebKeyMaterial {
    #[serde(rename = "RSA")]
    Rsa { n: String, e: String },
    #[serde(rename = "EC")]
    Ec { crv: String, x: String, y: String },
}

/// Whether a key is published for signature verification or for
/// encryption (RFC 7517 §4.2 `use`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyUse {
    Sig,
    Enc,
}

impl KeyUse {
    fn as_str(self) -> &'static str {
        match self {
            KeyUse::Sig => "sig",
            KeyUse::Enc => "enc",
        }
    }
}

/// An X.509 certificate associated with a published key, carried as a
/// first-class accessor (`x5t`/`x5c`) rather than surfaced via reflection
/// over the key material — this is the one place a certificate's DER bytes
/// are touched.
#[derive(Debug, Clone)]
pub struct X509Certificate {
    der: Vec<u8>,
}

impl X509Certificate {
    #[must_use]
    pub fn from_der(der: Vec<u8>) -> Self {
        Self { der }
    }

    /// RFC 7517 §4.8: base64url-encoded SHA-1 thumbprint of the DER
    /// certificate.
    #[must_use]
    pub fn x5t(&self) -> String {
        URL_SAFE_NO_PAD.encode(Sha1::digest(&self.der))
    }

    /// RFC 7517 §4.7: standard-base64-encoded (not base64url) DER
    /// certificate, as the sole entry of the `x5c` chain this server
    /// publishes.
    #[must_use]
    pub fn x5c(&self) -> String {
        STANDARD.encode(&self.der)
    }
}

/// Allow-listed signing/encryption algorithms this server will publish a
/// JWK for. An algorithm outside this list is a configuration mistake the
/// JWKS endpoint refuses to surface rather than publishing a key whose
/// `alg` no client can act on correctly.
fn is_publishable_algorithm(algorithm: &str, key_use: KeyUse) -> bool {
    match key_use {
        KeyUse::Sig => algorithm == "RS256",
        KeyUse::Enc => matches!(algorithm, "RSA-OAEP" | "RSA1_5"),
    }
}

/// Builds the published JWK for one signing or encrypting key. Returns
/// `None` if `algorithm` is not in the allow-list for `key_use`; the caller
/// logs and skips rather than publishing a key a client couldn't use.
#[must_use]
pub fn build_jwk(
    kid: &str,
    algorithm: &str,
    key_use: KeyUse,
    n: &str,
    e: &str,
    certificate: Option<&X509Certificate>,
) -> Option<JsonWebKey> {
    if !is_publishable_algorithm(algorithm, key_use) {
        return None;
    }
    Some(JsonWebKey {
        key_use: key_use.as_str().to_owned(),
        kid: kid.to_owned(),
        alg: algorithm.to_owned(),
        key_ops: Vec::new(),
        x5t: certificate.map(X509Certificate::x5t),
        x5c: certificate.map(|cert| vec![cert.x5c()]),
        material: JsonWebKeyMaterial::Rsa {
            n: n.to_owned(),
            e: e.to_owned(),
        },
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn rs256_maps_to_sha256() {
        assert_eq!(
            digest_for_signing_algorithm("RS256").unwrap(),
            DigestAlgorithm::Sha256
        );
    }

    #[test]
    fn unknown_algorithm_is_rejected() {
        assert!(digest_for_signing_algorithm("EdDSA").is_err());
    }

    #[test]
    fn left_half_hash_is_deterministic_and_half_length() {
        let full = URL_SAFE_NO_PAD.encode(Sha256::digest(b"abc.def.ghi"));
        let half = left_half_hash("abc.def.ghi", DigestAlgorithm::Sha256);
        assert_ne!(half, full);
        assert_eq!(half, left_half_hash("abc.def.ghi", DigestAlgorithm::Sha256));
    }

    #[test]
    fn build_jwk_rejects_algorithm_outside_allow_list() {
        assert!(build_jwk("k1", "RS384", KeyUse::Sig, "n", "AQAB", None).is_none());
        assert!(build_jwk("k1", "RSA-OAEP", KeyUse::Sig, "n", "AQAB", None).is_none());
    }

    #[test]
    fn build_jwk_accepts_allow_listed_algorithm() {
        let jwk = build_jwk("k1", "RS256", KeyUse::Sig, "n", "AQAB", None).unwrap();
        assert_eq!(jwk.alg, "RS256");
        assert_eq!(jwk.key_use, "sig");
        assert!(jwk.x5t.is_none());
    }

    #[test]
    fn x509_certificate_derives_thumbprint_and_chain() {
        let cert = X509Certificate::from_der(b"not-a-real-certificate".to_vec());
        let jwk = build_jwk("k1", "RS256", KeyUse::Sig, "n", "AQAB", Some(&cert)).unwrap();
        assert!(jwk.x5t.is_some());
        assert_eq!(jwk.x5c.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn json_web_key_serializes_a_single_kty() {
        let jwk = build_jwk("k1", "RS256", KeyUse::Sig, "n-value", "AQAB", None).unwrap();
        let json = serde_json::to_value(&jwk).unwrap();
        assert_eq!(json["kty"], "RSA");
    }
}
