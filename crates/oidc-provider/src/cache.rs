//! The code cache and ticket-protection seams.
//!
//! Both are injected by the host application: [`CodeCache`] backs
//! authorization-code (and, optionally, refresh-token) storage, and
//! [`TicketProtector`] seals/unseals the opaque ticket envelope. This crate
//! ships only the in-process reference implementations below, used by its
//! own tests and suitable for single-process deployments; a distributed
//! cache or a real AEAD keyring is the host application's responsibility.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use thiserror::Error;
use tokio::time::Instant;

/// A store for one-shot, time-limited opaque blobs: authorization codes
/// above all, but the same contract suits any short-lived server-side
/// secret keyed by a random string.
///
/// `take` MUST be atomic: a value handed out by one `take` call must never
/// also be handed out by a concurrent one. This is what makes
/// authorization-code replay detection race-free regardless of how many
/// request tasks see the same code.
#[async_trait]
pub trait CodeCache: Send + Sync {
    async fn set(&self, key: String, value: Bytes, ttl: Duration);

    /// Atomically retrieve and remove the value for `key`. Returns `None`
    /// both when the key never existed and when it already expired or was
    /// already taken.
    async fn take(&self, key: &str) -> Option<Bytes>;
}

/// A `DashMap`-backed, single-process [`CodeCache`]. Expiration is checked
/// lazily on `take` rather than via a background sweep, which keeps the
/// one-shot guarantee intact without a timer task racing a `take` call.
#[derive(Debug, Default)]
pub struct InMemoryCodeCache {
    entries: DashMap<String, (Bytes, Instant)>,
}

impl InMemoryCodeCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CodeCache for InMemoryCodeCache {
    async fn set(&self, key: String, value: Bytes, ttl: Duration) {
        self.entries.insert(key, (value, Instant::now() + ttl));
    }

    async fn take(&self, key: &str) -> Option<Bytes> {
        let (_, (value, expires_at)) = self.entries.remove(key)?;
        if Instant::now() >= expires_at {
            None
        } else {
            Some(value)
        }
    }
}

/// Errors from [`TicketProtector::unseal`]. Sealing itself is assumed
/// infallible for a correctly configured protector.
#[derive(Debug, Error)]
pub enum ProtectorError {
    #[error("ticket payload could not be unsealed: {0}")]
    InvalidPayload(String),
}

/// Seals/unseals the opaque ticket binary envelope for storage in an
/// authorization code, refresh token, or opaque access token. `purpose`
/// binds the sealed bytes to the context they were sealed for (middleware
/// name, auth scheme, token kind, envelope format version) so a ciphertext
/// minted for one purpose cannot be replayed as another.
pub trait TicketProtector: Send + Sync {
    fn seal(&self, purpose: &[&str], plaintext: &[u8]) -> Vec<u8>;
    fn unseal(&self, purpose: &[&str], sealed: &[u8]) -> Result<Vec<u8>, ProtectorError>;
}

/// A reversible but **not secure** protector: XORs the plaintext with a
/// repeating key derived from the purpose tuple. Exists only so this
/// crate's own tests (and small non-production setups) don't need a real
/// AEAD dependency; production deployments must inject a real keyring.
#[derive(Debug, Default)]
pub struct NullProtector {
    _guard: Mutex<()>,
}

impl NullProtector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn keystream(purpose: &[&str]) -> Vec<u8> {
        let joined = purpose.join("\u{0}");
        if joined.is_empty() {
            vec![0]
        } else {
            joined.into_bytes()
        }
    }

    fn xor(data: &[u8], key: &[u8]) -> Vec<u8> {
        data.iter()
            .enumerate()
            .map(|(i, b)| b ^ key[i % key.len()])
            .collect()
    }
}

impl TicketProtector for NullProtector {
    fn seal(&self, purpose: &[&str], plaintext: &[u8]) -> Vec<u8> {
        Self::xor(plaintext, &Self::keystream(purpose))
    }

    fn unseal(&self, purpose: &[&str], sealed: &[u8]) -> Result<Vec<u8>, ProtectorError> {
        Ok(Self::xor(sealed, &Self::keystream(purpose)))
    }
}

/// A simple in-process registry mapping `kid` to signing key material, used
/// by the JWKS endpoint and the token service's JWT creators. An
/// application that rotates keys at runtime is expected to hold its
/// `Options` behind its own `ArcSwap` (or rebuild `Options` entirely) rather
/// than mutate a registry shared with in-flight requests, since `Options`
/// itself is immutable once built.
#[derive(Debug, Default)]
pub struct SigningKeyRegistry {
    keys: HashMap<String, SigningKeyEntry>,
}

/// One signing key: its raw RSA public modulus/exponent (for JWKS
/// publication) and the PEM-encoded private key material `jsonwebtoken`
/// signs with. `certificate`, if set, is published as the key's `x5t`/`x5c`.
#[derive(Debug, Clone)]
pub struct SigningKeyEntry {
    pub kid: String,
    pub algorithm: String,
    pub encoding_key_pem: Vec<u8>,
    pub n: String,
    pub e: String,
    pub certificate: Option<crate::crypto::X509Certificate>,
}

impl SigningKeyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: SigningKeyEntry) {
        self.keys.insert(entry.kid.clone(), entry);
    }

    #[must_use]
    pub fn get(&self, kid: &str) -> Option<&SigningKeyEntry> {
        self.keys.get(kid)
    }

    #[must_use]
    pub fn first(&self) -> Option<&SigningKeyEntry> {
        self.keys.values().next()
    }

    pub fn values(&self) -> impl Iterator<Item = &SigningKeyEntry> {
        self.keys.values()
    }
}

/// A public encrypting key this server advertises via JWKS. This crate
/// publishes encrypting credentials but does not itself perform JWE
/// encryption: no crate already in this workspace's dependency stack
/// implements RSA-OAEP JWE, so encrypting the tokens this server issues is
/// left to a future extension; see `DESIGN.md`.
#[derive(Debug, Clone)]
pub struct EncryptingCredential {
    pub kid: String,
    pub algorithm: String,
    pub n: String,
    pub e: String,
    pub certificate: Option<crate::crypto::X509Certificate>,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn take_is_one_shot() {
        let cache = InMemoryCodeCache::new();
        cache
            .set("key1".to_owned(), Bytes::from_static(b"payload"), Duration::from_secs(60))
            .await;

        assert_eq!(cache.take("key1").await, Some(Bytes::from_static(b"payload")));
        assert_eq!(cache.take("key1").await, None);
    }

    #[tokio::test]
    async fn take_respects_ttl() {
        let cache = InMemoryCodeCache::new();
        cache
            .set("key1".to_owned(), Bytes::from_static(b"payload"), Duration::from_millis(1))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.take("key1").await, None);
    }

    #[test]
    fn null_protector_round_trips() {
        let protector = NullProtector::new();
        let purpose = ["oidc", "code", "v3"];
        let sealed = protector.seal(&purpose, b"secret-ticket-bytes");
        let opened = protector.unseal(&purpose, &sealed).unwrap();
        assert_eq!(opened, b"secret-ticket-bytes");
    }

    #[test]
    fn null_protector_rejects_wrong_purpose_by_producing_different_bytes() {
        let protector = NullProtector::new();
        let sealed = protector.seal(&["a"], b"hello123");
        let opened = protector.unseal(&["b"], &sealed).unwrap();
        assert_ne!(opened, b"hello123");
    }
}
