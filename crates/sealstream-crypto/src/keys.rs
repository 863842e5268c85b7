//! Key handles: one-time content keys and recipient X25519 key pairs

use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::erase;
use crate::error::{CryptoError, CryptoResult};
use crate::KEY_SIZE;

/// A one-time 256-bit AEAD key. Created once per message, never reused.
///
/// Scrubbed (random overwrite + zero-fill) on drop.
#[derive(Clone)]
pub struct ContentKey {
    bytes: [u8; KEY_SIZE],
}

impl ContentKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Generate a fresh random content key from the OS entropy source.
    pub fn generate() -> Self {
        Self::generate_with_rng(&mut OsRng)
    }

    /// Generate a content key from a caller-supplied CSPRNG.
    pub fn generate_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        rng.fill_bytes(&mut bytes);
        Self { bytes }
    }
}

impl Drop for ContentKey {
    fn drop(&mut self) {
        erase::scrub(&mut self.bytes);
    }
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// A recipient's X25519 public key, validated on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecipientPublicKey {
    inner: PublicKey,
}

impl RecipientPublicKey {
    /// Parse a recipient public key from raw bytes.
    ///
    /// Rejects anything that is not exactly 32 bytes, and the all-zero
    /// encoding (the identity point, which can never contribute to a shared
    /// secret). Other low-order points are caught at exchange time via the
    /// contributory check.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let raw: [u8; KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| CryptoError::Key(format!("expected 32 bytes, got {}", bytes.len())))?;
        if raw == [0u8; KEY_SIZE] {
            return Err(CryptoError::Key("all-zero public key".into()));
        }
        Ok(Self {
            inner: PublicKey::from(raw),
        })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        self.inner.as_bytes()
    }

    pub(crate) fn inner(&self) -> &PublicKey {
        &self.inner
    }
}

/// A recipient's long-lived X25519 secret key.
///
/// The inner `StaticSecret` zeroizes itself on drop.
#[derive(Clone)]
pub struct RecipientSecretKey {
    inner: StaticSecret,
}

impl RecipientSecretKey {
    /// Generate a fresh recipient key pair's secret half.
    pub fn generate() -> Self {
        Self::generate_with_rng(&mut OsRng)
    }

    pub fn generate_with_rng<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self {
            inner: StaticSecret::random_from_rng(rng),
        }
    }

    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self {
            inner: StaticSecret::from(bytes),
        }
    }

    /// The matching public key, for publication to senders.
    pub fn public_key(&self) -> RecipientPublicKey {
        RecipientPublicKey {
            inner: PublicKey::from(&self.inner),
        }
    }

    pub(crate) fn inner(&self) -> &StaticSecret {
        &self.inner
    }
}

impl std::fmt::Debug for RecipientSecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecipientSecretKey")
            .field("inner", &"[REDACTED]")
            .finish()
    }
}
