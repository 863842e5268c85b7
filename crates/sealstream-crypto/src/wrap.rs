//! Key wrapping: protect a one-time content key for a single recipient
//!
//! v2 scheme (the only one emitted):
//! ```text
//! ephemeral X25519 pair ──┐
//!                         ├─ DH ─→ shared secret
//! recipient public key  ──┘           │
//!                                     ▼
//!        HKDF-SHA256(salt = random 16 B, info = "sealstream-key-wrap-v2")
//!                                     │
//!                                     ▼
//!        AES-256-GCM seal of the 32 content-key bytes, fresh 12-byte nonce
//! ```
//! `WrappedKey.ciphertext` is `salt ‖ sealed`; the ephemeral public key rides
//! alongside so the recipient can re-derive the shared secret. Nothing in the
//! structure suffices to recover the content key without the recipient's
//! private key.
//!
//! v1 is the legacy scheme that stored the raw wrapping secret in the
//! `ephemeral_public_key` field: trivially reversible by anyone holding the
//! bytes. It is decoded for previously issued data and never emitted; treat
//! any v1-wrapped message as non-confidential.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey};

use crate::erase;
use crate::error::{CryptoError, CryptoResult};
use crate::keys::{ContentKey, RecipientPublicKey, RecipientSecretKey};
use crate::{KEY_SIZE, NONCE_SIZE, SALT_SIZE, TAG_SIZE};

/// Legacy wrapped-key encoding (compromised by design; decode-only).
pub const WRAP_VERSION_V1: &str = "v1";

/// Current wrapped-key encoding.
pub const WRAP_VERSION_V2: &str = "v2";

/// HKDF context string binding derived keys to this protocol and version.
const WRAP_INFO_V2: &[u8] = b"sealstream-key-wrap-v2";

/// A content key encrypted so that only one recipient can recover it.
///
/// Byte fields are base64; the structure serializes to JSON and is the
/// engine's second wire format (alongside the container), so fields are
/// stable across versions and `version` selects the decode scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WrappedKey {
    /// Encoding scheme: [`WRAP_VERSION_V2`] for all newly issued wraps.
    pub version: String,
    /// v2: `salt (16) ‖ AES-GCM ciphertext + tag` (base64)
    pub ciphertext: String,
    /// AES-GCM nonce, 12 bytes (base64)
    pub nonce: String,
    /// v2: sender's ephemeral X25519 public key (base64).
    /// v1 (legacy defect): the raw wrapping secret itself.
    pub ephemeral_public_key: String,
    /// The recipient this wrap was issued for (base64)
    pub recipient_public_key: String,
}

impl WrappedKey {
    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> CryptoResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| CryptoError::Format(format!("wrapped-key serialization: {e}")))
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(data: &[u8]) -> CryptoResult<Self> {
        serde_json::from_slice(data)
            .map_err(|e| CryptoError::Format(format!("wrapped-key deserialization: {e}")))
    }
}

/// Wrap a content key for a recipient, using OS randomness.
pub fn wrap_key(key: &ContentKey, recipient: &RecipientPublicKey) -> CryptoResult<WrappedKey> {
    wrap_key_with_rng(&mut OsRng, key, recipient)
}

/// Wrap with a caller-supplied CSPRNG (deterministic under a seeded rng).
pub fn wrap_key_with_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
    key: &ContentKey,
    recipient: &RecipientPublicKey,
) -> CryptoResult<WrappedKey> {
    // One ephemeral pair per wrap; the secret half can perform exactly one
    // exchange and zeroizes on drop.
    let ephemeral = EphemeralSecret::random_from_rng(&mut *rng);
    let ephemeral_public = PublicKey::from(&ephemeral);

    let shared = ephemeral.diffie_hellman(recipient.inner());
    if !shared.was_contributory() {
        return Err(CryptoError::Key("low-order recipient public key".into()));
    }

    let mut salt = [0u8; SALT_SIZE];
    rng.fill_bytes(&mut salt);

    let mut kek = [0u8; KEY_SIZE];
    Hkdf::<Sha256>::new(Some(&salt), shared.as_bytes())
        .expand(WRAP_INFO_V2, &mut kek)
        .map_err(|e| CryptoError::Derive(e.to_string()))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rng.fill_bytes(&mut nonce_bytes);

    let sealed = Aes256Gcm::new((&kek).into())
        .encrypt(Nonce::from_slice(&nonce_bytes), key.as_bytes().as_slice())
        .map_err(|_| CryptoError::Encrypt);
    erase::scrub(&mut kek);
    let sealed = sealed?;

    let mut ciphertext = Vec::with_capacity(SALT_SIZE + sealed.len());
    ciphertext.extend_from_slice(&salt);
    ciphertext.extend_from_slice(&sealed);

    Ok(WrappedKey {
        version: WRAP_VERSION_V2.to_string(),
        ciphertext: STANDARD.encode(&ciphertext),
        nonce: STANDARD.encode(nonce_bytes),
        ephemeral_public_key: STANDARD.encode(ephemeral_public.as_bytes()),
        recipient_public_key: STANDARD.encode(recipient.as_bytes()),
    })
}

/// Recover the content key from a wrapped key, dispatching on `version`.
pub fn unwrap_key(wrapped: &WrappedKey, secret: &RecipientSecretKey) -> CryptoResult<ContentKey> {
    match wrapped.version.as_str() {
        WRAP_VERSION_V2 => unwrap_v2(wrapped, secret),
        WRAP_VERSION_V1 => unwrap_v1(wrapped),
        other => Err(CryptoError::UnsupportedVersion(other.to_string())),
    }
}

/// Re-issue an existing wrap for a new recipient without touching the
/// container: unwrap with the current recipient's secret, wrap for the new
/// one. Also the upgrade path off v1.
pub fn rewrap_key(
    wrapped: &WrappedKey,
    secret: &RecipientSecretKey,
    new_recipient: &RecipientPublicKey,
) -> CryptoResult<WrappedKey> {
    let key = unwrap_key(wrapped, secret)?;
    wrap_key(&key, new_recipient)
}

fn unwrap_v2(wrapped: &WrappedKey, secret: &RecipientSecretKey) -> CryptoResult<ContentKey> {
    let ciphertext = b64_field(&wrapped.ciphertext, "ciphertext")?;
    let nonce_bytes = b64_array::<NONCE_SIZE>(&wrapped.nonce, "nonce")?;
    let ephemeral_raw = b64_array::<KEY_SIZE>(&wrapped.ephemeral_public_key, "ephemeral key")?;

    if ciphertext.len() != SALT_SIZE + KEY_SIZE + TAG_SIZE {
        return Err(CryptoError::Format(format!(
            "v2 ciphertext is {} bytes, expected {}",
            ciphertext.len(),
            SALT_SIZE + KEY_SIZE + TAG_SIZE
        )));
    }
    let (salt, sealed) = ciphertext.split_at(SALT_SIZE);

    let shared = secret.inner().diffie_hellman(&PublicKey::from(ephemeral_raw));
    if !shared.was_contributory() {
        return Err(CryptoError::Key("low-order ephemeral public key".into()));
    }

    let mut kek = [0u8; KEY_SIZE];
    Hkdf::<Sha256>::new(Some(salt), shared.as_bytes())
        .expand(WRAP_INFO_V2, &mut kek)
        .map_err(|e| CryptoError::Derive(e.to_string()))?;

    let opened = Aes256Gcm::new((&kek).into())
        .decrypt(Nonce::from_slice(&nonce_bytes), sealed)
        .map_err(|_| CryptoError::Integrity);
    erase::scrub(&mut kek);

    content_key_from_plaintext(opened?)
}

/// Legacy decode: the "ephemeral_public_key" field holds the raw wrapping
/// secret, so no private key is involved. Kept only so previously issued
/// data stays readable.
fn unwrap_v1(wrapped: &WrappedKey) -> CryptoResult<ContentKey> {
    let ciphertext = b64_field(&wrapped.ciphertext, "ciphertext")?;
    let nonce_bytes = b64_array::<NONCE_SIZE>(&wrapped.nonce, "nonce")?;
    let mut wrap_secret = b64_array::<KEY_SIZE>(&wrapped.ephemeral_public_key, "wrap secret")?;

    if ciphertext.len() != KEY_SIZE + TAG_SIZE {
        return Err(CryptoError::Format(format!(
            "v1 ciphertext is {} bytes, expected {}",
            ciphertext.len(),
            KEY_SIZE + TAG_SIZE
        )));
    }

    let opened = Aes256Gcm::new((&wrap_secret).into())
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
        .map_err(|_| CryptoError::Integrity);
    erase::scrub(&mut wrap_secret);

    content_key_from_plaintext(opened?)
}

fn content_key_from_plaintext(mut plaintext: Vec<u8>) -> CryptoResult<ContentKey> {
    if plaintext.len() != KEY_SIZE {
        erase::scrub(&mut plaintext);
        return Err(CryptoError::Format(format!(
            "unwrapped key is {} bytes, expected {KEY_SIZE}",
            plaintext.len()
        )));
    }
    let mut key_bytes = [0u8; KEY_SIZE];
    key_bytes.copy_from_slice(&plaintext);
    erase::scrub(&mut plaintext);
    Ok(ContentKey::from_bytes(key_bytes))
}

fn b64_field(value: &str, what: &str) -> CryptoResult<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|e| CryptoError::Format(format!("{what}: invalid base64: {e}")))
}

fn b64_array<const N: usize>(value: &str, what: &str) -> CryptoResult<[u8; N]> {
    let bytes = b64_field(value, what)?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| {
            CryptoError::Format(format!("{what}: expected {} bytes, got {}", N, bytes.len()))
        })
}
