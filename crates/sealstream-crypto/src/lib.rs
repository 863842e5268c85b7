//! sealstream-crypto: client-side hybrid encryption for large media blobs
//!
//! Architecture: Encrypt-then-Wrap with AES-256-GCM and X25519
//!
//! Pipeline: plaintext → chunked AES-256-GCM seal → container bytes,
//! while the one-time content key is wrapped for the recipient via an
//! ephemeral X25519 exchange + HKDF-SHA256.
//!
//! Container layouts (binary, self-describing by total length):
//! ```text
//! simple  (payload < chunk threshold):
//!   [12 bytes: nonce][ciphertext + 16-byte tag]
//! chunked (payload >= chunk threshold):
//!   [4 bytes: chunk count, BE][12 bytes: base nonce]
//!   then per chunk: [4 bytes: record length, BE][ciphertext + 16-byte tag]
//!   chunk nonce = base nonce with its last 4 bytes XOR chunk index (BE u32)
//! ```
//!
//! Key hierarchy:
//! ```text
//! ContentKey (256-bit random, one per message)
//!   ├── seals the container          (AES-256-GCM)
//!   └── wrapped for the recipient    (X25519 ephemeral DH → HKDF-SHA256 → AES-256-GCM)
//! ```
//!
//! No transport, storage, or account management lives here; callers hand in
//! in-memory blobs and keys and get bytes back.

pub mod cipher;
pub mod container;
pub mod erase;
pub mod error;
pub mod hybrid;
pub mod keys;
pub mod wrap;

pub use cipher::{
    decrypt, derive_chunk_nonce, encrypt, ChunkProgress, CipherConfig, ProgressFn,
    DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_THRESHOLD,
};
pub use container::{describe, ContainerInfo, LayoutKind};
pub use erase::{scrub, scrub_all};
pub use error::{CryptoError, CryptoResult};
pub use hybrid::{decrypt_as_recipient, encrypt_for_recipient, EncryptedMessage};
pub use keys::{ContentKey, RecipientPublicKey, RecipientSecretKey};
pub use wrap::{rewrap_key, unwrap_key, wrap_key, WrappedKey, WRAP_VERSION_V1, WRAP_VERSION_V2};

/// Size of a content key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of the HKDF salt embedded in a v2 wrapped key
pub const SALT_SIZE: usize = 16;

/// Largest buffer a single secure-random call may fill.
///
/// Browser runtimes cap `getRandomValues` at 65536 bytes per call; the same
/// limit is kept here as a policy constant so [`erase::scrub`] behaves
/// identically across runtimes.
pub const MAX_RANDOM_FILL_BYTES: usize = 65536;
