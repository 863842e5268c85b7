use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Every failure here is terminal for the operation that raised it; retrying
/// a cryptographic failure never helps, so retry policy belongs to callers.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Malformed or ambiguous container / wrapped-key structure. Never
    /// decoded best-effort.
    #[error("malformed container or wrapped key: {0}")]
    Format(String),

    /// AEAD tag verification failed. Covers both tampering and wrong-key
    /// attempts; the two are deliberately not distinguished.
    #[error("authentication failed: tag mismatch (tampering or wrong key)")]
    Integrity,

    /// Malformed or unusable public key supplied to wrap/unwrap.
    #[error("invalid recipient key: {0}")]
    Key(String),

    /// Wrapped-key version not recognized by this build.
    #[error("unsupported wrapped-key version: {0}")]
    UnsupportedVersion(String),

    /// Invalid cipher configuration.
    #[error("invalid cipher config: {0}")]
    Config(String),

    /// AEAD seal failure.
    #[error("AEAD encryption failed")]
    Encrypt,

    /// HKDF expansion failed.
    #[error("key derivation failed: {0}")]
    Derive(String),

    /// Facade-level: the wrapped key could not be recovered (wrong
    /// recipient or tampered wrap).
    #[error("key recovery failed: {source}")]
    KeyRecovery {
        #[source]
        source: Box<CryptoError>,
    },

    /// Facade-level: the container could not be decrypted (tampered or
    /// corrupted content).
    #[error("content decryption failed: {source}")]
    ContentDecryption {
        #[source]
        source: Box<CryptoError>,
    },
}
