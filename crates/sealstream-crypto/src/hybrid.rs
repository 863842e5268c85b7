//! The two operations the rest of the application needs
//!
//! `encrypt_for_recipient` and `decrypt_as_recipient` compose the streaming
//! cipher with the key wrapper. Sub-step failures on the decrypt path are
//! classified so callers can tell the user whether key recovery failed
//! (wrong recipient, tampered wrap) or the content itself failed to decrypt
//! (tampered or corrupted container).

use crate::cipher::{self, CipherConfig, ProgressFn};
use crate::error::{CryptoError, CryptoResult};
use crate::keys::{ContentKey, RecipientPublicKey, RecipientSecretKey};
use crate::wrap::{self, WrappedKey};

/// Everything a sender hands to its transport: the sealed container plus the
/// content key wrapped for the recipient.
#[derive(Debug, Clone)]
pub struct EncryptedMessage {
    pub container: Vec<u8>,
    pub wrapped_key: WrappedKey,
}

/// Encrypt a blob under a fresh one-time key and wrap that key for the
/// recipient. The raw key is scrubbed before this returns.
pub async fn encrypt_for_recipient(
    plaintext: &[u8],
    recipient: &RecipientPublicKey,
    config: &CipherConfig,
    progress: Option<&ProgressFn>,
) -> CryptoResult<EncryptedMessage> {
    let key = ContentKey::generate();
    let container = cipher::encrypt(&key, plaintext, config, progress).await?;
    let wrapped_key = wrap::wrap_key(&key, recipient)?;
    drop(key);

    Ok(EncryptedMessage {
        container,
        wrapped_key,
    })
}

/// Recover the content key with the recipient's secret, then decrypt the
/// container. The recovered key is scrubbed before this returns.
pub async fn decrypt_as_recipient(
    container: &[u8],
    wrapped_key: &WrappedKey,
    secret: &RecipientSecretKey,
    config: &CipherConfig,
    progress: Option<&ProgressFn>,
) -> CryptoResult<Vec<u8>> {
    let key = wrap::unwrap_key(wrapped_key, secret).map_err(|e| CryptoError::KeyRecovery {
        source: Box::new(e),
    })?;

    cipher::decrypt(&key, container, config, progress)
        .await
        .map_err(|e| CryptoError::ContentDecryption {
            source: Box::new(e),
        })
}
