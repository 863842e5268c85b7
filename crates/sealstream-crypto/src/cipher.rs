//! Streaming symmetric cipher: AES-256-GCM in simple or chunked layout
//!
//! Mode selection is driven purely by payload size so that encrypt/decrypt
//! round-trip without any out-of-band mode flag. Payloads below
//! `chunk_threshold` are sealed in one call; larger payloads are split into
//! `chunk_size` slices, each sealed independently under a nonce derived from
//! a single random base nonce, keeping peak memory bounded by one chunk of
//! ciphertext rather than a second copy of the whole payload.
//!
//! Per-chunk nonce derivation (part of the container format): the 0-based
//! chunk index, as a big-endian u32, is XORed into the last 4 bytes of the
//! base nonce. Reversible and collision-free below 2^32 chunks, so every
//! nonce used under one content key is unique.
//!
//! The chunk loops yield to the scheduler after every chunk; dropping the
//! returned future at a yield point is the way to abort a long operation.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use tracing::debug;

use crate::container::{self, ContainerLayout, CHUNK_HEADER_SIZE, RECORD_OVERHEAD};
use crate::error::{CryptoError, CryptoResult};
use crate::keys::ContentKey;
use crate::{NONCE_SIZE, TAG_SIZE};

/// Default chunk size for the chunked layout (1 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Default payload size at which encryption switches to the chunked layout (50 MB)
pub const DEFAULT_CHUNK_THRESHOLD: usize = 50 * 1024 * 1024;

/// Chunking geometry. Both sides of a round-trip must agree on it, since
/// layout detection and nonce derivation depend on the same numbers.
#[derive(Debug, Clone)]
pub struct CipherConfig {
    /// Plaintext bytes per chunk in the chunked layout.
    pub chunk_size: usize,
    /// Payload size at or above which the chunked layout is used.
    pub chunk_threshold: usize,
}

impl Default for CipherConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_threshold: DEFAULT_CHUNK_THRESHOLD,
        }
    }
}

impl CipherConfig {
    /// Check the geometry invariants layout detection relies on.
    pub fn validate(&self) -> CryptoResult<()> {
        if self.chunk_size == 0 {
            return Err(CryptoError::Config("chunk_size must be non-zero".into()));
        }
        if self.chunk_size + TAG_SIZE > u32::MAX as usize {
            return Err(CryptoError::Config(format!(
                "chunk_size {} does not fit a 32-bit record length",
                self.chunk_size
            )));
        }
        if self.chunk_threshold > usize::MAX / 4 {
            return Err(CryptoError::Config(format!(
                "chunk_threshold {} is beyond any addressable payload",
                self.chunk_threshold
            )));
        }
        if self.chunk_threshold < 2 * self.chunk_size {
            return Err(CryptoError::Config(format!(
                "chunk_threshold {} must be at least twice chunk_size {}",
                self.chunk_threshold, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Progress of a chunked operation, reported after each chunk.
#[derive(Debug, Clone, Copy)]
pub struct ChunkProgress {
    /// 0-based index of the chunk just processed.
    pub chunk_index: u32,
    pub chunk_count: u32,
    pub bytes_done: u64,
    pub bytes_total: u64,
}

/// Progress callback type
pub type ProgressFn = Box<dyn Fn(ChunkProgress) + Send + Sync>;

/// Derive the nonce for chunk `index` from a container's base nonce.
///
/// Public so that nonce uniqueness is externally verifiable.
pub fn derive_chunk_nonce(base_nonce: &[u8; NONCE_SIZE], index: u32) -> [u8; NONCE_SIZE] {
    let mut nonce = *base_nonce;
    let counter = index.to_be_bytes();
    for (n, c) in nonce[NONCE_SIZE - 4..].iter_mut().zip(counter) {
        *n ^= c;
    }
    nonce
}

/// Encrypt a blob into a self-describing container, using OS randomness.
pub async fn encrypt(
    key: &ContentKey,
    plaintext: &[u8],
    config: &CipherConfig,
    progress: Option<&ProgressFn>,
) -> CryptoResult<Vec<u8>> {
    encrypt_with_rng(&mut OsRng, key, plaintext, config, progress).await
}

/// Encrypt with a caller-supplied CSPRNG (deterministic under a seeded rng).
pub async fn encrypt_with_rng<R: RngCore + CryptoRng>(
    rng: &mut R,
    key: &ContentKey,
    plaintext: &[u8],
    config: &CipherConfig,
    progress: Option<&ProgressFn>,
) -> CryptoResult<Vec<u8>> {
    config.validate()?;

    let cipher = Aes256Gcm::new(key.as_bytes().into());

    if plaintext.len() < config.chunk_threshold {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rng.fill_bytes(&mut nonce_bytes);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| CryptoError::Encrypt)?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        debug!(bytes = plaintext.len(), "sealed simple-layout container");
        return Ok(out);
    }

    let chunk_count = u32::try_from(plaintext.len().div_ceil(config.chunk_size))
        .map_err(|_| CryptoError::Format("payload exceeds 2^32 chunks".into()))?;

    let mut base_nonce = [0u8; NONCE_SIZE];
    rng.fill_bytes(&mut base_nonce);

    let mut out = Vec::with_capacity(
        CHUNK_HEADER_SIZE + plaintext.len() + chunk_count as usize * RECORD_OVERHEAD,
    );
    out.extend_from_slice(&chunk_count.to_be_bytes());
    out.extend_from_slice(&base_nonce);

    let bytes_total = plaintext.len() as u64;
    let mut bytes_done: u64 = 0;

    for (index, chunk) in plaintext.chunks(config.chunk_size).enumerate() {
        let nonce_bytes = derive_chunk_nonce(&base_nonce, index as u32);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), chunk)
            .map_err(|_| CryptoError::Encrypt)?;

        out.extend_from_slice(&(ciphertext.len() as u32).to_be_bytes());
        out.extend_from_slice(&ciphertext);

        bytes_done += chunk.len() as u64;
        if let Some(callback) = progress {
            callback(ChunkProgress {
                chunk_index: index as u32,
                chunk_count,
                bytes_done,
                bytes_total,
            });
        }
        tokio::task::yield_now().await;
    }

    debug!(
        chunks = chunk_count,
        bytes = bytes_total,
        "sealed chunked container"
    );
    Ok(out)
}

/// Decrypt a container back into the original blob.
///
/// The layout is detected from the container itself; see [`crate::container`].
pub async fn decrypt(
    key: &ContentKey,
    data: &[u8],
    config: &CipherConfig,
    progress: Option<&ProgressFn>,
) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    match container::parse(data, config)? {
        ContainerLayout::Simple { nonce, ciphertext } => {
            let plaintext = cipher
                .decrypt(Nonce::from_slice(&nonce), ciphertext)
                .map_err(|_| CryptoError::Integrity)?;
            debug!(bytes = plaintext.len(), "opened simple-layout container");
            Ok(plaintext)
        }
        ContainerLayout::Chunked {
            chunk_count,
            base_nonce,
            records,
            plaintext_len,
        } => {
            let mut out = Vec::with_capacity(plaintext_len as usize);
            let mut bytes_done: u64 = 0;

            for (index, record) in records.iter().enumerate() {
                let nonce_bytes = derive_chunk_nonce(&base_nonce, index as u32);
                let chunk = cipher
                    .decrypt(Nonce::from_slice(&nonce_bytes), *record)
                    .map_err(|_| CryptoError::Integrity)?;

                bytes_done += chunk.len() as u64;
                out.extend_from_slice(&chunk);

                if let Some(callback) = progress {
                    callback(ChunkProgress {
                        chunk_index: index as u32,
                        chunk_count,
                        bytes_done,
                        bytes_total: plaintext_len,
                    });
                }
                tokio::task::yield_now().await;
            }

            debug!(
                chunks = chunk_count,
                bytes = plaintext_len,
                "opened chunked container"
            );
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{describe, LayoutKind};
    use proptest::prelude::*;
    use std::sync::{Arc, Mutex};

    fn test_config() -> CipherConfig {
        CipherConfig {
            chunk_size: 1024,
            chunk_threshold: 2048,
        }
    }

    fn make_data(size: usize) -> Vec<u8> {
        (0..size)
            .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
            .collect()
    }

    #[tokio::test]
    async fn test_roundtrip_boundary_sizes() {
        let key = ContentKey::generate();
        let config = test_config();

        // 0, 1, CHUNK_SIZE-1, CHUNK_SIZE, CHUNK_SIZE+1, threshold, 3*CHUNK_SIZE
        for size in [0, 1, 1023, 1024, 1025, 2048, 3072] {
            let data = make_data(size);
            let container = encrypt(&key, &data, &config, None).await.unwrap();
            let decrypted = decrypt(&key, &container, &config, None).await.unwrap();
            assert_eq!(decrypted, data, "round-trip failed for size {size}");
        }
    }

    #[tokio::test]
    async fn test_zero_length_produces_minimal_container() {
        let key = ContentKey::generate();
        let container = encrypt(&key, b"", &test_config(), None).await.unwrap();
        // nonce (12) + tag (16)
        assert_eq!(container.len(), 28);
    }

    #[tokio::test]
    async fn test_encrypt_is_nondeterministic() {
        let key = ContentKey::generate();
        let config = test_config();

        let small = make_data(100);
        let a = encrypt(&key, &small, &config, None).await.unwrap();
        let b = encrypt(&key, &small, &config, None).await.unwrap();
        assert_ne!(a, b, "fresh nonce must differ per call");

        let large = make_data(3000);
        let a = encrypt(&key, &large, &config, None).await.unwrap();
        let b = encrypt(&key, &large, &config, None).await.unwrap();
        assert_ne!(a, b, "fresh base nonce must differ per call");
    }

    #[tokio::test]
    async fn test_seeded_rng_is_deterministic() {
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        let key = ContentKey::from_bytes([9u8; 32]);
        let config = test_config();
        let data = make_data(3000);

        let a = encrypt_with_rng(&mut StdRng::seed_from_u64(42), &key, &data, &config, None)
            .await
            .unwrap();
        let b = encrypt_with_rng(&mut StdRng::seed_from_u64(42), &key, &data, &config, None)
            .await
            .unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_tampered_simple_container() {
        let key = ContentKey::generate();
        let config = test_config();
        let mut container = encrypt(&key, b"secret data", &config, None).await.unwrap();

        // Flip one bit in the ciphertext body
        container[14] ^= 0x01;
        let err = decrypt(&key, &container, &config, None).await.unwrap_err();
        assert!(matches!(err, CryptoError::Integrity));
    }

    #[tokio::test]
    async fn test_tampered_simple_tag() {
        let key = ContentKey::generate();
        let config = test_config();
        let mut container = encrypt(&key, b"secret data", &config, None).await.unwrap();

        let last = container.len() - 1;
        container[last] ^= 0x80;
        let err = decrypt(&key, &container, &config, None).await.unwrap_err();
        assert!(matches!(err, CryptoError::Integrity));
    }

    #[tokio::test]
    async fn test_tampered_chunked_container() {
        let key = ContentKey::generate();
        let config = test_config();
        let data = make_data(3000);
        let container = encrypt(&key, &data, &config, None).await.unwrap();

        // One bit in the middle chunk's ciphertext, then one in the final tag
        for flip in [CHUNK_HEADER_SIZE + 4 + 1040 + 4 + 100, container.len() - 1] {
            let mut tampered = container.clone();
            tampered[flip] ^= 0x01;
            let err = decrypt(&key, &tampered, &config, None).await.unwrap_err();
            assert!(matches!(err, CryptoError::Integrity));
        }
    }

    #[tokio::test]
    async fn test_wrong_key_fails() {
        let config = test_config();
        let container = encrypt(&ContentKey::generate(), b"payload", &config, None)
            .await
            .unwrap();
        let err = decrypt(&ContentKey::generate(), &container, &config, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CryptoError::Integrity));
    }

    #[test]
    fn test_chunk_nonces_pairwise_distinct() {
        let base = [0x3Cu8; NONCE_SIZE];
        let nonces: Vec<_> = (0..256).map(|i| derive_chunk_nonce(&base, i)).collect();
        for i in 0..nonces.len() {
            for j in (i + 1)..nonces.len() {
                assert_ne!(nonces[i], nonces[j], "nonce collision at ({i}, {j})");
            }
        }
    }

    #[test]
    fn test_chunk_nonce_derivation_is_reversible() {
        let base = [0x11u8; NONCE_SIZE];
        let derived = derive_chunk_nonce(&base, 7);
        // XORing the index back in recovers the base nonce
        assert_eq!(derive_chunk_nonce(&derived, 7), base);
        // Index 0 leaves the base nonce untouched
        assert_eq!(derive_chunk_nonce(&base, 0), base);
    }

    #[tokio::test]
    async fn test_small_file_scenario() {
        // 27-byte plaintext → 12 + 27 + 16 = 55-byte simple container
        let key = ContentKey::generate();
        let config = CipherConfig::default();
        let data = make_data(27);

        let container = encrypt(&key, &data, &config, None).await.unwrap();
        assert_eq!(container.len(), 55);

        let decrypted = decrypt(&key, &container, &config, None).await.unwrap();
        assert_eq!(decrypted, data);
    }

    #[tokio::test]
    async fn test_multi_chunk_scenario() {
        // 2.5 MiB at 1 MiB chunks → two full chunks + one partial
        let key = ContentKey::generate();
        let config = CipherConfig {
            chunk_size: 1024 * 1024,
            chunk_threshold: 2 * 1024 * 1024,
        };
        let data = make_data(5 * 512 * 1024);

        let container = encrypt(&key, &data, &config, None).await.unwrap();
        let info = describe(&container, &config).unwrap();
        assert_eq!(info.layout, LayoutKind::Chunked);
        assert_eq!(info.chunk_count, 3);
        assert_eq!(info.plaintext_len, data.len() as u64);

        let decrypted = decrypt(&key, &container, &config, None).await.unwrap();
        assert_eq!(decrypted.len(), data.len());
        assert_eq!(decrypted, data);
    }

    #[tokio::test]
    async fn test_progress_reported_both_directions() {
        let key = ContentKey::generate();
        let config = test_config();
        let data = make_data(3000);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ProgressFn = Box::new(move |p| sink.lock().unwrap().push(p));

        let container = encrypt(&key, &data, &config, Some(&callback)).await.unwrap();
        {
            let events = seen.lock().unwrap();
            assert_eq!(events.len(), 3);
            assert_eq!(events[0].chunk_index, 0);
            assert_eq!(events[2].chunk_count, 3);
            assert_eq!(events[2].bytes_done, 3000);
            assert_eq!(events[2].bytes_total, 3000);
        }

        seen.lock().unwrap().clear();
        decrypt(&key, &container, &config, Some(&callback)).await.unwrap();
        let events = seen.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].bytes_done, 3000);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = CipherConfig {
            chunk_size: 1024,
            chunk_threshold: 1024,
        };
        assert!(matches!(bad.validate(), Err(CryptoError::Config(_))));

        let zero = CipherConfig {
            chunk_size: 0,
            chunk_threshold: 2048,
        };
        assert!(matches!(zero.validate(), Err(CryptoError::Config(_))));

        // A threshold near usize::MAX would overflow layout detection's
        // threshold + overhead comparison.
        let huge = CipherConfig {
            chunk_size: 1024,
            chunk_threshold: usize::MAX - 16,
        };
        assert!(matches!(huge.validate(), Err(CryptoError::Config(_))));
    }

    proptest! {
        #[test]
        fn roundtrip_any_payload(data in proptest::collection::vec(any::<u8>(), 0..=8192)) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            let key = ContentKey::generate();
            let config = test_config();

            let decrypted = rt.block_on(async {
                let container = encrypt(&key, &data, &config, None).await.unwrap();
                decrypt(&key, &container, &config, None).await.unwrap()
            });
            prop_assert_eq!(decrypted, data);
        }
    }
}
