//! Encrypted container byte layouts: strict parsing and layout detection
//!
//! Two layouts share one wire format, told apart by total length alone:
//!
//! - simple containers carry a payload below the chunk threshold, so their
//!   total length is always `< chunk_threshold + 28`;
//! - chunked containers carry a payload at or above the threshold across at
//!   least two records, so their total length is always
//!   `>= chunk_threshold + 56`.
//!
//! `CipherConfig::validate` enforces `chunk_threshold >= 2 * chunk_size`,
//! which keeps the two ranges disjoint. Lengths falling in the dead band
//! between them, and any structural inconsistency inside a chunked header,
//! fail with [`CryptoError::Format`]; there is no best-effort decode path.

use crate::cipher::CipherConfig;
use crate::error::{CryptoError, CryptoResult};
use crate::{NONCE_SIZE, TAG_SIZE};

/// Fixed overhead of a simple-layout container: nonce + tag.
pub const SIMPLE_OVERHEAD: usize = NONCE_SIZE + TAG_SIZE;

/// Fixed header of a chunked container: chunk count + base nonce.
pub const CHUNK_HEADER_SIZE: usize = 4 + NONCE_SIZE;

/// Per-record overhead in a chunked container: length prefix + tag.
pub const RECORD_OVERHEAD: usize = 4 + TAG_SIZE;

/// A parsed view over container bytes. Records borrow from the input.
#[derive(Debug)]
pub enum ContainerLayout<'a> {
    Simple {
        nonce: [u8; NONCE_SIZE],
        /// Ciphertext with trailing tag.
        ciphertext: &'a [u8],
    },
    Chunked {
        chunk_count: u32,
        base_nonce: [u8; NONCE_SIZE],
        /// One ciphertext-with-tag slice per chunk, in order.
        records: Vec<&'a [u8]>,
        /// Total plaintext length implied by the records.
        plaintext_len: u64,
    },
}

/// Which layout a container uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutKind {
    Simple,
    Chunked,
}

/// Keyless summary of a container, for diagnostics and progress displays.
#[derive(Debug, Clone, Copy)]
pub struct ContainerInfo {
    pub layout: LayoutKind,
    /// 1 for simple containers.
    pub chunk_count: u32,
    pub total_len: u64,
    pub plaintext_len: u64,
}

/// Parse container bytes into a borrowed layout view.
pub fn parse<'a>(data: &'a [u8], config: &CipherConfig) -> CryptoResult<ContainerLayout<'a>> {
    config.validate()?;

    if data.len() < config.chunk_threshold + SIMPLE_OVERHEAD {
        parse_simple(data)
    } else {
        parse_chunked(data, config)
    }
}

/// Inspect a container without a key.
pub fn describe(data: &[u8], config: &CipherConfig) -> CryptoResult<ContainerInfo> {
    match parse(data, config)? {
        ContainerLayout::Simple { ciphertext, .. } => Ok(ContainerInfo {
            layout: LayoutKind::Simple,
            chunk_count: 1,
            total_len: data.len() as u64,
            plaintext_len: (ciphertext.len() - TAG_SIZE) as u64,
        }),
        ContainerLayout::Chunked {
            chunk_count,
            plaintext_len,
            ..
        } => Ok(ContainerInfo {
            layout: LayoutKind::Chunked,
            chunk_count,
            total_len: data.len() as u64,
            plaintext_len,
        }),
    }
}

fn parse_simple(data: &[u8]) -> CryptoResult<ContainerLayout<'_>> {
    if data.len() < SIMPLE_OVERHEAD {
        return Err(CryptoError::Format(format!(
            "container too short: {} bytes (minimum {})",
            data.len(),
            SIMPLE_OVERHEAD
        )));
    }
    let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(nonce_bytes);
    Ok(ContainerLayout::Simple { nonce, ciphertext })
}

fn parse_chunked<'a>(data: &'a [u8], config: &CipherConfig) -> CryptoResult<ContainerLayout<'a>> {
    // Caller guarantees data.len() >= chunk_threshold + 28 > CHUNK_HEADER_SIZE.
    let mut count_bytes = [0u8; 4];
    count_bytes.copy_from_slice(&data[..4]);
    let chunk_count = u32::from_be_bytes(count_bytes);

    if chunk_count < 2 {
        return Err(CryptoError::Format(format!(
            "chunked container must hold at least 2 chunks, header declares {chunk_count}"
        )));
    }

    // The count is attacker-controlled; every record needs a 4-byte length
    // prefix, a tag, and at least one payload byte, so bound it by what the
    // buffer can hold before reserving any space.
    let max_records = (data.len() - CHUNK_HEADER_SIZE) / (4 + TAG_SIZE + 1);
    if chunk_count as usize > max_records {
        return Err(CryptoError::Format(format!(
            "header declares {chunk_count} chunks but at most {max_records} fit in {} bytes",
            data.len()
        )));
    }

    let mut base_nonce = [0u8; NONCE_SIZE];
    base_nonce.copy_from_slice(&data[4..CHUNK_HEADER_SIZE]);

    let full_record = config.chunk_size + TAG_SIZE;
    let mut records = Vec::with_capacity(chunk_count as usize);
    let mut plaintext_len: u64 = 0;
    let mut offset = CHUNK_HEADER_SIZE;

    for index in 0..chunk_count {
        if data.len() - offset < 4 {
            return Err(CryptoError::Format(format!(
                "truncated container: {chunk_count} chunks declared, record {index} missing"
            )));
        }
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&data[offset..offset + 4]);
        let record_len = u32::from_be_bytes(len_bytes) as usize;
        offset += 4;

        let last = index + 1 == chunk_count;
        if !last && record_len != full_record {
            return Err(CryptoError::Format(format!(
                "interior record {index} is {record_len} bytes, expected {full_record}"
            )));
        }
        if last && (record_len <= TAG_SIZE || record_len > full_record) {
            return Err(CryptoError::Format(format!(
                "final record is {record_len} bytes, expected 17..={full_record}"
            )));
        }
        if data.len() - offset < record_len {
            return Err(CryptoError::Format(format!(
                "truncated container: record {index} declares {record_len} bytes past the end"
            )));
        }

        records.push(&data[offset..offset + record_len]);
        plaintext_len += (record_len - TAG_SIZE) as u64;
        offset += record_len;
    }

    if offset != data.len() {
        return Err(CryptoError::Format(format!(
            "{} trailing bytes after final record",
            data.len() - offset
        )));
    }

    Ok(ContainerLayout::Chunked {
        chunk_count,
        base_nonce,
        records,
        plaintext_len,
    })
}
