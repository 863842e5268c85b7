//! Best-effort scrubbing of sensitive buffers
//!
//! Buffers at or under [`MAX_RANDOM_FILL_BYTES`] (the per-call cap of
//! browser-style entropy sources) are overwritten once with random bytes and
//! then zero-filled, to defeat naive scanning of freed pages. Larger buffers
//! are zero-filled only: a random overwrite at that size would exceed the
//! entropy source's per-call limit without adding meaningful protection for
//! data that is about to be freed anyway.
//!
//! This is best-effort. A runtime or allocator may have copied or moved the
//! buffer before `scrub` runs, so this is a hygiene measure, not a certified
//! control.

use rand::RngCore;
use zeroize::Zeroize;

use crate::MAX_RANDOM_FILL_BYTES;

/// Overwrite a sensitive buffer in place, leaving it zero-filled.
pub fn scrub(buf: &mut [u8]) {
    if !buf.is_empty() && buf.len() <= MAX_RANDOM_FILL_BYTES {
        rand::thread_rng().fill_bytes(buf);
    }
    buf.zeroize();
}

/// Scrub several buffers in one call.
pub fn scrub_all(bufs: &mut [&mut [u8]]) {
    for buf in bufs.iter_mut() {
        scrub(buf);
    }
}
