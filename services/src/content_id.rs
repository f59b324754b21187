//! Content-addressed point ids.
//!
//! A log line's id is derived from nothing but its bytes, so the same line
//! always maps to the same Qdrant point and re-ingestion becomes a no-op.
//!
//! The fold keeps the low-order 32 bits of the SHA-256 digest (its last four
//! bytes, big-endian), reads them as a signed `i32` and takes the absolute
//! value. Ids written by earlier deployments use exactly this fold, so it must
//! not change. Folding 256 bits into 31 raises the collision odds noticeably
//! (about 50% at ~55k distinct lines); widening the id would change the stored
//! id format and is a migration, not a fix.

use sha2::{Digest, Sha256};

/// Deterministic point id for a raw log line.
pub fn point_id_for(line: &str) -> u64 {
    let digest = Sha256::digest(line.as_bytes());
    fold_digest(&digest)
}

fn fold_digest(digest: &[u8]) -> u64 {
    let tail: [u8; 4] = [
        digest[digest.len() - 4],
        digest[digest.len() - 3],
        digest[digest.len() - 2],
        digest[digest.len() - 1],
    ];
    u64::from(i32::from_be_bytes(tail).unsigned_abs())
}
