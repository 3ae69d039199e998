use crate::constants::HOLDOUT_BUCKETS;

/// Computes a 64-bit identifier from the first 8 bytes of a BLAKE3 hash.
///
/// Used for lot ids in the profile index, the holdout split and feature hashing. With 64 bits
/// the collision probability for a few million lots is negligible; a collision would only
/// make the index treat two lots as the same ingest unit.
#[inline]
pub fn stable_id(text: &str) -> u64 {
    let hash = blake3::hash(text.as_bytes());
    let bytes: [u8; 8] = hash.as_bytes()[0..8]
        .try_into()
        .expect("BLAKE3 always produces at least 8 bytes");
    u64::from_le_bytes(bytes)
}

/// Returns `true` if the lot falls on the holdout side of the split.
///
/// The decision depends only on `pn_lot`, so every participant row of a lot lands on the
/// same side.
#[inline]
pub fn holdout_bucket(pn_lot: &str, fraction: f64) -> bool {
    let cutoff = (fraction.clamp(0.0, 1.0) * HOLDOUT_BUCKETS as f64).round() as u64;
    stable_id(pn_lot) % HOLDOUT_BUCKETS < cutoff
}

/// Maps a `(name, value)` categorical feature into `0..buckets`.
#[inline]
pub fn hash_feature(name: &str, value: &str, buckets: usize) -> usize {
    let mut hasher = blake3::Hasher::new();
    hasher.update(name.as_bytes());
    hasher.update(b"=");
    hasher.update(value.as_bytes());

    let hash = hasher.finalize();
    let bytes: [u8; 8] = hash.as_bytes()[0..8]
        .try_into()
        .expect("BLAKE3 always produces at least 8 bytes");
    (u64::from_le_bytes(bytes) % buckets.max(1) as u64) as usize
}
