//! Deterministic content hash for alpha-equivalence lookups.
//!
//! [`std::collections::hash_map::DefaultHasher`] seeds itself randomly per
//! process, which would scatter alpha-equivalent atoms across different
//! `h@` buckets on every reopen. FNV-1a has no such seed, so a hash
//! computed before a close matches the one computed after.

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

pub fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Hex-encode a hash the way [`crate::keys::hash_bucket_key`] expects it:
/// fixed-width, lowercase.
pub fn hex(hash: u64) -> String {
    crate::codec::format_alpha_hash(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_hashes_identically_across_calls() {
        assert_eq!(fnv1a(b"(Concept \"A\")"), fnv1a(b"(Concept \"A\")"));
    }

    #[test]
    fn different_input_usually_hashes_differently() {
        assert_ne!(fnv1a(b"(Concept \"A\")"), fnv1a(b"(Concept \"B\")"));
    }

    #[test]
    fn hex_is_fixed_width() {
        assert_eq!(hex(0).len(), 16);
        assert_eq!(hex(u64::MAX).len(), 16);
    }
}
