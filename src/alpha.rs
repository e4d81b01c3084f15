//! Alpha-equivalence index (C5, §4.5).
//!
//! Every sid whose atom is alpha-convertible is additionally indexed under
//! `h@<hex-hash>`, where the value is a whitespace-separated list of sids
//! sharing that hash. A bucket holds more than one sid exactly when two atoms hash
//! equal but aren't themselves byte-identical (a hash collision, or two
//! genuinely alpha-equivalent-but-distinct atoms the host library still
//! wants to keep as separate atoms) — `find_alpha` returns the whole bucket
//! and leaves disambiguation to the caller, which is the only party that
//! can decode and compare the atoms.

use crate::error::Result;
use crate::id_codec::Sid;
use crate::keys::hash_bucket_key;
use crate::kv::KvStore;

/// Add `sid` to the bucket for `hex_hash`. No-op if already present.
pub fn append_to_sidlist(kv: &KvStore, hex_hash: &str, sid: &Sid) -> Result<()> {
    let key = hash_bucket_key(hex_hash);
    let mut sids = load_bucket(kv, &key)?;
    if sids.iter().any(|s| s == sid) {
        return Ok(());
    }
    sids.push(sid.clone());
    store_bucket(kv, &key, &sids)
}

/// Remove `sid` from the bucket for `hex_hash`. Deletes the bucket key
/// entirely once it empties out, rather than leaving a dangling empty value.
pub fn remove_from_sidlist(kv: &KvStore, hex_hash: &str, sid: &Sid) -> Result<()> {
    let key = hash_bucket_key(hex_hash);
    let mut sids = load_bucket(kv, &key)?;
    sids.retain(|s| s != sid);
    if sids.is_empty() {
        kv.delete(&key)
    } else {
        store_bucket(kv, &key, &sids)
    }
}

/// All sids sharing `hex_hash`, in insertion order. Empty if the hash has
/// never been indexed.
pub fn find_alpha(kv: &KvStore, hex_hash: &str) -> Result<Vec<Sid>> {
    load_bucket(kv, &hash_bucket_key(hex_hash))
}

fn load_bucket(kv: &KvStore, key: &[u8]) -> Result<Vec<Sid>> {
    match kv.get(key)? {
        None => Ok(Vec::new()),
        Some(bytes) => {
            let text = String::from_utf8_lossy(&bytes);
            Ok(text
                .split_whitespace()
                .map(|s| Sid::from_raw(s.to_string()))
                .collect())
        }
    }
}

fn store_bucket(kv: &KvStore, key: &[u8], sids: &[Sid]) -> Result<()> {
    let joined = sids
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    kv.put(key, joined.as_bytes())
}
