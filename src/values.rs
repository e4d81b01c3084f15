//! Value store (C8, §4.8).
//!
//! `fid: Option<&Sid>` selects single-graph keys (`k@sid:key_sid`, `None`)
//! versus layered keys (`k@sid:fid:key_sid`, `Some(fid)`) from the same
//! functions, so `overlay.rs` can reuse this module's read/write primitives
//! instead of duplicating them.

use crate::atoms;
use crate::codec::GraphCodec;
use crate::error::Result;
use crate::id_codec::Sid;
use crate::keys::{layered_value_key, value_key, value_prefix};
use crate::kv::KvStore;
use crate::sid_alloc::SidAllocator;

fn resolved_key(atom_sid: &Sid, key_sid: &Sid, fid: Option<&Sid>) -> Vec<u8> {
    match fid {
        Some(fid) => layered_value_key(atom_sid, fid, key_sid),
        None => value_key(atom_sid, key_sid),
    }
}

/// Store `value` under `value_key` on `atom`, creating sids for either atom
/// that don't already have one.
pub fn store_value<C: GraphCodec>(
    kv: &KvStore,
    sid_alloc: &SidAllocator,
    codec: &C,
    atom: &C::Atom,
    value_key: &C::Atom,
    value: &C::Value,
    fid: Option<&Sid>,
) -> Result<()> {
    let atom_sid = atoms::write_atom(kv, sid_alloc, codec, atom)?;
    let key_sid = atoms::write_atom(kv, sid_alloc, codec, value_key)?;
    put_value_by_sid(kv, codec, &atom_sid, &key_sid, value, fid)
}

/// Re-persist `value` for an already-resolved `(atom_sid, key_sid)` pair.
/// Used both by [`store_value`] and by callers applying an in-place delta
/// the host library has already computed (`update_value`, §4.8).
pub fn put_value_by_sid<C: GraphCodec>(
    kv: &KvStore,
    codec: &C,
    atom_sid: &Sid,
    key_sid: &Sid,
    value: &C::Value,
    fid: Option<&Sid>,
) -> Result<()> {
    let encoded = codec.encode_value(value);
    kv.put(resolved_key(atom_sid, key_sid, fid), encoded)
}

/// Load the value stored for `key_sid` on `atom_sid`, if any.
pub fn load_value<C: GraphCodec>(
    kv: &KvStore,
    codec: &C,
    atom_sid: &Sid,
    key_sid: &Sid,
    fid: Option<&Sid>,
) -> Result<Option<C::Value>> {
    match kv.get(resolved_key(atom_sid, key_sid, fid))? {
        None => Ok(None),
        Some(bytes) => {
            let text = String::from_utf8(bytes).map_err(|_| {
                crate::error::Error::internal(format!("value for sid {atom_sid} is not UTF-8"))
            })?;
            let (value, _) = codec.decode_value(&text, 0)?;
            Ok(Some(value))
        }
    }
}

/// Alias for [`load_value`] + [`put_value_by_sid`] together: re-persist a
/// value the host library has already updated locally. The engine trusts
/// the caller's delta and just writes the new value through.
pub fn update_value<C: GraphCodec>(
    kv: &KvStore,
    codec: &C,
    atom_sid: &Sid,
    key_sid: &Sid,
    new_value: &C::Value,
    fid: Option<&Sid>,
) -> Result<()> {
    put_value_by_sid(kv, codec, atom_sid, key_sid, new_value, fid)
}

/// Store `atom` and every `(key, value)` pair it carries. If `truth_value_key`
/// is given and not present in `pairs`, any previously stored value under
/// that key is cleared, so a default truth value recomputed by the host
/// library on every load is never spuriously persisted (§4.8, open question
/// 2). The engine has no way to manufacture that key atom itself — it has
/// no atom constructor in its trait boundary — so the caller supplies it
/// the same way it supplies every other value key.
pub fn store_atom<C: GraphCodec>(
    kv: &KvStore,
    sid_alloc: &SidAllocator,
    codec: &C,
    atom: &C::Atom,
    pairs: &[(C::Atom, C::Value)],
    truth_value_key: Option<&C::Atom>,
) -> Result<Sid> {
    let sid = atoms::write_atom(kv, sid_alloc, codec, atom)?;
    let mut saw_truth_value = false;
    for (key, value) in pairs {
        if let Some(tvk) = truth_value_key {
            if codec.encode_atom(key) == codec.encode_atom(tvk) {
                saw_truth_value = true;
            }
        }
        store_value(kv, sid_alloc, codec, atom, key, value, None)?;
    }
    if !saw_truth_value {
        if let Some(tvk) = truth_value_key {
            if let Some(key_sid) = atoms::find_sid(kv, codec, tvk)? {
                kv.delete(value_key(&sid, &key_sid))?;
            }
        }
    }
    Ok(sid)
}

/// Every `(key atom, value)` pair attached to `sid`, single-graph mode. A
/// record whose key sid no longer resolves to a live atom (the key atom
/// was deleted after the value was written) is itself deleted and skipped
/// rather than surfaced as an error.
pub fn get_keys<C: GraphCodec>(
    kv: &KvStore,
    codec: &C,
    sid: &Sid,
) -> Result<Vec<(C::Atom, C::Value)>> {
    let rows = kv.scan_prefix(value_prefix(sid))?;
    let mut out = Vec::with_capacity(rows.len());
    for (key, raw_value) in rows {
        let Some(key_sid_str) = crate::keys::strip_value_prefix(&key, sid) else {
            continue;
        };
        let key_sid = Sid::from_raw(key_sid_str.to_string());
        match atoms::get_atom(kv, codec, &key_sid) {
            Ok(key_atom) => {
                let text = String::from_utf8(raw_value).map_err(|_| {
                    crate::error::Error::internal(format!("value for sid {sid} is not UTF-8"))
                })?;
                let (value, _) = codec.decode_value(&text, 0)?;
                out.push((key_atom, value));
            }
            Err(_) => {
                kv.delete(&key)?;
            }
        }
    }
    Ok(out)
}

/// Delete every value attached to `sid`, regardless of which key it's
/// filed under. Used by [`crate::atoms::remove_atom`].
pub fn remove_all_values(kv: &KvStore, sid: &Sid) -> Result<()> {
    for (key, _) in kv.scan_prefix(value_prefix(sid))? {
        kv.delete(key)?;
    }
    Ok(())
}
