//! Layered overlay engine (C10, §4.10).
//!
//! Every function here is additive on top of [`crate::atoms`] and
//! [`crate::values`]: the `n@/l@/a@` triple and the value-store keys are
//! exactly what single-graph mode writes, with an extra per-frame sentinel
//! or membership record layered over them. None of this module decides
//! *which* frame is active — every entry point takes the fid explicitly.

use std::collections::HashMap;

use crate::atoms;
use crate::codec::{AtomLike, GraphCodec};
use crate::error::{Error, Result};
use crate::frames::FrameStore;
use crate::id_codec::Sid;
use crate::incoming;
use crate::keys::{
    absence_sentinel_key, height_key, height_prefix, origin_key, presence_sentinel_key,
    strip_height_prefix, strip_layered_value_prefix,
};
use crate::kv::KvStore;
use crate::sid_alloc::SidAllocator;
use crate::values;

/// A link's height is one more than its tallest child; nodes are height 0
/// and are never recorded in the height index. Computed purely from the
/// in-memory atom the caller already has — no store access needed, since
/// `outgoing()` hands back full child atoms, not just sids.
pub fn height_of<A: AtomLike>(atom: &A) -> u32 {
    if !atom.is_link() {
        return 0;
    }
    atom.outgoing()
        .iter()
        .map(height_of)
        .max()
        .map_or(1, |tallest_child| tallest_child + 1)
}

/// Every sid recorded at exactly `height` in the link-height index.
pub fn sids_at_height(kv: &KvStore, height: u32) -> Result<Vec<Sid>> {
    let prefix = height_prefix(height);
    kv.scan_prefix(&prefix)?
        .iter()
        .map(|(k, _)| {
            strip_height_prefix(k, &prefix)
                .map(|s| Sid::from_raw(s.to_string()))
                .ok_or_else(|| Error::internal("malformed height-index key"))
        })
        .collect()
}

/// Store `atom` (and its attached `values`) into frame `fid`. Performs the
/// standard single-graph write first, then layers the frame-membership
/// record, the height-index entry (links only), and either the value
/// records or a keyless-presence sentinel.
pub fn write_atom<C: GraphCodec>(
    kv: &KvStore,
    sid_alloc: &SidAllocator,
    codec: &C,
    atom: &C::Atom,
    fid: &Sid,
    values_to_store: &[(C::Atom, C::Value)],
) -> Result<Sid> {
    let sid = atoms::write_atom(kv, sid_alloc, codec, atom)?;
    kv.put(origin_key(fid, &sid), b"")?;

    if atom.is_link() {
        kv.put(height_key(height_of(atom), &sid), b"")?;
    }

    if values_to_store.is_empty() {
        kv.put(presence_sentinel_key(&sid, fid), b"")?;
    } else {
        kv.delete(presence_sentinel_key(&sid, fid))?;
        for (key, value) in values_to_store {
            values::store_value(kv, sid_alloc, codec, atom, key, value, Some(fid))?;
        }
    }
    Ok(sid)
}

/// Shadow `sid` out of frame `fid`. If `recursive` is false and `sid` has
/// any incoming edge, aborts without mutating anything (mirrors the
/// single-graph abort-on-incoming rule in §4.6, generalized to overlay
/// mode since a dangling parent pointing at a now-invisible child would be
/// just as inconsistent here).
pub fn remove_atom(kv: &KvStore, sid: &Sid, fid: &Sid, recursive: bool) -> Result<bool> {
    let parents = incoming::list_incoming(kv, sid)?;
    if !parents.is_empty() {
        if !recursive {
            return Ok(false);
        }
        for (_, parent_sid) in &parents {
            remove_atom(kv, &parent_sid, fid, true)?;
        }
    }
    kv.delete(presence_sentinel_key(sid, fid))?;
    kv.put(absence_sentinel_key(sid, fid), b"")?;
    Ok(true)
}

/// Shadow-aware read: walk `fid`'s ancestor order deep to shallow,
/// accumulating values and letting each frame's own record (real value,
/// `+1`, or `-1`) override what came before. Returns `None` if `sid` is not
/// visible in `fid` at all.
pub fn get_keys_multi<C: GraphCodec>(
    kv: &KvStore,
    codec: &C,
    frames: &FrameStore,
    sid: &Sid,
    fid: &Sid,
) -> Result<Option<Vec<(C::Atom, C::Value)>>> {
    let order = frames.make_order(kv, fid)?;
    let mut visible = false;
    let mut values: HashMap<String, (C::Atom, C::Value)> = HashMap::new();

    for layer_fid in order {
        let prefix = crate::keys::layered_value_prefix(sid, &layer_fid);
        let rows = kv.scan_prefix(&prefix)?;
        if rows.is_empty() {
            continue;
        }
        let mut cleared_this_layer = false;
        for (key, raw_value) in rows {
            let suffix = strip_layered_value_prefix(&key, sid, &layer_fid)
                .ok_or_else(|| Error::internal("malformed layered value key"))?;
            match suffix {
                "-1" => {
                    visible = false;
                    values.clear();
                }
                "+1" => {
                    visible = true;
                }
                key_sid_str => {
                    if !cleared_this_layer {
                        values.clear();
                        cleared_this_layer = true;
                    }
                    visible = true;
                    let key_sid = Sid::from_raw(key_sid_str.to_string());
                    let key_atom = atoms::get_atom(kv, codec, &key_sid)?;
                    let text = String::from_utf8(raw_value).map_err(|_| {
                        Error::internal(format!("value for sid {sid} is not UTF-8"))
                    })?;
                    let (value, _) = codec.decode_value(&text, 0)?;
                    values.insert(codec.encode_atom(&key_atom), (key_atom, value));
                }
            }
        }
    }

    if visible {
        Ok(Some(values.into_values().collect()))
    } else {
        Ok(None)
    }
}
