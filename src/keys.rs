//! Key schema (C2, §4.2, §6.2).
//!
//! Every key is printable ASCII. A one- or two-byte prefix followed by `@`
//! names the logical index; `:`/`-`/`()` separate fields within it. All
//! builders here return `Vec<u8>` rather than `String` because the backing
//! store deals in byte slices, even though the contents are always ASCII.

use crate::id_codec::Sid;

pub const NEXT_UNUSED_AID_KEY: &[u8] = b"*-NextUnusedAID-*";
pub const VERSION_KEY: &[u8] = b"*-Version-*";

pub fn atom_key(sid: &Sid) -> Vec<u8> {
    format!("a@{sid}:").into_bytes()
}

pub fn node_key(satom: &str) -> Vec<u8> {
    format!("n@{satom}").into_bytes()
}

pub fn link_key(satom: &str) -> Vec<u8> {
    format!("l@{satom}").into_bytes()
}

pub fn hash_bucket_key(hex_hash: &str) -> Vec<u8> {
    format!("h@{hex_hash}").into_bytes()
}

/// `k@<sid>:<key-sid>` — single-graph value key.
pub fn value_key(sid: &Sid, value_key_sid: &Sid) -> Vec<u8> {
    format!("k@{sid}:{value_key_sid}").into_bytes()
}

/// `k@<sid>:` prefix, for scanning every value attached to `sid`.
pub fn value_prefix(sid: &Sid) -> Vec<u8> {
    format!("k@{sid}:").into_bytes()
}

/// `k@<sid>:<fid>:<key-sid>` — layered value key.
pub fn layered_value_key(sid: &Sid, fid: &Sid, value_key_sid: &Sid) -> Vec<u8> {
    format!("k@{sid}:{fid}:{value_key_sid}").into_bytes()
}

/// `k@<sid>:<fid>:+1` — keyless-presence sentinel.
pub fn presence_sentinel_key(sid: &Sid, fid: &Sid) -> Vec<u8> {
    format!("k@{sid}:{fid}:+1").into_bytes()
}

/// `k@<sid>:<fid>:-1` — absence (shadow) sentinel.
pub fn absence_sentinel_key(sid: &Sid, fid: &Sid) -> Vec<u8> {
    format!("k@{sid}:{fid}:-1").into_bytes()
}

/// `k@<sid>:<fid>:` prefix, for scanning every value a sid carries in one frame.
pub fn layered_value_prefix(sid: &Sid, fid: &Sid) -> Vec<u8> {
    format!("k@{sid}:{fid}:").into_bytes()
}

/// `i@<child-sid>:<TypeName>-<parent-sid>` — incoming edge (key form, the
/// only form this engine implements; see §4.7).
pub fn incoming_key(child: &Sid, type_name: &str, parent: &Sid) -> Vec<u8> {
    format!("i@{child}:{type_name}-{parent}").into_bytes()
}

/// `i@<child-sid>:` prefix, for the full incoming set of a child.
pub fn incoming_prefix_all(child: &Sid) -> Vec<u8> {
    format!("i@{child}:").into_bytes()
}

/// `i@<child-sid>:<TypeName>` prefix, for the incoming set of one type.
pub fn incoming_prefix_type(child: &Sid, type_name: &str) -> Vec<u8> {
    format!("i@{child}:{type_name}").into_bytes()
}

/// Recover the parent sid from the suffix of an `i@` key (substring after
/// the final `-`), and the type name (substring between the first `:` and
/// that final `-`).
pub fn parse_incoming_key(key: &[u8]) -> Option<(String, Sid)> {
    let s = std::str::from_utf8(key).ok()?;
    let rest = s.strip_prefix("i@")?;
    let (_child, tail) = rest.split_once(':')?;
    let (type_name, parent) = tail.rsplit_once('-')?;
    Some((type_name.to_string(), Sid::from_raw(parent.to_string())))
}

pub fn frame_by_fid_key(fid: &Sid) -> Vec<u8> {
    format!("d@{fid}").into_bytes()
}

pub fn frame_by_encoding_key(sframe: &str) -> Vec<u8> {
    format!("f@{sframe}").into_bytes()
}

/// `o@<fid>:<sid>` — frame-membership index.
pub fn origin_key(fid: &Sid, sid: &Sid) -> Vec<u8> {
    format!("o@{fid}:{sid}").into_bytes()
}

pub fn origin_prefix(fid: &Sid) -> Vec<u8> {
    format!("o@{fid}:").into_bytes()
}

/// `z<N>@<sid>` — link height index.
pub fn height_key(height: u32, sid: &Sid) -> Vec<u8> {
    format!("z{height}@{sid}").into_bytes()
}

pub fn height_prefix(height: u32) -> Vec<u8> {
    format!("z{height}@").into_bytes()
}

/// Recover the sid from a `z<N>@<sid>` key whose prefix is already known to
/// be `z<N>@`.
pub fn strip_height_prefix<'a>(key: &'a [u8], prefix: &[u8]) -> Option<&'a str> {
    let rest = key.strip_prefix(prefix)?;
    std::str::from_utf8(rest).ok()
}

/// Strip a `k@<sid>:<fid>:` prefix off a value key, returning the suffix
/// (either a value-key sid, `+1`, or `-1`).
pub fn strip_layered_value_prefix<'a>(key: &'a [u8], sid: &Sid, fid: &Sid) -> Option<&'a str> {
    let prefix = layered_value_prefix(sid, fid);
    let rest = key.strip_prefix(prefix.as_slice())?;
    std::str::from_utf8(rest).ok()
}

/// Strip a `k@<sid>:` prefix off a value key, returning the value-key sid
/// suffix (single-graph mode).
pub fn strip_value_prefix<'a>(key: &'a [u8], sid: &Sid) -> Option<&'a str> {
    let prefix = value_prefix(sid);
    let rest = key.strip_prefix(prefix.as_slice())?;
    std::str::from_utf8(rest).ok()
}
