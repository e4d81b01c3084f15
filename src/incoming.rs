//! Incoming-edge index (C7, §4.7), key form only.
//!
//! Every outgoing edge `parent --TypeName--> child` is recorded as the
//! presence of the key `i@child:TypeName-parent`, whose value is unused
//! (empty). There is no list-form mode: a single edge never touches more
//! than one key, so fan-in doesn't cost write amplification the way it
//! would under the list-form alternative the original spec also allows.

use crate::error::Result;
use crate::id_codec::Sid;
use crate::keys::{incoming_prefix_all, incoming_prefix_type, incoming_key, parse_incoming_key};
use crate::kv::KvStore;

/// Record that `parent` reaches `child` via an outgoing edge of type
/// `type_name`. Idempotent.
pub fn add_incoming(kv: &KvStore, child: &Sid, type_name: &str, parent: &Sid) -> Result<()> {
    kv.put(incoming_key(child, type_name, parent), b"")
}

/// Remove the `parent --type_name--> child` edge. Tolerates the edge
/// already being absent, since a link can list the same child more than
/// once in its outgoing set, and a concurrent delete may have removed it
/// first.
pub fn remove_incoming(kv: &KvStore, child: &Sid, type_name: &str, parent: &Sid) -> Result<()> {
    kv.delete(incoming_key(child, type_name, parent))
}

/// Every `(type_name, parent)` pair pointing at `child`.
pub fn list_incoming(kv: &KvStore, child: &Sid) -> Result<Vec<(String, Sid)>> {
    let rows = kv.scan_prefix(incoming_prefix_all(child))?;
    rows.iter()
        .map(|(k, _)| {
            parse_incoming_key(k)
                .ok_or_else(|| crate::error::Error::internal("malformed incoming-index key"))
        })
        .collect()
}

/// Parents pointing at `child` via edges of exactly `type_name`.
pub fn list_incoming_of_type(kv: &KvStore, child: &Sid, type_name: &str) -> Result<Vec<Sid>> {
    let rows = kv.scan_prefix(incoming_prefix_type(child, type_name))?;
    rows.iter()
        .map(|(k, _)| {
            parse_incoming_key(k)
                .map(|(_, parent)| parent)
                .ok_or_else(|| crate::error::Error::internal("malformed incoming-index key"))
        })
        .collect()
}

/// Whether `child` has any incoming edge at all.
pub fn has_incoming(kv: &KvStore, child: &Sid) -> Result<bool> {
    kv.has_prefix(incoming_prefix_all(child))
}
