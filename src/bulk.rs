//! Bulk loader/storer (C11, §4.11).

use crate::atoms;
use crate::codec::GraphCodec;
use crate::error::Result;
use crate::frames::FrameStore;
use crate::id_codec::Sid;
use crate::keys::NEXT_UNUSED_AID_KEY;
use crate::kv::KvStore;
use crate::overlay;
use crate::sid_alloc::SidAllocator;
use crate::values;

/// One persisted atom plus every value attached to it, as handed back by a
/// load operation. The engine has no atomspace of its own to intern into
/// (§1); callers do that themselves with the returned sid/atom/value data.
#[derive(Debug, Clone)]
pub struct LoadedAtom<C: GraphCodec> {
    pub sid: Sid,
    pub atom: C::Atom,
    pub values: Vec<(C::Atom, C::Value)>,
}

/// Store every atom reachable from `roots` (and the values attached to
/// each, via `values_of`), single-graph mode.
pub fn store_atomspace<C: GraphCodec>(
    kv: &KvStore,
    sid_alloc: &SidAllocator,
    codec: &C,
    roots: &[C::Atom],
    values_of: impl Fn(&C::Atom) -> Vec<(C::Atom, C::Value)>,
) -> Result<Vec<Sid>> {
    roots
        .iter()
        .map(|atom| values::store_atom(kv, sid_alloc, codec, atom, &values_of(atom), None))
        .collect()
}

/// Load every atom in the database, single-graph mode: iterate `a@`, decode
/// each, and fetch its attached values.
pub fn load_atomspace<C: GraphCodec>(kv: &KvStore, codec: &C) -> Result<Vec<LoadedAtom<C>>> {
    let mut out = Vec::new();
    for (key, value) in kv.scan_prefix(b"a@")? {
        let sid_str = std::str::from_utf8(&key[2..]).map_err(|_| {
            crate::error::Error::internal("non-UTF-8 atom-index key")
        })?;
        let sid = Sid::from_raw(sid_str.trim_end_matches(':').to_string());
        let raw = String::from_utf8(value)
            .map_err(|_| crate::error::Error::internal(format!("atom at sid {sid} is not UTF-8")))?;
        let (atom, _) = codec.decode_atom(crate::codec::skip_hash_prefix(&raw), 0)?;
        let values = values::get_keys(kv, codec, &sid)?;
        out.push(LoadedAtom { sid, atom, values });
    }
    Ok(out)
}

/// Load every atom whose canonical encoding begins `(type_name`, single-graph
/// mode.
pub fn load_type<C: GraphCodec>(
    kv: &KvStore,
    codec: &C,
    type_name: &str,
) -> Result<Vec<LoadedAtom<C>>> {
    let node_prefix = format!("n@({type_name}").into_bytes();
    let link_prefix = format!("l@({type_name}").into_bytes();
    let mut out = Vec::new();
    for prefix in [node_prefix, link_prefix] {
        for (_, sid_bytes) in kv.scan_prefix(&prefix)? {
            let sid = Sid::from_raw(String::from_utf8_lossy(&sid_bytes).into_owned());
            let atom = atoms::get_atom(kv, codec, &sid)?;
            let values = values::get_keys(kv, codec, &sid)?;
            out.push(LoadedAtom { sid, atom, values });
        }
    }
    Ok(out)
}

/// Load every atom visible in frame `target_fid`, height-ordered so no
/// parent link is ever materialized before its children: all nodes first,
/// then links in increasing height, stopping once a height contributes no
/// records at all.
pub fn load_atomspace_overlay<C: GraphCodec>(
    kv: &KvStore,
    codec: &C,
    frames: &FrameStore,
    target_fid: &Sid,
) -> Result<Vec<(Sid, Option<Vec<(C::Atom, C::Value)>>)>> {
    // Priming the order cache here means every get_keys_multi call below
    // hits it instead of recomputing the same ancestor walk per sid.
    frames.make_order(kv, target_fid)?;
    let mut out = Vec::new();

    for (_, sid_bytes) in kv.scan_prefix(b"n@")? {
        let sid = Sid::from_raw(String::from_utf8_lossy(&sid_bytes).into_owned());
        let entry = overlay::get_keys_multi(kv, codec, frames, &sid, target_fid)?;
        out.push((sid, entry));
    }

    let mut height = 1;
    loop {
        let sids = overlay::sids_at_height(kv, height)?;
        if sids.is_empty() {
            break;
        }
        for sid in sids {
            let entry = overlay::get_keys_multi(kv, codec, frames, &sid, target_fid)?;
            out.push((sid, entry));
        }
        height += 1;
    }
    Ok(out)
}

/// Delete every key in the database and reset the aid counter to 1.
pub fn kill_data(kv: &KvStore, sid_alloc: &SidAllocator) -> Result<()> {
    kv.clear_all()?;
    kv.put(NEXT_UNUSED_AID_KEY, crate::id_codec::Sid::encode(1).as_str())?;
    sid_alloc.reset(1);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sexpr::{Atom, SexprCodec};
    use tempfile::tempdir;

    fn open() -> (tempfile::TempDir, KvStore, SidAllocator, SexprCodec) {
        let dir = tempdir().unwrap();
        let kv = KvStore::open(dir.path(), true, false).unwrap();
        (dir, kv, SidAllocator::new(1), SexprCodec)
    }

    #[test]
    fn store_then_load_round_trips() {
        let (_dir, kv, alloc, codec) = open();
        let atom = Atom::node("Concept", "A");
        store_atomspace(&kv, &alloc, &codec, &[atom.clone()], |_| vec![]).unwrap();
        let loaded = load_atomspace(&kv, &codec).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].atom, atom);
    }

    #[test]
    fn load_type_filters_by_type_name() {
        let (_dir, kv, alloc, codec) = open();
        store_atomspace(
            &kv,
            &alloc,
            &codec,
            &[Atom::node("Concept", "A"), Atom::node("Predicate", "P")],
            |_| vec![],
        )
        .unwrap();
        let loaded = load_type(&kv, &codec, "Concept").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].atom, Atom::node("Concept", "A"));
    }

    #[test]
    fn kill_data_empties_the_database() {
        let (_dir, kv, alloc, codec) = open();
        store_atomspace(&kv, &alloc, &codec, &[Atom::node("Concept", "A")], |_| vec![]).unwrap();
        kill_data(&kv, &alloc).unwrap();
        assert!(load_atomspace(&kv, &codec).unwrap().is_empty());
        let stored = kv.get(NEXT_UNUSED_AID_KEY).unwrap().unwrap();
        assert_eq!(
            crate::id_codec::Sid::decode(&String::from_utf8(stored).unwrap()),
            Some(1)
        );
    }
}
