//! Atom store (C6, §4.6), single-graph mode.
//!
//! Overlay mode (C10) is layered on top of these functions rather than
//! folded into them: `write_atom` here always does the plain single-graph
//! write (`n@`/`l@`/`a@`, alpha bucket, incoming index on children), and
//! `overlay.rs` decides separately whether a keyless-presence sentinel is
//! also needed for the active frame.

use crate::codec::{format_alpha_hash, skip_hash_prefix, split_outgoing, AtomLike, GraphCodec};
use crate::error::{Error, Result};
use crate::id_codec::Sid;
use crate::incoming::{add_incoming, list_incoming, remove_incoming};
use crate::keys::{atom_key, link_key, node_key};
use crate::kv::KvStore;
use crate::sid_alloc::SidAllocator;
use crate::{alpha, values};

/// Look up an atom's sid without creating one. For alpha-convertible types
/// this means scanning the candidate hash bucket and comparing full
/// equality (via `C::Atom: PartialEq` is not assumed — the engine instead
/// compares the two atoms' canonical encodings, which is always available).
pub fn find_sid<C: GraphCodec>(
    kv: &KvStore,
    codec: &C,
    atom: &C::Atom,
) -> Result<Option<Sid>> {
    let satom = codec.encode_atom(atom);
    if codec.is_alpha_convertible(atom) {
        let hex = format_alpha_hash(codec.alpha_hash(atom));
        for candidate in alpha::find_alpha(kv, &hex)? {
            let stored = get_atom_satom(kv, &candidate)?;
            if stored == satom {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    } else {
        let key = if atom.is_link() {
            link_key(&satom)
        } else {
            node_key(&satom)
        };
        match kv.get(key)? {
            Some(bytes) => Ok(Some(Sid::from_raw(String::from_utf8_lossy(&bytes).into_owned()))),
            None => Ok(None),
        }
    }
}

/// Store `atom`, recursively storing its outgoing children first, and
/// return its sid. Returns the existing sid if the atom (or an
/// alpha-equivalent form of it) is already present.
pub fn write_atom<C: GraphCodec>(
    kv: &KvStore,
    sid_alloc: &SidAllocator,
    codec: &C,
    atom: &C::Atom,
) -> Result<Sid> {
    if let Some(existing) = find_sid(kv, codec, atom)? {
        return Ok(existing);
    }

    let child_sids: Vec<(String, Sid)> = if atom.is_link() {
        atom.outgoing()
            .iter()
            .map(|child| Ok((child.type_name().to_string(), write_atom(kv, sid_alloc, codec, child)?)))
            .collect::<Result<_>>()?
    } else {
        Vec::new()
    };

    let satom = codec.encode_atom(atom);
    let is_alpha = codec.is_alpha_convertible(atom);
    let hex = is_alpha.then(|| format_alpha_hash(codec.alpha_hash(atom)));

    // Hold the allocator's lock across the bump and the first content-index
    // write, so two threads racing to store the same new atom can't each
    // believe they won the race.
    let _guard = sid_alloc.lock();
    if let Some(existing) = find_sid(kv, codec, atom)? {
        return Ok(existing);
    }
    let sid = sid_alloc.new_sid(kv)?;

    let content_key = if atom.is_link() {
        link_key(&satom)
    } else {
        node_key(&satom)
    };
    kv.put(content_key, sid.as_str())?;

    let stored = match &hex {
        Some(hex) => format!("{hex}{satom}"),
        None => satom,
    };
    kv.put(atom_key(&sid), stored)?;

    if let Some(hex) = &hex {
        alpha::append_to_sidlist(kv, hex, &sid)?;
    }

    for (type_name, child_sid) in &child_sids {
        add_incoming(kv, child_sid, type_name, &sid)?;
    }

    Ok(sid)
}

/// Fetch and decode the atom stored at `sid`.
pub fn get_atom<C: GraphCodec>(kv: &KvStore, codec: &C, sid: &Sid) -> Result<C::Atom> {
    let satom = get_atom_satom(kv, sid)?;
    let (atom, _) = codec.decode_atom(&satom, 0)?;
    Ok(atom)
}

/// Fetch the raw canonical s-expression stored at `sid`, with any alpha
/// hash prefix stripped.
fn get_atom_satom(kv: &KvStore, sid: &Sid) -> Result<String> {
    let bytes = kv
        .get(atom_key(sid))?
        .ok_or_else(|| Error::internal(format!("no atom stored at sid {sid}")))?;
    let raw = String::from_utf8(bytes)
        .map_err(|_| Error::internal(format!("atom at sid {sid} is not valid UTF-8")))?;
    Ok(skip_hash_prefix(&raw).to_string())
}

/// Build the canonical s-expression for `(type_name children...)` and look
/// it up, without constructing a full host-library atom. Single-graph mode
/// only (§9 open-question decision: overlay `get_link` is out of scope).
pub fn get_link<C: GraphCodec>(
    kv: &KvStore,
    codec: &C,
    type_name: &str,
    children: &[C::Atom],
) -> Result<Option<Sid>> {
    let parts: Vec<String> = children.iter().map(|c| codec.encode_atom(c)).collect();
    let satom = if parts.is_empty() {
        format!("({type_name})")
    } else {
        format!("({type_name} {})", parts.join(" "))
    };
    // Building a real `C::Atom` just to reuse `find_sid`'s alpha-bucket path
    // would require a constructor this trait doesn't offer, so links whose
    // type happens to be alpha-convertible fall back to a direct `l@` probe:
    // `get_link` is defined in terms of exact structural lookup, not
    // alpha-equivalence.
    match kv.get(link_key(&satom))? {
        Some(bytes) => Ok(Some(Sid::from_raw(String::from_utf8_lossy(&bytes).into_owned()))),
        None => Ok(None),
    }
}

/// Delete `atom` (single-graph mode). If `recursive` is false and the atom
/// has any incoming edge, aborts without mutating anything and returns
/// `Ok(false)`. Otherwise removes every parent first (depth-first), then
/// this atom's content indexes, alpha-bucket membership, attached values,
/// and its entries in each child's incoming index.
pub fn remove_atom<C: GraphCodec>(
    kv: &KvStore,
    codec: &C,
    sid: &Sid,
    recursive: bool,
) -> Result<bool> {
    let parents = list_incoming(kv, sid)?;
    if !parents.is_empty() {
        if !recursive {
            return Ok(false);
        }
        for (_, parent_sid) in &parents {
            remove_atom(kv, codec, parent_sid, true)?;
        }
    }

    let satom_raw = match kv.get(atom_key(sid))? {
        Some(bytes) => String::from_utf8(bytes)
            .map_err(|_| Error::internal(format!("atom at sid {sid} is not valid UTF-8")))?,
        None => return Ok(true), // already gone; tolerate concurrent delete
    };
    let (hash_prefix, satom) = crate::codec::split_hash_prefix(&satom_raw);
    if let Some(hash_prefix) = hash_prefix {
        alpha::remove_from_sidlist(kv, hash_prefix, sid)?;
    }

    let is_link = satom.starts_with('(') && {
        let (_, atom) = codec.decode_atom(satom, 0)?;
        atom.is_link()
    };
    if is_link {
        let mut seen = std::collections::HashSet::new();
        for child_satom in split_outgoing(satom) {
            if !seen.insert(child_satom) {
                continue;
            }
            let (child_atom, _) = codec.decode_atom(child_satom, 0)?;
            if let Some(child_sid) = find_sid(kv, codec, &child_atom)? {
                remove_incoming(kv, &child_sid, child_atom.type_name(), sid)?;
            }
        }
    }

    values::remove_all_values(kv, sid)?;

    let content_key = if is_link {
        link_key(satom)
    } else {
        node_key(satom)
    };
    kv.delete(content_key)?;
    kv.delete(atom_key(sid))?;

    Ok(true)
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
    fn write_then_get_round_trips() {
        let (_dir, kv, alloc, codec) = open();
        let atom = Atom::node("Concept", "A");
        let sid = write_atom(&kv, &alloc, &codec, &atom).unwrap();
        assert_eq!(get_atom(&kv, &codec, &sid).unwrap(), atom);
    }

    #[test]
    fn writing_twice_returns_same_sid() {
        let (_dir, kv, alloc, codec) = open();
        let atom = Atom::node("Concept", "A");
        let a = write_atom(&kv, &alloc, &codec, &atom).unwrap();
        let b = write_atom(&kv, &alloc, &codec, &atom).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn link_children_get_their_own_sids_and_incoming_edges() {
        let (_dir, kv, alloc, codec) = open();
        let link = Atom::link("List", vec![Atom::node("Concept", "A"), Atom::node("Concept", "B")]);
        let link_sid = write_atom(&kv, &alloc, &codec, &link).unwrap();
        let child_sid = find_sid(&kv, &codec, &Atom::node("Concept", "A"))
            .unwrap()
            .unwrap();
        let parents = list_incoming(&kv, &child_sid).unwrap();
        assert_eq!(parents, vec![("List".to_string(), link_sid)]);
    }

    #[test]
    fn alpha_equivalent_but_textually_distinct_atoms_both_land_in_one_bucket() {
        let (_dir, kv, alloc, codec) = open();
        let a = Atom::link("Lambda", vec![Atom::node("Variable", "X"), Atom::node("Variable", "X")]);
        let b = Atom::link("Lambda", vec![Atom::node("Variable", "Y"), Atom::node("Variable", "Y")]);
        let sid_a = write_atom(&kv, &alloc, &codec, &a).unwrap();
        let sid_b = write_atom(&kv, &alloc, &codec, &b).unwrap();
        assert_ne!(sid_a, sid_b);
        let hex = format_alpha_hash(codec.alpha_hash(&a));
        let mut bucket = alpha::find_alpha(&kv, &hex).unwrap();
        bucket.sort();
        let mut expected = vec![sid_a, sid_b];
        expected.sort();
        assert_eq!(bucket, expected);
    }

    #[test]
    fn non_recursive_remove_aborts_when_incoming_non_empty() {
        let (_dir, kv, alloc, codec) = open();
        let link = Atom::link("List", vec![Atom::node("Concept", "A")]);
        write_atom(&kv, &alloc, &codec, &link).unwrap();
        let child_sid = find_sid(&kv, &codec, &Atom::node("Concept", "A")).unwrap().unwrap();
        let removed = remove_atom(&kv, &codec, &child_sid, false).unwrap();
        assert!(!removed);
        assert!(get_atom(&kv, &codec, &child_sid).is_ok());
    }

    #[test]
    fn recursive_remove_deletes_parents_first() {
        let (_dir, kv, alloc, codec) = open();
        let link = Atom::link("List", vec![Atom::node("Concept", "A")]);
        let link_sid = write_atom(&kv, &alloc, &codec, &link).unwrap();
        let child_sid = find_sid(&kv, &codec, &Atom::node("Concept", "A")).unwrap().unwrap();
        let removed = remove_atom(&kv, &codec, &child_sid, true).unwrap();
        assert!(removed);
        assert!(get_atom(&kv, &codec, &link_sid).is_err());
        assert!(get_atom(&kv, &codec, &child_sid).is_err());
    }

    #[test]
    fn get_link_finds_existing_link_by_structure() {
        let (_dir, kv, alloc, codec) = open();
        let link = Atom::link("List", vec![Atom::node("Concept", "A")]);
        let link_sid = write_atom(&kv, &alloc, &codec, &link).unwrap();
        let found = get_link(&kv, &codec, "List", &[Atom::node("Concept", "A")]).unwrap();
        assert_eq!(found, Some(link_sid));
    }
}
