//! Frame store (C9, §4.9).
//!
//! A frame is `(as "name" fid1 fid2 … fidN)`, where each `fid_i` is the sid
//! of a frame this one builds on (always already persisted, hence always
//! numerically smaller). The in-memory caches this module keeps —
//! `frame_map`/`fid_map`/`top_frames`/`order_cache` — are the Rust analogue
//! of the reference engine's `frame_mutex`-guarded maps (§5) and live
//! behind a single [`parking_lot::Mutex`] rather than four separate locks,
//! since every access here already needs all four together.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::id_codec::Sid;
use crate::keys::{frame_by_encoding_key, frame_by_fid_key, origin_prefix};
use crate::kv::KvStore;
use crate::sid_alloc::SidAllocator;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub name: String,
    pub children: Vec<Sid>,
}

pub fn encode_frame(frame: &Frame) -> String {
    let mut s = format!("(as \"{}\"", frame.name.replace('\\', "\\\\").replace('"', "\\\""));
    for fid in &frame.children {
        s.push(' ');
        s.push_str(fid.as_str());
    }
    s.push(')');
    s
}

pub fn decode_frame(s: &str) -> Result<Frame> {
    let body = s
        .strip_prefix("(as \"")
        .ok_or_else(|| Error::internal(format!("malformed frame encoding: {s:?}")))?;
    let bytes = body.as_bytes();
    let mut name = String::new();
    let mut i = 0;
    loop {
        match bytes.get(i) {
            Some(b'\\') => {
                let escaped = *bytes
                    .get(i + 1)
                    .ok_or_else(|| Error::internal("unterminated escape in frame name"))?;
                name.push(escaped as char);
                i += 2;
            }
            Some(b'"') => {
                i += 1;
                break;
            }
            Some(&b) => {
                name.push(b as char);
                i += 1;
            }
            None => return Err(Error::internal("unterminated frame name")),
        }
    }
    let rest = body[i..]
        .strip_suffix(')')
        .ok_or_else(|| Error::internal("frame encoding missing closing paren"))?;
    let children = rest
        .split_whitespace()
        .map(|tok| Sid::from_raw(tok.to_string()))
        .collect();
    Ok(Frame { name, children })
}

#[derive(Default)]
struct Cache {
    frame_map: HashMap<Sid, Frame>,
    fid_map: HashMap<String, Sid>,
    top_frames: HashSet<Sid>,
    order_cache: HashMap<Sid, Vec<Sid>>,
}

pub struct FrameStore {
    cache: Mutex<Cache>,
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameStore {
    pub fn new() -> Self {
        FrameStore {
            cache: Mutex::new(Cache::default()),
        }
    }

    /// Persist `frame` (whose children must already be persisted fids) and
    /// return its fid. `multi_space` must be true to persist a second,
    /// unrelated top-level frame in the same database.
    pub fn write_frame(
        &self,
        kv: &KvStore,
        sid_alloc: &SidAllocator,
        frame: &Frame,
        multi_space: bool,
    ) -> Result<Sid> {
        let encoding = encode_frame(frame);
        let mut cache = self.cache.lock();
        if let Some(fid) = cache.fid_map.get(&encoding) {
            return Ok(fid.clone());
        }

        let fid = {
            let _guard = sid_alloc.lock();
            if let Some(bytes) = kv.get(frame_by_encoding_key(&encoding))? {
                Sid::from_raw(String::from_utf8_lossy(&bytes).into_owned())
            } else {
                let fid = sid_alloc.new_sid(kv)?;
                kv.put(frame_by_encoding_key(&encoding), fid.as_str())?;
                kv.put(frame_by_fid_key(&fid), encoding.as_str())?;
                fid
            }
        };

        for child in &frame.children {
            cache.top_frames.remove(child);
        }
        if !cache.top_frames.is_empty() && !cache.top_frames.contains(&fid) && !multi_space {
            return Err(Error::state(
                "a top-level frame already exists in this database; pass multi_space to add another",
            ));
        }
        cache.top_frames.insert(fid.clone());
        cache.frame_map.insert(fid.clone(), frame.clone());
        cache.fid_map.insert(encoding, fid.clone());
        Ok(fid)
    }

    /// Fetch (from cache, or from `d@fid` on a miss) the frame at `fid`.
    pub fn get_frame(&self, kv: &KvStore, fid: &Sid) -> Result<Frame> {
        {
            let cache = self.cache.lock();
            if let Some(frame) = cache.frame_map.get(fid) {
                return Ok(frame.clone());
            }
        }
        let bytes = kv
            .get(frame_by_fid_key(fid))?
            .ok_or_else(|| Error::internal(format!("no frame stored at fid {fid}")))?;
        let text = String::from_utf8(bytes)
            .map_err(|_| Error::internal(format!("frame at fid {fid} is not valid UTF-8")))?;
        let frame = decode_frame(&text)?;
        let mut cache = self.cache.lock();
        cache.fid_map.insert(encode_frame(&frame), fid.clone());
        cache.frame_map.insert(fid.clone(), frame.clone());
        Ok(frame)
    }

    /// Force-load every persisted frame and return the fids that are never
    /// listed as anyone else's child — the roots of the overlay DAG.
    pub fn load_frame_dag(&self, kv: &KvStore) -> Result<Vec<Sid>> {
        let rows = kv.scan_prefix(b"d@")?;
        let mut all = HashSet::new();
        let mut children = HashSet::new();
        for (key, value) in &rows {
            let fid = Sid::from_raw(
                std::str::from_utf8(&key[2..])
                    .map_err(|_| Error::internal("non-UTF-8 frame key"))?
                    .to_string(),
            );
            let text = std::str::from_utf8(value)
                .map_err(|_| Error::internal("non-UTF-8 frame encoding"))?;
            let frame = decode_frame(text)?;
            for child in &frame.children {
                children.insert(child.clone());
            }
            {
                let mut cache = self.cache.lock();
                cache.fid_map.insert(text.to_string(), fid.clone());
                cache.frame_map.insert(fid.clone(), frame);
            }
            all.insert(fid);
        }
        let mut roots: Vec<Sid> = all.difference(&children).cloned().collect();
        roots.sort_by_key(|s| Sid::decode(s.as_str()).unwrap_or(u64::MAX));
        Ok(roots)
    }

    /// The fids this frame builds on, deepest (smallest fid) first, ending
    /// with `fid` itself. This is the traversal order [`Frame store (C9)`]
    /// calls "ancestor order": in this engine's flat on-disk shape, a
    /// frame's `children` list already names the bases it was built on, so
    /// the order is just those fids, transitively, sorted by aid.
    pub fn make_order(&self, kv: &KvStore, fid: &Sid) -> Result<Vec<Sid>> {
        if let Some(cached) = self.cache.lock().order_cache.get(fid) {
            return Ok(cached.clone());
        }
        let mut seen = HashSet::new();
        let mut stack = vec![fid.clone()];
        while let Some(next) = stack.pop() {
            if seen.insert(next.clone()) {
                let frame = self.get_frame(kv, &next)?;
                stack.extend(frame.children);
            }
        }
        let mut order: Vec<Sid> = seen.into_iter().collect();
        order.sort_by_key(|s| Sid::decode(s.as_str()).unwrap_or(u64::MAX));
        self.cache.lock().order_cache.insert(fid.clone(), order.clone());
        Ok(order)
    }

    /// Delete `fid`, permitted only when it is a top-level frame (no known
    /// parent). Requires on-disk format version >= 2.
    pub fn delete_frame(&self, kv: &KvStore, fid: &Sid, disk_version: u32) -> Result<()> {
        if disk_version < 2 {
            return Err(Error::state("frame deletion requires on-disk format version >= 2"));
        }
        let frame = self.get_frame(kv, fid)?;
        {
            let cache = self.cache.lock();
            for other in cache.frame_map.values() {
                if other.children.contains(fid) {
                    return Err(Error::state("cannot delete a frame that other frames build on"));
                }
            }
        }

        for (o_key, _) in kv.scan_prefix(origin_prefix(fid))? {
            let sid_str = std::str::from_utf8(&o_key[origin_prefix(fid).len()..])
                .map_err(|_| Error::internal("non-UTF-8 origin-index key"))?;
            let sid = Sid::from_raw(sid_str.to_string());
            for (value_key, _) in kv.scan_prefix(crate::keys::layered_value_prefix(&sid, fid))? {
                kv.delete(value_key)?;
            }
            kv.delete(o_key)?;
        }

        kv.delete(frame_by_fid_key(fid))?;
        kv.delete(frame_by_encoding_key(&encode_frame(&frame)))?;

        let mut cache = self.cache.lock();
        cache.frame_map.remove(fid);
        cache.fid_map.remove(&encode_frame(&frame));
        cache.top_frames.remove(fid);
        cache.order_cache.remove(fid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open() -> (tempfile::TempDir, KvStore, SidAllocator, FrameStore) {
        let dir = tempdir().unwrap();
        let kv = KvStore::open(dir.path(), true, false).unwrap();
        (dir, kv, SidAllocator::new(1), FrameStore::new())
    }

    #[test]
    fn frame_encoding_round_trips() {
        let frame = Frame {
            name: "base".to_string(),
            children: vec![Sid::encode(1), Sid::encode(2)],
        };
        let text = encode_frame(&frame);
        assert_eq!(decode_frame(&text).unwrap(), frame);
    }

    #[test]
    fn write_then_get_round_trips() {
        let (_dir, kv, alloc, frames) = open();
        let root = Frame {
            name: "root".to_string(),
            children: vec![],
        };
        let fid = frames.write_frame(&kv, &alloc, &root, false).unwrap();
        assert_eq!(frames.get_frame(&kv, &fid).unwrap(), root);
    }

    #[test]
    fn writing_same_frame_twice_returns_same_fid() {
        let (_dir, kv, alloc, frames) = open();
        let root = Frame {
            name: "root".to_string(),
            children: vec![],
        };
        let a = frames.write_frame(&kv, &alloc, &root, false).unwrap();
        let b = frames.write_frame(&kv, &alloc, &root, false).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn second_unrelated_top_frame_rejected_without_multi_space() {
        let (_dir, kv, alloc, frames) = open();
        let root_a = Frame {
            name: "a".to_string(),
            children: vec![],
        };
        let root_b = Frame {
            name: "b".to_string(),
            children: vec![],
        };
        frames.write_frame(&kv, &alloc, &root_a, false).unwrap();
        assert!(frames.write_frame(&kv, &alloc, &root_b, false).is_err());
        assert!(frames.write_frame(&kv, &alloc, &root_b, true).is_ok());
    }

    #[test]
    fn make_order_puts_bases_before_the_frame_itself() {
        let (_dir, kv, alloc, frames) = open();
        let base = Frame {
            name: "base".to_string(),
            children: vec![],
        };
        let base_fid = frames.write_frame(&kv, &alloc, &base, false).unwrap();
        let child = Frame {
            name: "child".to_string(),
            children: vec![base_fid.clone()],
        };
        let child_fid = frames.write_frame(&kv, &alloc, &child, false).unwrap();
        let order = frames.make_order(&kv, &child_fid).unwrap();
        assert_eq!(order, vec![base_fid, child_fid]);
    }

    #[test]
    fn load_frame_dag_finds_roots() {
        let (_dir, kv, alloc, frames) = open();
        let base = Frame {
            name: "base".to_string(),
            children: vec![],
        };
        let base_fid = frames.write_frame(&kv, &alloc, &base, false).unwrap();
        let child = Frame {
            name: "child".to_string(),
            children: vec![base_fid.clone()],
        };
        let child_fid = frames.write_frame(&kv, &alloc, &child, false).unwrap();

        let fresh = FrameStore::new();
        let roots = fresh.load_frame_dag(&kv).unwrap();
        assert_eq!(roots, vec![child_fid]);
        let _ = base_fid;
    }

    #[test]
    fn delete_frame_rejects_version_below_2() {
        let (_dir, kv, alloc, frames) = open();
        let root = Frame {
            name: "root".to_string(),
            children: vec![],
        };
        let fid = frames.write_frame(&kv, &alloc, &root, false).unwrap();
        assert!(frames.delete_frame(&kv, &fid, 1).is_err());
    }

    #[test]
    fn delete_frame_rejects_frame_with_dependents() {
        let (_dir, kv, alloc, frames) = open();
        let base = Frame {
            name: "base".to_string(),
            children: vec![],
        };
        let base_fid = frames.write_frame(&kv, &alloc, &base, false).unwrap();
        let child = Frame {
            name: "child".to_string(),
            children: vec![base_fid.clone()],
        };
        frames.write_frame(&kv, &alloc, &child, false).unwrap();
        assert!(frames.delete_frame(&kv, &base_fid, 2).is_err());
    }
}
