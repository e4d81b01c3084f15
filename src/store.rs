//! Lifecycle facade (C12, §4.12).
//!
//! `Store<C>` is the crate's single public entry point: every other module
//! is a free-function library operating on `&KvStore`/`&SidAllocator`/
//! `&FrameStore`, and this type just owns one instance of each plus the
//! open-path guard and the `tracing` spans around every public call.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::{info, instrument, warn};

use crate::bulk::{self, LoadedAtom};
use crate::codec::GraphCodec;
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::frames::{Frame, FrameStore};
use crate::id_codec::Sid;
use crate::incoming;
use crate::keys::{NEXT_UNUSED_AID_KEY, VERSION_KEY};
use crate::kv::KvStore;
use crate::overlay;
use crate::sid_alloc::SidAllocator;
use crate::uri::{Scheme, StoreUri};
use crate::values;

/// On-disk format version this build writes and the minimum it accepts on
/// open. Bumped whenever a key-schema change would make an older build
/// misread a newer database (e.g. frame deletion needing format >= 2, §4.9).
pub const CURRENT_DISK_VERSION: u32 = 2;

fn open_paths() -> &'static Mutex<HashSet<PathBuf>> {
    static PATHS: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();
    PATHS.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Aggregate record counts for the `stats()` query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    pub nodes: usize,
    pub links: usize,
    pub atoms: usize,
    pub values: usize,
    pub frames: usize,
    /// Mutating calls served since the store was opened or since the last
    /// `clear_stats()`. Operational, not a record count.
    pub mutations_served: u64,
}

/// A value record (`k@...`) whose key sid no longer resolves to a live
/// `a@` record — what `check()` reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingValue {
    pub key: Vec<u8>,
}

pub struct Store<C: GraphCodec> {
    path: PathBuf,
    scheme: Scheme,
    codec: C,
    config: StoreConfig,
    kv: KvStore,
    sid_alloc: SidAllocator,
    frames: FrameStore,
    mutations_served: AtomicU64,
}

impl<C: GraphCodec> Store<C> {
    /// Parse `uri`, open the backing store, and either initialize a fresh
    /// database or validate and resume an existing one. Rejects a second
    /// open of the same normalized path within this process.
    #[instrument(skip(codec, config), fields(uri))]
    pub fn open(uri: &str, codec: C, config: StoreConfig) -> Result<Self> {
        let parsed = StoreUri::parse(uri)?;
        {
            let mut open = open_paths().lock();
            if !open.insert(parsed.path.clone()) {
                return Err(Error::state(format!(
                    "database at {} is already open in this process",
                    parsed.path.display()
                )));
            }
        }

        match Self::open_inner(parsed, codec, config) {
            Ok(store) => Ok(store),
            Err(err) => Err(err),
        }
    }

    fn open_inner(parsed: StoreUri, codec: C, config: StoreConfig) -> Result<Self> {
        let kv = match KvStore::open(&parsed.path, config.create_if_missing, config.compression) {
            Ok(kv) => kv,
            Err(err) => {
                open_paths().lock().remove(&parsed.path);
                return Err(err);
            }
        };

        let sid_alloc = match Self::init_or_validate(&kv) {
            Ok(alloc) => alloc,
            Err(err) => {
                open_paths().lock().remove(&parsed.path);
                return Err(err);
            }
        };

        info!(path = %parsed.path.display(), scheme = ?parsed.scheme, "opened store");
        Ok(Store {
            path: parsed.path,
            scheme: parsed.scheme,
            codec,
            config,
            kv,
            sid_alloc,
            frames: FrameStore::new(),
            mutations_served: AtomicU64::new(0),
        })
    }

    fn init_or_validate(kv: &KvStore) -> Result<SidAllocator> {
        match kv.get(VERSION_KEY)? {
            None => {
                kv.put(VERSION_KEY, CURRENT_DISK_VERSION.to_string())?;
                kv.put(NEXT_UNUSED_AID_KEY, Sid::encode(1).as_str())?;
                Ok(SidAllocator::new(1))
            }
            Some(bytes) => {
                let version: u32 = String::from_utf8_lossy(&bytes)
                    .parse()
                    .map_err(|_| Error::internal("version key is not a valid integer"))?;
                if version > CURRENT_DISK_VERSION {
                    return Err(Error::state(format!(
                        "database format version {version} is newer than this build supports ({CURRENT_DISK_VERSION})"
                    )));
                }
                let next_aid = match kv.get(NEXT_UNUSED_AID_KEY)? {
                    Some(bytes) => Sid::decode(&String::from_utf8_lossy(&bytes))
                        .ok_or_else(|| Error::internal("next-unused-aid key is not a valid sid"))?,
                    None => 1,
                };
                Ok(SidAllocator::new(next_aid))
            }
        }
    }

    /// Persist the current high-water mark and flush the active memtable to
    /// disk. `lsm-tree` has no write-ahead log, so everything since the last
    /// flush is otherwise lost on an unclean exit.
    #[instrument(skip(self))]
    pub fn barrier(&self) -> Result<()> {
        self.sid_alloc.persist_high_water(&self.kv)?;
        self.kv.flush()
    }

    /// Write the final high-water mark and flush (unless read-only), then
    /// release the open-path registration. The backing store handle and
    /// in-memory caches are dropped along with `self`.
    #[instrument(skip(self))]
    pub fn close(self) -> Result<()> {
        if !self.config.read_only {
            self.sid_alloc.persist_high_water(&self.kv)?;
            self.kv.flush()?;
        }
        open_paths().lock().remove(&self.path);
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        if self.config.read_only {
            return Err(Error::state("store was opened read-only"));
        }
        self.mutations_served.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Reset the operational mutation counter. Record counts (`nodes`,
    /// `links`, ...) are unaffected; only `Stats::mutations_served` is zeroed.
    pub fn clear_stats(&self) {
        self.mutations_served.store(0, Ordering::Relaxed);
    }

    #[instrument(skip(self, atom))]
    pub fn write_atom(&self, atom: &C::Atom) -> Result<Sid> {
        self.check_writable()?;
        crate::atoms::write_atom(&self.kv, &self.sid_alloc, &self.codec, atom)
    }

    pub fn get_atom(&self, sid: &Sid) -> Result<C::Atom> {
        crate::atoms::get_atom(&self.kv, &self.codec, sid)
    }

    pub fn find_sid(&self, atom: &C::Atom) -> Result<Option<Sid>> {
        crate::atoms::find_sid(&self.kv, &self.codec, atom)
    }

    pub fn get_link(&self, type_name: &str, children: &[C::Atom]) -> Result<Option<Sid>> {
        crate::atoms::get_link(&self.kv, &self.codec, type_name, children)
    }

    #[instrument(skip(self))]
    pub fn remove_atom(&self, sid: &Sid, recursive: bool) -> Result<bool> {
        self.check_writable()?;
        crate::atoms::remove_atom(&self.kv, &self.codec, sid, recursive)
    }

    pub fn store_value(&self, atom: &C::Atom, key: &C::Atom, value: &C::Value) -> Result<()> {
        self.check_writable()?;
        values::store_value(&self.kv, &self.sid_alloc, &self.codec, atom, key, value, None)
    }

    pub fn load_value(&self, atom_sid: &Sid, key_sid: &Sid) -> Result<Option<C::Value>> {
        values::load_value(&self.kv, &self.codec, atom_sid, key_sid, None)
    }

    pub fn update_value(&self, atom_sid: &Sid, key_sid: &Sid, new_value: &C::Value) -> Result<()> {
        self.check_writable()?;
        values::update_value(&self.kv, &self.codec, atom_sid, key_sid, new_value, None)
    }

    pub fn store_atom(
        &self,
        atom: &C::Atom,
        pairs: &[(C::Atom, C::Value)],
        truth_value_key: Option<&C::Atom>,
    ) -> Result<Sid> {
        self.check_writable()?;
        values::store_atom(&self.kv, &self.sid_alloc, &self.codec, atom, pairs, truth_value_key)
    }

    pub fn get_keys(&self, sid: &Sid) -> Result<Vec<(C::Atom, C::Value)>> {
        values::get_keys(&self.kv, &self.codec, sid)
    }

    /// Persist `frame`; see [`FrameStore::write_frame`].
    pub fn write_frame(&self, frame: &Frame, multi_space: bool) -> Result<Sid> {
        self.check_writable()?;
        self.frames.write_frame(&self.kv, &self.sid_alloc, frame, multi_space)
    }

    pub fn get_frame(&self, fid: &Sid) -> Result<Frame> {
        self.frames.get_frame(&self.kv, fid)
    }

    pub fn load_frame_dag(&self) -> Result<Vec<Sid>> {
        self.frames.load_frame_dag(&self.kv)
    }

    pub fn delete_frame(&self, fid: &Sid) -> Result<()> {
        self.check_writable()?;
        self.frames.delete_frame(&self.kv, fid, CURRENT_DISK_VERSION)
    }

    /// Store `atom` (with its values) into overlay frame `fid`.
    pub fn write_atom_in_frame(
        &self,
        atom: &C::Atom,
        fid: &Sid,
        values_to_store: &[(C::Atom, C::Value)],
    ) -> Result<Sid> {
        self.check_writable()?;
        if self.scheme != Scheme::Overlay {
            return Err(Error::state("per-frame writes require a hgraphd:// store"));
        }
        overlay::write_atom(&self.kv, &self.sid_alloc, &self.codec, atom, fid, values_to_store)
    }

    pub fn remove_atom_from_frame(&self, sid: &Sid, fid: &Sid, recursive: bool) -> Result<bool> {
        self.check_writable()?;
        if self.scheme != Scheme::Overlay {
            return Err(Error::state("per-frame removal requires a hgraphd:// store"));
        }
        overlay::remove_atom(&self.kv, sid, fid, recursive)
    }

    pub fn get_keys_in_frame(&self, sid: &Sid, fid: &Sid) -> Result<Option<Vec<(C::Atom, C::Value)>>> {
        overlay::get_keys_multi(&self.kv, &self.codec, &self.frames, sid, fid)
    }

    pub fn load_atomspace(&self) -> Result<Vec<LoadedAtom<C>>> {
        bulk::load_atomspace(&self.kv, &self.codec)
    }

    pub fn load_type(&self, type_name: &str) -> Result<Vec<LoadedAtom<C>>> {
        bulk::load_type(&self.kv, &self.codec, type_name)
    }

    pub fn load_atomspace_in_frame(
        &self,
        target_fid: &Sid,
    ) -> Result<Vec<(Sid, Option<Vec<(C::Atom, C::Value)>>)>> {
        bulk::load_atomspace_overlay(&self.kv, &self.codec, &self.frames, target_fid)
    }

    #[instrument(skip(self))]
    pub fn kill_data(&self) -> Result<()> {
        self.check_writable()?;
        warn!(path = %self.path.display(), "kill_data: erasing entire database");
        bulk::kill_data(&self.kv, &self.sid_alloc)
    }

    /// Record counts per key family.
    pub fn stats(&self) -> Result<Stats> {
        Ok(Stats {
            nodes: self.kv.count_prefix(b"n@")?,
            links: self.kv.count_prefix(b"l@")?,
            atoms: self.kv.count_prefix(b"a@")?,
            values: self.kv.count_prefix(b"k@")?,
            frames: self.kv.count_prefix(b"d@")?,
            mutations_served: self.mutations_served.load(Ordering::Relaxed),
        })
    }

    /// The backing store's own property strings (e.g. SSTable counts,
    /// memtable size), keyed by the names it recognizes.
    pub fn backend_property(&self, name: &str) -> Option<String> {
        self.kv.property(name)
    }

    /// Every raw `(key, value)` pair sharing `prefix`, for diagnostic tools
    /// (`store-cli dump-range`). Bypasses atom/value decoding entirely.
    pub fn scan_raw_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.kv.scan_prefix(prefix)
    }

    /// Scan every `k@` record and report ones whose key sid has no live
    /// `a@` record, single-graph mode.
    pub fn check(&self) -> Result<Vec<DanglingValue>> {
        let mut dangling = Vec::new();
        for (key, _) in self.kv.scan_prefix(b"k@")? {
            let Some(rest) = key.get(2..) else { continue };
            let Some(colon) = rest.iter().position(|&b| b == b':') else {
                continue;
            };
            let key_sid_str = std::str::from_utf8(&rest[colon + 1..])
                .map_err(|_| Error::internal("non-UTF-8 value-store key"))?;
            let key_sid_str = key_sid_str.split(':').next_back().unwrap_or(key_sid_str);
            if key_sid_str == "+1" || key_sid_str == "-1" {
                continue;
            }
            let key_sid = Sid::from_raw(key_sid_str.to_string());
            if self.get_atom(&key_sid).is_err() {
                dangling.push(DanglingValue { key });
            }
        }
        Ok(dangling)
    }

    pub fn incoming(&self, child: &Sid) -> Result<Vec<(String, Sid)>> {
        incoming::list_incoming(&self.kv, child)
    }
}

/// A store handle shareable across threads, mirroring §5's `Store: Send +
/// Sync` requirement.
pub type SharedStore<C> = Arc<Store<C>>;
