//! Thin wrapper over the embedded LSM-tree backing store.
//!
//! Every range scan in the rest of the crate goes through [`KvStore::scan_prefix`],
//! which collects into a `Vec` before returning so the underlying snapshot
//! iterator is released as soon as the scan completes, on every exit path
//! including `?`-propagated errors.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use lsm_tree::{AbstractTree, Config, SeqNo, Tree};

use crate::error::{Error, Result};

pub struct KvStore {
    tree: Tree,
    seqno: AtomicU64,
}

impl KvStore {
    pub fn open(path: &Path, create_if_missing: bool, compression: bool) -> Result<Self> {
        let mut config = Config::new(path);
        if compression {
            config = config.compression(lsm_tree::CompressionType::Lz4);
        }
        if create_if_missing {
            std::fs::create_dir_all(path).map_err(|source| Error::io(path, source))?;
        } else if !path.join("manifest").exists() {
            return Err(Error::config(format!(
                "database does not exist at {}",
                path.display()
            )));
        }
        let tree = config.open().map_err(Error::Store)?;
        // `get_highest_seqno` covers both sealed/disk segments and the
        // recovered active memtable, so resuming the counter from it keeps
        // every post-reopen write/delete above anything already persisted.
        // Starting back at 0 would shadow them at `SeqNo::MAX` reads.
        let next_seqno = tree.get_highest_seqno().map_or(0, |s| s + 1);
        Ok(KvStore {
            tree,
            seqno: AtomicU64::new(next_seqno),
        })
    }

    fn next_seqno(&self) -> SeqNo {
        self.seqno.fetch_add(1, Ordering::SeqCst)
    }

    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>> {
        Ok(self
            .tree
            .get(key.as_ref(), SeqNo::MAX)
            .map_err(Error::Store)?
            .map(|v| v.to_vec()))
    }

    pub fn put(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<()> {
        let seqno = self.next_seqno();
        self.tree
            .insert(key.as_ref(), value.as_ref(), seqno)
            .map_err(Error::Store)?;
        Ok(())
    }

    pub fn delete(&self, key: impl AsRef<[u8]>) -> Result<()> {
        let seqno = self.next_seqno();
        self.tree.remove(key.as_ref(), seqno).map_err(Error::Store)?;
        Ok(())
    }

    /// All (key, value) pairs whose key starts with `prefix`, in key order.
    pub fn scan_prefix(&self, prefix: impl AsRef<[u8]>) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let prefix = prefix.as_ref();
        let mut out = Vec::new();
        for item in self.tree.prefix(prefix, SeqNo::MAX, None) {
            let (k, v) = item.map_err(Error::Store)?;
            out.push((k.to_vec(), v.to_vec()));
        }
        Ok(out)
    }

    /// Whether any key starts with `prefix`.
    pub fn has_prefix(&self, prefix: impl AsRef<[u8]>) -> Result<bool> {
        let prefix = prefix.as_ref();
        match self.tree.prefix(prefix, SeqNo::MAX, None).next() {
            Some(item) => {
                item.map_err(Error::Store)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Count of keys sharing `prefix`. Used by the stats surface (§10.5).
    pub fn count_prefix(&self, prefix: impl AsRef<[u8]>) -> Result<usize> {
        let mut n = 0usize;
        for item in self.tree.prefix(prefix.as_ref(), SeqNo::MAX, None) {
            item.map_err(Error::Store)?;
            n += 1;
        }
        Ok(n)
    }

    /// Delete every key in the database. Used by `kill_data` (C11).
    pub fn clear_all(&self) -> Result<()> {
        let keys: Vec<Vec<u8>> = self
            .tree
            .iter(SeqNo::MAX, None)
            .map(|item| item.map(|(k, _)| k.to_vec()))
            .collect::<std::result::Result<_, _>>()
            .map_err(Error::Store)?;
        for key in keys {
            self.delete(key)?;
        }
        Ok(())
    }

    /// Flush the active memtable to a disk segment. Called from
    /// `Store::barrier`/`Store::close`; without it, nothing written since
    /// the last flush survives a process exit.
    pub fn flush(&self) -> Result<()> {
        self.tree.flush_active_memtable(self.next_seqno()).map_err(Error::Store)?;
        Ok(())
    }

    pub fn property(&self, name: &str) -> Option<String> {
        self.tree.property(name)
    }
}
