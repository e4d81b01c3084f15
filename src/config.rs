//! Store configuration (ambient stack, §10.3).

/// Construction-time knobs for [`crate::Store::open`].
///
/// There is no external config-file format: the engine is a library, and
/// every embedder picks these up from its own config layer and passes them
/// in directly, the same way `MonoStorage::init` builds a `rocksdb::Options`
/// inline rather than reading a config file of its own.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Create the database if it does not exist yet.
    pub create_if_missing: bool,
    /// Open without ever writing (rejects all mutating operations).
    pub read_only: bool,
    /// Enable compression in the backing store.
    pub compression: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            create_if_missing: true,
            read_only: false,
            compression: true,
        }
    }
}
