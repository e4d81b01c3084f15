//! A layered hypergraph persistence engine over an embedded sorted
//! key/value store.
//!
//! The crate never represents atoms itself beyond a canonical
//! s-expression: callers supply their own atom/value type through
//! [`codec::GraphCodec`] and get back sids, and the reference [`sexpr`]
//! codec exists only to drive this crate's own tests and `store-cli`.

pub mod alpha;
pub mod atoms;
pub mod bulk;
pub mod codec;
pub mod config;
pub mod error;
pub mod frames;
pub mod id_codec;
pub mod incoming;
pub mod keys;
pub mod kv;
pub mod overlay;
pub mod sexpr;
pub mod sid_alloc;
pub mod store;
pub mod uri;
pub mod values;

pub use codec::{AtomLike, GraphCodec};
pub use config::StoreConfig;
pub use error::{Error, Result};
pub use frames::Frame;
pub use id_codec::Sid;
pub use store::{DanglingValue, SharedStore, Stats, Store, CURRENT_DISK_VERSION};
pub use uri::{Scheme, StoreUri};
