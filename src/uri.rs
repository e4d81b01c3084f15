//! URI parsing and path normalization (§6.1).

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// The two schemes the store accepts, pinned to the two operating modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// `hgraph://` — single-graph mode.
    SingleGraph,
    /// `hgraphd://` — layered (DAG-of-overlays) mode.
    Overlay,
}

impl Scheme {
    fn prefix(self) -> &'static str {
        match self {
            Scheme::SingleGraph => "hgraph://",
            Scheme::Overlay => "hgraphd://",
        }
    }
}

/// A parsed, normalized store URI.
#[derive(Debug, Clone)]
pub struct StoreUri {
    pub scheme: Scheme,
    pub path: PathBuf,
}

impl StoreUri {
    /// Parse `<scheme>://<path>`, lexically normalizing `<path>` so that two
    /// different spellings of the same path never produce distinct handles.
    pub fn parse(uri: &str) -> Result<Self> {
        for scheme in [Scheme::SingleGraph, Scheme::Overlay] {
            if let Some(rest) = uri.strip_prefix(scheme.prefix()) {
                if rest.is_empty() {
                    return Err(Error::config(format!("empty path in URI '{uri}'")));
                }
                return Ok(StoreUri {
                    scheme,
                    path: normalize(Path::new(rest)),
                });
            }
        }
        Err(Error::config(format!(
            "unknown URI '{uri}', expected 'hgraph://' or 'hgraphd://'"
        )))
    }
}

/// Lexically normalize a path: collapse `.` and redundant separators and
/// resolve `..` against preceding components, without touching the
/// filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !matches!(out.components().next_back(), Some(Component::RootDir) | None) {
                    out.pop();
                } else {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_graph_scheme() {
        let uri = StoreUri::parse("hgraph:///data/my.db").unwrap();
        assert_eq!(uri.scheme, Scheme::SingleGraph);
        assert_eq!(uri.path, PathBuf::from("/data/my.db"));
    }

    #[test]
    fn parses_overlay_scheme() {
        let uri = StoreUri::parse("hgraphd:///data/my.db").unwrap();
        assert_eq!(uri.scheme, Scheme::Overlay);
    }

    #[test]
    fn normalizes_redundant_separators() {
        let uri = StoreUri::parse("hgraph:///data//sub/../my.db").unwrap();
        assert_eq!(uri.path, PathBuf::from("/data/my.db"));
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!(StoreUri::parse("foo:///data/my.db").is_err());
    }

    #[test]
    fn rejects_empty_path() {
        assert!(StoreUri::parse("hgraph://").is_err());
    }
}
