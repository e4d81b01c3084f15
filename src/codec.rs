//! Atom/value codec boundary (C3, §4.3).
//!
//! The in-memory graph data structure — atom interning, equality, hashing,
//! the type registry — is an external collaborator (§1). This crate only
//! contracts with it through [`AtomLike`] (structural access: is it a node
//! or a link, what type, what children) and [`GraphCodec`] (canonical
//! s-expression encode/decode, plus the alpha-equivalence predicate and
//! hash that only the host library can compute, since it alone knows which
//! types bind variables).
//!
//! Once an atom is on disk, the engine mostly treats its serialized form as
//! opaque text and only ever does three things to it directly, without
//! going through `GraphCodec::decode_atom`: skip an optional hash prefix,
//! pull out a link's type name, and split its outgoing list into balanced
//! sub-expressions. Those three operations are implemented here as free
//! functions ([`skip_hash_prefix`], [`link_type_name`], [`split_outgoing`])
//! because they're needed on raw persisted strings read back via `a@`,
//! where decoding a full structured atom would be wasted work (or, for a
//! parent discovered only by sid during a recursive delete, isn't even
//! meaningful — the caller never asked to intern it).

use crate::error::Result;

/// Structural access to an atom, without needing to know the concrete type
/// the host library uses to represent one.
pub trait AtomLike: Clone {
    /// `true` for a link, `false` for a node.
    fn is_link(&self) -> bool;
    /// The atom's type, as the host library names it.
    fn type_name(&self) -> &str;
    /// A node's name. Unused (and may return `""`) for links.
    fn node_name(&self) -> &str;
    /// A link's ordered children. Empty for nodes.
    fn outgoing(&self) -> &[Self]
    where
        Self: Sized;
}

/// The pair of total functions (§4.3) the engine depends on to move atoms
/// and values to and from their canonical s-expression form, plus the
/// alpha-equivalence category and hash the host library alone can compute.
pub trait GraphCodec {
    type Atom: AtomLike;
    type Value: Clone;

    /// Render `atom` as its canonical s-expression.
    fn encode_atom(&self, atom: &Self::Atom) -> String;

    /// Parse an atom starting at `offset`; return it along with the offset
    /// of the first byte past the parsed form.
    fn decode_atom(&self, s: &str, offset: usize) -> Result<(Self::Atom, usize)>;

    /// Render `value` as its canonical s-expression.
    fn encode_value(&self, value: &Self::Value) -> String;

    /// Parse a value starting at `offset`; return it along with the offset
    /// of the first byte past the parsed form.
    fn decode_value(&self, s: &str, offset: usize) -> Result<(Self::Value, usize)>;

    /// Whether `atom`'s type is alpha-convertible (its identity is modulo
    /// renaming of bound variables, e.g. a `Lambda`).
    fn is_alpha_convertible(&self, atom: &Self::Atom) -> bool;

    /// A 64-bit hash that is equal for any two alpha-equivalent atoms.
    /// Only meaningful when [`GraphCodec::is_alpha_convertible`] is true.
    fn alpha_hash(&self, atom: &Self::Atom) -> u64;
}

/// Render a [`GraphCodec::alpha_hash`] result as the fixed-width lowercase
/// hex string used both as the `h@` bucket key suffix and as the `a@sid:`
/// hash prefix.
pub fn format_alpha_hash(hash: u64) -> String {
    format!("{hash:016x}")
}

/// If `satom` begins with a 16-hex-digit hash prefix followed by `(`,
/// return the substring starting at that `(`. Otherwise return `satom`
/// unchanged.
pub fn skip_hash_prefix(satom: &str) -> &str {
    if satom.len() >= 16 {
        let (prefix, rest) = satom.split_at(16);
        if prefix.bytes().all(|b| b.is_ascii_hexdigit()) && rest.starts_with('(') {
            return rest;
        }
    }
    satom
}

/// Split a stored atom string into its optional hash prefix and the
/// canonical s-expression.
pub fn split_hash_prefix(satom: &str) -> (Option<&str>, &str) {
    let body = skip_hash_prefix(satom);
    if body.len() == satom.len() {
        (None, satom)
    } else {
        (Some(&satom[..16]), body)
    }
}

/// Extract a link's type name from its canonical form `(TypeName child...)`:
/// the substring between the first `(` and the following space.
pub fn link_type_name(satom: &str) -> Option<&str> {
    let body = skip_hash_prefix(satom);
    let after_paren = body.strip_prefix('(')?;
    let end = after_paren.find([' ', ')'])?;
    Some(&after_paren[..end])
}

/// Split a link's outgoing list into the canonical sub-expression of each
/// child, by counting balanced parentheses. `satom` is the link's full
/// canonical form, hash prefix already stripped.
///
/// Nodes appear as bare `(TypeName "name")` sub-forms and are handled the
/// same as link children: this just needs balanced-paren boundaries, not
/// atom semantics.
pub fn split_outgoing(satom: &str) -> Vec<&str> {
    let body = skip_hash_prefix(satom);
    let Some(after_paren) = body.strip_prefix('(') else {
        return Vec::new();
    };
    // Skip the type name token.
    let Some(space) = after_paren.find(' ') else {
        return Vec::new();
    };
    let mut rest = &after_paren[space + 1..];
    let mut children = Vec::new();
    loop {
        rest = rest.trim_start();
        if rest.is_empty() || rest.starts_with(')') {
            break;
        }
        let child_start = rest;
        let mut depth = 0i32;
        let mut end = 0;
        for (i, b) in rest.bytes().enumerate() {
            match b {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        end = i + 1;
                        break;
                    }
                }
                _ => {}
            }
        }
        if end == 0 {
            break;
        }
        children.push(&child_start[..end]);
        rest = &rest[end..];
    }
    children
}
