//! A minimal reference `Atom` type: enough to drive the engine's own tests
//! and the `store-cli` tool. Production embedders bring their own type and
//! implement [`crate::codec::AtomLike`]/[`crate::codec::GraphCodec`] for it.

use crate::codec::AtomLike;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Atom {
    Node { type_name: String, name: String },
    Link { type_name: String, outgoing: Vec<Atom> },
}

impl Atom {
    pub fn node(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Atom::Node {
            type_name: type_name.into(),
            name: name.into(),
        }
    }

    pub fn link(type_name: impl Into<String>, outgoing: Vec<Atom>) -> Self {
        Atom::Link {
            type_name: type_name.into(),
            outgoing,
        }
    }
}

impl AtomLike for Atom {
    fn is_link(&self) -> bool {
        matches!(self, Atom::Link { .. })
    }

    fn type_name(&self) -> &str {
        match self {
            Atom::Node { type_name, .. } => type_name,
            Atom::Link { type_name, .. } => type_name,
        }
    }

    fn node_name(&self) -> &str {
        match self {
            Atom::Node { name, .. } => name,
            Atom::Link { .. } => "",
        }
    }

    fn outgoing(&self) -> &[Self] {
        match self {
            Atom::Node { .. } => &[],
            Atom::Link { outgoing, .. } => outgoing,
        }
    }
}

/// Render the canonical s-expression: `(TypeName "name")` for a node,
/// `(TypeName child...)` for a link.
pub fn encode(atom: &Atom) -> String {
    match atom {
        Atom::Node { type_name, name } => format!("({type_name} \"{}\")", escape(name)),
        Atom::Link {
            type_name,
            outgoing,
        } => {
            let children: Vec<String> = outgoing.iter().map(encode).collect();
            if children.is_empty() {
                format!("({type_name})")
            } else {
                format!("({type_name} {})", children.join(" "))
            }
        }
    }
}

fn escape(name: &str) -> String {
    name.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Parse one atom starting at `offset`; return it with the offset of the
/// first byte past the parsed form.
pub fn decode(s: &str, offset: usize) -> Result<(Atom, usize)> {
    let bytes = s.as_bytes();
    let mut i = offset;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    if bytes.get(i) != Some(&b'(') {
        return Err(Error::internal(format!(
            "expected '(' at offset {i} in {s:?}"
        )));
    }
    i += 1;
    let type_start = i;
    while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b')' {
        i += 1;
    }
    let type_name = s[type_start..i].to_string();

    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }

    if bytes.get(i) == Some(&b'"') {
        // Node: quoted name follows, then the closing paren.
        i += 1;
        let mut name = String::new();
        loop {
            match bytes.get(i) {
                Some(b'\\') => {
                    let escaped = *bytes
                        .get(i + 1)
                        .ok_or_else(|| Error::internal("unterminated escape in atom name"))?;
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
                None => return Err(Error::internal("unterminated quoted atom name")),
            }
        }
        while bytes.get(i) == Some(&b' ') {
            i += 1;
        }
        if bytes.get(i) != Some(&b')') {
            return Err(Error::internal("expected ')' closing node"));
        }
        i += 1;
        return Ok((Atom::node(type_name, name), i));
    }

    // Link: zero or more child atoms, then the closing paren.
    let mut outgoing = Vec::new();
    loop {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        match bytes.get(i) {
            Some(b')') => {
                i += 1;
                break;
            }
            Some(b'(') => {
                let (child, next) = decode(s, i)?;
                outgoing.push(child);
                i = next;
            }
            _ => return Err(Error::internal("malformed link outgoing list")),
        }
    }
    Ok((Atom::link(type_name, outgoing), i))
}
