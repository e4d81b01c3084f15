//! Reference [`crate::codec::GraphCodec`] implementation used by this
//! crate's own tests and `store-cli`. Treats the `Lambda` type as the one
//! alpha-convertible type, with `Variable` nodes as its bound names.

pub mod atom;
pub mod hash;

use crate::codec::GraphCodec;
use crate::error::Result;
pub use atom::Atom;

#[derive(Debug, Default, Clone, Copy)]
pub struct SexprCodec;

impl GraphCodec for SexprCodec {
    type Atom = Atom;
    type Value = Atom;

    fn encode_atom(&self, atom: &Atom) -> String {
        atom::encode(atom)
    }

    fn decode_atom(&self, s: &str, offset: usize) -> Result<(Atom, usize)> {
        atom::decode(s, offset)
    }

    fn encode_value(&self, value: &Atom) -> String {
        atom::encode(value)
    }

    fn decode_value(&self, s: &str, offset: usize) -> Result<(Atom, usize)> {
        atom::decode(s, offset)
    }

    fn is_alpha_convertible(&self, atom: &Atom) -> bool {
        matches!(atom, Atom::Link { type_name, .. } if type_name == "Lambda")
    }

    fn alpha_hash(&self, atom: &Atom) -> u64 {
        let canonical = canonicalize(atom, &mut Vec::new());
        hash::fnv1a(canonical.as_bytes())
    }
}

/// Render `atom` with every `Variable` node's name replaced by its order of
/// first appearance (`$0`, `$1`, ...), so two atoms that differ only in
/// bound-variable names render identically.
fn canonicalize(atom: &Atom, seen: &mut Vec<String>) -> String {
    match atom {
        Atom::Node { type_name, name } if type_name == "Variable" => {
            let index = match seen.iter().position(|n| n == name) {
                Some(i) => i,
                None => {
                    seen.push(name.clone());
                    seen.len() - 1
                }
            };
            format!("(Variable \"${index}\")")
        }
        Atom::Node { type_name, name } => format!("({type_name} \"{name}\")"),
        Atom::Link {
            type_name,
            outgoing,
        } => {
            let children: Vec<String> = outgoing.iter().map(|a| canonicalize(a, seen)).collect();
            if children.is_empty() {
                format!("({type_name})")
            } else {
                format!("({type_name} {})", children.join(" "))
            }
        }
    }
}
