#![forbid(unsafe_code)]

use std::fmt;

use crate::{ContractId, VarDecl};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementaryType {
    Bool,
    /// `uintN`, N in bits.
    Uint(u16),
    /// `intN`, N in bits.
    Int(u16),
    Address,
    /// `bytesN`, N in bytes.
    FixedBytes(u8),
    Bytes,
    String,
}

impl ElementaryType {
    /// Parse a Solidity elementary type name (`uint`, `uint8`, `address payable`, ...).
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        let name = name.strip_suffix(" payable").unwrap_or(name);
        match name {
            "bool" => return Some(ElementaryType::Bool),
            "address" => return Some(ElementaryType::Address),
            "string" => return Some(ElementaryType::String),
            "bytes" => return Some(ElementaryType::Bytes),
            "byte" => return Some(ElementaryType::FixedBytes(1)),
            "uint" => return Some(ElementaryType::Uint(256)),
            "int" => return Some(ElementaryType::Int(256)),
            _ => {}
        }
        if let Some(bits) = name.strip_prefix("uint") {
            let bits: u16 = bits.parse().ok()?;
            return (bits % 8 == 0 && (8..=256).contains(&bits)).then_some(ElementaryType::Uint(bits));
        }
        if let Some(bits) = name.strip_prefix("int") {
            let bits: u16 = bits.parse().ok()?;
            return (bits % 8 == 0 && (8..=256).contains(&bits)).then_some(ElementaryType::Int(bits));
        }
        if let Some(n) = name.strip_prefix("bytes") {
            let n: u8 = n.parse().ok()?;
            return (1..=32).contains(&n).then_some(ElementaryType::FixedBytes(n));
        }
        None
    }

    pub fn is_unsigned(&self) -> bool {
        matches!(
            self,
            ElementaryType::Uint(_) | ElementaryType::Address | ElementaryType::FixedBytes(_)
        )
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, ElementaryType::Uint(_) | ElementaryType::Int(_))
    }
}

impl fmt::Display for ElementaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementaryType::Bool => write!(f, "bool"),
            ElementaryType::Uint(bits) => write!(f, "uint{bits}"),
            ElementaryType::Int(bits) => write!(f, "int{bits}"),
            ElementaryType::Address => write!(f, "address"),
            ElementaryType::FixedBytes(n) => write!(f, "bytes{n}"),
            ElementaryType::Bytes => write!(f, "bytes"),
            ElementaryType::String => write!(f, "string"),
        }
    }
}

/// Reference to a user-defined declaration. Resolved by id, never copied inline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UserType {
    Struct(StructId),
    Contract(ContractId),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeName {
    Elementary(ElementaryType),
    Mapping(Box<TypeName>, Box<TypeName>),
    Array(Box<TypeName>, Option<u64>),
    UserDefined(UserType),
}

impl TypeName {
    pub fn elementary(name: &str) -> Option<Self> {
        ElementaryType::parse(name).map(TypeName::Elementary)
    }

    pub fn uint(bits: u16) -> Self {
        TypeName::Elementary(ElementaryType::Uint(bits))
    }

    pub fn bool() -> Self {
        TypeName::Elementary(ElementaryType::Bool)
    }

    pub fn address() -> Self {
        TypeName::Elementary(ElementaryType::Address)
    }

    pub fn mapping(key: TypeName, value: TypeName) -> Self {
        TypeName::Mapping(Box::new(key), Box::new(value))
    }

    pub fn array(base: TypeName, len: Option<u64>) -> Self {
        TypeName::Array(Box::new(base), len)
    }

    pub fn as_elementary(&self) -> Option<ElementaryType> {
        match self {
            TypeName::Elementary(e) => Some(*e),
            _ => None,
        }
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, TypeName::Elementary(ElementaryType::Bool))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StructDef {
    pub name: String,
    pub members: Vec<VarDecl>,
}

impl StructDef {
    pub fn member_index(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|m| m.name == name)
    }
}

/// Arena of struct definitions addressed by [`StructId`].
///
/// The environment structs `msg` and `block` are interned first so every
/// program can refer to them without declaring them.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeArena {
    structs: Vec<StructDef>,
}

impl TypeArena {
    pub const MSG: StructId = StructId(0);
    pub const BLOCK: StructId = StructId(1);

    pub fn new() -> Self {
        let span = crate::span(0, 0);
        let field = |name: &str, ty: TypeName| VarDecl {
            span,
            name: name.to_string(),
            ty,
        };
        Self {
            structs: vec![
                StructDef {
                    name: "msg".to_string(),
                    members: vec![
                        field("sender", TypeName::address()),
                        field("value", TypeName::uint(256)),
                    ],
                },
                StructDef {
                    name: "block".to_string(),
                    members: vec![
                        field("number", TypeName::uint(256)),
                        field("timestamp", TypeName::uint(256)),
                    ],
                },
            ],
        }
    }

    /// Reserve an id before the definition is known, so structs can refer to
    /// each other (or themselves) by id.
    pub fn reserve(&mut self, name: &str) -> StructId {
        let id = StructId(self.structs.len() as u32);
        self.structs.push(StructDef {
            name: name.to_string(),
            members: Vec::new(),
        });
        id
    }

    pub fn define(&mut self, id: StructId, members: Vec<VarDecl>) {
        if let Some(def) = self.structs.get_mut(id.0 as usize) {
            def.members = members;
        }
    }

    pub fn intern(&mut self, def: StructDef) -> StructId {
        let id = StructId(self.structs.len() as u32);
        self.structs.push(def);
        id
    }

    pub fn get(&self, id: StructId) -> Option<&StructDef> {
        self.structs.get(id.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = (StructId, &StructDef)> {
        self.structs
            .iter()
            .enumerate()
            .map(|(i, s)| (StructId(i as u32), s))
    }
}

impl Default for TypeArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sized_and_alias_names() {
        assert_eq!(ElementaryType::parse("uint"), Some(ElementaryType::Uint(256)));
        assert_eq!(ElementaryType::parse("uint8"), Some(ElementaryType::Uint(8)));
        assert_eq!(ElementaryType::parse("int128"), Some(ElementaryType::Int(128)));
        assert_eq!(ElementaryType::parse("bytes32"), Some(ElementaryType::FixedBytes(32)));
        assert_eq!(ElementaryType::parse("address payable"), Some(ElementaryType::Address));
        assert_eq!(ElementaryType::parse("uint7"), None);
        assert_eq!(ElementaryType::parse("bytes33"), None);
        assert_eq!(ElementaryType::parse("float"), None);
    }

    #[test]
    fn arena_reserves_ids_for_cyclic_structs() {
        let mut arena = TypeArena::new();
        let node = arena.reserve("Node");
        arena.define(
            node,
            vec![VarDecl {
                span: crate::span(0, 0),
                name: "children".to_string(),
                ty: TypeName::array(TypeName::UserDefined(UserType::Struct(node)), None),
            }],
        );
        let def = arena.get(node).expect("node");
        assert_eq!(def.name, "Node");
        assert_eq!(def.member_index("children"), Some(0));
        assert_eq!(arena.get(TypeArena::MSG).map(|s| s.name.as_str()), Some("msg"));
    }
}
