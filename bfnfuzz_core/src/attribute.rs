//! The (type, length, value) triple shared by every path attribute.

use crate::error::BfnError;
use crate::node::{Aggregate, BfnTree, LeafField, Length, NodeId, NodeKind};
use serde::Deserialize;

// 0 1 2 3 4 5 6 7
//
// 0: optional, 1: transitive, 2: partial,
// 3: extended length (0 -> 1 byte length, 1 -> 2 byte length)
pub const OPTIONAL: u8 = 0b1000_0000;
pub const TRANSITIVE: u8 = 0b0100_0000;
pub const PARTIAL: u8 = 0b0010_0000;
pub const EXTENDED_LEN: u8 = 0b0001_0000;

/// Largest value a one-byte attribute length can describe.
pub const MAX_SHORT_LENGTH: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathAttributeType {
    #[default]
    AsPath,
    Communities,
}

impl PathAttributeType {
    pub fn code(self) -> u8 {
        match self {
            PathAttributeType::AsPath => 2,
            PathAttributeType::Communities => 8,
        }
    }

    pub fn default_flags(self) -> u8 {
        match self {
            PathAttributeType::AsPath => TRANSITIVE,
            PathAttributeType::Communities => OPTIONAL | TRANSITIVE,
        }
    }
}

/// Flags octet plus type code octet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrType {
    flags: u8,
    code: u8,
}

impl AttrType {
    pub fn new(flags: u8, code: u8) -> Self {
        Self { flags, code }
    }

    /// The default flags of `attr`, with the extended-length bit as given.
    pub fn for_type(attr: PathAttributeType, extended_length: bool) -> Self {
        let mut flags = attr.default_flags();
        if extended_length {
            flags |= EXTENDED_LEN;
        }
        Self::new(flags, attr.code())
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn code(&self) -> u8 {
        self.code
    }

    pub fn extended_length(&self) -> bool {
        self.flags & EXTENDED_LEN == EXTENDED_LEN
    }

    /// Width of the length field the flags announce.
    pub fn length_width(&self) -> usize {
        if self.extended_length() { 2 } else { 1 }
    }
}

impl LeafField for AttrType {
    fn encoded_len(&self) -> usize {
        2
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&[self.flags, self.code]);
    }
}

/// Keys of the three children of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeParts {
    pub type_node: NodeId,
    pub length: NodeId,
    pub value: NodeId,
}

impl BfnTree {
    /// Assembles a detached attribute from a length node and a value node.
    ///
    /// The extended-length flag of `attr_type` must agree with the width of
    /// `length`; a mismatch is reported, never corrected.
    pub fn build_attribute(
        &mut self,
        attr_type: AttrType,
        length: NodeId,
        value: NodeId,
    ) -> Result<NodeId, BfnError> {
        let width = self.length(length)?.width();
        if width != attr_type.length_width() {
            return Err(BfnError::ExtendedLengthMismatch {
                flag: attr_type.extended_length(),
                width,
            });
        }
        let type_node = self.insert(NodeKind::AttrType(attr_type));
        let attribute = self.insert(NodeKind::Attribute);
        self.append_child(attribute, type_node)?;
        self.append_child(attribute, length)?;
        self.append_child(attribute, value)?;
        self.declare_child_dependency(attribute, length, value)?;
        Ok(attribute)
    }

    /// Assembles a detached attribute of a known type around `value`, with a
    /// length field sized by `extended_length`.
    pub fn new_attribute(
        &mut self,
        attr: PathAttributeType,
        extended_length: bool,
        value: NodeId,
    ) -> Result<NodeId, BfnError> {
        let attr_type = AttrType::for_type(attr, extended_length);
        let length = self.insert(NodeKind::Length(Length::new(
            attr_type.length_width(),
            Aggregate::ByteLength,
        )?));
        self.build_attribute(attr_type, length, value)
    }

    pub fn attribute_parts(&self, attribute: NodeId) -> Result<AttributeParts, BfnError> {
        Ok(AttributeParts {
            type_node: self.child_at(attribute, 0, "attribute")?,
            length: self.child_at(attribute, 1, "attribute")?,
            value: self.child_at(attribute, 2, "attribute")?,
        })
    }

    pub fn attr_type(&self, id: NodeId) -> Result<AttrType, BfnError> {
        match self.kind(id)? {
            NodeKind::AttrType(attr_type) => Ok(*attr_type),
            _ => Err(BfnError::WrongKind {
                node: id,
                expected: "attribute-type",
            }),
        }
    }

    /// Replaces the flags octet. The extended-length bit cannot change, since
    /// the length field's width is fixed at construction.
    pub fn set_attr_flags(&mut self, id: NodeId, flags: u8) -> Result<(), BfnError> {
        self.set_leaf(id, |id, kind| match kind {
            NodeKind::AttrType(attr_type) => {
                if (flags ^ attr_type.flags) & EXTENDED_LEN != 0 {
                    return Err(BfnError::ExtendedLengthMismatch {
                        flag: flags & EXTENDED_LEN != 0,
                        width: attr_type.length_width(),
                    });
                }
                attr_type.flags = flags;
                Ok(())
            }
            _ => Err(BfnError::WrongKind {
                node: id,
                expected: "attribute-type",
            }),
        })
    }
}

/// An attribute read back from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttribute<'a> {
    pub flags: u8,
    pub code: u8,
    pub length: usize,
    pub value: &'a [u8],
}

/// Parses one attribute off the front of `bytes`, returning it and the number
/// of bytes consumed.
pub fn decode_attribute(bytes: &[u8]) -> Result<(RawAttribute<'_>, usize), BfnError> {
    let truncated = |expected: usize| BfnError::InvalidWidth {
        expected,
        actual: bytes.len(),
    };
    if bytes.len() < 3 {
        return Err(truncated(3));
    }
    let (flags, code) = (bytes[0], bytes[1]);
    let (header_len, length) = if flags & EXTENDED_LEN == EXTENDED_LEN {
        if bytes.len() < 4 {
            return Err(truncated(4));
        }
        (4, usize::from(u16::from_be_bytes([bytes[2], bytes[3]])))
    } else {
        (3, usize::from(bytes[2]))
    };
    let value = bytes
        .get(header_len..header_len + length)
        .ok_or(truncated(header_len + length))?;
    Ok((
        RawAttribute {
            flags,
            code,
            length,
            value,
        },
        header_len + length,
    ))
}
