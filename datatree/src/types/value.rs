//! Value cells and their wire encoding.
//!
//! Provides the `Value` tagged scalar and its `ValueKind` discriminant,
//! along with stream encoding, decoding and lookup equality.

use std::io::{Read, Write};

use crate::codec::{self, DecodeError, DecodeLimits};

/// Value kind discriminants. The numeric value is the wire tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueKind {
    Hash = 0x01,
    Int = 0x02,
    Float = 0x03,
    Bool = 0x04,
    String = 0x05,
}

impl TryFrom<u8> for ValueKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::Hash),
            0x02 => Ok(Self::Int),
            0x03 => Ok(Self::Float),
            0x04 => Ok(Self::Bool),
            0x05 => Ok(Self::String),
            _ => Err(value),
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Hash => "hash",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::String => "string",
        };
        f.write_str(name)
    }
}

/// A single scalar stored in a sapling field.
///
/// `Hash` holds the identifier text; hashing it is left to the consumer of
/// the serialized tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Hash(String),
    Int(i32),
    Float(f32),
    Bool(bool),
    String(String),
}

impl Value {
    /// Get the kind discriminant.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Hash(_) => ValueKind::Hash,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Bool(_) => ValueKind::Bool,
            Self::String(_) => ValueKind::String,
        }
    }

    /// Text payload of `Hash` and `String` values.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Hash(s) | Self::String(s) => Some(s),
            Self::Int(_) | Self::Float(_) | Self::Bool(_) => None,
        }
    }

    /// Equality used by branch lookup.
    ///
    /// Hash and String compare as text, Int and Float compare numerically,
    /// Bool only matches Bool.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn lookup_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Hash(a) | Self::String(a), Self::Hash(b) | Self::String(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => {
                f64::from(*a) == f64::from(*b)
            }
            (Self::Bool(a), Self::Bool(b)) => a == b,
            _ => false,
        }
    }

    /// Exact equality: same kind and same payload, floats compared bit for
    /// bit so that NaN equals itself.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }

    /// Render the value as the text stored in a lookup pair.
    #[must_use]
    pub fn to_lookup_string(&self) -> String {
        match self {
            Self::Hash(s) | Self::String(s) => s.as_str().to_owned(),
            Self::Int(n) => n.to_string(),
            Self::Float(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }

    /// Write the kind tag followed by the payload.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&[self.kind() as u8])?;
        match self {
            Self::Hash(s) | Self::String(s) => codec::write_str(writer, s),
            Self::Int(n) => writer.write_all(&n.to_le_bytes()),
            Self::Float(n) => writer.write_all(&n.to_le_bytes()),
            Self::Bool(b) => writer.write_all(&[u8::from(*b)]),
        }
    }

    /// Read a tag and payload.
    pub fn read_from<R: Read>(reader: &mut R, limits: &DecodeLimits) -> Result<Self, DecodeError> {
        let tag = codec::read_u8(reader)?;
        let kind = ValueKind::try_from(tag).map_err(DecodeError::InvalidKindTag)?;
        Self::read_payload(kind, reader, limits)
    }

    /// Read the payload of a value whose kind is already known.
    pub fn read_payload<R: Read>(
        kind: ValueKind,
        reader: &mut R,
        limits: &DecodeLimits,
    ) -> Result<Self, DecodeError> {
        match kind {
            ValueKind::Hash => Ok(Self::Hash(codec::read_string(reader, limits)?)),
            ValueKind::String => Ok(Self::String(codec::read_string(reader, limits)?)),
            ValueKind::Int => {
                let mut buf = [0u8; 4];
                codec::read_exact(reader, &mut buf)?;
                Ok(Self::Int(i32::from_le_bytes(buf)))
            }
            ValueKind::Float => {
                let mut buf = [0u8; 4];
                codec::read_exact(reader, &mut buf)?;
                Ok(Self::Float(f32::from_le_bytes(buf)))
            }
            ValueKind::Bool => Ok(Self::Bool(codec::read_u8(reader)? != 0)),
        }
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Plain text converts to `String`; lookup equality still matches `Hash` fields.
impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hash(s) => write!(f, "#{s}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n:?}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}
