//! Binary tree codec.
//!
//! # Node record
//!
//! All integers are little-endian.
//!
//! ```text
//! node  := field_count:u32 field* child_count:u32 child*
//! field := name_len:u32 name kind_tag:u8 value
//! child := key_len:u32 key value_len:u32 value_text node
//! ```
//!
//! Values are encoded by kind: Hash and String as `len:u32` + UTF-8,
//! Int as `i32`, Float as `f32`, Bool as one byte (0/1). A child that was
//! registered without a lookup pair carries two empty strings.
//!
//! Encoding walks the tree depth-first in pre-order. Every branch must be
//! ready; this is checked before the first byte is written.

use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};

use crate::config::TreeConfig;
use crate::error::TreeError;
use crate::sapling::Sapling;
use crate::schema::{DeclareFields, SelfSchema};
use crate::tree::{DataTree, SaplingId};
use crate::types::{LookupPair, Value};

/// Bounds applied to untrusted input while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    pub max_depth: usize,
    pub max_string_len: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self::from(&TreeConfig::default())
    }
}

impl From<&TreeConfig> for DecodeLimits {
    fn from(config: &TreeConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            max_string_len: config.max_string_len,
        }
    }
}

/// Errors that can occur while decoding a tree.
#[derive(Debug)]
pub enum DecodeError {
    /// I/O error from the underlying reader.
    Io(std::io::Error),
    /// The input ended in the middle of a record.
    Truncated,
    /// Unknown value kind tag.
    InvalidKindTag(u8),
    /// A string was not valid UTF-8.
    InvalidUtf8,
    /// A length prefix exceeds the configured maximum.
    LengthLimit { len: usize, max: usize },
    /// Nesting exceeds the configured maximum depth.
    DepthExceeded(usize),
    /// A record declares the same field twice.
    DuplicateField(String),
    /// Bytes remain after the root record.
    TrailingBytes,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Truncated => write!(f, "unexpected end of input"),
            Self::InvalidKindTag(tag) => write!(f, "invalid value kind tag: 0x{tag:02x}"),
            Self::InvalidUtf8 => write!(f, "string is not valid UTF-8"),
            Self::LengthLimit { len, max } => {
                write!(f, "length {len} exceeds maximum {max}")
            }
            Self::DepthExceeded(max) => write!(f, "tree deeper than {max} levels"),
            Self::DuplicateField(name) => write!(f, "duplicate field in record: '{name}'"),
            Self::TrailingBytes => write!(f, "trailing bytes after root record"),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == ErrorKind::UnexpectedEof {
            Self::Truncated
        } else {
            Self::Io(e)
        }
    }
}

pub(crate) fn write_u32<W: Write>(writer: &mut W, value: u32) -> std::io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

fn write_len<W: Write>(writer: &mut W, len: usize) -> std::io::Result<()> {
    let len = u32::try_from(len).map_err(|_| {
        std::io::Error::new(ErrorKind::InvalidInput, "length does not fit in u32")
    })?;
    write_u32(writer, len)
}

pub(crate) fn write_str<W: Write>(writer: &mut W, s: &str) -> std::io::Result<()> {
    write_len(writer, s.len())?;
    writer.write_all(s.as_bytes())
}

pub(crate) fn read_exact<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), DecodeError> {
    reader.read_exact(buf).map_err(DecodeError::from)
}

pub(crate) fn read_u8<R: Read>(reader: &mut R) -> Result<u8, DecodeError> {
    let mut buf = [0u8; 1];
    read_exact(reader, &mut buf)?;
    Ok(buf[0])
}

pub(crate) fn read_u32<R: Read>(reader: &mut R) -> Result<u32, DecodeError> {
    let mut buf = [0u8; 4];
    read_exact(reader, &mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_string<R: Read>(
    reader: &mut R,
    limits: &DecodeLimits,
) -> Result<String, DecodeError> {
    let len = read_u32(reader)? as usize;
    if len > limits.max_string_len {
        return Err(DecodeError::LengthLimit {
            len,
            max: limits.max_string_len,
        });
    }
    let mut bytes = Vec::new();
    reader
        .by_ref()
        .take(len as u64)
        .read_to_end(&mut bytes)
        .map_err(DecodeError::from)?;
    if bytes.len() != len {
        return Err(DecodeError::Truncated);
    }
    String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
}

/// Where an encoder is in its life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecPhase {
    /// Nothing written yet.
    Building,
    /// A subtree has been written.
    Serializing,
    /// The writer was flushed and handed back.
    Done,
}

impl std::fmt::Display for CodecPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Building => write!(f, "building"),
            Self::Serializing => write!(f, "serializing"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Streams one subtree to a writer.
///
/// The encoder borrows the tree for its whole life, so the tree cannot be
/// mutated while it is being written. It moves through
/// `Building -> Serializing -> Done`: [`encode`](Self::encode) runs once,
/// then [`finish`](Self::finish) flushes and hands the writer back.
pub struct TreeEncoder<'a, W: Write> {
    tree: &'a DataTree,
    /// `None` once finished.
    writer: Option<BufWriter<W>>,
    phase: CodecPhase,
}

impl<'a, W: Write> TreeEncoder<'a, W> {
    pub fn new(tree: &'a DataTree, writer: W) -> Self {
        Self {
            tree,
            writer: Some(BufWriter::new(writer)),
            phase: CodecPhase::Building,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> CodecPhase {
        self.phase
    }

    /// Write `id` and its subtree.
    ///
    /// # Errors
    ///
    /// `EncoderPhase` unless the encoder is still building. `BranchNotReady`
    /// before anything is written if a branch in the subtree is not ready;
    /// the encoder then stays in `Building`. `StreamWrite` if the writer
    /// fails part way.
    pub fn encode(&mut self, id: SaplingId) -> Result<(), TreeError> {
        self.expect_phase(CodecPhase::Building)?;
        let order = self.tree.subtree(id)?;
        for parent in &order {
            let node = self.tree.sapling(*parent)?;
            for child in node.children() {
                if !self.tree.sapling(*child)?.is_ready() {
                    return Err(TreeError::BranchNotReady {
                        parent: *parent,
                        child: *child,
                    });
                }
            }
        }

        let Some(writer) = self.writer.as_mut() else {
            return Err(self.phase_error(CodecPhase::Building));
        };
        self.phase = CodecPhase::Serializing;
        for (index, current) in order.iter().enumerate() {
            let node = self.tree.sapling(*current)?;
            if index > 0 {
                match node.lookup() {
                    Some(pair) => {
                        write_str(writer, &pair.key)?;
                        write_str(writer, &pair.value)?;
                    }
                    None => {
                        write_u32(writer, 0)?;
                        write_u32(writer, 0)?;
                    }
                }
            }
            write_len(writer, node.field_count())?;
            for (name, value) in node.fields() {
                write_str(writer, name)?;
                value.write_to(writer)?;
            }
            write_len(writer, node.children().len())?;
        }
        tracing::debug!("encoded {} saplings from {id}", order.len());
        Ok(())
    }

    /// Flush buffered output and return the writer.
    ///
    /// # Errors
    ///
    /// `EncoderPhase` unless a subtree was encoded and the encoder is not
    /// finished yet; `StreamWrite` if the flush fails.
    pub fn finish(&mut self) -> Result<W, TreeError> {
        self.expect_phase(CodecPhase::Serializing)?;
        let Some(writer) = self.writer.take() else {
            return Err(self.phase_error(CodecPhase::Serializing));
        };
        self.phase = CodecPhase::Done;
        writer
            .into_inner()
            .map_err(|e| TreeError::StreamWrite(e.into_error()))
    }

    fn expect_phase(&self, expected: CodecPhase) -> Result<(), TreeError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(self.phase_error(expected))
        }
    }

    const fn phase_error(&self, expected: CodecPhase) -> TreeError {
        TreeError::EncoderPhase {
            expected,
            actual: self.phase,
        }
    }
}

struct Frame {
    id: SaplingId,
    remaining: u32,
    depth: usize,
}

/// Decode a whole stream into a new tree.
///
/// Every decoded branch is ready and keeps the lookup pair it was written
/// with; the pair's key is re-declared as a key field on its parent.
pub fn decode_tree<R: Read>(reader: R, config: TreeConfig) -> Result<DataTree, DecodeError> {
    let limits = DecodeLimits::from(&config);
    let mut reader = BufReader::new(reader);

    let mut root = Sapling::new(SelfSchema::new(), None, config);
    let child_count = read_record(&mut reader, &mut root, &limits)?;
    let mut tree = DataTree::with_root(root, config);

    let mut stack = vec![Frame {
        id: tree.root(),
        remaining: child_count,
        depth: 0,
    }];
    while let Some(frame) = stack.last_mut() {
        if frame.remaining == 0 {
            stack.pop();
            continue;
        }
        frame.remaining -= 1;
        let parent = frame.id;
        let depth = frame.depth + 1;
        if depth > limits.max_depth {
            return Err(DecodeError::DepthExceeded(limits.max_depth));
        }

        let key = read_string(&mut reader, &limits)?;
        let value = read_string(&mut reader, &limits)?;
        let mut branch = Sapling::new(SelfSchema::new(), Some(parent), config);
        let child_count = read_record(&mut reader, &mut branch, &limits)?;
        branch.ready = true;
        if !key.is_empty() {
            if let Some(owner) = tree.get_mut(parent) {
                owner.schema.schema_mut().ensure_key(&key);
            }
            branch.lookup = Some(LookupPair { key, value });
        }

        let id = tree.push_decoded(branch);
        stack.push(Frame {
            id,
            remaining: child_count,
            depth,
        });
    }

    let mut probe = [0u8; 1];
    if reader.read(&mut probe)? != 0 {
        return Err(DecodeError::TrailingBytes);
    }
    tracing::debug!("decoded {} saplings", tree.node_count());
    Ok(tree)
}

/// Read a record's fields into `sapling` and return its child count.
fn read_record<R: Read>(
    reader: &mut R,
    sapling: &mut Sapling,
    limits: &DecodeLimits,
) -> Result<u32, DecodeError> {
    let field_count = read_u32(reader)?;
    for _ in 0..field_count {
        let name = read_string(reader, limits)?;
        let value = Value::read_from(reader, limits)?;
        let index = sapling
            .schema
            .schema_mut()
            .auto_declare(&name, value.kind())
            .map_err(|_| DecodeError::DuplicateField(name))?;
        if sapling.values.len() <= index {
            sapling.values.resize(index + 1, None);
        }
        sapling.values[index] = Some(value);
    }
    if field_count > 0 {
        sapling.mark_written();
    }
    read_u32(reader)
}
