//! Tree files.
//!
//! A tree file wraps one encoded tree in a checksummed envelope:
//!
//! - `magic`: 8 bytes (`KDATTREE`)
//! - `version`: 4 bytes
//! - `payload_len`: 8 bytes
//! - `payload`: the encoded root record
//! - `checksum`: 4 bytes (CRC32 of the payload)
//!
//! Saves go to a temporary file in the target's directory and are renamed
//! over the target only once fully written and synced.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::codec::{self, DecodeError};
use crate::config::TreeConfig;
use crate::constants::{CHECKSUM_SIZE, ENVELOPE_HEADER_SIZE, FORMAT_VERSION, MAGIC};
use crate::error::TreeError;
use crate::tree::DataTree;

/// Errors that can occur while saving or loading a tree file.
#[derive(Debug)]
pub enum FileError {
    /// I/O error.
    Io(std::io::Error),
    /// The file does not start with the tree magic number.
    BadMagic,
    /// The file was written by another format version.
    UnsupportedVersion(u32),
    /// The file is shorter than its header claims.
    Truncated,
    /// Payload checksum mismatch.
    ChecksumMismatch { expected: u32, actual: u32 },
    /// Bytes follow the checksum.
    TrailingBytes(usize),
    /// The payload could not be decoded.
    Decode(DecodeError),
    /// The tree could not be encoded.
    Tree(TreeError),
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::BadMagic => write!(f, "not a data tree file"),
            Self::UnsupportedVersion(v) => write!(f, "unsupported format version: {v}"),
            Self::Truncated => write!(f, "file is truncated"),
            Self::ChecksumMismatch { expected, actual } => {
                write!(f, "checksum mismatch: expected {expected}, got {actual}")
            }
            Self::TrailingBytes(n) => write!(f, "{n} unexpected bytes after checksum"),
            Self::Decode(e) => write!(f, "decode error: {e}"),
            Self::Tree(e) => write!(f, "tree error: {e}"),
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Decode(e) => Some(e),
            Self::Tree(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FileError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<DecodeError> for FileError {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

impl From<TreeError> for FileError {
    fn from(e: TreeError) -> Self {
        Self::Tree(e)
    }
}

/// Wrap an encoded payload in the file envelope.
#[must_use]
pub fn seal(payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(ENVELOPE_HEADER_SIZE + payload.len() + CHECKSUM_SIZE);
    bytes.extend_from_slice(&MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    bytes.extend_from_slice(payload);
    bytes.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
    bytes
}

/// Validate the envelope and return the payload it carries.
pub fn unseal(bytes: &[u8]) -> Result<&[u8], FileError> {
    if bytes.len() < MAGIC.len() || bytes[..MAGIC.len()] != MAGIC {
        return Err(FileError::BadMagic);
    }
    if bytes.len() < ENVELOPE_HEADER_SIZE {
        return Err(FileError::Truncated);
    }

    let version = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
    if version != FORMAT_VERSION {
        return Err(FileError::UnsupportedVersion(version));
    }

    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&bytes[12..ENVELOPE_HEADER_SIZE]);
    let payload_len =
        usize::try_from(u64::from_le_bytes(len_bytes)).map_err(|_| FileError::Truncated)?;
    let payload_end = ENVELOPE_HEADER_SIZE
        .checked_add(payload_len)
        .ok_or(FileError::Truncated)?;
    let file_end = payload_end
        .checked_add(CHECKSUM_SIZE)
        .ok_or(FileError::Truncated)?;
    if bytes.len() < file_end {
        return Err(FileError::Truncated);
    }
    if bytes.len() > file_end {
        return Err(FileError::TrailingBytes(bytes.len() - file_end));
    }

    let payload = &bytes[ENVELOPE_HEADER_SIZE..payload_end];
    let stored = u32::from_le_bytes([
        bytes[payload_end],
        bytes[payload_end + 1],
        bytes[payload_end + 2],
        bytes[payload_end + 3],
    ]);
    let computed = crc32fast::hash(payload);
    if stored != computed {
        return Err(FileError::ChecksumMismatch {
            expected: stored,
            actual: computed,
        });
    }
    Ok(payload)
}

/// Encode `tree` and write it to `path`.
///
/// The file is flushed and synced before it replaces `path`. If any step
/// fails, whatever was at `path` is left as it was and the temporary file
/// is removed.
pub fn write_file(tree: &DataTree, path: &Path) -> Result<(), FileError> {
    let bytes = seal(&tree.to_bytes()?);
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir)?;
    write_synced(temp.as_file_mut(), &bytes)?;
    temp.persist(path).map_err(|e| FileError::Io(e.error))?;
    tracing::info!(
        "saved {} saplings ({} bytes) to {}",
        tree.node_count(),
        bytes.len(),
        path.display()
    );
    Ok(())
}

fn write_synced(file: &mut File, bytes: &[u8]) -> std::io::Result<()> {
    let mut writer = BufWriter::new(file);
    writer.write_all(bytes)?;
    let file = writer
        .into_inner()
        .map_err(std::io::IntoInnerError::into_error)?;
    file.sync_all()
}

/// Read and decode a tree file.
pub fn read_file(path: &Path, config: TreeConfig) -> Result<DataTree, FileError> {
    let bytes = std::fs::read(path)?;
    let payload = unseal(&bytes)?;
    let tree = codec::decode_tree(payload, config)?;
    tracing::info!(
        "loaded {} saplings from {}",
        tree.node_count(),
        path.display()
    );
    Ok(tree)
}
