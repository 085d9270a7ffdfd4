//! Format constants and default limits.

/// Magic number identifying a data tree file: "KDATTREE"
pub const MAGIC: [u8; 8] = *b"KDATTREE";

/// Current envelope format version.
pub const FORMAT_VERSION: u32 = 1;

/// Envelope header size: magic (8) + version (4) + payload length (8).
pub const ENVELOPE_HEADER_SIZE: usize = 20;

/// Size of the trailing CRC32 checksum.
pub const CHECKSUM_SIZE: usize = 4;

/// Default maximum nesting depth accepted by the decoder.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Default maximum length of any string on the wire (16 MiB).
pub const DEFAULT_MAX_STRING_LENGTH: usize = 16 * 1024 * 1024;

/// Key under which the workbook importer registers sheet branches.
pub const SHEET_NAME_KEY: &str = "sheetName";

/// Key under which the workbook importer registers list and tree twigs.
pub const BRANCH_NAME_KEY: &str = "branchName";

/// Field holding one element of a scalar list.
pub const LIST_VALUE_FIELD: &str = "value";
