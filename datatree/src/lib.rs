// Shape of a tree:
//  - The root sapling owns an arena of saplings, addressed by `SaplingId`
//  - Each sapling carries a schema for its own fields and, optionally,
//    a branch header that seeds the schema of branches grown beneath it
//  - A branch marked ready is registered under its parent's first key
//    field it holds a value for
//
// Life of a tree:
// 1. Plant a root from a `TreeFactory`
// 2. Declare fields, grow branches, write values, mark branches ready
// 3. Encode to a stream, or seal into a checksummed file
// 4. Decode back into a tree with identical lookups

pub mod codec;
pub mod config;
pub mod constants;
mod error;
mod file;
pub mod refs;
mod sapling;
pub mod schema;
mod tree;
pub mod types;
pub mod workbook;

#[cfg(test)]
mod e2e_tests;

pub use codec::{CodecPhase, DecodeError, DecodeLimits, TreeEncoder, decode_tree};
pub use config::{ConfigError, TreeConfig};
pub use error::TreeError;
pub use file::{FileError, read_file, seal, unseal, write_file};
pub use sapling::Sapling;
pub use schema::{ChildSchema, DeclareFields, FieldDecl, Schema, SelfSchema};
pub use tree::{DataTree, SaplingId, TreeFactory};
pub use types::{LookupPair, Value, ValueKind};
