mod bytes;
mod catalog;
mod chunk;
mod compression;
mod decl;
mod diag;
mod dna;
mod error;
mod hash;
mod header;
mod matcher;
mod options;
mod primitive;
mod reader;
mod relink;
mod store;
mod stream;
mod writer;

/// Flattened schema catalog and its tables.
pub use catalog::{ChainLink, Flags, Member, SchemaCatalog, SchemaName, SchemaType, StructDef};
/// Chunk header records and old addresses.
pub use chunk::{ChunkHeader, OldAddress, code_label};
/// Compression detection and codecs.
pub use compression::{Compression, decode_bytes, encode_bytes, open_stream};
/// Declarator parsing.
pub use decl::{FieldDecl, parse_field_decl};
/// Diagnostics sink and its stock implementations.
pub use diag::{Collect, Diagnostics, Severity, Silent, Stderr, TracingDiagnostics};
/// Raw DNA tables.
pub use dna::{Dna, DnaField, DnaStruct};
/// Error, status, and result aliases.
pub use error::{BlendError, Result, Status};
/// Hashing helpers and pre-hashed keys.
pub use hash::{AddrKey, IntKey, KeyMap, NameKey, hash_bytes, hash_str, hash_u32, hash_u64, key_map_with_capacity};
/// File header, container format, and storage layout.
pub use header::{Endianness, FileHeader, Format, Layout, PointerWidth};
/// Cross-schema link table.
pub use matcher::{LinkTable, MemberLink, StructLink};
/// Parse options and catalog ceilings.
pub use options::{CatalogLimits, ParseOptions};
/// Numeric conversion helpers.
pub use primitive::{Number, PrimKind, Primitive, cast_elements, copy_swapped, swap_in_place};
/// Parse driver and its output.
pub use reader::{ChunkHandler, FileStats, LinkedFile, ParseState, Probe, Reader, probe, probe_path};
/// Pointer relinking.
pub use relink::{LinkedChunk, RelinkStats, Relinker};
/// Chunk ledger.
pub use store::{ChunkKind, ChunkStore, Inserted, StoredChunk};
/// Byte stream capability and backends.
pub use stream::{ByteStream, CompressedStream, FileStream, MemoryStream, Mode};
/// File serialization.
pub use writer::Writer;
