use thiserror::Error;

/// Crate-local result type.
pub type Result<T> = std::result::Result<T, BlendError>;

/// Closed status taxonomy reported by the top-level parse entry points.
///
/// Discriminants follow the on-disk tooling convention: the more negative,
/// the more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
	/// Schema matching produced nothing usable.
	LinkFailed = -7,
	/// The chunk ledger refused an entry.
	InsertFailed = -6,
	/// An allocation request failed.
	BadAlloc = -5,
	/// The stream returned fewer bytes than a mandatory read needed.
	InvalidRead = -4,
	/// A chunk declared an impossible length.
	InvalidLength = -3,
	/// The file magic did not match.
	InvalidHeader = -2,
	/// Anything else.
	Failed = -1,
	/// Success.
	Ok = 0,
}

impl Status {
	/// Numeric status code.
	pub fn code(self) -> i32 {
		self as i32
	}

	/// Stable lowercase label.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::LinkFailed => "link_failed",
			Self::InsertFailed => "insert_failed",
			Self::BadAlloc => "bad_alloc",
			Self::InvalidRead => "invalid_read",
			Self::InvalidLength => "invalid_length",
			Self::InvalidHeader => "invalid_header",
			Self::Failed => "failed",
			Self::Ok => "ok",
		}
	}
}

/// Errors produced while reading, linking, and writing chunked files.
#[derive(Debug, Error)]
pub enum BlendError {
	/// Filesystem or stream IO failure.
	#[error("io: {0}")]
	Io(#[from] std::io::Error),
	/// Decompression output exceeded configured safety limit.
	#[error("decompressed output exceeded limit {limit} bytes")]
	DecompressedTooLarge {
		/// Maximum allowed output bytes.
		limit: usize,
	},
	/// The 7-byte magic or one of the header markers is wrong.
	#[error("invalid header (prefix={prefix:?})")]
	InvalidHeader {
		/// First up-to-7 bytes of the stream.
		prefix: Vec<u8>,
	},
	/// File pointer width differs from the host and mixed widths are disabled.
	#[error("file pointer width {file} differs from host width {host}")]
	PointerWidthMismatch {
		/// File pointer width in bytes.
		file: usize,
		/// Host pointer width in bytes.
		host: usize,
	},
	/// Not enough bytes remained for a requested read.
	#[error("unexpected eof at offset {at}, need {need} bytes, remaining {rem}")]
	UnexpectedEof {
		/// Byte offset where the read was attempted.
		at: usize,
		/// Requested bytes.
		need: usize,
		/// Bytes still available.
		rem: usize,
	},
	/// Chunk length sentinel is impossible.
	#[error("invalid chunk length {len} at offset {at}")]
	InvalidLength {
		/// Chunk header stream offset.
		at: u64,
		/// Declared signed length or count.
		len: i64,
	},
	/// Chunk payload would exceed the remaining stream.
	#[error("chunk length {len} at offset {at} exceeds remaining {rem}")]
	ChunkLenOutOfRange {
		/// Chunk header stream offset.
		at: u64,
		/// Declared payload length.
		len: u64,
		/// Remaining bytes in stream.
		rem: u64,
	},
	/// A fallible allocation was refused.
	#[error("allocation of {size} bytes failed")]
	Allocation {
		/// Requested bytes.
		size: usize,
	},
	/// Strict duplicate checking saw a second header with different content.
	#[error("duplicate chunk address 0x{old:x} with a different header")]
	DuplicateMismatch {
		/// Conflicting old address.
		old: u64,
	},
	/// The scan ended without a schema chunk.
	#[error("schema chunk not found")]
	SchemaNotFound,
	/// Unexpected DNA section tag.
	#[error("DNA tag mismatch at {at}: expected {expected:?}, got {got:?}")]
	DnaBadTag {
		/// Expected section tag.
		expected: [u8; 4],
		/// Actual section tag.
		got: [u8; 4],
		/// Cursor offset of the tag read.
		at: usize,
	},
	/// A DNA table declares more entries than the configured ceiling.
	#[error("DNA {kind} table too large: count={count}, max={max}")]
	TableTooLarge {
		/// Table being read.
		kind: &'static str,
		/// Declared entry count.
		count: usize,
		/// Configured ceiling.
		max: usize,
	},
	/// Out-of-range index inside DNA tables.
	#[error("DNA index out of range for {kind}: idx={idx}, max={max}")]
	DnaIndexOutOfRange {
		/// Logical index kind being validated.
		kind: &'static str,
		/// Offending index value.
		idx: u32,
		/// Maximum valid index.
		max: u32,
	},
	/// Duplicate type->struct mapping in DNA `STRC` section.
	#[error("DNA duplicate struct type index {type_idx}: first={first}, second={second}")]
	DnaDuplicateStructType {
		/// Duplicate type index.
		type_idx: u16,
		/// First struct index observed.
		first: u32,
		/// Second struct index observed.
		second: u32,
	},
	/// Struct flattening recursed past the configured depth.
	#[error("struct {name} nests deeper than {max_depth} levels")]
	SchemaTooDeep {
		/// Struct being flattened when the limit was hit.
		name: String,
		/// Configured depth ceiling.
		max_depth: usize,
	},
	/// A version number does not fit the three header digits.
	#[error("version {version} does not fit a file header (max {max})")]
	VersionOutOfRange {
		/// Requested version.
		version: u16,
		/// Largest representable version.
		max: u16,
	},
	/// A flattened struct exceeds a configured size ceiling.
	#[error("struct {name} exceeds {limit} {kind}")]
	SchemaTooLarge {
		/// Struct being flattened when the limit was hit.
		name: String,
		/// Which ceiling was hit, `bytes` or `members`.
		kind: &'static str,
		/// Configured ceiling.
		limit: usize,
	},
	/// Not a single struct of the memory schema exists in the file schema.
	#[error("no struct of the memory schema matched the file schema")]
	LinkFailed,
	/// Requested struct name was not found.
	#[error("struct not found: {name}")]
	StructNotFound {
		/// Requested struct name.
		name: String,
	},
	/// Option file failed to deserialize.
	#[error("options: {0}")]
	Options(#[from] serde_json::Error),
}

impl BlendError {
	/// Map this error onto the closed status taxonomy.
	pub fn status(&self) -> Status {
		match self {
			Self::LinkFailed => Status::LinkFailed,
			Self::DuplicateMismatch { .. } => Status::InsertFailed,
			Self::Allocation { .. } => Status::BadAlloc,
			Self::UnexpectedEof { .. } | Self::ChunkLenOutOfRange { .. } => Status::InvalidRead,
			Self::Io(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => Status::InvalidRead,
			Self::InvalidLength { .. } => Status::InvalidLength,
			Self::InvalidHeader { .. } => Status::InvalidHeader,
			_ => Status::Failed,
		}
	}
}
