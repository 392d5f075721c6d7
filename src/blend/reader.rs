use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::blend::bytes::read_uint;
use crate::blend::chunk::code_label;
use crate::blend::compression::open_stream;
use crate::blend::diag::{Diagnostics, Severity, TracingDiagnostics};
use crate::blend::hash::{AddrKey, KeyMap, key_map_with_capacity};
use crate::blend::relink::{LinkedChunk, RelinkStats, Relinker};
use crate::blend::store::{ChunkKind, ChunkStore, Inserted};
use crate::blend::stream::{ByteStream, MemoryStream};
use crate::blend::{BlendError, ChunkHeader, Dna, FileHeader, Format, Layout, LinkTable, ParseOptions, PointerWidth, Result, SchemaCatalog};

/// Last stage a [`Reader`] reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseState {
	/// Reading and validating the 12-byte header.
	ReadingHeader,
	/// Reading chunk headers.
	ScanningChunks,
	/// Reading one chunk payload.
	Buffering,
	/// Schema chunk payload was read.
	FoundSchemaChunk,
	/// Building the file catalog and link table.
	CompilingSchema,
	/// Converting chunks and rewriting pointers.
	Linking,
	/// Parse finished successfully.
	Done,
	/// Parse stopped with an error.
	Failed,
}

/// Callback invoked once per relinked chunk, in scan order.
pub trait ChunkHandler {
	/// Receive one converted chunk.
	fn on_chunk(&mut self, header: &ChunkHeader, linked: &LinkedChunk);
}

struct Ignore;

impl ChunkHandler for Ignore {
	fn on_chunk(&mut self, _header: &ChunkHeader, _linked: &LinkedChunk) {}
}

/// Reads a chunked file and links it against the program's own catalog.
pub struct Reader {
	format: Format,
	memory: Arc<SchemaCatalog>,
	options: ParseOptions,
	diag: Arc<dyn Diagnostics>,
	state: ParseState,
}

impl Reader {
	/// Reader for `format` linking against `memory`.
	pub fn new(format: Format, memory: Arc<SchemaCatalog>) -> Self {
		Self {
			format,
			memory,
			options: ParseOptions::default(),
			diag: Arc::new(TracingDiagnostics),
			state: ParseState::ReadingHeader,
		}
	}

	/// Replace the parse options.
	pub fn with_options(mut self, options: ParseOptions) -> Self {
		self.options = options;
		self
	}

	/// Replace the diagnostics sink.
	pub fn with_diagnostics(mut self, diag: Arc<dyn Diagnostics>) -> Self {
		self.diag = diag;
		self
	}

	/// Last stage reached by the most recent parse.
	pub fn state(&self) -> ParseState {
		self.state
	}

	/// Parse options in effect.
	pub fn options(&self) -> &ParseOptions {
		&self.options
	}

	/// Parse a whole stream.
	pub fn parse(&mut self, stream: &mut dyn ByteStream) -> Result<LinkedFile> {
		self.parse_with(stream, &mut Ignore)
	}

	/// Parse a file, inflating gzip or zstd input first.
	pub fn parse_path(&mut self, path: impl AsRef<Path>) -> Result<LinkedFile> {
		let mut stream = open_stream(path, self.options.max_decompressed_bytes)?;
		self.parse(stream.as_mut())
	}

	/// Parse an in-memory copy of a file.
	pub fn parse_bytes(&mut self, bytes: &[u8]) -> Result<LinkedFile> {
		let mut stream = MemoryStream::new(bytes.to_vec());
		self.parse(&mut stream)
	}

	/// Parse a stream, handing every converted chunk to `handler`.
	pub fn parse_with(&mut self, stream: &mut dyn ByteStream, handler: &mut dyn ChunkHandler) -> Result<LinkedFile> {
		match self.run(stream, handler) {
			Ok(file) => {
				self.state = ParseState::Done;
				Ok(file)
			}
			Err(err) => {
				let at = self.state;
				self.state = ParseState::Failed;
				self.diag.report(
					Severity::Error,
					&format!("parse failed during {at:?} with status {}: {err}", err.status().as_str()),
				);
				Err(err)
			}
		}
	}

	fn run(&mut self, stream: &mut dyn ByteStream, handler: &mut dyn ChunkHandler) -> Result<LinkedFile> {
		self.state = ParseState::ReadingHeader;
		let header = self.read_header(stream)?;
		let layout = header.layout();

		self.state = ParseState::ScanningChunks;
		let mut store = ChunkStore::default();
		let mut schema: Option<(SchemaCatalog, LinkTable)> = None;
		let head_size = ChunkHeader::size(layout.pointer_width);
		let mut head = vec![0_u8; head_size];

		loop {
			let at = stream.position();
			if stream.remaining() == 0 {
				self.diag.report(Severity::Debug, "stream ended without an end marker");
				break;
			}

			read_mandatory(stream, &mut head[..4])?;
			if self.format.legacy_schema_code.is_some_and(|code| head[..4] == code) {
				stream.seek(SeekFrom::Start(at))?;
				self.state = ParseState::Buffering;
				let rest = stream.remaining();
				let payload = read_payload(stream, rest)?;
				self.load_schema(&payload, layout, &mut schema)?;
				break;
			}

			read_mandatory(stream, &mut head[4..])?;
			let chunk = ChunkHeader::parse(&head, layout, at)?;
			if chunk.is(self.format.end_code) {
				break;
			}

			let rem = stream.remaining();
			if u64::from(chunk.len) > rem {
				return Err(BlendError::ChunkLenOutOfRange {
					at,
					len: u64::from(chunk.len),
					rem,
				});
			}

			self.state = ParseState::Buffering;
			let payload = read_payload(stream, u64::from(chunk.len))?;
			if chunk.is(self.format.schema_code) {
				self.load_schema(&payload, layout, &mut schema)?;
			} else if let Inserted::Duplicate(_) = store.insert(chunk, payload, self.options.strict_duplicates)? {
				self.diag.report(
					Severity::Debug,
					&format!("duplicate {} chunk at {:#x} dropped", code_label(chunk.code), chunk.old.widen()),
				);
			}
			self.state = ParseState::ScanningChunks;
		}

		let (catalog, table) = schema.ok_or(BlendError::SchemaNotFound)?;
		if table.is_catastrophic() {
			return Err(BlendError::LinkFailed);
		}

		self.state = ParseState::Linking;
		let (chunks, relink) = Relinker::new(&catalog, &self.memory, &table, &self.options.opaque_types, self.diag.as_ref()).relink(store)?;
		for chunk in &chunks {
			handler.on_chunk(&chunk.header, chunk);
		}

		Ok(LinkedFile::new(header, catalog, self.memory.clone(), table, chunks, relink))
	}

	fn read_header(&self, stream: &mut dyn ByteStream) -> Result<FileHeader> {
		let mut bytes = [0_u8; FileHeader::SIZE];
		let available = (FileHeader::SIZE as u64).min(stream.remaining()) as usize;
		read_mandatory(stream, &mut bytes[..available])?;

		let header = match FileHeader::parse(&bytes[..available], &self.format) {
			Ok(header) => header,
			Err(err) => {
				if !self.options.quiet_header {
					self.diag.report(Severity::Warning, &format!("not a {} file: {err}", String::from_utf8_lossy(&self.format.magic)));
				}
				return Err(err);
			}
		};

		let host = PointerWidth::native();
		if header.pointer_width != host {
			if !self.options.allow_foreign_pointer_width {
				return Err(BlendError::PointerWidthMismatch {
					file: header.pointer_width.bytes(),
					host: host.bytes(),
				});
			}
			self.diag.report(
				Severity::Info,
				&format!("file uses {}-byte pointers, host uses {}", header.pointer_width.bytes(), host.bytes()),
			);
		}
		Ok(header)
	}

	fn load_schema(&mut self, payload: &[u8], layout: Layout, schema: &mut Option<(SchemaCatalog, LinkTable)>) -> Result<()> {
		self.state = ParseState::FoundSchemaChunk;
		if schema.is_some() {
			self.diag.report(Severity::Warning, "second schema chunk ignored");
			return Ok(());
		}

		self.state = ParseState::CompilingSchema;
		let catalog = SchemaCatalog::from_blob(payload, layout, &self.options.limits, self.diag.as_ref())?;
		let table = LinkTable::build(&catalog, &self.memory, self.diag.as_ref());
		self.diag.report(
			Severity::Debug,
			&format!("schema: {} structs, {} linked", catalog.structs().len(), table.linked_count()),
		);
		*schema = Some((catalog, table));
		Ok(())
	}
}

/// Header, schema tables, and chunk census read without linking.
#[derive(Debug, Clone)]
pub struct Probe {
	/// Header as read.
	pub header: FileHeader,
	/// Schema tables, when a schema chunk was found.
	pub dna: Option<Dna>,
	/// Chunks other than the schema and end marker.
	pub chunk_count: usize,
	/// Chunk count per code, sorted by code.
	pub codes: Vec<(String, usize)>,
	/// Whether the scan stopped at an end marker.
	pub has_end: bool,
}

/// Scan chunk headers, skipping payloads except the schema chunk.
pub fn probe(stream: &mut dyn ByteStream, format: &Format, options: &ParseOptions) -> Result<Probe> {
	let mut bytes = [0_u8; FileHeader::SIZE];
	let available = (FileHeader::SIZE as u64).min(stream.remaining()) as usize;
	read_mandatory(stream, &mut bytes[..available])?;
	let header = FileHeader::parse(&bytes[..available], format)?;
	let layout = header.layout();

	let mut probe = Probe {
		header,
		dna: None,
		chunk_count: 0,
		codes: Vec::new(),
		has_end: false,
	};
	let mut codes: HashMap<[u8; 4], usize> = HashMap::new();
	let mut head = vec![0_u8; ChunkHeader::size(layout.pointer_width)];
	while stream.remaining() > 0 {
		let at = stream.position();
		read_mandatory(stream, &mut head[..4])?;
		if format.legacy_schema_code.is_some_and(|code| head[..4] == code) {
			stream.seek(SeekFrom::Start(at))?;
			let rest = stream.remaining();
			let payload = read_payload(stream, rest)?;
			probe.dna = Some(Dna::parse(&payload, layout.endianness, &options.limits)?);
			break;
		}

		read_mandatory(stream, &mut head[4..])?;
		let chunk = ChunkHeader::parse(&head, layout, at)?;
		if chunk.is(format.end_code) {
			probe.has_end = true;
			break;
		}
		let rem = stream.remaining();
		if u64::from(chunk.len) > rem {
			return Err(BlendError::ChunkLenOutOfRange {
				at,
				len: u64::from(chunk.len),
				rem,
			});
		}

		if chunk.is(format.schema_code) {
			let payload = read_payload(stream, u64::from(chunk.len))?;
			if probe.dna.is_none() {
				probe.dna = Some(Dna::parse(&payload, layout.endianness, &options.limits)?);
			}
			continue;
		}

		stream.seek(SeekFrom::Current(i64::from(chunk.len)))?;
		probe.chunk_count += 1;
		*codes.entry(chunk.code).or_insert(0) += 1;
	}

	probe.codes = codes.into_iter().map(|(code, count)| (code_label(code), count)).collect();
	probe.codes.sort();
	Ok(probe)
}

/// [`probe`] a file, inflating gzip or zstd input first.
pub fn probe_path(path: impl AsRef<Path>, format: &Format, options: &ParseOptions) -> Result<Probe> {
	let mut stream = open_stream(path, options.max_decompressed_bytes)?;
	probe(stream.as_mut(), format, options)
}

fn read_mandatory(stream: &mut dyn ByteStream, buf: &mut [u8]) -> Result<()> {
	let rem = stream.remaining();
	if buf.len() as u64 > rem {
		return Err(BlendError::UnexpectedEof {
			at: stream.position() as usize,
			need: buf.len(),
			rem: rem as usize,
		});
	}
	stream.read_exact(buf)
}

fn read_payload(stream: &mut dyn ByteStream, len: u64) -> Result<Box<[u8]>> {
	let size = usize::try_from(len).map_err(|_| BlendError::Allocation { size: usize::MAX })?;
	let mut buf = Vec::new();
	buf.try_reserve_exact(size).map_err(|_| BlendError::Allocation { size })?;
	buf.resize(size, 0);
	read_mandatory(stream, &mut buf)?;
	Ok(buf.into_boxed_slice())
}

/// Summary of a linked file.
#[derive(Debug, Clone, Serialize)]
pub struct FileStats {
	/// Producer version from the header.
	pub version: u16,
	/// File pointer width in bytes.
	pub pointer_size: usize,
	/// File byte order.
	pub endianness: &'static str,
	/// Stored chunks (schema and end marker excluded).
	pub chunk_count: usize,
	/// Chunk count per code, sorted by code.
	pub codes: Vec<(String, usize)>,
	/// Structs in the file schema.
	pub file_structs: usize,
	/// Memory structs with a file counterpart.
	pub linked_structs: usize,
	/// Relink counters.
	pub relink: RelinkStats,
}

/// A parsed file whose chunks follow the memory layout.
#[derive(Debug)]
pub struct LinkedFile {
	header: FileHeader,
	catalog: SchemaCatalog,
	memory: Arc<SchemaCatalog>,
	table: LinkTable,
	chunks: Vec<LinkedChunk>,
	by_code: HashMap<[u8; 4], Vec<usize>>,
	by_address: KeyMap<AddrKey, usize>,
	relink: RelinkStats,
}

impl LinkedFile {
	fn new(header: FileHeader, catalog: SchemaCatalog, memory: Arc<SchemaCatalog>, table: LinkTable, chunks: Vec<LinkedChunk>, relink: RelinkStats) -> Self {
		let mut by_code: HashMap<[u8; 4], Vec<usize>> = HashMap::new();
		let mut by_address = key_map_with_capacity(chunks.len());
		for (idx, chunk) in chunks.iter().enumerate() {
			by_code.entry(chunk.header.code).or_default().push(idx);
			if chunk.address() != 0 {
				by_address.insert(AddrKey(chunk.address()), idx);
			}
		}
		Self {
			header,
			catalog,
			memory,
			table,
			chunks,
			by_code,
			by_address,
			relink,
		}
	}

	/// Header as read.
	pub fn header(&self) -> &FileHeader {
		&self.header
	}

	/// Catalog compiled from the file's own schema.
	pub fn catalog(&self) -> &SchemaCatalog {
		&self.catalog
	}

	/// Catalog the chunks were converted to.
	pub fn memory(&self) -> &SchemaCatalog {
		&self.memory
	}

	/// Matching result between the two catalogs.
	pub fn link_table(&self) -> &LinkTable {
		&self.table
	}

	/// Chunks in scan order.
	pub fn chunks(&self) -> &[LinkedChunk] {
		&self.chunks
	}

	/// Chunks carrying `code`, in scan order.
	pub fn by_code(&self, code: [u8; 4]) -> impl Iterator<Item = &LinkedChunk> + '_ {
		self.by_code.get(&code).into_iter().flatten().map(|idx| &self.chunks[*idx])
	}

	/// Chunks whose memory struct is `name`.
	pub fn of_type<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a LinkedChunk> + 'a {
		let wanted = self.memory.find_struct(name);
		self.chunks
			.iter()
			.filter(move |chunk| wanted.is_some() && chunk.memory_struct == wanted && chunk.kind == ChunkKind::Typed)
	}

	/// Chunk whose converted payload starts at `address`.
	pub fn chunk_at(&self, address: u64) -> Option<&LinkedChunk> {
		self.by_address.get(&AddrKey(address)).map(|idx| &self.chunks[*idx])
	}

	/// Follow the native pointer stored at `offset` of `chunk`.
	pub fn follow(&self, chunk: &LinkedChunk, offset: usize) -> Option<&LinkedChunk> {
		let layout = self.memory.layout();
		let raw = chunk.data.get(offset..offset + layout.pointer_size())?;
		self.chunk_at(read_uint(raw, layout.endianness))
	}

	/// Summary counters.
	pub fn stats(&self) -> FileStats {
		let mut codes: Vec<(String, usize)> = self.by_code.iter().map(|(code, items)| (code_label(*code), items.len())).collect();
		codes.sort();
		FileStats {
			version: self.header.version,
			pointer_size: self.header.pointer_width.bytes(),
			endianness: self.header.endianness.as_str(),
			chunk_count: self.chunks.len(),
			codes,
			file_structs: self.catalog.structs().len(),
			linked_structs: self.table.linked_count(),
			relink: self.relink,
		}
	}

	/// Take the converted chunks.
	pub fn into_chunks(self) -> Vec<LinkedChunk> {
		self.chunks
	}
}

#[cfg(test)]
mod tests;
