use std::path::Path;

use crate::blend::compression::Compression;
use crate::blend::relink::LinkedChunk;
use crate::blend::store::ChunkKind;
use crate::blend::stream::{ByteStream, CompressedStream, FileStream, MemoryStream, Mode};
use crate::blend::{BlendError, ChunkHeader, FileHeader, Format, OldAddress, Result, SchemaCatalog};

/// Serializes linked chunks back into a chunked file in the memory layout.
///
/// Old addresses are the current block addresses and struct ids index the
/// memory catalog. Chunks without a memory struct get an out-of-range id so
/// they stay raw when read back. The memory schema payload is embedded verbatim.
pub struct Writer<'a> {
	format: Format,
	memory: &'a SchemaCatalog,
	version: u16,
}

impl<'a> Writer<'a> {
	/// Writer for `format` describing chunks laid out per `memory`.
	///
	/// Fails when `version` has more than the three digits a header holds.
	pub fn new(format: Format, memory: &'a SchemaCatalog, version: u16) -> Result<Self> {
		if version > FileHeader::MAX_VERSION {
			return Err(BlendError::VersionOutOfRange {
				version,
				max: FileHeader::MAX_VERSION,
			});
		}
		Ok(Self { format, memory, version })
	}

	/// Header this writer emits.
	pub fn header(&self) -> FileHeader {
		let layout = self.memory.layout();
		FileHeader {
			magic: self.format.magic,
			pointer_width: layout.pointer_width,
			endianness: layout.endianness,
			version: self.version,
		}
	}

	/// Write header, chunks, schema chunk, and end marker.
	pub fn write(&self, chunks: &[LinkedChunk], stream: &mut dyn ByteStream) -> Result<()> {
		let blob = self.memory.blob().ok_or(BlendError::SchemaNotFound)?;
		let layout = self.memory.layout();
		stream.write_all(&self.header().to_bytes())?;

		let mut head = Vec::with_capacity(ChunkHeader::size(layout.pointer_width));
		for chunk in chunks {
			head.clear();
			self.chunk_header(chunk).write(&mut head, layout);
			stream.write_all(&head)?;
			stream.write_all(&chunk.data)?;
		}

		head.clear();
		ChunkHeader {
			code: self.format.schema_code,
			len: blob.len() as u32,
			old: OldAddress::new(layout.pointer_width, 0),
			sdna_nr: 0,
			nr: 1,
		}
		.write(&mut head, layout);
		stream.write_all(&head)?;
		stream.write_all(blob)?;

		head.clear();
		ChunkHeader {
			code: self.format.end_code,
			len: 0,
			old: OldAddress::new(layout.pointer_width, 0),
			sdna_nr: 0,
			nr: 0,
		}
		.write(&mut head, layout);
		stream.write_all(&head)
	}

	/// Serialize into a byte vector.
	pub fn to_bytes(&self, chunks: &[LinkedChunk]) -> Result<Vec<u8>> {
		let mut stream = MemoryStream::default();
		self.write(chunks, &mut stream)?;
		Ok(stream.into_inner())
	}

	/// Write to `path`, compressing with `codec`.
	pub fn write_path(&self, chunks: &[LinkedChunk], path: impl AsRef<Path>, codec: Compression) -> Result<()> {
		match codec {
			Compression::None => {
				let mut stream = FileStream::open(path, Mode::Write)?;
				self.write(chunks, &mut stream)?;
				stream.close()
			}
			_ => {
				let mut stream = CompressedStream::create(path, codec);
				self.write(chunks, &mut stream)?;
				stream.finish()
			}
		}
	}

	fn chunk_header(&self, chunk: &LinkedChunk) -> ChunkHeader {
		let layout = self.memory.layout();
		let len = chunk.data.len();
		let nr = match chunk.kind {
			ChunkKind::Typed => chunk
				.memory_struct
				.and_then(|idx| self.memory.struct_def(idx))
				.filter(|def| def.len > 0)
				.map_or(chunk.header.nr as usize, |def| len / def.len),
			ChunkKind::PointerArray => len / layout.pointer_size(),
			ChunkKind::Raw | ChunkKind::Opaque => chunk.header.nr as usize,
		};
		ChunkHeader {
			code: chunk.header.code,
			len: len as u32,
			old: OldAddress::new(layout.pointer_width, chunk.address()),
			sdna_nr: chunk.memory_struct.unwrap_or(self.memory.structs().len()) as u32,
			nr: nr as u32,
		}
	}
}
