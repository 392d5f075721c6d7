use std::io::{Read, Write};
use std::path::Path;

use crate::blend::stream::{ByteStream, CompressedStream, FileStream, Mode};
use crate::blend::{BlendError, Result};

/// zstd frame magic.
pub const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];
/// gzip member magic.
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Compression mode detected for a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
	/// Raw uncompressed stream.
	None,
	/// gzip-compressed stream.
	Gzip,
	/// zstd-compressed stream.
	Zstd,
}

impl Compression {
	/// Render compression mode as a stable lowercase label.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::None => "none",
			Self::Gzip => "gzip",
			Self::Zstd => "zstd",
		}
	}

	/// Classify leading bytes.
	pub fn detect(bytes: &[u8]) -> Self {
		if bytes.starts_with(&ZSTD_MAGIC) {
			Self::Zstd
		} else if bytes.starts_with(&GZIP_MAGIC) {
			Self::Gzip
		} else {
			Self::None
		}
	}

	/// Classify the first bytes of the file at `path`.
	pub fn detect_path(path: impl AsRef<Path>) -> Result<Self> {
		let mut prefix = [0_u8; 4];
		let read = read_prefix(path.as_ref(), &mut prefix)?;
		Ok(Self::detect(&prefix[..read]))
	}
}

/// Detect and decode compression, returning `(mode, decoded_bytes)`.
pub fn decode_bytes(raw: Vec<u8>, limit: usize) -> Result<(Compression, Vec<u8>)> {
	match Compression::detect(&raw) {
		Compression::None => Ok((Compression::None, raw)),
		Compression::Zstd => {
			let decoder = zstd::stream::read::Decoder::new(raw.as_slice())?;
			Ok((Compression::Zstd, read_capped(decoder, limit)?))
		}
		Compression::Gzip => {
			let decoder = libflate::gzip::Decoder::new(raw.as_slice())?;
			Ok((Compression::Gzip, read_capped(decoder, limit)?))
		}
	}
}

/// Compress `data` with `codec`.
pub fn encode_bytes(codec: Compression, data: &[u8]) -> Result<Vec<u8>> {
	match codec {
		Compression::None => Ok(data.to_vec()),
		Compression::Zstd => Ok(zstd::stream::encode_all(data, 0)?),
		Compression::Gzip => {
			let mut encoder = libflate::gzip::Encoder::new(Vec::new())?;
			encoder.write_all(data)?;
			Ok(encoder.finish().into_result()?)
		}
	}
}

/// Open `path` for reading with the backend its leading bytes call for.
pub fn open_stream(path: impl AsRef<Path>, limit: usize) -> Result<Box<dyn ByteStream>> {
	let path = path.as_ref();
	match Compression::detect_path(path)? {
		Compression::None => Ok(Box::new(FileStream::open(path, Mode::Read)?)),
		_ => Ok(Box::new(CompressedStream::open_read(path, limit)?)),
	}
}

fn read_prefix(path: &Path, buf: &mut [u8]) -> Result<usize> {
	let mut file = std::fs::File::open(path)?;
	let mut filled = 0;
	while filled < buf.len() {
		let read = file.read(&mut buf[filled..])?;
		if read == 0 {
			break;
		}
		filled += read;
	}
	Ok(filled)
}

fn read_capped(mut decoder: impl Read, limit: usize) -> Result<Vec<u8>> {
	let mut out = Vec::new();
	let mut buf = [0_u8; 8192];

	loop {
		let read = decoder.read(&mut buf)?;
		if read == 0 {
			break;
		}

		if out.len() + read > limit {
			return Err(BlendError::DecompressedTooLarge { limit });
		}

		out.extend_from_slice(&buf[..read]);
	}

	Ok(out)
}
