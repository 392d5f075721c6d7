use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::blend::compression::{Compression, decode_bytes, encode_bytes};
use crate::blend::{BlendError, Result};

/// Access mode a stream was opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
	/// Read-only access.
	Read,
	/// Write access, truncating existing content.
	Write,
}

/// Seekable byte source/sink consumed by the reader and writer.
pub trait ByteStream {
	/// Whether the backend holds an open handle.
	fn is_open(&self) -> bool;
	/// Whether the position reached the end of the data.
	fn eof(&self) -> bool;
	/// Read up to `buf.len()` bytes, returning how many were read.
	fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
	/// Write `buf`, returning how many bytes were accepted.
	fn write(&mut self, buf: &[u8]) -> Result<usize>;
	/// Move the position, returning the new absolute offset.
	fn seek(&mut self, pos: SeekFrom) -> Result<u64>;
	/// Current absolute offset.
	fn position(&self) -> u64;
	/// Total size in bytes.
	fn size(&self) -> u64;

	/// Fill `buf` completely or fail with [`BlendError::UnexpectedEof`].
	fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
		let mut filled = 0;
		while filled < buf.len() {
			let read = self.read(&mut buf[filled..])?;
			if read == 0 {
				return Err(BlendError::UnexpectedEof {
					at: self.position() as usize,
					need: buf.len() - filled,
					rem: 0,
				});
			}
			filled += read;
		}
		Ok(())
	}

	/// Write all of `buf`.
	fn write_all(&mut self, buf: &[u8]) -> Result<()> {
		let mut done = 0;
		while done < buf.len() {
			let wrote = self.write(&buf[done..])?;
			if wrote == 0 {
				return Err(BlendError::Io(std::io::ErrorKind::WriteZero.into()));
			}
			done += wrote;
		}
		Ok(())
	}

	/// Bytes between the position and the end.
	fn remaining(&self) -> u64 {
		self.size().saturating_sub(self.position())
	}
}

/// Growable in-memory buffer.
#[derive(Debug, Default, Clone)]
pub struct MemoryStream {
	data: Vec<u8>,
	pos: usize,
}

impl MemoryStream {
	/// Wrap existing bytes, positioned at the start.
	pub fn new(data: Vec<u8>) -> Self {
		Self { data, pos: 0 }
	}

	/// Borrow the buffer.
	pub fn as_slice(&self) -> &[u8] {
		&self.data
	}

	/// Take the buffer.
	pub fn into_inner(self) -> Vec<u8> {
		self.data
	}
}

impl ByteStream for MemoryStream {
	fn is_open(&self) -> bool {
		true
	}

	fn eof(&self) -> bool {
		self.pos >= self.data.len()
	}

	fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
		let rem = self.data.get(self.pos..).unwrap_or(&[]);
		let n = rem.len().min(buf.len());
		buf[..n].copy_from_slice(&rem[..n]);
		self.pos += n;
		Ok(n)
	}

	fn write(&mut self, buf: &[u8]) -> Result<usize> {
		let end = self.pos + buf.len();
		if end > self.data.len() {
			self.data.try_reserve(end - self.data.len()).map_err(|_| BlendError::Allocation { size: end })?;
			self.data.resize(end, 0);
		}
		self.data[self.pos..end].copy_from_slice(buf);
		self.pos = end;
		Ok(buf.len())
	}

	fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
		let target = match pos {
			SeekFrom::Start(offset) => i128::from(offset),
			SeekFrom::End(offset) => self.data.len() as i128 + i128::from(offset),
			SeekFrom::Current(offset) => self.pos as i128 + i128::from(offset),
		};
		if target < 0 {
			return Err(BlendError::Io(std::io::ErrorKind::InvalidInput.into()));
		}
		self.pos = usize::try_from(target).map_err(|_| BlendError::Io(std::io::ErrorKind::InvalidInput.into()))?;
		Ok(self.pos as u64)
	}

	fn position(&self) -> u64 {
		self.pos as u64
	}

	fn size(&self) -> u64 {
		self.data.len() as u64
	}
}

/// Uncompressed random-access file.
#[derive(Debug)]
pub struct FileStream {
	file: Option<File>,
	mode: Mode,
	pos: u64,
	size: u64,
}

impl FileStream {
	/// Open `path` in the given mode.
	pub fn open(path: impl AsRef<Path>, mode: Mode) -> Result<Self> {
		let file = match mode {
			Mode::Read => File::open(path)?,
			Mode::Write => OpenOptions::new().write(true).create(true).truncate(true).open(path)?,
		};
		let size = file.metadata()?.len();
		Ok(Self {
			file: Some(file),
			mode,
			pos: 0,
			size,
		})
	}

	/// Release the handle.
	pub fn close(&mut self) -> Result<()> {
		if let Some(mut file) = self.file.take()
			&& self.mode == Mode::Write
		{
			file.flush()?;
		}
		Ok(())
	}

	fn handle(&mut self) -> Result<&mut File> {
		self.file.as_mut().ok_or_else(|| BlendError::Io(std::io::ErrorKind::NotConnected.into()))
	}
}

impl ByteStream for FileStream {
	fn is_open(&self) -> bool {
		self.file.is_some()
	}

	fn eof(&self) -> bool {
		self.pos >= self.size
	}

	fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
		let read = self.handle()?.read(buf)?;
		self.pos += read as u64;
		Ok(read)
	}

	fn write(&mut self, buf: &[u8]) -> Result<usize> {
		let wrote = self.handle()?.write(buf)?;
		self.pos += wrote as u64;
		self.size = self.size.max(self.pos);
		Ok(wrote)
	}

	fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
		self.pos = self.handle()?.seek(pos)?;
		Ok(self.pos)
	}

	fn position(&self) -> u64 {
		self.pos
	}

	fn size(&self) -> u64 {
		self.size
	}
}

/// Gzip or zstd file held fully inflated in memory.
///
/// Read mode inflates at open. Write mode buffers and deflates on [`CompressedStream::finish`].
#[derive(Debug)]
pub struct CompressedStream {
	codec: Compression,
	mode: Mode,
	inner: MemoryStream,
	path: Option<PathBuf>,
}

impl CompressedStream {
	/// Open a compressed file for reading, inflating at most `limit` bytes.
	pub fn open_read(path: impl AsRef<Path>, limit: usize) -> Result<Self> {
		let raw = std::fs::read(path)?;
		let (codec, data) = decode_bytes(raw, limit)?;
		Ok(Self {
			codec,
			mode: Mode::Read,
			inner: MemoryStream::new(data),
			path: None,
		})
	}

	/// Create a compressed file for writing with the given codec.
	pub fn create(path: impl AsRef<Path>, codec: Compression) -> Self {
		Self {
			codec,
			mode: Mode::Write,
			inner: MemoryStream::default(),
			path: Some(path.as_ref().to_path_buf()),
		}
	}

	/// Codec of this stream.
	pub fn codec(&self) -> Compression {
		self.codec
	}

	/// Deflate buffered output to disk and close the stream.
	pub fn finish(&mut self) -> Result<()> {
		if self.mode != Mode::Write {
			return Ok(());
		}
		let Some(path) = self.path.take() else {
			return Ok(());
		};
		let encoded = encode_bytes(self.codec, self.inner.as_slice())?;
		std::fs::write(path, encoded)?;
		Ok(())
	}
}

impl Drop for CompressedStream {
	fn drop(&mut self) {
		let _ = self.finish();
	}
}

impl ByteStream for CompressedStream {
	fn is_open(&self) -> bool {
		self.mode == Mode::Read || self.path.is_some()
	}

	fn eof(&self) -> bool {
		self.inner.eof()
	}

	fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
		self.inner.read(buf)
	}

	fn write(&mut self, buf: &[u8]) -> Result<usize> {
		if self.mode != Mode::Write {
			return Err(BlendError::Io(std::io::ErrorKind::PermissionDenied.into()));
		}
		self.inner.write(buf)
	}

	fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
		self.inner.seek(pos)
	}

	fn position(&self) -> u64 {
		self.inner.position()
	}

	fn size(&self) -> u64 {
		self.inner.size()
	}
}
