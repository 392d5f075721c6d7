use crate::blend::{BlendError, Endianness, PointerWidth, Result};

/// Simple bounded cursor over an immutable byte slice.
pub struct Cursor<'a> {
	bytes: &'a [u8],
	pos: usize,
}

impl<'a> Cursor<'a> {
	/// Create a cursor at position 0.
	pub fn new(bytes: &'a [u8]) -> Self {
		Self { bytes, pos: 0 }
	}

	/// Return current byte offset.
	pub fn pos(&self) -> usize {
		self.pos
	}

	/// Return remaining unread bytes.
	pub fn remaining(&self) -> usize {
		self.bytes.len().saturating_sub(self.pos)
	}

	/// Read exactly `n` bytes and advance cursor.
	pub fn read_exact(&mut self, n: usize) -> Result<&'a [u8]> {
		if n > self.remaining() {
			return Err(BlendError::UnexpectedEof {
				at: self.pos,
				need: n,
				rem: self.remaining(),
			});
		}

		let start = self.pos;
		self.pos += n;
		Ok(&self.bytes[start..self.pos])
	}

	/// Read a four-byte code.
	pub fn read_code4(&mut self) -> Result<[u8; 4]> {
		let raw = self.read_exact(4)?;
		let mut out = [0_u8; 4];
		out.copy_from_slice(raw);
		Ok(out)
	}

	/// Return the next four bytes without advancing.
	pub fn peek_code4(&self) -> Option<[u8; 4]> {
		let raw = self.bytes.get(self.pos..self.pos + 4)?;
		let mut out = [0_u8; 4];
		out.copy_from_slice(raw);
		Some(out)
	}

	/// Read a `u16` using the selected endianness.
	pub fn read_u16(&mut self, endianness: Endianness) -> Result<u16> {
		let raw = self.read_exact(2)?;
		Ok(read_uint(raw, endianness) as u16)
	}

	/// Read a `u32` using the selected endianness.
	pub fn read_u32(&mut self, endianness: Endianness) -> Result<u32> {
		let raw = self.read_exact(4)?;
		Ok(read_uint(raw, endianness) as u32)
	}

	/// Read an `i32` using the selected endianness.
	pub fn read_i32(&mut self, endianness: Endianness) -> Result<i32> {
		Ok(self.read_u32(endianness)? as i32)
	}

	/// Read a `u64` using the selected endianness.
	pub fn read_u64(&mut self, endianness: Endianness) -> Result<u64> {
		let raw = self.read_exact(8)?;
		Ok(read_uint(raw, endianness))
	}

	/// Read a pointer-sized unsigned integer and widen to `u64`.
	pub fn read_ptr(&mut self, width: PointerWidth, endianness: Endianness) -> Result<u64> {
		match width {
			PointerWidth::W32 => Ok(u64::from(self.read_u32(endianness)?)),
			PointerWidth::W64 => self.read_u64(endianness),
		}
	}

	/// Advance to the next 4-byte aligned position.
	pub fn align4(&mut self) -> Result<()> {
		let aligned = (self.pos + 3) & !3;
		let skip = aligned.saturating_sub(self.pos);
		let _ = self.read_exact(skip)?;
		Ok(())
	}

	/// Read a zero-terminated byte string without the terminator.
	pub fn read_cstring_bytes(&mut self) -> Result<&'a [u8]> {
		let start = self.pos;
		let rem = self.bytes.get(self.pos..).unwrap_or(&[]);
		let Some(rel_end) = rem.iter().position(|byte| *byte == 0) else {
			return Err(BlendError::UnexpectedEof {
				at: self.pos,
				need: 1,
				rem: self.remaining(),
			});
		};

		let end = start + rel_end;
		self.pos = end + 1;
		Ok(&self.bytes[start..end])
	}
}

/// Decode an unsigned integer of 1..=8 bytes.
pub fn read_uint(raw: &[u8], endianness: Endianness) -> u64 {
	let mut value = 0_u64;
	match endianness {
		Endianness::Little => {
			for byte in raw.iter().rev() {
				value = (value << 8) | u64::from(*byte);
			}
		}
		Endianness::Big => {
			for byte in raw {
				value = (value << 8) | u64::from(*byte);
			}
		}
	}
	value
}

/// Encode the low `out.len()` bytes of `value`.
pub fn write_uint(out: &mut [u8], value: u64, endianness: Endianness) {
	let len = out.len();
	for (idx, slot) in out.iter_mut().enumerate() {
		let shift = match endianness {
			Endianness::Little => idx,
			Endianness::Big => len - 1 - idx,
		};
		*slot = if shift < 8 { (value >> (shift * 8)) as u8 } else { 0 };
	}
}

/// Append the low `len` bytes of `value` to `out`.
pub fn put_uint(out: &mut Vec<u8>, value: u64, len: usize, endianness: Endianness) {
	let start = out.len();
	out.resize(start + len, 0);
	write_uint(&mut out[start..], value, endianness);
}
