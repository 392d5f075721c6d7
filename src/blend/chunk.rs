use crate::blend::bytes::{Cursor, put_uint};
use crate::blend::{BlendError, Layout, PointerWidth, Result};

/// Old-memory address as stored in a chunk header.
///
/// The width is carried explicitly so 32-bit files read on 64-bit hosts
/// (and the reverse) widen or narrow visibly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OldAddress {
	/// 4-byte address from a 32-bit producer.
	Width32(u32),
	/// 8-byte address from a 64-bit producer.
	Width64(u64),
}

impl OldAddress {
	/// Build an address of the given width, truncating when narrowing.
	pub fn new(width: PointerWidth, value: u64) -> Self {
		match width {
			PointerWidth::W32 => Self::Width32(value as u32),
			PointerWidth::W64 => Self::Width64(value),
		}
	}

	/// Zero-extended 64-bit value, used as the ledger key.
	pub fn widen(self) -> u64 {
		match self {
			Self::Width32(value) => u64::from(value),
			Self::Width64(value) => value,
		}
	}

	/// Value truncated to 32 bits.
	pub fn narrow(self) -> u32 {
		match self {
			Self::Width32(value) => value,
			Self::Width64(value) => value as u32,
		}
	}

	/// Width this address was stored with.
	pub fn width(self) -> PointerWidth {
		match self {
			Self::Width32(_) => PointerWidth::W32,
			Self::Width64(_) => PointerWidth::W64,
		}
	}

	/// Whether the address is null.
	pub fn is_null(self) -> bool {
		self.widen() == 0
	}
}

/// One chunk record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
	/// Four-byte chunk code (two-character codes are zero padded).
	pub code: [u8; 4],
	/// Payload byte length.
	pub len: u32,
	/// Producer-side address of the payload.
	pub old: OldAddress,
	/// Struct index into the producing schema.
	pub sdna_nr: u32,
	/// Number of struct instances in the payload.
	pub nr: u32,
}

impl ChunkHeader {
	/// Encoded size for a pointer width.
	pub fn size(width: PointerWidth) -> usize {
		16 + width.bytes()
	}

	/// Parse a chunk header; `at` is the stream offset used in errors.
	pub fn parse(bytes: &[u8], layout: Layout, at: u64) -> Result<Self> {
		let mut cursor = Cursor::new(bytes);
		let code = cursor.read_code4()?;

		let len = cursor.read_i32(layout.endianness)?;
		if len < 0 {
			return Err(BlendError::InvalidLength { at, len: i64::from(len) });
		}

		let old = OldAddress::new(layout.pointer_width, cursor.read_ptr(layout.pointer_width, layout.endianness)?);
		let sdna_nr = cursor.read_u32(layout.endianness)?;

		let nr = cursor.read_i32(layout.endianness)?;
		if nr < 0 {
			return Err(BlendError::InvalidLength { at, len: i64::from(nr) });
		}

		Ok(Self {
			code,
			len: len as u32,
			old,
			sdna_nr,
			nr: nr as u32,
		})
	}

	/// Append the encoded header using `layout`.
	pub fn write(&self, out: &mut Vec<u8>, layout: Layout) {
		out.extend_from_slice(&self.code);
		put_uint(out, u64::from(self.len), 4, layout.endianness);
		put_uint(out, self.old.widen(), layout.pointer_size(), layout.endianness);
		put_uint(out, u64::from(self.sdna_nr), 4, layout.endianness);
		put_uint(out, u64::from(self.nr), 4, layout.endianness);
	}

	/// Whether this header carries `code`.
	pub fn is(&self, code: [u8; 4]) -> bool {
		self.code == code
	}
}

/// Render a chunk code as a printable label.
pub fn code_label(code: [u8; 4]) -> String {
	let mut out = String::new();
	for byte in code {
		if byte == 0 {
			continue;
		}
		if byte.is_ascii_graphic() || byte == b' ' {
			out.push(char::from(byte));
		} else {
			out.push('.');
		}
	}
	if out.is_empty() { "....".to_owned() } else { out }
}

#[cfg(test)]
mod tests;
