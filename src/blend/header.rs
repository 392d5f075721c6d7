use crate::blend::{BlendError, Result};

/// Byte endianness marker stored in file headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endianness {
	/// Little-endian byte order (`v` marker).
	Little,
	/// Big-endian byte order (`V` marker).
	Big,
}

impl Endianness {
	/// Byte order of the running process.
	pub fn native() -> Self {
		if cfg!(target_endian = "big") { Self::Big } else { Self::Little }
	}

	/// Stable lowercase label.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Little => "little",
			Self::Big => "big",
		}
	}

	fn marker(self) -> u8 {
		match self {
			Self::Little => b'v',
			Self::Big => b'V',
		}
	}
}

/// Pointer width carried by the header and used for every stored address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerWidth {
	/// 4-byte pointers (`_` marker).
	W32,
	/// 8-byte pointers (`-` marker).
	W64,
}

impl PointerWidth {
	/// Pointer width of the running process.
	pub fn native() -> Self {
		if cfg!(target_pointer_width = "32") { Self::W32 } else { Self::W64 }
	}

	/// Width in bytes.
	pub fn bytes(self) -> usize {
		match self {
			Self::W32 => 4,
			Self::W64 => 8,
		}
	}

	fn marker(self) -> u8 {
		match self {
			Self::W32 => b'_',
			Self::W64 => b'-',
		}
	}
}

/// Storage layout of one side of a link: pointer width plus byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Layout {
	/// Stored pointer width.
	pub pointer_width: PointerWidth,
	/// Byte order of multi-byte scalars.
	pub endianness: Endianness,
}

impl Layout {
	/// Layout of the running process.
	pub fn native() -> Self {
		Self {
			pointer_width: PointerWidth::native(),
			endianness: Endianness::native(),
		}
	}

	/// Pointer size in bytes.
	pub fn pointer_size(self) -> usize {
		self.pointer_width.bytes()
	}
}

/// Container flavour: magics and reserved chunk codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Format {
	/// Expected 7-byte magic.
	pub magic: [u8; 7],
	/// Magic of the stripped variant, accepted as an alias.
	pub stripped_magic: Option<[u8; 7]>,
	/// Code of the schema chunk.
	pub schema_code: [u8; 4],
	/// Code of the end marker.
	pub end_code: [u8; 4],
	/// Legacy code whose payload is the rest of the stream.
	pub legacy_schema_code: Option<[u8; 4]>,
}

impl Format {
	/// Blender `.blend` files.
	pub const BLENDER: Self = Self {
		magic: *b"BLENDER",
		stripped_magic: Some(*b"BLENDEs"),
		schema_code: *b"DNA1",
		end_code: *b"ENDB",
		legacy_schema_code: Some(*b"SDNA"),
	};

	/// Same container with a different magic.
	pub fn with_magic(magic: [u8; 7]) -> Self {
		Self {
			magic,
			stripped_magic: None,
			..Self::BLENDER
		}
	}

	fn accepts(&self, prefix: &[u8]) -> bool {
		prefix == self.magic || self.stripped_magic.is_some_and(|alt| prefix == alt)
	}
}

impl Default for Format {
	fn default() -> Self {
		Self::BLENDER
	}
}

/// Parsed 12-byte file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
	/// Magic found in the file.
	pub magic: [u8; 7],
	/// Stored pointer width.
	pub pointer_width: PointerWidth,
	/// Stored byte order.
	pub endianness: Endianness,
	/// Three-digit producer version (for example `300`).
	pub version: u16,
}

impl FileHeader {
	/// Exact header size in bytes.
	pub const SIZE: usize = 12;
	/// Largest version the three header digits can carry.
	pub const MAX_VERSION: u16 = 999;

	/// Parse a header from the beginning of `bytes`.
	pub fn parse(bytes: &[u8], format: &Format) -> Result<Self> {
		let invalid = || BlendError::InvalidHeader {
			prefix: bytes[..bytes.len().min(7)].to_vec(),
		};

		let header = bytes.get(0..Self::SIZE).ok_or_else(invalid)?;
		if !format.accepts(&header[0..7]) {
			return Err(invalid());
		}

		let pointer_width = match header[7] {
			b'_' => PointerWidth::W32,
			b'-' => PointerWidth::W64,
			_ => return Err(invalid()),
		};
		let endianness = match header[8] {
			b'v' => Endianness::Little,
			b'V' => Endianness::Big,
			_ => return Err(invalid()),
		};
		let version = parse_digits(&header[9..12]).ok_or_else(invalid)?;

		let mut magic = [0_u8; 7];
		magic.copy_from_slice(&header[0..7]);
		Ok(Self {
			magic,
			pointer_width,
			endianness,
			version,
		})
	}

	/// Header describing the running process.
	///
	/// Only the last three decimal digits of `version` are kept.
	pub fn native(format: &Format, version: u16) -> Self {
		let layout = Layout::native();
		Self {
			magic: format.magic,
			pointer_width: layout.pointer_width,
			endianness: layout.endianness,
			version: version % 1000,
		}
	}

	/// Storage layout declared by this header.
	pub fn layout(&self) -> Layout {
		Layout {
			pointer_width: self.pointer_width,
			endianness: self.endianness,
		}
	}

	/// Serialize to the 12-byte on-disk form.
	///
	/// The version is written as its last three decimal digits.
	pub fn to_bytes(&self) -> [u8; Self::SIZE] {
		let mut out = [0_u8; Self::SIZE];
		out[0..7].copy_from_slice(&self.magic);
		out[7] = self.pointer_width.marker();
		out[8] = self.endianness.marker();
		let version = self.version % 1000;
		out[9] = b'0' + (version / 100) as u8;
		out[10] = b'0' + (version / 10 % 10) as u8;
		out[11] = b'0' + (version % 10) as u8;
		out
	}
}

fn parse_digits(bytes: &[u8]) -> Option<u16> {
	if bytes.is_empty() {
		return None;
	}

	let mut value = 0_u16;
	for byte in bytes {
		if !byte.is_ascii_digit() {
			return None;
		}
		value = value * 10 + u16::from(*byte - b'0');
	}
	Some(value)
}
