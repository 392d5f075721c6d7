use crate::blend::Endianness;
use crate::blend::bytes::{read_uint, write_uint};

/// Numeric class of a primitive DNA type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimKind {
	/// Two's complement integer.
	Signed,
	/// Unsigned integer.
	Unsigned,
	/// IEEE-754 float.
	Float,
}

/// Primitive DNA type with its stored width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Primitive {
	/// Numeric class.
	pub kind: PrimKind,
	/// Width in bytes (1, 2, 4 or 8).
	pub size: usize,
}

impl Primitive {
	/// Classify a type name and its `TLEN` width; `None` for non-numeric types.
	pub fn classify(type_name: &str, size: usize) -> Option<Self> {
		let kind = match type_name {
			"char" | "int8_t" | "short" | "int16_t" | "int" | "int32_t" | "long" | "int64_t" => PrimKind::Signed,
			"uchar" | "uint8_t" | "ushort" | "uint16_t" | "uint" | "uint32_t" | "ulong" | "uint64_t" | "bool" => PrimKind::Unsigned,
			"float" | "double" => PrimKind::Float,
			_ => return None,
		};
		let valid = match kind {
			PrimKind::Float => matches!(size, 4 | 8),
			_ => matches!(size, 1 | 2 | 4 | 8),
		};
		valid.then_some(Self { kind, size })
	}

	/// Whether this is an integer type.
	pub fn is_integer(self) -> bool {
		self.kind != PrimKind::Float
	}
}

/// Common accumulator used to convert between primitive types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
	/// Signed integer value.
	Int(i64),
	/// Unsigned integer value.
	UInt(u64),
	/// Floating-point value.
	Float(f64),
}

impl Number {
	/// Decode one element of `prim` from `bytes`.
	pub fn decode(prim: Primitive, bytes: &[u8], endianness: Endianness) -> Self {
		let raw = read_uint(&bytes[..prim.size], endianness);
		match (prim.kind, prim.size) {
			(PrimKind::Float, 4) => Self::Float(f64::from(f32::from_bits(raw as u32))),
			(PrimKind::Float, _) => Self::Float(f64::from_bits(raw)),
			(PrimKind::Unsigned, _) => Self::UInt(raw),
			(PrimKind::Signed, 1) => Self::Int(i64::from(raw as u8 as i8)),
			(PrimKind::Signed, 2) => Self::Int(i64::from(raw as u16 as i16)),
			(PrimKind::Signed, 4) => Self::Int(i64::from(raw as u32 as i32)),
			(PrimKind::Signed, _) => Self::Int(raw as i64),
		}
	}

	/// Encode as `prim` into `out` using C conversion rules.
	///
	/// Integer narrowing wraps, float to integer truncates toward zero and saturates.
	pub fn encode(self, prim: Primitive, out: &mut [u8], endianness: Endianness) {
		let bits = match prim.kind {
			PrimKind::Float => match prim.size {
				4 => u64::from(self.as_f32().to_bits()),
				_ => self.as_f64().to_bits(),
			},
			PrimKind::Signed | PrimKind::Unsigned => match self {
				Self::Int(value) => value as u64,
				Self::UInt(value) => value,
				Self::Float(value) => float_to_int_bits(value, prim),
			},
		};
		write_uint(&mut out[..prim.size], bits, endianness);
	}

	fn as_f64(self) -> f64 {
		match self {
			Self::Int(value) => value as f64,
			Self::UInt(value) => value as f64,
			Self::Float(value) => value,
		}
	}

	fn as_f32(self) -> f32 {
		match self {
			Self::Int(value) => value as f32,
			Self::UInt(value) => value as f32,
			Self::Float(value) => value as f32,
		}
	}
}

fn float_to_int_bits(value: f64, prim: Primitive) -> u64 {
	match (prim.kind, prim.size) {
		(PrimKind::Signed, 1) => (value as i8) as u8 as u64,
		(PrimKind::Signed, 2) => (value as i16) as u16 as u64,
		(PrimKind::Signed, 4) => (value as i32) as u32 as u64,
		(PrimKind::Signed, _) => (value as i64) as u64,
		(_, 1) => u64::from(value as u8),
		(_, 2) => u64::from(value as u16),
		(_, 4) => u64::from(value as u32),
		_ => value as u64,
	}
}

/// Convert elements from `src` into `dst` until either side runs out.
///
/// Returns the number of elements written.
pub fn cast_elements(src: &[u8], from: Primitive, from_order: Endianness, dst: &mut [u8], to: Primitive, to_order: Endianness) -> usize {
	let count = (src.len() / from.size).min(dst.len() / to.size);
	for idx in 0..count {
		let value = Number::decode(from, &src[idx * from.size..], from_order);
		value.encode(to, &mut dst[idx * to.size..], to_order);
	}
	count
}

/// Copy whole `width`-sized elements, reversing each element's bytes.
///
/// Returns the number of elements written.
pub fn copy_swapped(src: &[u8], dst: &mut [u8], width: usize) -> usize {
	if width == 0 {
		return 0;
	}
	let count = src.len().min(dst.len()) / width;
	for idx in 0..count {
		let range = idx * width..(idx + 1) * width;
		dst[range.clone()].copy_from_slice(&src[range.clone()]);
		dst[range].reverse();
	}
	count
}

/// Reverse the byte order of every `width`-sized element in place.
pub fn swap_in_place(bytes: &mut [u8], width: usize) {
	if width < 2 {
		return;
	}
	for chunk in bytes.chunks_exact_mut(width) {
		chunk.reverse();
	}
}
