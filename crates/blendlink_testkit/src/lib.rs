//! Shared test helpers: synthetic DNA payloads and whole chunked files.

/// Byte order used when serializing fixtures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
	/// Little-endian (`v` marker).
	Little,
	/// Big-endian (`V` marker).
	Big,
}

impl Order {
	/// Byte order of the machine running the tests.
	pub fn native() -> Self {
		if cfg!(target_endian = "big") { Self::Big } else { Self::Little }
	}

	fn marker(self) -> u8 {
		match self {
			Self::Little => b'v',
			Self::Big => b'V',
		}
	}
}

/// Pointer width of the machine running the tests, in bytes.
pub fn native_pointer_size() -> usize {
	std::mem::size_of::<usize>()
}

/// Builder for a `SDNA` payload.
///
/// Struct lengths are computed from member declarations with the builder's
/// pointer size unless overridden with [`SchemaBuilder::add_struct_with_len`].
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
	pointer_size: usize,
	names: Vec<String>,
	types: Vec<(String, u16)>,
	structs: Vec<(u16, Vec<(u16, u16)>)>,
}

impl SchemaBuilder {
	/// Start an empty schema for the given pointer size.
	pub fn new(pointer_size: usize) -> Self {
		Self {
			pointer_size,
			names: Vec::new(),
			types: Vec::new(),
			structs: Vec::new(),
		}
	}

	/// Start a schema pre-populated with the usual primitive types.
	pub fn with_primitives(pointer_size: usize) -> Self {
		let mut out = Self::new(pointer_size);
		for (name, len) in [
			("char", 1),
			("uchar", 1),
			("short", 2),
			("ushort", 2),
			("int", 4),
			("uint", 4),
			("long", 4),
			("ulong", 4),
			("float", 4),
			("double", 8),
			("int64_t", 8),
			("uint64_t", 8),
			("void", 0),
		] {
			out = out.primitive(name, len);
		}
		out
	}

	/// Register a primitive type with its byte length.
	pub fn primitive(mut self, name: &str, len: u16) -> Self {
		self.type_index(name, len);
		self
	}

	/// Register a struct; members are `(type, declaration)` pairs.
	pub fn add_struct(self, name: &str, members: &[(&str, &str)]) -> Self {
		let len = members.iter().map(|(ty, decl)| self.member_len(ty, decl)).sum::<usize>();
		self.add_struct_with_len(name, members, len as u16)
	}

	/// Register a struct with an explicit declared length.
	pub fn add_struct_with_len(mut self, name: &str, members: &[(&str, &str)], len: u16) -> Self {
		let type_idx = self.type_index(name, len);
		self.types[type_idx as usize].1 = len;
		let mut fields = Vec::with_capacity(members.len());
		for (ty, decl) in members {
			let ty_idx = self.type_index(ty, 0);
			let name_idx = self.name_index(decl);
			fields.push((ty_idx, name_idx));
		}
		self.structs.push((type_idx, fields));
		self
	}

	/// Length in bytes of a registered type.
	pub fn type_len(&self, name: &str) -> usize {
		self.types.iter().find(|(item, _)| item == name).map(|(_, len)| usize::from(*len)).unwrap_or(0)
	}

	/// Serialize to payload bytes in the given order.
	pub fn build(&self, order: Order) -> Vec<u8> {
		let mut out = Vec::new();
		out.extend_from_slice(b"SDNA");
		out.extend_from_slice(b"NAME");
		put_u32(&mut out, order, self.names.len() as u32);
		for name in &self.names {
			out.extend_from_slice(name.as_bytes());
			out.push(0);
		}
		align4(&mut out);

		out.extend_from_slice(b"TYPE");
		put_u32(&mut out, order, self.types.len() as u32);
		for (name, _) in &self.types {
			out.extend_from_slice(name.as_bytes());
			out.push(0);
		}
		align4(&mut out);

		out.extend_from_slice(b"TLEN");
		for (_, len) in &self.types {
			put_u16(&mut out, order, *len);
		}
		align4(&mut out);

		out.extend_from_slice(b"STRC");
		put_u32(&mut out, order, self.structs.len() as u32);
		for (type_idx, fields) in &self.structs {
			put_u16(&mut out, order, *type_idx);
			put_u16(&mut out, order, fields.len() as u16);
			for (ty, name) in fields {
				put_u16(&mut out, order, *ty);
				put_u16(&mut out, order, *name);
			}
		}
		out
	}

	fn member_len(&self, ty: &str, decl: &str) -> usize {
		let count = decl_count(decl);
		if decl.starts_with('*') || decl.starts_with('(') {
			return self.pointer_size * count;
		}
		self.type_len(ty) * count
	}

	fn type_index(&mut self, name: &str, len: u16) -> u16 {
		if let Some(idx) = self.types.iter().position(|(item, _)| item == name) {
			return idx as u16;
		}
		self.types.push((name.to_owned(), len));
		(self.types.len() - 1) as u16
	}

	fn name_index(&mut self, name: &str) -> u16 {
		if let Some(idx) = self.names.iter().position(|item| item == name) {
			return idx as u16;
		}
		self.names.push(name.to_owned());
		(self.names.len() - 1) as u16
	}
}

fn decl_count(decl: &str) -> usize {
	if decl.contains('(') {
		return 1;
	}
	let mut total = 1;
	let mut rest = decl;
	while let Some(start) = rest.find('[') {
		let Some(end) = rest[start..].find(']') else {
			break;
		};
		total *= rest[start + 1..start + end].parse::<usize>().unwrap_or(1);
		rest = &rest[start + end + 1..];
	}
	total
}

/// Builder for a complete chunked file.
#[derive(Debug, Clone)]
pub struct FileBuilder {
	pointer_size: usize,
	order: Order,
	bytes: Vec<u8>,
}

impl FileBuilder {
	/// Write the 12-byte header and start an empty chunk list.
	pub fn new(magic: &[u8; 7], pointer_size: usize, order: Order, version: u16) -> Self {
		let mut bytes = Vec::new();
		bytes.extend_from_slice(magic);
		bytes.push(if pointer_size == 4 { b'_' } else { b'-' });
		bytes.push(order.marker());
		bytes.extend_from_slice(format!("{:03}", version % 1000).as_bytes());
		Self { pointer_size, order, bytes }
	}

	/// Blender-magic file in the host's pointer width and byte order.
	pub fn native_blender() -> Self {
		Self::new(b"BLENDER", native_pointer_size(), Order::native(), 300)
	}

	/// Fresh payload writer matching this file's layout.
	pub fn payload(&self) -> Payload {
		Payload::new(self.pointer_size, self.order)
	}

	/// Append one chunk.
	pub fn chunk(mut self, code: &[u8; 4], sdna: u32, old: u64, nr: u32, payload: &[u8]) -> Self {
		self.bytes.extend_from_slice(code);
		put_u32(&mut self.bytes, self.order, payload.len() as u32);
		if self.pointer_size == 4 {
			put_u32(&mut self.bytes, self.order, old as u32);
		} else {
			put_u64(&mut self.bytes, self.order, old);
		}
		put_u32(&mut self.bytes, self.order, sdna);
		put_u32(&mut self.bytes, self.order, nr);
		self.bytes.extend_from_slice(payload);
		self
	}

	/// Append the `DNA1` chunk.
	pub fn schema(self, dna: &[u8]) -> Self {
		self.chunk(b"DNA1", 0, 0, 1, dna)
	}

	/// Append raw bytes with no chunk framing.
	pub fn raw(mut self, bytes: &[u8]) -> Self {
		self.bytes.extend_from_slice(bytes);
		self
	}

	/// Append the `ENDB` marker and return the file bytes.
	pub fn end(self) -> Vec<u8> {
		self.chunk(b"ENDB", 0, 0, 0, &[]).bytes
	}

	/// Return the file bytes without an end marker.
	pub fn into_bytes(self) -> Vec<u8> {
		self.bytes
	}
}

/// Field-by-field writer for struct instances.
#[derive(Debug, Clone)]
pub struct Payload {
	pointer_size: usize,
	order: Order,
	bytes: Vec<u8>,
}

impl Payload {
	/// Create an empty payload for a layout.
	pub fn new(pointer_size: usize, order: Order) -> Self {
		Self {
			pointer_size,
			order,
			bytes: Vec::new(),
		}
	}

	/// Append one byte.
	pub fn u8(mut self, value: u8) -> Self {
		self.bytes.push(value);
		self
	}

	/// Append a 16-bit integer.
	pub fn i16(mut self, value: i16) -> Self {
		put_u16(&mut self.bytes, self.order, value as u16);
		self
	}

	/// Append a 32-bit integer.
	pub fn i32(mut self, value: i32) -> Self {
		put_u32(&mut self.bytes, self.order, value as u32);
		self
	}

	/// Append a 64-bit integer.
	pub fn i64(mut self, value: i64) -> Self {
		put_u64(&mut self.bytes, self.order, value as u64);
		self
	}

	/// Append a 32-bit float.
	pub fn f32(self, value: f32) -> Self {
		self.i32(value.to_bits() as i32)
	}

	/// Append a 64-bit float.
	pub fn f64(self, value: f64) -> Self {
		self.i64(value.to_bits() as i64)
	}

	/// Append a pointer-width address.
	pub fn ptr(mut self, value: u64) -> Self {
		if self.pointer_size == 4 {
			put_u32(&mut self.bytes, self.order, value as u32);
		} else {
			put_u64(&mut self.bytes, self.order, value);
		}
		self
	}

	/// Append raw bytes.
	pub fn bytes(mut self, value: &[u8]) -> Self {
		self.bytes.extend_from_slice(value);
		self
	}

	/// Append `n` zero bytes.
	pub fn zeros(mut self, n: usize) -> Self {
		self.bytes.resize(self.bytes.len() + n, 0);
		self
	}

	/// Finished payload bytes.
	pub fn build(self) -> Vec<u8> {
		self.bytes
	}
}

fn put_u16(out: &mut Vec<u8>, order: Order, value: u16) {
	match order {
		Order::Little => out.extend_from_slice(&value.to_le_bytes()),
		Order::Big => out.extend_from_slice(&value.to_be_bytes()),
	}
}

fn put_u32(out: &mut Vec<u8>, order: Order, value: u32) {
	match order {
		Order::Little => out.extend_from_slice(&value.to_le_bytes()),
		Order::Big => out.extend_from_slice(&value.to_be_bytes()),
	}
}

fn put_u64(out: &mut Vec<u8>, order: Order, value: u64) {
	match order {
		Order::Little => out.extend_from_slice(&value.to_le_bytes()),
		Order::Big => out.extend_from_slice(&value.to_be_bytes()),
	}
}

fn align4(out: &mut Vec<u8>) {
	while out.len() % 4 != 0 {
		out.push(0);
	}
}
