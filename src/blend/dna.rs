use crate::blend::bytes::{Cursor, put_uint};
use crate::blend::{BlendError, CatalogLimits, Endianness, Result};

/// Raw DNA tables as stored in a schema payload.
#[derive(Debug, Clone)]
pub struct Dna {
	/// Field declarator strings from `NAME`.
	pub names: Vec<Box<str>>,
	/// Type name strings from `TYPE`.
	pub types: Vec<Box<str>>,
	/// Type byte sizes from `TLEN`.
	pub tlen: Vec<u16>,
	/// Struct declarations from `STRC`.
	pub structs: Vec<DnaStruct>,
	/// Fast mapping `type_idx -> struct_idx`.
	pub struct_for_type: Vec<Option<u32>>,
}

/// One struct declaration.
#[derive(Debug, Clone)]
pub struct DnaStruct {
	/// Type index for this struct's name.
	pub type_idx: u16,
	/// Field declarations in source order.
	pub fields: Vec<DnaField>,
}

/// One field declaration.
#[derive(Debug, Clone, Copy)]
pub struct DnaField {
	/// Type table index for field type.
	pub type_idx: u16,
	/// Name table index for field declarator text.
	pub name_idx: u16,
}

impl Dna {
	/// Parse schema payload bytes into DNA tables.
	///
	/// A leading `SDNA` tag is optional. Table counts above
	/// `limits.max_table_size` fail instead of allocating.
	pub fn parse(payload: &[u8], endianness: Endianness, limits: &CatalogLimits) -> Result<Self> {
		let mut tables = Tables {
			cursor: Cursor::new(payload),
			endianness,
			limits,
		};
		if tables.cursor.peek_code4() == Some(*b"SDNA") {
			tables.cursor.read_code4()?;
		}

		let names = tables.strings(*b"NAME", "name")?;
		let types = tables.strings(*b"TYPE", "type")?;
		let tlen = tables.lengths(types.len())?;
		let structs = tables.structs(types.len(), names.len())?;
		let struct_for_type = index_struct_types(&structs, types.len())?;

		Ok(Self {
			names,
			types,
			tlen,
			structs,
			struct_for_type,
		})
	}

	/// Serialize back to a tagged schema payload in `endianness`.
	pub fn to_bytes(&self, endianness: Endianness) -> Vec<u8> {
		let mut out = b"SDNA".to_vec();
		put_strings(&mut out, *b"NAME", &self.names, endianness);
		put_strings(&mut out, *b"TYPE", &self.types, endianness);

		out.extend_from_slice(b"TLEN");
		for len in &self.tlen {
			put_uint(&mut out, u64::from(*len), 2, endianness);
		}
		pad4(&mut out);

		out.extend_from_slice(b"STRC");
		put_uint(&mut out, self.structs.len() as u64, 4, endianness);
		for item in &self.structs {
			let words = [item.type_idx, item.fields.len() as u16]
				.into_iter()
				.chain(item.fields.iter().flat_map(|field| [field.type_idx, field.name_idx]));
			for word in words {
				put_uint(&mut out, u64::from(word), 2, endianness);
			}
		}
		out
	}

	/// Type name at `type_idx`.
	pub fn type_name(&self, type_idx: u16) -> &str {
		&self.types[type_idx as usize]
	}

	/// Declarator text at `name_idx`.
	pub fn field_name(&self, name_idx: u16) -> &str {
		&self.names[name_idx as usize]
	}
}

struct Tables<'a> {
	cursor: Cursor<'a>,
	endianness: Endianness,
	limits: &'a CatalogLimits,
}

impl Tables<'_> {
	fn tag(&mut self, expected: [u8; 4]) -> Result<()> {
		let at = self.cursor.pos();
		let got = self.cursor.read_code4()?;
		if got != expected {
			return Err(BlendError::DnaBadTag { expected, got, at });
		}
		Ok(())
	}

	fn count(&mut self, kind: &'static str) -> Result<usize> {
		let count = self.cursor.read_u32(self.endianness)? as usize;
		let max = self.limits.max_table_size;
		if count > max {
			return Err(BlendError::TableTooLarge { kind, count, max });
		}
		Ok(count)
	}

	fn strings(&mut self, tag: [u8; 4], kind: &'static str) -> Result<Vec<Box<str>>> {
		self.tag(tag)?;
		let count = self.count(kind)?;
		let mut out = Vec::with_capacity(count);
		for _ in 0..count {
			let bytes = self.cursor.read_cstring_bytes()?;
			out.push(String::from_utf8_lossy(bytes).into());
		}
		self.cursor.align4()?;
		Ok(out)
	}

	fn lengths(&mut self, count: usize) -> Result<Vec<u16>> {
		self.tag(*b"TLEN")?;
		let out = (0..count).map(|_| self.cursor.read_u16(self.endianness)).collect::<Result<Vec<_>>>()?;
		self.cursor.align4()?;
		Ok(out)
	}

	fn structs(&mut self, types: usize, names: usize) -> Result<Vec<DnaStruct>> {
		self.tag(*b"STRC")?;
		let count = self.count("struct")?;
		let mut out = Vec::with_capacity(count);
		for _ in 0..count {
			let type_idx = self.index("struct.type_idx", types)?;
			let field_count = self.cursor.read_u16(self.endianness)? as usize;
			let fields = (0..field_count)
				.map(|_| {
					Ok(DnaField {
						type_idx: self.index("field.type_idx", types)?,
						name_idx: self.index("field.name_idx", names)?,
					})
				})
				.collect::<Result<Vec<_>>>()?;
			out.push(DnaStruct { type_idx, fields });
		}
		Ok(out)
	}

	fn index(&mut self, kind: &'static str, len: usize) -> Result<u16> {
		let idx = self.cursor.read_u16(self.endianness)?;
		if usize::from(idx) >= len {
			return Err(BlendError::DnaIndexOutOfRange {
				kind,
				idx: u32::from(idx),
				max: len.saturating_sub(1) as u32,
			});
		}
		Ok(idx)
	}
}

fn index_struct_types(structs: &[DnaStruct], types: usize) -> Result<Vec<Option<u32>>> {
	let mut out = vec![None; types];
	for (idx, item) in structs.iter().enumerate() {
		let slot = &mut out[item.type_idx as usize];
		if let Some(first) = *slot {
			return Err(BlendError::DnaDuplicateStructType {
				type_idx: item.type_idx,
				first,
				second: idx as u32,
			});
		}
		*slot = Some(idx as u32);
	}
	Ok(out)
}

fn put_strings(out: &mut Vec<u8>, tag: [u8; 4], items: &[Box<str>], endianness: Endianness) {
	out.extend_from_slice(&tag);
	put_uint(out, items.len() as u64, 4, endianness);
	for item in items {
		out.extend_from_slice(item.as_bytes());
		out.push(0);
	}
	pad4(out);
}

fn pad4(out: &mut Vec<u8>) {
	while out.len() % 4 != 0 {
		out.push(0);
	}
}

#[cfg(test)]
mod tests;
