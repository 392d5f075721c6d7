use std::rc::Rc;

use crate::blend::decl::parse_field_decl;
use crate::blend::diag::{Diagnostics, Severity, TracingDiagnostics};
use crate::blend::hash::{KeyMap, NameKey, key_map_with_capacity};
use crate::blend::primitive::Primitive;
use crate::blend::{BlendError, CatalogLimits, Dna, Layout, Result};

/// Small flag set shared by struct definitions and link tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Flags(u8);

impl Flags {
	/// Struct or member has a counterpart in the other schema.
	pub const CAN_LINK: Self = Self(1);
	/// Member has no usable counterpart; its bytes stay zero.
	pub const MISSING: Self = Self(1 << 1);
	/// Flattened size differs from the declared struct length.
	pub const MISALIGNED: Self = Self(1 << 2);
	/// File member nothing in memory reads from.
	pub const SKIP: Self = Self(1 << 3);
	/// Linked members differ in numeric type and need conversion.
	pub const NEED_CAST: Self = Self(1 << 4);

	/// Empty set.
	pub const fn empty() -> Self {
		Self(0)
	}

	/// Whether every bit of `other` is set.
	pub fn contains(self, other: Self) -> bool {
		self.0 & other.0 == other.0
	}

	/// Set the bits of `other`.
	pub fn insert(&mut self, other: Self) {
		self.0 |= other.0;
	}

	/// Labels of the set bits.
	pub fn labels(self) -> Vec<&'static str> {
		[
			(Self::CAN_LINK, "can_link"),
			(Self::MISSING, "missing"),
			(Self::MISALIGNED, "misaligned"),
			(Self::SKIP, "skip"),
			(Self::NEED_CAST, "need_cast"),
		]
		.into_iter()
		.filter(|(flag, _)| self.contains(*flag))
		.map(|(_, label)| label)
		.collect()
	}
}

/// One parsed declaration from the `NAME` table.
#[derive(Debug, Clone)]
pub struct SchemaName {
	/// Declaration text as stored (for example `*mat[4]`).
	pub raw: Box<str>,
	/// Identifier without stars or extents, used for partial matches.
	pub base: NameKey,
	/// Pointer indirection count.
	pub ptr_depth: u8,
	/// Whether the declaration is a function pointer.
	pub is_func_ptr: bool,
	/// Captured array extents.
	pub dims: Vec<usize>,
	/// Total element count.
	pub count: usize,
}

impl SchemaName {
	/// Whether the declaration stores an address.
	pub fn is_pointer(&self) -> bool {
		self.ptr_depth > 0 || self.is_func_ptr
	}
}

/// One entry of the `TYPE` table.
#[derive(Debug, Clone)]
pub struct SchemaType {
	/// Type name.
	pub name: NameKey,
	/// Declared byte length from `TLEN`.
	pub len: usize,
	/// Struct definition index when the type is a struct.
	pub struct_idx: Option<usize>,
	/// Numeric classification for primitive types.
	pub primitive: Option<Primitive>,
}

/// One step of the path from a top-level struct to an inlined member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainLink {
	/// Hash of the enclosing struct type.
	pub type_hash: u32,
	/// Base-name hash of the enclosing member.
	pub name_hash: u32,
	/// Name table index of the enclosing member in this catalog.
	pub name_idx: usize,
	/// Element index when the enclosing member is an array of structs.
	pub index: usize,
}

impl ChainLink {
	/// Whether two links name the same slot, possibly across catalogs.
	pub fn same_slot(&self, other: &Self) -> bool {
		self.type_hash == other.type_hash && self.name_hash == other.name_hash && self.index == other.index
	}
}

/// One flattened leaf member of a struct.
#[derive(Debug, Clone)]
pub struct Member {
	/// Index into the type table.
	pub type_idx: usize,
	/// Index into the name table.
	pub name_idx: usize,
	/// Hash of the member's type name.
	pub type_hash: u32,
	/// Hash of the member's base name.
	pub base_hash: u32,
	/// Byte offset from the start of the top-level struct.
	pub offset: usize,
	/// Total byte length.
	pub len: usize,
	/// Byte length of one element.
	pub elem_size: usize,
	/// Element count.
	pub count: usize,
	/// Pointer indirection count.
	pub ptr_depth: u8,
	/// Whether the member is a function pointer.
	pub is_func_ptr: bool,
	/// Element index of the innermost enclosing struct array.
	pub array_index: usize,
	/// Path through inlined structs, outermost first.
	pub chain: Box<[ChainLink]>,
	/// Numeric classification of value members.
	pub primitive: Option<Primitive>,
}

impl Member {
	/// Whether the member stores addresses.
	pub fn is_pointer(&self) -> bool {
		self.ptr_depth > 0 || self.is_func_ptr
	}

	/// Nesting depth (0 for direct members).
	pub fn depth(&self) -> usize {
		self.chain.len()
	}
}

/// Flattened description of one struct type.
#[derive(Debug, Clone)]
pub struct StructDef {
	/// Index into the type table.
	pub type_idx: usize,
	/// Struct name.
	pub name: NameKey,
	/// Declared byte length from `TLEN`.
	pub len: usize,
	/// Size accumulated while flattening.
	pub flattened_len: usize,
	/// Leaf members in storage order.
	pub members: Vec<Member>,
	/// Compile-time flags (`MISALIGNED`).
	pub flags: Flags,
}

/// Normalized, immutable struct catalog for one side of a link.
#[derive(Debug)]
pub struct SchemaCatalog {
	layout: Layout,
	names: Vec<SchemaName>,
	types: Vec<SchemaType>,
	structs: Vec<StructDef>,
	by_name: KeyMap<NameKey, usize>,
	blob: Option<Box<[u8]>>,
}

struct Flat {
	members: Vec<Member>,
	size: usize,
}

impl SchemaCatalog {
	/// Flatten raw DNA tables for the given storage layout.
	pub fn compile(dna: &Dna, layout: Layout, limits: &CatalogLimits, diag: &dyn Diagnostics) -> Result<Self> {
		let names: Vec<SchemaName> = dna
			.names
			.iter()
			.map(|raw| {
				let decl = parse_field_decl(raw, limits.max_array_rank);
				SchemaName {
					raw: raw.clone(),
					base: NameKey::new(decl.ident),
					ptr_depth: decl.ptr_depth,
					is_func_ptr: decl.is_func_ptr,
					dims: decl.dims,
					count: decl.count,
				}
			})
			.collect();

		let types: Vec<SchemaType> = dna
			.types
			.iter()
			.enumerate()
			.map(|(idx, name)| {
				let len = usize::from(dna.tlen[idx]);
				SchemaType {
					name: NameKey::new(name),
					len,
					struct_idx: dna.struct_for_type[idx].map(|value| value as usize),
					primitive: Primitive::classify(name, len),
				}
			})
			.collect();

		let mut compiler = Compiler {
			dna,
			names: &names,
			types: &types,
			layout,
			limits,
			memo: vec![None; dna.structs.len()],
		};

		let mut structs = Vec::with_capacity(dna.structs.len());
		let mut by_name = key_map_with_capacity(dna.structs.len());
		for (idx, item) in dna.structs.iter().enumerate() {
			let ty = &types[item.type_idx as usize];
			let flat = compiler.flatten(idx, 0)?;

			let mut flags = Flags::empty();
			if flat.size != ty.len {
				flags.insert(Flags::MISALIGNED);
				diag.report(
					Severity::Warning,
					&format!("struct {} flattens to {} bytes but declares {}", ty.name.as_str(), flat.size, ty.len),
				);
			}

			by_name.insert(ty.name.clone(), idx);
			structs.push(StructDef {
				type_idx: item.type_idx as usize,
				name: ty.name.clone(),
				len: ty.len,
				flattened_len: flat.size,
				members: flat.members.clone(),
				flags,
			});
		}

		Ok(Self {
			layout,
			names,
			types,
			structs,
			by_name,
			blob: None,
		})
	}

	/// Parse a schema payload and flatten it, keeping the payload bytes.
	pub fn from_blob(blob: &[u8], layout: Layout, limits: &CatalogLimits, diag: &dyn Diagnostics) -> Result<Self> {
		let dna = Dna::parse(blob, layout.endianness, limits)?;
		let mut catalog = Self::compile(&dna, layout, limits, diag)?;
		catalog.blob = Some(blob.into());
		Ok(catalog)
	}

	/// Build the program's own catalog from an embedded schema payload.
	///
	/// The payload must use the host's byte order; pointers use the host width.
	pub fn memory(blob: &[u8]) -> Result<Self> {
		Self::from_blob(blob, Layout::native(), &CatalogLimits::default(), &TracingDiagnostics)
	}

	/// Build the program's catalog from tables read out of any file.
	///
	/// The tables are re-encoded in host byte order so [`SchemaCatalog::blob`]
	/// can be embedded in files this host writes.
	pub fn memory_from_dna(dna: &Dna) -> Result<Self> {
		Self::memory(&dna.to_bytes(Layout::native().endianness))
	}

	/// Storage layout the offsets were computed for.
	pub fn layout(&self) -> Layout {
		self.layout
	}

	/// Original schema payload when built with [`SchemaCatalog::from_blob`].
	pub fn blob(&self) -> Option<&[u8]> {
		self.blob.as_deref()
	}

	/// All struct definitions, indexed like the schema's `STRC` table.
	pub fn structs(&self) -> &[StructDef] {
		&self.structs
	}

	/// Struct definition by index.
	pub fn struct_def(&self, idx: usize) -> Option<&StructDef> {
		self.structs.get(idx)
	}

	/// Struct index by name; hash hits are verified against the text.
	pub fn find_struct(&self, name: &str) -> Option<usize> {
		self.by_name.get(&NameKey::new(name)).copied()
	}

	/// Struct index for an existing key.
	pub fn find_struct_key(&self, key: &NameKey) -> Option<usize> {
		self.by_name.get(key).copied()
	}

	/// Declaration entry by index.
	pub fn name(&self, idx: usize) -> &SchemaName {
		&self.names[idx]
	}

	/// Type entry by index.
	pub fn type_entry(&self, idx: usize) -> &SchemaType {
		&self.types[idx]
	}

	/// Type name of a member.
	pub fn member_type_name(&self, member: &Member) -> &str {
		self.types[member.type_idx].name.as_str()
	}

	/// Declaration text of a member.
	pub fn member_decl(&self, member: &Member) -> &str {
		&self.names[member.name_idx].raw
	}

	/// Dotted path of a member including enclosing inlined members.
	pub fn member_path(&self, member: &Member) -> String {
		let mut out = String::new();
		for link in member.chain.iter() {
			let name = &self.names[link.name_idx];
			out.push_str(name.base.as_str());
			if name.count > 1 {
				out.push_str(&format!("[{}]", link.index));
			}
			out.push('.');
		}
		out.push_str(self.names[member.name_idx].base.as_str());
		out
	}
}

struct Compiler<'a> {
	dna: &'a Dna,
	names: &'a [SchemaName],
	types: &'a [SchemaType],
	layout: Layout,
	limits: &'a CatalogLimits,
	memo: Vec<Option<Rc<Flat>>>,
}

impl Compiler<'_> {
	fn flatten(&mut self, struct_idx: usize, depth: usize) -> Result<Rc<Flat>> {
		if let Some(done) = &self.memo[struct_idx] {
			return Ok(done.clone());
		}

		let item = &self.dna.structs[struct_idx];
		if depth > self.limits.max_nesting_depth {
			return Err(BlendError::SchemaTooDeep {
				name: self.types[item.type_idx as usize].name.as_str().to_owned(),
				max_depth: self.limits.max_nesting_depth,
			});
		}

		let mut members = Vec::with_capacity(item.fields.len());
		let mut size = 0_usize;
		for field in &item.fields {
			let name = &self.names[field.name_idx as usize];
			let ty = &self.types[field.type_idx as usize];

			if !name.is_pointer()
				&& let Some(sub_idx) = ty.struct_idx
			{
				let sub = self.flatten(sub_idx, depth + 1)?;
				let stride = if ty.len > 0 { ty.len } else { sub.size };
				let span = stride.checked_mul(name.count).ok_or_else(|| self.too_large(struct_idx, "bytes", self.limits.max_struct_bytes))?;
				size = self.grow(struct_idx, size, span)?;
				let added = sub.members.len().checked_mul(name.count).unwrap_or(usize::MAX);
				if added > self.limits.max_members.saturating_sub(members.len()) {
					return Err(self.too_large(struct_idx, "members", self.limits.max_members));
				}

				let base = size - span;
				let repeats = if sub.members.is_empty() { 0 } else { name.count };
				for index in 0..repeats {
					let link = ChainLink {
						type_hash: ty.name.hash(),
						name_hash: name.base.hash(),
						name_idx: field.name_idx as usize,
						index,
					};
					for member in &sub.members {
						let mut chain = Vec::with_capacity(member.chain.len() + 1);
						chain.push(link);
						chain.extend_from_slice(&member.chain);
						let array_index = if member.chain.is_empty() { index } else { member.array_index };
						members.push(Member {
							offset: base + index * stride + member.offset,
							chain: chain.into_boxed_slice(),
							array_index,
							..member.clone()
						});
					}
				}
				continue;
			}

			let elem_size = if name.is_pointer() { self.layout.pointer_size() } else { ty.len };
			let len = elem_size.checked_mul(name.count).ok_or_else(|| self.too_large(struct_idx, "bytes", self.limits.max_struct_bytes))?;
			if members.len() >= self.limits.max_members {
				return Err(self.too_large(struct_idx, "members", self.limits.max_members));
			}
			members.push(Member {
				type_idx: field.type_idx as usize,
				name_idx: field.name_idx as usize,
				type_hash: ty.name.hash(),
				base_hash: name.base.hash(),
				offset: size,
				len,
				elem_size,
				count: name.count,
				ptr_depth: if name.is_func_ptr { name.ptr_depth.max(1) } else { name.ptr_depth },
				is_func_ptr: name.is_func_ptr,
				array_index: 0,
				chain: Box::new([]),
				primitive: if name.is_pointer() { None } else { ty.primitive },
			});
			size = self.grow(struct_idx, size, len)?;
		}

		let flat = Rc::new(Flat { members, size });
		self.memo[struct_idx] = Some(flat.clone());
		Ok(flat)
	}

	/// Advance a running struct size by `len`, bounded by `max_struct_bytes`.
	fn grow(&self, struct_idx: usize, size: usize, len: usize) -> Result<usize> {
		let limit = self.limits.max_struct_bytes;
		match size.checked_add(len) {
			Some(next) if next <= limit => Ok(next),
			_ => Err(self.too_large(struct_idx, "bytes", limit)),
		}
	}

	fn too_large(&self, struct_idx: usize, kind: &'static str, limit: usize) -> BlendError {
		let type_idx = self.dna.structs[struct_idx].type_idx as usize;
		BlendError::SchemaTooLarge {
			name: self.types[type_idx].name.as_str().to_owned(),
			kind,
			limit,
		}
	}
}

#[cfg(test)]
mod tests;
