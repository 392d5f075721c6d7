use serde::Serialize;

use crate::blend::bytes::{read_uint, write_uint};
use crate::blend::catalog::SchemaCatalog;
use crate::blend::diag::{Diagnostics, Severity};
use crate::blend::matcher::{LinkTable, StructLink};
use crate::blend::primitive::{cast_elements, copy_swapped};
use crate::blend::store::{ChunkKind, ChunkStore, StoredChunk};
use crate::blend::{BlendError, ChunkHeader, Flags, Result, StructDef};

/// One chunk converted to the memory layout.
#[derive(Debug)]
pub struct LinkedChunk {
	/// Header as read from the file.
	pub header: ChunkHeader,
	/// How the payload was converted.
	pub kind: ChunkKind,
	/// Memory struct index for typed and opaque chunks.
	pub memory_struct: Option<usize>,
	/// Converted payload; pointer fields hold addresses of other payloads.
	pub data: Box<[u8]>,
}

impl LinkedChunk {
	/// Current address of the payload, as stored in pointer fields.
	pub fn address(&self) -> u64 {
		if self.data.is_empty() { 0 } else { self.data.as_ptr() as u64 }
	}

	/// Chunk code.
	pub fn code(&self) -> [u8; 4] {
		self.header.code
	}
}

/// Counters collected during one relink pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelinkStats {
	/// Chunks converted struct by struct.
	pub typed: usize,
	/// Chunks converted as address arrays.
	pub pointer_arrays: usize,
	/// Chunks copied verbatim for lack of a struct type.
	pub raw: usize,
	/// Chunks copied verbatim because their struct is opaque or unknown to memory.
	pub opaque: usize,
	/// Typed chunks whose payload held fewer bytes than `nr` structs.
	pub truncated: usize,
	/// Non-null addresses that matched no chunk and were nulled.
	pub dangling: usize,
}

/// Converts stored chunks into memory-layout blocks and rewrites pointers.
pub struct Relinker<'a> {
	file: &'a SchemaCatalog,
	memory: &'a SchemaCatalog,
	table: &'a LinkTable,
	opaque: &'a [String],
	diag: &'a dyn Diagnostics,
}

struct Target {
	kind: ChunkKind,
	base: u64,
	len: usize,
	file_struct: Option<usize>,
	memory_struct: Option<usize>,
}

impl<'a> Relinker<'a> {
	/// Bind the catalogs, link table, and opaque type list of one parse.
	pub fn new(file: &'a SchemaCatalog, memory: &'a SchemaCatalog, table: &'a LinkTable, opaque: &'a [String], diag: &'a dyn Diagnostics) -> Self {
		Self {
			file,
			memory,
			table,
			opaque,
			diag,
		}
	}

	/// Classify, allocate, and transcode every chunk in scan order.
	pub fn relink(&self, mut store: ChunkStore) -> Result<(Vec<LinkedChunk>, RelinkStats)> {
		self.classify(&mut store);
		store.index_ranges();
		self.mark_pointer_arrays(&mut store);

		let mut stats = RelinkStats::default();
		let mut blocks = Vec::with_capacity(store.len());
		for chunk in store.chunks() {
			let size = self.target_size(chunk)?;
			blocks.push(alloc_zeroed(size)?.into_boxed_slice());
		}

		let targets: Vec<Target> = store
			.chunks()
			.iter()
			.zip(&blocks)
			.map(|(chunk, block)| Target {
				kind: chunk.kind,
				base: block.as_ptr() as u64,
				len: block.len(),
				file_struct: (chunk.kind == ChunkKind::Typed).then_some(chunk.header.sdna_nr as usize),
				memory_struct: chunk.memory_struct,
			})
			.collect();

		for (idx, block) in blocks.iter_mut().enumerate() {
			let chunk = &store.chunks()[idx];
			match chunk.kind {
				ChunkKind::Typed => {
					stats.typed += 1;
					self.transcode_typed(&store, &targets, idx, block, &mut stats);
				}
				ChunkKind::PointerArray => {
					stats.pointer_arrays += 1;
					let width = self.file.layout().pointer_size();
					let out = self.memory.layout().pointer_size();
					for (slot, raw) in chunk.data.chunks_exact(width).enumerate() {
						let value = self.resolve(&store, &targets, read_uint(raw, self.file.layout().endianness), &mut stats);
						write_uint(&mut block[slot * out..(slot + 1) * out], value, self.memory.layout().endianness);
					}
				}
				ChunkKind::Raw | ChunkKind::Opaque => {
					if chunk.kind == ChunkKind::Raw {
						stats.raw += 1;
					} else {
						stats.opaque += 1;
					}
					block.copy_from_slice(&chunk.data);
				}
			}
		}

		if stats.dangling > 0 {
			self.diag.report(Severity::Warning, &format!("{} pointers matched no chunk and were nulled", stats.dangling));
		}

		let linked = store
			.into_chunks()
			.into_iter()
			.zip(blocks)
			.map(|(chunk, data)| LinkedChunk {
				header: chunk.header,
				kind: chunk.kind,
				memory_struct: chunk.memory_struct,
				data,
			})
			.collect();
		Ok((linked, stats))
	}

	fn classify(&self, store: &mut ChunkStore) {
		for idx in 0..store.len() {
			let Some(chunk) = store.chunk_mut(idx) else {
				continue;
			};
			let Some(file_def) = self.file.struct_def(chunk.header.sdna_nr as usize) else {
				continue;
			};

			let opaque = self.opaque.iter().any(|name| name == file_def.name.as_str());
			let memory_struct = self.table.memory_for_file(chunk.header.sdna_nr as usize);
			chunk.memory_struct = memory_struct;
			chunk.kind = match memory_struct {
				Some(_) if !opaque && file_def.len > 0 => ChunkKind::Typed,
				_ => ChunkKind::Opaque,
			};
		}
	}

	fn mark_pointer_arrays(&self, store: &mut ChunkStore) {
		let layout = self.file.layout();
		let mut targets = Vec::new();
		for chunk in store.chunks() {
			if chunk.kind != ChunkKind::Typed {
				continue;
			}
			let Some((file_def, _, link)) = self.defs(chunk.header.sdna_nr as usize) else {
				continue;
			};
			let elements = element_count(chunk.header.nr, chunk.data.len(), file_def.len);
			for member_link in &link.members {
				let Some(file_member) = member_link.file_member.map(|idx| &file_def.members[idx]) else {
					continue;
				};
				if file_member.ptr_depth < 2 || file_member.is_func_ptr {
					continue;
				}
				for element in 0..elements {
					for slot in 0..file_member.count {
						let start = element * file_def.len + file_member.offset + slot * layout.pointer_size();
						let Some(raw) = chunk.data.get(start..start + layout.pointer_size()) else {
							continue;
						};
						if let Some(target) = store.find(read_uint(raw, layout.endianness)) {
							targets.push(target);
						}
					}
				}
			}
		}

		for idx in targets {
			if let Some(chunk) = store.chunk_mut(idx)
				&& chunk.kind != ChunkKind::Typed
			{
				chunk.kind = ChunkKind::PointerArray;
			}
		}
	}

	fn defs(&self, file_struct: usize) -> Option<(&'a StructDef, &'a StructDef, &'a StructLink)> {
		let memory_struct = self.table.memory_for_file(file_struct)?;
		Some((self.file.struct_def(file_struct)?, self.memory.struct_def(memory_struct)?, self.table.link(memory_struct)?))
	}

	fn target_size(&self, chunk: &StoredChunk) -> Result<usize> {
		let len = chunk.data.len();
		match chunk.kind {
			ChunkKind::Typed => {
				let Some((file_def, memory_def, _)) = self.defs(chunk.header.sdna_nr as usize) else {
					return Ok(0);
				};
				let elements = element_count(chunk.header.nr, len, file_def.len);
				elements.checked_mul(memory_def.len).ok_or(BlendError::Allocation { size: usize::MAX })
			}
			ChunkKind::PointerArray => Ok(len / self.file.layout().pointer_size() * self.memory.layout().pointer_size()),
			ChunkKind::Raw | ChunkKind::Opaque => Ok(len),
		}
	}

	fn transcode_typed(&self, store: &ChunkStore, targets: &[Target], idx: usize, block: &mut [u8], stats: &mut RelinkStats) {
		let chunk = &store.chunks()[idx];
		let Some((file_def, memory_def, link)) = self.defs(chunk.header.sdna_nr as usize) else {
			return;
		};

		let elements = element_count(chunk.header.nr, chunk.data.len(), file_def.len);
		if elements < chunk.header.nr as usize {
			stats.truncated += 1;
			self.diag.report(
				Severity::Warning,
				&format!(
					"chunk {:#x} of {} holds {} of {} declared structs",
					chunk.header.old.widen(),
					file_def.name.as_str(),
					elements,
					chunk.header.nr
				),
			);
		}

		let file_layout = self.file.layout();
		let memory_layout = self.memory.layout();
		for element in 0..elements {
			let src = &chunk.data[element * file_def.len..(element + 1) * file_def.len];
			let dst = &mut block[element * memory_def.len..(element + 1) * memory_def.len];
			if link.identical {
				dst.copy_from_slice(src);
			}

			for (member_idx, member_link) in link.members.iter().enumerate() {
				let Some(file_idx) = member_link.file_member else {
					continue;
				};
				let file_member = &file_def.members[file_idx];
				let memory_member = &memory_def.members[member_idx];
				if link.identical && !memory_member.is_pointer() {
					continue;
				}
				let Some(from) = src.get(file_member.offset..file_member.offset + file_member.len) else {
					continue;
				};
				let Some(to) = dst.get_mut(memory_member.offset..memory_member.offset + memory_member.len) else {
					continue;
				};

				if memory_member.is_pointer() {
					let slots = file_member.count.min(memory_member.count);
					for slot in 0..slots {
						let raw = &from[slot * file_member.elem_size..(slot + 1) * file_member.elem_size];
						let value = self.resolve(store, targets, read_uint(raw, file_layout.endianness), stats);
						write_uint(
							&mut to[slot * memory_member.elem_size..(slot + 1) * memory_member.elem_size],
							value,
							memory_layout.endianness,
						);
					}
				} else if member_link.flags.contains(Flags::NEED_CAST) {
					if let (Some(from_prim), Some(to_prim)) = (file_member.primitive, memory_member.primitive) {
						cast_elements(from, from_prim, file_layout.endianness, to, to_prim, memory_layout.endianness);
					}
				} else {
					let n = from.len().min(to.len());
					match memory_member.primitive {
						Some(prim) if prim.size > 1 && file_layout.endianness != memory_layout.endianness => {
							copy_swapped(&from[..n], &mut to[..n], prim.size);
						}
						_ => to[..n].copy_from_slice(&from[..n]),
					}
				}
			}
		}
	}

	fn resolve(&self, store: &ChunkStore, targets: &[Target], addr: u64, stats: &mut RelinkStats) -> u64 {
		if addr == 0 {
			return 0;
		}
		let Some((idx, offset)) = store.resolve(addr) else {
			stats.dangling += 1;
			return 0;
		};
		let target = &targets[idx];
		if target.len == 0 {
			return 0;
		}

		let offset = offset as usize;
		let new_offset = match target.kind {
			ChunkKind::Typed => self.remap_offset(target, offset),
			ChunkKind::PointerArray => offset / self.file.layout().pointer_size() * self.memory.layout().pointer_size(),
			ChunkKind::Raw | ChunkKind::Opaque => offset,
		};
		if new_offset >= target.len {
			return 0;
		}
		target.base + new_offset as u64
	}

	fn remap_offset(&self, target: &Target, offset: usize) -> usize {
		let (Some(file_struct), Some(_)) = (target.file_struct, target.memory_struct) else {
			return offset;
		};
		let Some((file_def, memory_def, link)) = self.defs(file_struct) else {
			return offset;
		};
		if file_def.len == 0 || offset == 0 {
			return offset;
		}

		let element = offset / file_def.len;
		let rem = offset % file_def.len;
		let inner = link
			.members
			.iter()
			.enumerate()
			.find_map(|(member_idx, member_link)| {
				let file_member = &file_def.members[member_link.file_member?];
				if rem < file_member.offset || rem >= file_member.offset + file_member.len.max(1) {
					return None;
				}
				let memory_member = &memory_def.members[member_idx];
				let delta = rem - file_member.offset;
				if file_member.elem_size == 0 || memory_member.elem_size == 0 {
					return Some(memory_member.offset);
				}
				let slot = delta / file_member.elem_size;
				let within = (delta % file_member.elem_size).min(memory_member.elem_size - 1);
				Some(memory_member.offset + slot * memory_member.elem_size + within)
			})
			.unwrap_or(0);
		element * memory_def.len + inner
	}
}

fn element_count(nr: u32, len: usize, struct_len: usize) -> usize {
	if struct_len == 0 {
		return 0;
	}
	(nr as usize).min(len / struct_len)
}

fn alloc_zeroed(size: usize) -> Result<Vec<u8>> {
	let mut buf = Vec::new();
	buf.try_reserve_exact(size).map_err(|_| BlendError::Allocation { size })?;
	buf.resize(size, 0);
	Ok(buf)
}
