use crate::blend::catalog::{Member, SchemaCatalog};
use crate::blend::diag::{Diagnostics, Severity};
use crate::blend::hash::{IntKey, KeyMap, key_map_with_capacity};
use crate::blend::{Flags, StructDef};

/// Link state of one memory member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberLink {
	/// Matching file member index, `None` when the member is missing.
	pub file_member: Option<usize>,
	/// `CAN_LINK`, `NEED_CAST`, or `MISSING`.
	pub flags: Flags,
}

/// Link between one memory struct and its file counterpart.
#[derive(Debug, Clone)]
pub struct StructLink {
	/// File struct index.
	pub file_struct: usize,
	/// Aggregate flags of the member links.
	pub flags: Flags,
	/// One entry per memory member, in member order.
	pub members: Vec<MemberLink>,
	/// Per file member: `SKIP` when nothing reads it.
	pub file_flags: Vec<Flags>,
	/// Layouts and members agree byte for byte, so elements copy whole.
	pub identical: bool,
}

impl StructLink {
	/// Linked members whose file side stores addresses.
	pub fn pointer_members<'a>(&'a self, memory: &'a StructDef) -> impl Iterator<Item = (usize, &'a Member, usize)> + 'a {
		self.members.iter().enumerate().filter_map(move |(idx, link)| {
			let member = &memory.members[idx];
			match link.file_member {
				Some(file_member) if member.is_pointer() => Some((idx, member, file_member)),
				_ => None,
			}
		})
	}
}

/// Per-parse linking result between a file catalog and the memory catalog.
///
/// Both catalogs stay read-only; every cross-schema fact lives here.
#[derive(Debug, Clone)]
pub struct LinkTable {
	by_memory: Vec<Option<StructLink>>,
	file_to_memory: Vec<Option<usize>>,
	catastrophic: bool,
}

impl LinkTable {
	/// Match every memory struct against the file catalog by name.
	pub fn build(file: &SchemaCatalog, memory: &SchemaCatalog, diag: &dyn Diagnostics) -> Self {
		let mut by_memory = Vec::with_capacity(memory.structs().len());
		let mut file_to_memory = vec![None; file.structs().len()];
		let mut linked = 0_usize;

		for (memory_idx, memory_def) in memory.structs().iter().enumerate() {
			let Some(file_idx) = file.find_struct_key(&memory_def.name) else {
				by_memory.push(None);
				continue;
			};
			let Some(file_def) = file.struct_def(file_idx) else {
				by_memory.push(None);
				continue;
			};

			file_to_memory[file_idx] = Some(memory_idx);
			linked += 1;
			by_memory.push(Some(link_struct(file, file_def, file_idx, memory, memory_def, diag)));
		}

		let catastrophic = linked == 0 && !file.structs().is_empty() && !memory.structs().is_empty();
		if catastrophic {
			diag.report(Severity::Error, "no struct in the file schema matches the program schema");
		}

		Self {
			by_memory,
			file_to_memory,
			catastrophic,
		}
	}

	/// Whether both schemas have structs but none of them match.
	pub fn is_catastrophic(&self) -> bool {
		self.catastrophic
	}

	/// Link for a memory struct, `None` when the file lacks it.
	pub fn link(&self, memory_struct: usize) -> Option<&StructLink> {
		self.by_memory.get(memory_struct).and_then(Option::as_ref)
	}

	/// Memory struct index linked to a file struct index.
	pub fn memory_for_file(&self, file_struct: usize) -> Option<usize> {
		self.file_to_memory.get(file_struct).copied().flatten()
	}

	/// Number of memory structs with a file counterpart.
	pub fn linked_count(&self) -> usize {
		self.by_memory.iter().filter(|item| item.is_some()).count()
	}
}

fn link_struct(
	file: &SchemaCatalog,
	file_def: &StructDef,
	file_idx: usize,
	memory: &SchemaCatalog,
	memory_def: &StructDef,
	diag: &dyn Diagnostics,
) -> StructLink {
	let mut by_name: KeyMap<IntKey, Vec<usize>> = key_map_with_capacity(file_def.members.len());
	for (idx, member) in file_def.members.iter().enumerate() {
		by_name.entry(IntKey(member.base_hash)).or_default().push(idx);
	}

	let mut flags = Flags::CAN_LINK;
	let mut file_flags = vec![Flags::SKIP; file_def.members.len()];
	let mut members = Vec::with_capacity(memory_def.members.len());

	for member in &memory_def.members {
		let candidate = by_name
			.get(&IntKey(member.base_hash))
			.into_iter()
			.flatten()
			.copied()
			.find(|idx| same_path(&file_def.members[*idx], member, file, memory));

		let link = match candidate.and_then(|idx| compatibility(file, &file_def.members[idx], memory, member).map(|cast| (idx, cast))) {
			Some((idx, cast)) => {
				file_flags[idx] = Flags::CAN_LINK;
				let mut member_flags = Flags::CAN_LINK;
				if cast {
					member_flags.insert(Flags::NEED_CAST);
					file_flags[idx].insert(Flags::NEED_CAST);
					flags.insert(Flags::NEED_CAST);
					diag.report(
						Severity::Info,
						&format!(
							"{}.{} converts {} to {}",
							memory_def.name.as_str(),
							memory.member_path(member),
							file.member_type_name(&file_def.members[idx]),
							memory.member_type_name(member)
						),
					);
				}
				MemberLink {
					file_member: Some(idx),
					flags: member_flags,
				}
			}
			None => {
				flags.insert(Flags::MISSING);
				diag.report(
					Severity::Info,
					&format!("{}.{} missing from file schema; left zeroed", memory_def.name.as_str(), memory.member_path(member)),
				);
				MemberLink {
					file_member: None,
					flags: Flags::MISSING,
				}
			}
		};
		members.push(link);
	}

	for (idx, item) in file_flags.iter().enumerate() {
		if item.contains(Flags::SKIP) {
			diag.report(
				Severity::Debug,
				&format!("{}.{} in file schema is not read", file_def.name.as_str(), file.member_path(&file_def.members[idx])),
			);
		}
	}

	let identical = file.layout() == memory.layout()
		&& file_def.len == memory_def.len
		&& file_def.members.len() == memory_def.members.len()
		&& members.iter().enumerate().all(|(idx, link)| {
			link.file_member == Some(idx)
				&& link.flags == Flags::CAN_LINK
				&& file_def.members[idx].offset == memory_def.members[idx].offset
				&& file_def.members[idx].len == memory_def.members[idx].len
		});

	StructLink {
		file_struct: file_idx,
		flags,
		members,
		file_flags,
		identical,
	}
}

fn same_path(file_member: &Member, memory_member: &Member, file: &SchemaCatalog, memory: &SchemaCatalog) -> bool {
	file_member.chain.len() == memory_member.chain.len()
		&& file_member.chain.iter().zip(memory_member.chain.iter()).all(|(a, b)| a.same_slot(b))
		&& file.name(file_member.name_idx).base == memory.name(memory_member.name_idx).base
}

/// `Some(needs_cast)` when the file member can feed the memory member.
fn compatibility(file: &SchemaCatalog, file_member: &Member, memory: &SchemaCatalog, memory_member: &Member) -> Option<bool> {
	if file_member.is_pointer() || memory_member.is_pointer() {
		let same = file_member.ptr_depth == memory_member.ptr_depth
			&& file_member.is_func_ptr == memory_member.is_func_ptr
			&& same_type(file, file_member, memory, memory_member);
		return same.then_some(false);
	}

	match (file_member.primitive, memory_member.primitive) {
		(Some(from), Some(to)) => {
			let direct = from.size == to.size && (from.is_integer() == to.is_integer());
			Some(!direct)
		}
		(None, None) => (same_type(file, file_member, memory, memory_member) && file_member.elem_size == memory_member.elem_size).then_some(false),
		_ => None,
	}
}

fn same_type(file: &SchemaCatalog, file_member: &Member, memory: &SchemaCatalog, memory_member: &Member) -> bool {
	file_member.type_hash == memory_member.type_hash && file.member_type_name(file_member) == memory.member_type_name(memory_member)
}
