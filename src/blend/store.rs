use crate::blend::hash::{AddrKey, KeyMap, key_map_with_capacity};
use crate::blend::{BlendError, ChunkHeader, Result};

/// How the relinker treats a chunk payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
	/// No struct type; bytes pass through untouched.
	Raw,
	/// Array of `nr` instances of a linked struct.
	Typed,
	/// Array of addresses referenced through a `**` member.
	PointerArray,
	/// Struct type listed as opaque, or without a memory counterpart.
	Opaque,
}

impl ChunkKind {
	/// Stable lowercase label.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Raw => "raw",
			Self::Typed => "typed",
			Self::PointerArray => "pointer_array",
			Self::Opaque => "opaque",
		}
	}
}

/// One chunk as read from the stream.
#[derive(Debug)]
pub struct StoredChunk {
	/// Header as read.
	pub header: ChunkHeader,
	/// Payload bytes as read.
	pub data: Box<[u8]>,
	/// Relink classification, `Raw` until classified.
	pub kind: ChunkKind,
	/// Linked memory struct for `Typed` chunks.
	pub memory_struct: Option<usize>,
}

/// Result of [`ChunkStore::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inserted {
	/// Stored at this position.
	New(usize),
	/// The address was already present at this position; the new chunk was dropped.
	Duplicate(usize),
}

/// Insertion-ordered chunk ledger keyed by old address.
///
/// Chunks with a null address are kept but never indexed.
#[derive(Debug, Default)]
pub struct ChunkStore {
	chunks: Vec<StoredChunk>,
	by_addr: KeyMap<AddrKey, usize>,
	ranges: Vec<(u64, u64, usize)>,
}

impl ChunkStore {
	/// Empty ledger with room for `capacity` chunks.
	pub fn with_capacity(capacity: usize) -> Self {
		Self {
			chunks: Vec::with_capacity(capacity),
			by_addr: key_map_with_capacity(capacity),
			ranges: Vec::new(),
		}
	}

	/// Add a chunk; the first chunk at an address wins.
	///
	/// With `strict`, a repeated address whose header differs fails instead.
	pub fn insert(&mut self, header: ChunkHeader, data: Box<[u8]>, strict: bool) -> Result<Inserted> {
		let addr = header.old.widen();
		if addr != 0 {
			if let Some(existing) = self.by_addr.get(&AddrKey(addr)).copied() {
				if strict && self.chunks[existing].header != header {
					return Err(BlendError::DuplicateMismatch { old: addr });
				}
				return Ok(Inserted::Duplicate(existing));
			}
			self.by_addr.insert(AddrKey(addr), self.chunks.len());
		}

		self.chunks.push(StoredChunk {
			header,
			data,
			kind: ChunkKind::Raw,
			memory_struct: None,
		});
		self.ranges.clear();
		Ok(Inserted::New(self.chunks.len() - 1))
	}

	/// Chunks in insertion order.
	pub fn chunks(&self) -> &[StoredChunk] {
		&self.chunks
	}

	/// Mutable chunk by position.
	pub fn chunk_mut(&mut self, idx: usize) -> Option<&mut StoredChunk> {
		self.chunks.get_mut(idx)
	}

	/// Number of stored chunks.
	pub fn len(&self) -> usize {
		self.chunks.len()
	}

	/// Whether the ledger is empty.
	pub fn is_empty(&self) -> bool {
		self.chunks.is_empty()
	}

	/// Position of the chunk whose old address is exactly `addr`.
	pub fn find(&self, addr: u64) -> Option<usize> {
		self.by_addr.get(&AddrKey(addr)).copied()
	}

	/// Build the sorted range index used by [`ChunkStore::resolve`].
	pub fn index_ranges(&mut self) {
		self.ranges = self
			.by_addr
			.values()
			.map(|idx| {
				let chunk = &self.chunks[*idx];
				let start = chunk.header.old.widen();
				(start, start.saturating_add(u64::from(chunk.header.len)), *idx)
			})
			.collect();
		self.ranges.sort_unstable_by_key(|(start, _, _)| *start);
	}

	/// Chunk position and byte offset for an address, exact or interior.
	///
	/// Interior lookups need [`ChunkStore::index_ranges`] first.
	pub fn resolve(&self, addr: u64) -> Option<(usize, u64)> {
		if addr == 0 {
			return None;
		}
		if let Some(idx) = self.find(addr) {
			return Some((idx, 0));
		}

		let after = self.ranges.partition_point(|(start, _, _)| *start <= addr);
		let (start, end, idx) = *self.ranges.get(after.checked_sub(1)?)?;
		(addr < end).then_some((idx, addr - start))
	}

	/// Take every chunk out of the ledger.
	pub fn into_chunks(self) -> Vec<StoredChunk> {
		self.chunks
	}
}
