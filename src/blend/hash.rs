use std::collections::HashMap;
use std::hash::{BuildHasherDefault, Hash, Hasher};

const FNV_OFFSET: u32 = 0x811C_9DC5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a hash of a byte string.
pub fn hash_bytes(bytes: &[u8]) -> u32 {
	let mut hash = FNV_OFFSET;
	for byte in bytes {
		hash ^= u32::from(*byte);
		hash = hash.wrapping_mul(FNV_PRIME);
	}
	hash
}

/// 32-bit FNV-1a hash of a string.
pub fn hash_str(value: &str) -> u32 {
	hash_bytes(value.as_bytes())
}

/// Thomas Wang 32-bit integer mix.
pub fn hash_u32(value: u32) -> u32 {
	let mut key = value;
	key = (!key).wrapping_add(key << 15);
	key ^= key >> 12;
	key = key.wrapping_add(key << 2);
	key ^= key >> 4;
	key = key.wrapping_mul(2057);
	key ^= key >> 16;
	key
}

/// Thomas Wang 64-bit mix folded to 32 bits, used for raw addresses.
pub fn hash_u64(value: u64) -> u32 {
	let mut key = value;
	key = (!key).wrapping_add(key << 21);
	key ^= key >> 24;
	key = key.wrapping_add(key << 3).wrapping_add(key << 8);
	key ^= key >> 14;
	key = key.wrapping_add(key << 2).wrapping_add(key << 4);
	key ^= key >> 28;
	key = key.wrapping_add(key << 31);
	(key ^ (key >> 32)) as u32
}

/// String key carrying its precomputed hash.
///
/// Equality compares the text too, so a hash collision never aliases two names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameKey {
	hash: u32,
	name: Box<str>,
}

impl NameKey {
	/// Hash and wrap `name`.
	pub fn new(name: &str) -> Self {
		Self {
			hash: hash_str(name),
			name: name.into(),
		}
	}

	/// Precomputed hash.
	pub fn hash(&self) -> u32 {
		self.hash
	}

	/// Original text.
	pub fn as_str(&self) -> &str {
		&self.name
	}
}

impl Hash for NameKey {
	fn hash<H: Hasher>(&self, state: &mut H) {
		state.write_u32(self.hash);
	}
}

/// Old-address key with a mixed hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddrKey(pub u64);

impl Hash for AddrKey {
	fn hash<H: Hasher>(&self, state: &mut H) {
		state.write_u32(hash_u64(self.0));
	}
}

/// Integer key with a mixed hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntKey(pub u32);

impl Hash for IntKey {
	fn hash<H: Hasher>(&self, state: &mut H) {
		state.write_u32(hash_u32(self.0));
	}
}

/// Hasher that passes through the single pre-mixed `u32` a key writes.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughHasher(u64);

impl Hasher for PassThroughHasher {
	fn finish(&self) -> u64 {
		self.0
	}

	fn write(&mut self, bytes: &[u8]) {
		for byte in bytes {
			self.0 = (self.0 << 8) ^ u64::from(*byte) ^ (self.0 >> 56);
		}
	}

	fn write_u32(&mut self, value: u32) {
		self.0 = (self.0 << 32) ^ u64::from(value);
	}
}

/// Hash map over keys that already carry a good hash.
pub type KeyMap<K, V> = HashMap<K, V, BuildHasherDefault<PassThroughHasher>>;

/// Create an empty [`KeyMap`] with room for `capacity` entries.
pub fn key_map_with_capacity<K, V>(capacity: usize) -> KeyMap<K, V> {
	HashMap::with_capacity_and_hasher(capacity, BuildHasherDefault::default())
}
