use serde::{Deserialize, Serialize};

/// Ceilings applied while reading a DNA table.
///
/// Malformed or hostile input must fail instead of allocating without bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogLimits {
	/// Maximum entries in the name, type, or struct table.
	pub max_table_size: usize,
	/// Maximum captured array dimensions per declaration.
	pub max_array_rank: usize,
	/// Maximum nesting of value structs during flattening.
	pub max_nesting_depth: usize,
	/// Maximum byte size of one flattened struct.
	pub max_struct_bytes: usize,
	/// Maximum leaf members of one flattened struct.
	pub max_members: usize,
}

impl Default for CatalogLimits {
	fn default() -> Self {
		Self {
			max_table_size: 16_384,
			max_array_rank: 3,
			max_nesting_depth: 32,
			max_struct_bytes: 1 << 20,
			max_members: 1 << 16,
		}
	}
}

/// Runtime switches for one parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
	/// DNA table ceilings.
	pub limits: CatalogLimits,
	/// Fail when a repeated old address arrives with a different header.
	pub strict_duplicates: bool,
	/// Do not report a header magic mismatch through diagnostics.
	pub quiet_header: bool,
	/// Read files whose pointer width differs from the host.
	pub allow_foreign_pointer_width: bool,
	/// Struct names copied verbatim instead of transcoded.
	pub opaque_types: Vec<String>,
	/// Cap on inflated size for compressed inputs.
	pub max_decompressed_bytes: usize,
}

impl Default for ParseOptions {
	fn default() -> Self {
		Self {
			limits: CatalogLimits::default(),
			strict_duplicates: false,
			quiet_header: false,
			allow_foreign_pointer_width: true,
			opaque_types: vec!["Link".to_owned()],
			max_decompressed_bytes: 512 * 1024 * 1024,
		}
	}
}

impl ParseOptions {
	/// Options used when probing whether bytes look like a chunked file.
	pub fn for_probe() -> Self {
		Self {
			quiet_header: true,
			..Self::default()
		}
	}

	/// Load options from a JSON document; missing keys keep their defaults.
	pub fn from_json(text: &str) -> crate::blend::Result<Self> {
		Ok(serde_json::from_str(text)?)
	}
}
