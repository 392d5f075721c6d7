use std::path::{Path, PathBuf};
use std::sync::Arc;

use blendlink::blend::{BlendError, Compression, Format, ParseOptions, Result, SchemaCatalog, probe_path};

/// Print `value` as pretty JSON on stdout.
pub(crate) fn emit_json<T: serde::Serialize>(value: &T) {
	match serde_json::to_string_pretty(value) {
		Ok(text) => println!("{text}"),
		Err(err) => eprintln!("error: json encode failed: {err}"),
	}
}

/// Load parse options from a JSON file, or defaults.
pub(crate) fn load_options(path: Option<&Path>) -> Result<ParseOptions> {
	match path {
		Some(path) => ParseOptions::from_json(&std::fs::read_to_string(path)?),
		None => Ok(ParseOptions::default()),
	}
}

/// Program catalog taken from the schema chunk of a reference file.
pub(crate) fn reference_catalog(path: &Path, options: &ParseOptions) -> Result<Arc<SchemaCatalog>> {
	let probe = probe_path(path, &Format::BLENDER, options)?;
	let dna = probe.dna.ok_or(BlendError::SchemaNotFound)?;
	Ok(Arc::new(SchemaCatalog::memory_from_dna(&dna)?))
}

/// Reference schema path, defaulting to the input file itself.
pub(crate) fn schema_or_self(schema: Option<PathBuf>, path: &Path) -> PathBuf {
	schema.unwrap_or_else(|| path.to_path_buf())
}

/// Compression codec choice for written files.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub(crate) enum Codec {
	None,
	Gzip,
	Zstd,
}

impl From<Codec> for Compression {
	fn from(value: Codec) -> Self {
		match value {
			Codec::None => Compression::None,
			Codec::Gzip => Compression::Gzip,
			Codec::Zstd => Compression::Zstd,
		}
	}
}

/// Render an address as `0x`-prefixed hex.
pub(crate) fn ptr_hex(value: u64) -> String {
	format!("0x{value:016x}")
}
