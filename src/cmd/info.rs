use std::path::PathBuf;

use blendlink::blend::{Compression, Format, ParseOptions, Result, probe_path};

use crate::cmd::util::emit_json;

#[derive(clap::Args)]
pub struct Args {
	pub path: PathBuf,
	#[arg(long)]
	pub json: bool,
}

/// Print header fields and chunk counts without linking.
pub fn run(args: Args) -> Result<()> {
	let Args { path, json } = args;

	let compression = Compression::detect_path(&path)?;
	let probe = probe_path(&path, &Format::BLENDER, &ParseOptions::default())?;
	let header = probe.header;

	if json {
		let payload = InfoJson {
			path: path.display().to_string(),
			compression: compression.as_str(),
			version: header.version,
			pointer_size: header.pointer_width.bytes(),
			endianness: header.endianness.as_str(),
			chunk_count: probe.chunk_count,
			has_schema: probe.dna.is_some(),
			has_end: probe.has_end,
			schema_structs: probe.dna.as_ref().map_or(0, |dna| dna.structs.len()),
			codes: probe.codes.iter().map(|(code, count)| CodeCountJson { code: code.clone(), count: *count }).collect(),
		};
		emit_json(&payload);
		return Ok(());
	}

	println!("path: {}", path.display());
	println!("compression: {}", compression.as_str());
	println!("version: {}", header.version);
	println!("pointer_size: {}", header.pointer_width.bytes());
	println!("endianness: {}", header.endianness.as_str());
	println!("chunk_count: {}", probe.chunk_count);
	println!("has_schema: {}", probe.dna.is_some());
	println!("has_end: {}", probe.has_end);
	if let Some(dna) = &probe.dna {
		println!("schema_structs: {}", dna.structs.len());
	}

	let mut entries = probe.codes;
	entries.sort_by(|left, right| right.1.cmp(&left.1).then_with(|| left.0.cmp(&right.0)));
	println!("top_codes:");
	for (code, count) in entries.into_iter().take(12) {
		println!("  {code}: {count}");
	}

	Ok(())
}

#[derive(serde::Serialize)]
struct CodeCountJson {
	code: String,
	count: usize,
}

#[derive(serde::Serialize)]
struct InfoJson {
	path: String,
	compression: &'static str,
	version: u16,
	pointer_size: usize,
	endianness: &'static str,
	chunk_count: usize,
	has_schema: bool,
	has_end: bool,
	schema_structs: usize,
	codes: Vec<CodeCountJson>,
}
