use std::path::PathBuf;

use blendlink::blend::{Format, Reader, Result, Writer};

use crate::cmd::util::{Codec, load_options, ptr_hex, reference_catalog, schema_or_self};

#[derive(clap::Args)]
pub struct Args {
	pub path: PathBuf,
	/// File whose schema is the target layout (defaults to the input).
	#[arg(long)]
	pub schema: Option<PathBuf>,
	/// JSON file with parse options.
	#[arg(long)]
	pub options: Option<PathBuf>,
	/// Output path.
	#[arg(long)]
	pub out: PathBuf,
	/// Output compression.
	#[arg(long, value_enum, default_value = "none")]
	pub compress: Codec,
}

/// Link a file and write it back in the reference layout.
pub fn run(args: Args) -> Result<()> {
	let Args {
		path,
		schema,
		options,
		out,
		compress,
	} = args;

	let options = load_options(options.as_deref())?;
	let memory = reference_catalog(&schema_or_self(schema, &path), &options)?;
	let file = Reader::new(Format::BLENDER, memory.clone()).with_options(options).parse_path(&path)?;

	Writer::new(Format::BLENDER, &memory, file.header().version)?.write_path(file.chunks(), &out, compress.into())?;

	println!("path: {}", path.display());
	println!("out: {}", out.display());
	println!("chunks: {}", file.chunks().len());
	if let Some(first) = file.chunks().first() {
		println!("first_address: {}", ptr_hex(first.address()));
	}
	Ok(())
}
