use std::path::PathBuf;

use blendlink::blend::{BlendError, Format, ParseOptions, Result, SchemaCatalog, Stderr, Severity, probe_path};

use crate::cmd::util::emit_json;

#[derive(clap::Args)]
pub struct Args {
	pub path: PathBuf,
	/// Print the flattened layout of one struct.
	#[arg(long = "struct")]
	pub struct_name: Option<String>,
	#[arg(long)]
	pub json: bool,
}

/// Print schema table sizes and, optionally, one struct's flattened members.
pub fn run(args: Args) -> Result<()> {
	let Args { path, struct_name, json } = args;

	let options = ParseOptions::default();
	let probe = probe_path(&path, &Format::BLENDER, &options)?;
	let dna = probe.dna.ok_or(BlendError::SchemaNotFound)?;
	let layout = probe.header.layout();

	let mut layout_json = None;
	if let Some(name) = &struct_name {
		let catalog = SchemaCatalog::compile(&dna, layout, &options.limits, &Stderr { min: Severity::Warning })?;
		let idx = catalog.find_struct(name).ok_or_else(|| BlendError::StructNotFound { name: name.clone() })?;
		let Some(def) = catalog.struct_def(idx) else {
			return Err(BlendError::StructNotFound { name: name.clone() });
		};

		layout_json = Some(StructJson {
			name: def.name.as_str().to_owned(),
			sdna_index: idx,
			len: def.len,
			flattened_len: def.flattened_len,
			flags: def.flags.labels(),
			members: def
				.members
				.iter()
				.map(|member| MemberJson {
					path: catalog.member_path(member),
					type_name: catalog.member_type_name(member).to_owned(),
					decl: catalog.member_decl(member).to_owned(),
					offset: member.offset,
					len: member.len,
					count: member.count,
					ptr_depth: member.ptr_depth,
				})
				.collect(),
		});
	}

	if json {
		emit_json(&DnaJson {
			path: path.display().to_string(),
			names: dna.names.len(),
			types: dna.types.len(),
			structs: dna.structs.len(),
			layout: layout_json,
		});
		return Ok(());
	}

	println!("path: {}", path.display());
	println!("version: {}", probe.header.version);
	println!("dna_names: {}", dna.names.len());
	println!("dna_types: {}", dna.types.len());
	println!("dna_structs: {}", dna.structs.len());

	if let Some(item) = layout_json {
		println!("struct: {}", item.name);
		println!("sdna_index: {}", item.sdna_index);
		println!("len: {}", item.len);
		if item.flattened_len != item.len {
			println!("flattened_len: {} (misaligned)", item.flattened_len);
		}
		println!("member_count: {}", item.members.len());
		for member in &item.members {
			println!("  +{:<5} {:>4}  {} {}  ({})", member.offset, member.len, member.type_name, member.decl, member.path);
		}
	}

	Ok(())
}

#[derive(serde::Serialize)]
struct MemberJson {
	path: String,
	type_name: String,
	decl: String,
	offset: usize,
	len: usize,
	count: usize,
	ptr_depth: u8,
}

#[derive(serde::Serialize)]
struct StructJson {
	name: String,
	sdna_index: usize,
	len: usize,
	flattened_len: usize,
	flags: Vec<&'static str>,
	members: Vec<MemberJson>,
}

#[derive(serde::Serialize)]
struct DnaJson {
	path: String,
	names: usize,
	types: usize,
	structs: usize,
	layout: Option<StructJson>,
}
