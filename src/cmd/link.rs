use std::path::PathBuf;
use std::sync::Arc;

use blendlink::blend::{FileStats, Flags, Format, LinkedFile, Reader, Result, TracingDiagnostics};

use crate::cmd::util::{emit_json, load_options, reference_catalog, schema_or_self};

#[derive(clap::Args)]
pub struct Args {
	pub path: PathBuf,
	/// File whose schema is the target layout (defaults to the input).
	#[arg(long)]
	pub schema: Option<PathBuf>,
	/// JSON file with parse options.
	#[arg(long)]
	pub options: Option<PathBuf>,
	#[arg(long)]
	pub json: bool,
}

/// Link a file against a reference schema and report struct drift.
pub fn run(args: Args) -> Result<()> {
	let Args { path, schema, options, json } = args;

	let options = load_options(options.as_deref())?;
	let memory = reference_catalog(&schema_or_self(schema, &path), &options)?;
	let file = Reader::new(Format::BLENDER, memory)
		.with_options(options)
		.with_diagnostics(Arc::new(TracingDiagnostics))
		.parse_path(&path)?;

	let report = LinkJson {
		path: path.display().to_string(),
		stats: file.stats(),
		drift: drift(&file),
	};

	if json {
		emit_json(&report);
		return Ok(());
	}

	let stats = &report.stats;
	println!("path: {}", report.path);
	println!("version: {}", stats.version);
	println!("pointer_size: {}", stats.pointer_size);
	println!("endianness: {}", stats.endianness);
	println!("chunks: {}", stats.chunk_count);
	println!("file_structs: {}", stats.file_structs);
	println!("linked_structs: {}", stats.linked_structs);
	println!(
		"relink: typed={} pointer_arrays={} raw={} opaque={} truncated={} dangling={}",
		stats.relink.typed, stats.relink.pointer_arrays, stats.relink.raw, stats.relink.opaque, stats.relink.truncated, stats.relink.dangling
	);
	println!("drift: {}", report.drift.len());
	for item in &report.drift {
		println!("  {} [{}]", item.name, item.flags.join(","));
		for name in &item.missing {
			println!("    missing {name}");
		}
		for name in &item.cast {
			println!("    cast {name}");
		}
		for name in &item.skipped {
			println!("    skipped {name}");
		}
	}

	Ok(())
}

fn drift(file: &LinkedFile) -> Vec<DriftJson> {
	let memory = file.memory();
	let catalog = file.catalog();
	let table = file.link_table();

	let mut out = Vec::new();
	for (idx, def) in memory.structs().iter().enumerate() {
		let Some(link) = table.link(idx) else {
			continue;
		};
		let skipped: Vec<String> = catalog
			.struct_def(link.file_struct)
			.map(|file_def| {
				file_def
					.members
					.iter()
					.zip(&link.file_flags)
					.filter(|(_, flags)| flags.contains(Flags::SKIP))
					.map(|(member, _)| catalog.member_path(member))
					.collect()
			})
			.unwrap_or_default();
		if link.flags == Flags::CAN_LINK && skipped.is_empty() {
			continue;
		}

		let select = |flag: Flags| -> Vec<String> {
			def.members
				.iter()
				.zip(&link.members)
				.filter(|(_, member_link)| member_link.flags.contains(flag))
				.map(|(member, _)| memory.member_path(member))
				.collect()
		};
		out.push(DriftJson {
			name: def.name.as_str().to_owned(),
			flags: link.flags.labels(),
			missing: select(Flags::MISSING),
			cast: select(Flags::NEED_CAST),
			skipped,
		});
	}
	out
}

#[derive(serde::Serialize)]
struct DriftJson {
	name: String,
	flags: Vec<&'static str>,
	missing: Vec<String>,
	cast: Vec<String>,
	skipped: Vec<String>,
}

#[derive(serde::Serialize)]
struct LinkJson {
	path: String,
	stats: FileStats,
	drift: Vec<DriftJson>,
}
