use std::sync::Arc;

use blendlink_testkit::{FileBuilder, Order, SchemaBuilder, native_pointer_size};

use crate::blend::diag::{Collect, Severity, Silent};
use crate::blend::{
	BlendError, CatalogLimits, ChunkHandler, ChunkHeader, Format, Layout, LinkedChunk, ParseOptions, ParseState, Reader, SchemaCatalog, Status,
};

fn schema() -> SchemaBuilder {
	SchemaBuilder::with_primitives(native_pointer_size()).add_struct("Foo", &[("int", "a"), ("int", "b")])
}

fn memory() -> Arc<SchemaCatalog> {
	Arc::new(SchemaCatalog::from_blob(&schema().build(Order::native()), Layout::native(), &CatalogLimits::default(), &Silent).expect("memory"))
}

fn foo_file() -> FileBuilder {
	let file = FileBuilder::native_blender();
	let foo = file.payload().i32(1).i32(2).build();
	file.chunk(b"DATA", 0, 0x1000, 1, &foo).schema(&schema().build(Order::native()))
}

fn reader(diag: Arc<Collect>) -> Reader {
	Reader::new(Format::BLENDER, memory()).with_diagnostics(diag)
}

#[test]
fn reaches_done_and_reports_handler_calls() {
	struct Count(usize);
	impl ChunkHandler for Count {
		fn on_chunk(&mut self, header: &ChunkHeader, linked: &LinkedChunk) {
			assert_eq!(header.code, linked.code());
			self.0 += 1;
		}
	}

	let bytes = foo_file().end();
	let mut stream = crate::blend::MemoryStream::new(bytes);
	let mut reader = reader(Arc::new(Collect::default()));
	let mut count = Count(0);
	let file = reader.parse_with(&mut stream, &mut count).expect("parse");

	assert_eq!(reader.state(), ParseState::Done);
	assert_eq!(count.0, 1);
	assert_eq!(file.chunks().len(), 1);
	assert_eq!(file.stats().chunk_count, 1);
}

#[test]
fn end_of_stream_without_end_marker_is_accepted() {
	let bytes = foo_file().into_bytes();
	let diag = Arc::new(Collect::default());
	let file = reader(diag.clone()).parse_bytes(&bytes).expect("parse without ENDB");
	assert_eq!(file.chunks().len(), 1);
	assert!(diag.contains(Severity::Debug, "without an end marker"));
}

#[test]
fn legacy_schema_code_reads_rest_of_stream() {
	let file = FileBuilder::native_blender();
	let foo = file.payload().i32(5).i32(6).build();
	let bytes = file.chunk(b"DATA", 0, 0x1000, 1, &foo).raw(&schema().build(Order::native())).into_bytes();

	let linked = reader(Arc::new(Collect::default())).parse_bytes(&bytes).expect("legacy schema");
	assert_eq!(linked.catalog().structs().len(), 1);
	assert_eq!(linked.chunks()[0].data.len(), 8);
}

#[test]
fn missing_schema_is_a_generic_failure() {
	let file = FileBuilder::native_blender();
	let foo = file.payload().i32(1).i32(2).build();
	let bytes = file.chunk(b"DATA", 0, 0x1000, 1, &foo).end();

	let mut reader = reader(Arc::new(Collect::default()));
	let err = reader.parse_bytes(&bytes).expect_err("no schema");
	assert!(matches!(err, BlendError::SchemaNotFound));
	assert_eq!(err.status(), Status::Failed);
	assert_eq!(reader.state(), ParseState::Failed);
}

#[test]
fn negative_length_is_invalid_length() {
	let mut bytes = foo_file().end();
	let len_at = 12 + 4;
	bytes[len_at..len_at + 4].copy_from_slice(&(-5_i32).to_ne_bytes());
	let err = reader(Arc::new(Collect::default())).parse_bytes(&bytes).expect_err("negative length");
	assert_eq!(err.status(), Status::InvalidLength);
}

#[test]
fn length_past_stream_end_is_invalid_read() {
	let mut bytes = foo_file().end();
	let len_at = 12 + 4;
	bytes[len_at..len_at + 4].copy_from_slice(&0x00FF_FFFF_i32.to_ne_bytes());
	let err = reader(Arc::new(Collect::default())).parse_bytes(&bytes).expect_err("length overflow");
	assert!(matches!(err, BlendError::ChunkLenOutOfRange { at: 12, .. }));
	assert_eq!(err.status(), Status::InvalidRead);
}

#[test]
fn truncated_chunk_header_is_invalid_read() {
	let mut with_partial = foo_file().into_bytes();
	with_partial.extend_from_slice(b"DA");
	let err = reader(Arc::new(Collect::default())).parse_bytes(&with_partial).expect_err("partial header");
	assert_eq!(err.status(), Status::InvalidRead);
}

#[test]
fn foreign_pointer_width_can_be_refused() {
	let foreign = if native_pointer_size() == 8 { 4 } else { 8 };
	let bytes = FileBuilder::new(b"BLENDER", foreign, Order::native(), 300)
		.schema(&SchemaBuilder::with_primitives(foreign).add_struct("Foo", &[("int", "a"), ("int", "b")]).build(Order::native()))
		.end();

	let options = ParseOptions {
		allow_foreign_pointer_width: false,
		..ParseOptions::default()
	};
	let err = reader(Arc::new(Collect::default())).with_options(options).parse_bytes(&bytes).expect_err("width refused");
	assert!(matches!(err, BlendError::PointerWidthMismatch { file, .. } if file == foreign));

	let linked = reader(Arc::new(Collect::default())).parse_bytes(&bytes).expect("width allowed");
	assert_eq!(linked.header().pointer_width.bytes(), foreign);
}

#[test]
fn quiet_header_suppresses_the_warning() {
	let mut bytes = foo_file().end();
	bytes[0] = b'X';

	let diag = Arc::new(Collect::default());
	let err = reader(diag.clone()).parse_bytes(&bytes).expect_err("bad magic");
	assert_eq!(err.status(), Status::InvalidHeader);
	assert!(diag.contains(Severity::Warning, "not a BLENDER file"));

	let quiet = Arc::new(Collect::default());
	let options = ParseOptions {
		quiet_header: true,
		..ParseOptions::default()
	};
	reader(quiet.clone()).with_options(options).parse_bytes(&bytes).expect_err("bad magic");
	assert!(!quiet.contains(Severity::Warning, "not a BLENDER file"));
}

#[test]
fn stripped_magic_is_accepted() {
	let file = FileBuilder::new(b"BLENDEs", native_pointer_size(), Order::native(), 300);
	let bytes = file.schema(&schema().build(Order::native())).end();
	assert!(reader(Arc::new(Collect::default())).parse_bytes(&bytes).is_ok());
}

#[test]
fn disjoint_schema_fails_to_link() {
	let other = SchemaBuilder::with_primitives(native_pointer_size()).add_struct("Bar", &[("int", "x")]);
	let bytes = FileBuilder::native_blender().schema(&other.build(Order::native())).end();
	let err = reader(Arc::new(Collect::default())).parse_bytes(&bytes).expect_err("nothing links");
	assert_eq!(err.status(), Status::LinkFailed);
}

#[test]
fn probe_counts_chunks_without_linking() {
	let file = FileBuilder::native_blender();
	let foo = file.payload().i32(1).i32(2).build();
	let bytes = file
		.chunk(b"DATA", 0, 0x1000, 1, &foo)
		.chunk(b"TEST", 0, 0x2000, 1, &foo)
		.chunk(b"DATA", 0, 0x3000, 1, &foo)
		.schema(&schema().build(Order::native()))
		.end();

	let mut stream = crate::blend::MemoryStream::new(bytes);
	let found = crate::blend::probe(&mut stream, &Format::BLENDER, &ParseOptions::for_probe()).expect("probe");
	assert_eq!(found.chunk_count, 3);
	assert_eq!(found.codes, vec![("DATA".to_owned(), 2), ("TEST".to_owned(), 1)]);
	assert!(found.has_end);
	assert_eq!(found.dna.map(|dna| dna.structs.len()), Some(1));
}
