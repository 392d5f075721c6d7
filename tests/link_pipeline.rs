#![allow(missing_docs)]

use std::sync::Arc;

use blendlink::blend::{
	BlendError, ChunkKind, Collect, Compression, Flags, Format, LinkedChunk, LinkedFile, ParseOptions, ParseState, Reader, SchemaCatalog, Severity,
	Status, encode_bytes,
};
use blendlink_testkit::{FileBuilder, Order, SchemaBuilder, native_pointer_size};

fn ptr() -> usize {
	native_pointer_size()
}

fn memory(schema: &SchemaBuilder) -> Arc<SchemaCatalog> {
	Arc::new(SchemaCatalog::memory(&schema.build(Order::native())).expect("memory catalog"))
}

fn node_schema(pointer_size: usize) -> SchemaBuilder {
	SchemaBuilder::with_primitives(pointer_size)
		.add_struct("Node", &[("int", "value"), ("Node", "*next")])
		.add_struct("Holder", &[("Node", "**items"), ("int", "n")])
}

fn i32_at(chunk: &LinkedChunk, offset: usize) -> i32 {
	i32::from_ne_bytes(chunk.data[offset..offset + 4].try_into().expect("four bytes"))
}

fn ptr_at(chunk: &LinkedChunk, offset: usize) -> u64 {
	let raw = &chunk.data[offset..offset + ptr()];
	if ptr() == 4 {
		u64::from(u32::from_ne_bytes(raw.try_into().expect("four bytes")))
	} else {
		u64::from_ne_bytes(raw.try_into().expect("eight bytes"))
	}
}

fn parse(memory: Arc<SchemaCatalog>, bytes: &[u8]) -> LinkedFile {
	Reader::new(Format::BLENDER, memory).parse_bytes(bytes).expect("parse")
}

#[test]
fn minimal_file_with_custom_magic() {
	let schema = SchemaBuilder::with_primitives(ptr()).add_struct("Foo", &[("int", "a"), ("int", "b")]);
	let file = FileBuilder::new(b"MYFORMT", ptr(), Order::native(), 300);
	let foo = file.payload().i32(1).i32(2).build();
	let bytes = file.chunk(b"DATA", 0, 0x1000, 1, &foo).schema(&schema.build(Order::native())).end();

	let mut reader = Reader::new(Format::with_magic(*b"MYFORMT"), memory(&schema));
	let linked = reader.parse_bytes(&bytes).expect("parse");

	assert_eq!(reader.state(), ParseState::Done);
	assert_eq!(&linked.header().magic, b"MYFORMT");
	let foos: Vec<_> = linked.of_type("Foo").collect();
	assert_eq!(foos.len(), 1);
	assert_eq!((i32_at(foos[0], 0), i32_at(foos[0], 4)), (1, 2));
	assert_eq!(linked.stats().relink.typed, 1);
}

#[test]
fn blender_reader_rejects_other_magic() {
	let schema = SchemaBuilder::with_primitives(ptr()).add_struct("Foo", &[("int", "a")]);
	let bytes = FileBuilder::new(b"MYFORMT", ptr(), Order::native(), 300).schema(&schema.build(Order::native())).end();

	let err = Reader::new(Format::BLENDER, memory(&schema)).parse_bytes(&bytes).expect_err("wrong magic");
	assert_eq!(err.status(), Status::InvalidHeader);
}

#[test]
fn corrupted_magic_yields_invalid_header_and_no_graph() {
	let schema = node_schema(ptr());
	let mut bytes = FileBuilder::native_blender().schema(&schema.build(Order::native())).end();
	bytes[0] = b'X';

	let diag = Arc::new(Collect::default());
	let mut reader = Reader::new(Format::BLENDER, memory(&schema)).with_diagnostics(diag.clone());
	let err = reader.parse_bytes(&bytes).expect_err("bad magic");

	assert!(matches!(err, BlendError::InvalidHeader { .. }));
	assert_eq!(reader.state(), ParseState::Failed);
	assert!(diag.contains(Severity::Warning, "not a BLENDER file"));
	assert!(diag.contains(Severity::Error, "invalid_header"));
}

#[test]
fn dangling_pointer_is_nulled() {
	let schema = node_schema(ptr());
	let file = FileBuilder::native_blender();
	let node = file.payload().i32(3).ptr(0xDEAD_0000).build();
	let bytes = file.chunk(b"DATA", 0, 0x1000, 1, &node).schema(&schema.build(Order::native())).end();

	let diag = Arc::new(Collect::default());
	let linked = Reader::new(Format::BLENDER, memory(&schema))
		.with_diagnostics(diag.clone())
		.parse_bytes(&bytes)
		.expect("parse");

	let node = &linked.chunks()[0];
	assert_eq!(i32_at(node, 0), 3);
	assert_eq!(ptr_at(node, 4), 0);
	assert!(linked.follow(node, 4).is_none());
	assert_eq!(linked.stats().relink.dangling, 1);
	assert!(diag.contains(Severity::Warning, "nulled"));
}

#[test]
fn short_widens_to_int_by_value() {
	let file_schema = SchemaBuilder::with_primitives(ptr()).add_struct("Foo", &[("short", "a"), ("int", "b")]);
	let memory_schema = SchemaBuilder::with_primitives(ptr()).add_struct("Foo", &[("int", "a"), ("int", "b")]);
	let file = FileBuilder::native_blender();
	let foos = file.payload().i16(0x7FFF).i32(5).i16(-3).i32(6).build();
	let bytes = file.chunk(b"DATA", 0, 0x1000, 2, &foos).schema(&file_schema.build(Order::native())).end();

	let linked = parse(memory(&memory_schema), &bytes);
	let foo = &linked.chunks()[0];
	assert_eq!(foo.data.len(), 16);
	assert_eq!((i32_at(foo, 0), i32_at(foo, 4)), (32767, 5));
	assert_eq!((i32_at(foo, 8), i32_at(foo, 12)), (-3, 6));
	let link = linked.link_table().link(0).expect("Foo links");
	assert!(link.members[0].flags.contains(Flags::NEED_CAST));
}

#[test]
fn member_missing_from_file_is_zero() {
	let file_schema = SchemaBuilder::with_primitives(ptr()).add_struct("Foo", &[("int", "a"), ("int", "b")]);
	let memory_schema = SchemaBuilder::with_primitives(ptr()).add_struct("Foo", &[("int", "a"), ("int", "b"), ("int", "c")]);
	let file = FileBuilder::native_blender();
	let foo = file.payload().i32(1).i32(2).build();
	let bytes = file.chunk(b"DATA", 0, 0x1000, 1, &foo).schema(&file_schema.build(Order::native())).end();

	let linked = parse(memory(&memory_schema), &bytes);
	let foo = &linked.chunks()[0];
	assert_eq!(foo.data.len(), 12);
	assert_eq!((i32_at(foo, 0), i32_at(foo, 4), i32_at(foo, 8)), (1, 2, 0));
	let link = linked.link_table().link(0).expect("Foo links");
	assert!(link.flags.contains(Flags::MISSING));
	assert_eq!(link.members[2].file_member, None);
}

#[test]
fn forward_references_close_the_pointer_graph() {
	let schema = node_schema(ptr());
	let file = FileBuilder::native_blender();
	let a = file.payload().i32(1).ptr(0x2000).build();
	let b = file.payload().i32(2).ptr(0x3000).build();
	let c = file.payload().i32(3).ptr(0x1000).build();
	let bytes = file
		.chunk(b"DATA", 0, 0x1000, 1, &a)
		.chunk(b"DATA", 0, 0x2000, 1, &b)
		.chunk(b"DATA", 0, 0x3000, 1, &c)
		.schema(&schema.build(Order::native()))
		.end();

	let linked = parse(memory(&schema), &bytes);
	let start = &linked.chunks()[0];
	let mut seen = vec![i32_at(start, 0)];
	let mut at = start;
	for _ in 0..3 {
		at = linked.follow(at, 4).expect("pointer resolves");
		seen.push(i32_at(at, 0));
	}
	assert_eq!(seen, vec![1, 2, 3, 1]);
	assert_eq!(at.address(), start.address());
}

#[test]
fn arrays_truncate_and_pad_to_the_program_length() {
	let wide = SchemaBuilder::with_primitives(ptr()).add_struct("Arr", &[("int", "v[4]")]);
	let narrow = SchemaBuilder::with_primitives(ptr()).add_struct("Arr", &[("int", "v[2]")]);

	let file = FileBuilder::native_blender();
	let four = file.payload().i32(1).i32(2).i32(3).i32(4).build();
	let bytes = file.chunk(b"DATA", 0, 0x1000, 1, &four).schema(&wide.build(Order::native())).end();
	let linked = parse(memory(&narrow), &bytes);
	let arr = &linked.chunks()[0];
	assert_eq!(arr.data.len(), 8);
	assert_eq!((i32_at(arr, 0), i32_at(arr, 4)), (1, 2));

	let file = FileBuilder::native_blender();
	let two = file.payload().i32(7).i32(8).build();
	let bytes = file.chunk(b"DATA", 0, 0x1000, 1, &two).schema(&narrow.build(Order::native())).end();
	let linked = parse(memory(&wide), &bytes);
	let arr = &linked.chunks()[0];
	assert_eq!(arr.data.len(), 16);
	assert_eq!((0..4).map(|slot| i32_at(arr, slot * 4)).collect::<Vec<_>>(), vec![7, 8, 0, 0]);
}

#[test]
fn big_endian_32_bit_file_converts_to_host_layout() {
	let file = FileBuilder::new(b"BLENDER", 4, Order::Big, 280);
	let a = file.payload().i32(0x0102_0304).ptr(0x20).build();
	let b = file.payload().i32(-9).ptr(0x10).build();
	let bytes = file
		.chunk(b"DATA", 0, 0x10, 1, &a)
		.chunk(b"DATA", 0, 0x20, 1, &b)
		.schema(&node_schema(4).build(Order::Big))
		.end();

	let linked = parse(memory(&node_schema(ptr())), &bytes);
	assert_eq!(linked.header().version, 280);
	assert_eq!(linked.stats().pointer_size, 4);
	assert_eq!(linked.stats().endianness, "big");

	let nodes: Vec<_> = linked.of_type("Node").collect();
	assert_eq!(nodes.len(), 2);
	assert_eq!(nodes[0].data.len(), 4 + ptr());
	assert_eq!(i32_at(nodes[0], 0), 0x0102_0304);
	assert_eq!(i32_at(nodes[1], 0), -9);
	assert_eq!(linked.follow(nodes[0], 4).map(LinkedChunk::address), Some(nodes[1].address()));
	assert_eq!(linked.follow(nodes[1], 4).map(LinkedChunk::address), Some(nodes[0].address()));
}

#[test]
fn pointer_arrays_widen_across_pointer_sizes() {
	let file = FileBuilder::new(b"BLENDER", 4, Order::Big, 280);
	let holder = file.payload().ptr(0x300).i32(2).build();
	let items = file.payload().ptr(0x400).ptr(0x500).build();
	let first = file.payload().i32(4).ptr(0).build();
	let second = file.payload().i32(5).ptr(0).build();
	let bytes = file
		.chunk(b"DATA", 1, 0x100, 1, &holder)
		.chunk(b"DATA", 999, 0x300, 2, &items)
		.chunk(b"DATA", 0, 0x400, 1, &first)
		.chunk(b"DATA", 0, 0x500, 1, &second)
		.schema(&node_schema(4).build(Order::Big))
		.end();

	let linked = parse(memory(&node_schema(ptr())), &bytes);
	let holder = linked.of_type("Holder").next().expect("holder");
	assert_eq!(i32_at(holder, ptr()), 2);

	let items = linked.follow(holder, 0).expect("items array");
	assert_eq!(items.kind, ChunkKind::PointerArray);
	assert_eq!(items.data.len(), 2 * ptr());
	let values: Vec<i32> = (0..2)
		.map(|slot| i32_at(linked.follow(items, slot * ptr()).expect("element"), 0))
		.collect();
	assert_eq!(values, vec![4, 5]);
	assert_eq!(linked.stats().relink.pointer_arrays, 1);
}

#[test]
fn duplicate_addresses_keep_the_first_chunk() {
	let schema = node_schema(ptr());
	let file = FileBuilder::native_blender();
	let a = file.payload().i32(1).ptr(0).build();
	let b = file.payload().i32(2).ptr(0).build();
	let bytes = file
		.chunk(b"DATA", 0, 0x1000, 1, &a)
		.chunk(b"DATA", 0, 0x1000, 1, &b)
		.schema(&schema.build(Order::native()))
		.end();

	let diag = Arc::new(Collect::default());
	let linked = Reader::new(Format::BLENDER, memory(&schema))
		.with_diagnostics(diag.clone())
		.parse_bytes(&bytes)
		.expect("lenient parse");
	assert_eq!(linked.chunks().len(), 1);
	assert_eq!(i32_at(&linked.chunks()[0], 0), 1);
	assert!(diag.contains(Severity::Debug, "duplicate"));
}

#[test]
fn strict_duplicates_reject_conflicting_headers() {
	let schema = node_schema(ptr());
	let file = FileBuilder::native_blender();
	let a = file.payload().i32(1).ptr(0).build();
	let pair = file.payload().i32(2).ptr(0).i32(3).ptr(0).build();
	let bytes = file
		.chunk(b"DATA", 0, 0x1000, 1, &a)
		.chunk(b"DATA", 0, 0x1000, 2, &pair)
		.schema(&schema.build(Order::native()))
		.end();

	let options = ParseOptions {
		strict_duplicates: true,
		..ParseOptions::default()
	};
	let mut reader = Reader::new(Format::BLENDER, memory(&schema)).with_options(options);
	let err = reader.parse_bytes(&bytes).expect_err("conflicting duplicate");
	assert!(matches!(err, BlendError::DuplicateMismatch { old: 0x1000 }));
	assert_eq!(err.status(), Status::InsertFailed);
	assert_eq!(reader.state(), ParseState::Failed);
}

#[test]
fn table_ceiling_comes_from_options() {
	let schema = node_schema(ptr());
	let bytes = FileBuilder::native_blender().schema(&schema.build(Order::native())).end();

	let options = ParseOptions::from_json(r#"{ "limits": { "max_table_size": 4 } }"#).expect("options");
	assert_eq!(options.limits.max_array_rank, 3);
	let err = Reader::new(Format::BLENDER, memory(&schema))
		.with_options(options)
		.parse_bytes(&bytes)
		.expect_err("table over ceiling");
	assert!(matches!(err, BlendError::TableTooLarge { max: 4, .. }));
}

#[test]
fn compressed_files_parse_from_disk() {
	let schema = node_schema(ptr());
	let file = FileBuilder::native_blender();
	let a = file.payload().i32(41).ptr(0x2000).build();
	let b = file.payload().i32(42).ptr(0x1000).build();
	let plain = file
		.chunk(b"DATA", 0, 0x1000, 1, &a)
		.chunk(b"DATA", 0, 0x2000, 1, &b)
		.schema(&schema.build(Order::native()))
		.end();

	let dir = tempfile::tempdir().expect("tempdir");
	for codec in [Compression::None, Compression::Gzip, Compression::Zstd] {
		let path = dir.path().join(format!("ring-{}.blend", codec.as_str()));
		std::fs::write(&path, encode_bytes(codec, &plain).expect("encode")).expect("write");

		let linked = Reader::new(Format::BLENDER, memory(&schema)).parse_path(&path).expect("parse compressed");
		let values: Vec<i32> = linked.of_type("Node").map(|node| i32_at(node, 0)).collect();
		assert_eq!(values, vec![41, 42], "codec {}", codec.as_str());
		let first = &linked.chunks()[0];
		assert_eq!(linked.follow(first, 4).map(|node| i32_at(node, 0)), Some(42));
	}
}
