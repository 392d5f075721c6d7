use blendlink_testkit::{Order, SchemaBuilder};

use crate::blend::diag::{Collect, Severity, Silent};
use crate::blend::{BlendError, CatalogLimits, Endianness, Flags, Layout, PointerWidth, SchemaCatalog};

fn layout64() -> Layout {
	Layout {
		pointer_width: PointerWidth::W64,
		endianness: Endianness::Little,
	}
}

fn compile(schema: &SchemaBuilder) -> SchemaCatalog {
	SchemaCatalog::from_blob(&schema.build(Order::Little), layout64(), &CatalogLimits::default(), &Silent).expect("catalog compiles")
}

#[test]
fn flattens_nested_value_structs_with_offsets() {
	let schema = SchemaBuilder::with_primitives(8)
		.add_struct("Vec2", &[("float", "x"), ("float", "y")])
		.add_struct("Node", &[("int", "flag"), ("Vec2", "pos[2]"), ("Node", "*next"), ("short", "pad[2]")]);
	let catalog = compile(&schema);

	let idx = catalog.find_struct("Node").expect("Node");
	let def = catalog.struct_def(idx).expect("def");
	assert_eq!(def.len, 4 + 16 + 8 + 4);
	assert_eq!(def.flattened_len, def.len);
	assert!(!def.flags.contains(Flags::MISALIGNED));

	let offsets: Vec<(String, usize, usize)> = def
		.members
		.iter()
		.map(|member| (catalog.member_path(member), member.offset, member.len))
		.collect();
	assert_eq!(
		offsets,
		vec![
			("flag".to_owned(), 0, 4),
			("pos[0].x".to_owned(), 4, 4),
			("pos[0].y".to_owned(), 8, 4),
			("pos[1].x".to_owned(), 12, 4),
			("pos[1].y".to_owned(), 16, 4),
			("next".to_owned(), 20, 8),
			("pad".to_owned(), 28, 4),
		]
	);

	let second = &def.members[3];
	assert_eq!(second.array_index, 1);
	assert_eq!(second.depth(), 1);
	assert_eq!(def.members[5].ptr_depth, 1);
	assert!(def.members[5].primitive.is_none());
	assert_eq!(def.members[6].count, 2);
	assert_eq!(def.members[6].elem_size, 2);
}

#[test]
fn pointer_size_follows_layout() {
	let schema = SchemaBuilder::with_primitives(4).add_struct("Link", &[("Link", "*next"), ("Link", "*prev")]);
	let layout = Layout {
		pointer_width: PointerWidth::W32,
		endianness: Endianness::Big,
	};
	let catalog = SchemaCatalog::from_blob(&schema.build(Order::Big), layout, &CatalogLimits::default(), &Silent).expect("catalog");
	let def = catalog.struct_def(0).expect("Link");
	assert_eq!(def.members[1].offset, 4);
	assert_eq!(def.flattened_len, 8);
	assert_eq!(catalog.layout(), layout);
}

#[test]
fn misaligned_struct_is_flagged_and_reported() {
	let schema = SchemaBuilder::with_primitives(8).add_struct_with_len("Odd", &[("int", "a"), ("char", "b")], 8);
	let diag = Collect::default();
	let catalog = SchemaCatalog::from_blob(&schema.build(Order::Little), layout64(), &CatalogLimits::default(), &diag).expect("catalog");

	let def = catalog.struct_def(0).expect("Odd");
	assert_eq!(def.flattened_len, 5);
	assert!(def.flags.contains(Flags::MISALIGNED));
	assert!(diag.contains(Severity::Warning, "Odd"));
}

#[test]
fn function_pointers_and_pointer_arrays() {
	let schema = SchemaBuilder::with_primitives(8).add_struct("Ops", &[("void", "(*exec)()"), ("char", "**names"), ("void", "*slots[3]")]);
	let catalog = compile(&schema);
	let def = catalog.struct_def(0).expect("Ops");

	assert!(def.members[0].is_func_ptr);
	assert!(def.members[0].is_pointer());
	assert_eq!(def.members[1].ptr_depth, 2);
	assert_eq!(def.members[2].len, 24);
	assert_eq!(def.members[2].count, 3);
	assert_eq!(def.len, 8 + 8 + 24);
}

#[test]
fn recursive_value_nesting_hits_depth_limit() {
	let schema = SchemaBuilder::with_primitives(8)
		.add_struct_with_len("A", &[("B", "b")], 4)
		.add_struct_with_len("B", &[("A", "a")], 4);
	let err = SchemaCatalog::from_blob(&schema.build(Order::Little), layout64(), &CatalogLimits::default(), &Silent).expect_err("cycle");
	assert!(matches!(err, BlendError::SchemaTooDeep { max_depth: 32, .. }));
}

#[test]
fn huge_array_declaration_is_rejected() {
	let schema = SchemaBuilder::with_primitives(8).add_struct_with_len("Big", &[("int", "cells[65536][65536]")], 4);
	let err = SchemaCatalog::from_blob(&schema.build(Order::Little), layout64(), &CatalogLimits::default(), &Silent).expect_err("too large");
	assert!(matches!(err, BlendError::SchemaTooLarge { kind: "bytes", .. }));
}

#[test]
fn wide_inline_struct_array_is_rejected() {
	let schema = SchemaBuilder::with_primitives(8)
		.add_struct("Vec2", &[("float", "x"), ("float", "y")])
		.add_struct_with_len("Grid", &[("Vec2", "points[100000]")], 8);
	let err = SchemaCatalog::from_blob(&schema.build(Order::Little), layout64(), &CatalogLimits::default(), &Silent).expect_err("too many members");
	match err {
		BlendError::SchemaTooLarge { name, kind, limit } => {
			assert_eq!(name, "Grid");
			assert_eq!(kind, "members");
			assert_eq!(limit, 1 << 16);
		}
		other => panic!("unexpected error {other}"),
	}
}

#[test]
fn struct_byte_ceiling_is_configurable() {
	let schema = SchemaBuilder::with_primitives(8).add_struct("Buf", &[("char", "data[64]")]);
	let limits = CatalogLimits {
		max_struct_bytes: 32,
		..CatalogLimits::default()
	};
	let err = SchemaCatalog::from_blob(&schema.build(Order::Little), layout64(), &limits, &Silent).expect_err("over ceiling");
	assert!(matches!(err, BlendError::SchemaTooLarge { kind: "bytes", limit: 32, .. }));
	compile(&schema);
}

#[test]
fn lookups_verify_text() {
	let catalog = compile(&SchemaBuilder::with_primitives(8).add_struct("Foo", &[("int", "a")]));
	assert_eq!(catalog.find_struct("Foo"), Some(0));
	assert_eq!(catalog.find_struct("Bar"), None);
	assert_eq!(catalog.find_struct("int"), None);
	assert!(catalog.blob().is_some());
}
