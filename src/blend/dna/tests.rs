use blendlink_testkit::{Order, SchemaBuilder};

use crate::blend::{BlendError, CatalogLimits, Dna, Endianness};

fn sample() -> SchemaBuilder {
	SchemaBuilder::with_primitives(8)
		.add_struct("Foo", &[("int", "a"), ("int", "b")])
		.add_struct("Bar", &[("Foo", "*p"), ("Foo", "inline"), ("float", "co[3]")])
}

#[test]
fn parses_tables_in_both_byte_orders() {
	for (order, endianness) in [(Order::Little, Endianness::Little), (Order::Big, Endianness::Big)] {
		let payload = sample().build(order);
		let dna = Dna::parse(&payload, endianness, &CatalogLimits::default()).expect("dna parses");

		assert_eq!(dna.tlen.len(), dna.types.len());
		assert_eq!(dna.structs.len(), 2);
		let bar = &dna.structs[1];
		assert_eq!(dna.type_name(bar.type_idx), "Bar");
		assert_eq!(dna.field_name(bar.fields[2].name_idx), "co[3]");
		assert_eq!(dna.tlen[bar.type_idx as usize], 8 + 8 + 12);
		assert_eq!(dna.struct_for_type[bar.type_idx as usize], Some(1));
	}
}

#[test]
fn leading_sdna_tag_is_optional() {
	let payload = sample().build(Order::Little);
	let dna = Dna::parse(&payload[4..], Endianness::Little, &CatalogLimits::default()).expect("untagged dna parses");
	assert_eq!(dna.structs.len(), 2);
}

#[test]
fn wrong_section_tag_fails() {
	let mut payload = sample().build(Order::Little);
	payload[4..8].copy_from_slice(b"NAMX");
	let err = Dna::parse(&payload, Endianness::Little, &CatalogLimits::default()).expect_err("bad tag");
	assert!(matches!(err, BlendError::DnaBadTag { expected, .. } if expected == *b"NAME"));
}

#[test]
fn table_ceiling_is_a_hard_failure() {
	let payload = sample().build(Order::Little);
	let limits = CatalogLimits {
		max_table_size: 4,
		..CatalogLimits::default()
	};
	let err = Dna::parse(&payload, Endianness::Little, &limits).expect_err("ceiling exceeded");
	assert!(matches!(err, BlendError::TableTooLarge { kind: "name", max: 4, .. }));
}

#[test]
fn truncated_payload_fails_cleanly() {
	let payload = sample().build(Order::Little);
	for cut in [6, 20, payload.len() - 3] {
		assert!(Dna::parse(&payload[..cut], Endianness::Little, &CatalogLimits::default()).is_err(), "cut at {cut}");
	}
}

#[test]
fn reencodes_in_the_other_byte_order() {
	let payload = sample().build(Order::Big);
	let dna = Dna::parse(&payload, Endianness::Big, &CatalogLimits::default()).expect("big-endian dna");

	let little = dna.to_bytes(Endianness::Little);
	assert_eq!(little, sample().build(Order::Little));
	let again = Dna::parse(&little, Endianness::Little, &CatalogLimits::default()).expect("little-endian dna");
	assert_eq!(again.names, dna.names);
	assert_eq!(again.tlen, dna.tlen);
}
