use crate::blend::{BlendError, ChunkHeader, Endianness, Layout, OldAddress, PointerWidth, Status, code_label};

const LE64: Layout = Layout {
	pointer_width: PointerWidth::W64,
	endianness: Endianness::Little,
};

const BE32: Layout = Layout {
	pointer_width: PointerWidth::W32,
	endianness: Endianness::Big,
};

#[test]
fn parses_64_bit_little_endian_header() {
	let mut bytes = Vec::new();
	bytes.extend_from_slice(b"OB\0\0");
	bytes.extend_from_slice(&16_i32.to_le_bytes());
	bytes.extend_from_slice(&0x1122_3344_5566_7788_u64.to_le_bytes());
	bytes.extend_from_slice(&3_u32.to_le_bytes());
	bytes.extend_from_slice(&2_i32.to_le_bytes());

	let head = ChunkHeader::parse(&bytes, LE64, 0).expect("header parses");
	assert_eq!(head.code, *b"OB\0\0");
	assert_eq!(head.len, 16);
	assert_eq!(head.old, OldAddress::Width64(0x1122_3344_5566_7788));
	assert_eq!(head.sdna_nr, 3);
	assert_eq!(head.nr, 2);
	assert_eq!(code_label(head.code), "OB");
}

#[test]
fn parses_32_bit_big_endian_header() {
	let mut bytes = Vec::new();
	bytes.extend_from_slice(b"DATA");
	bytes.extend_from_slice(&12_i32.to_be_bytes());
	bytes.extend_from_slice(&0x99AA_BBCC_u32.to_be_bytes());
	bytes.extend_from_slice(&7_u32.to_be_bytes());
	bytes.extend_from_slice(&1_i32.to_be_bytes());
	assert_eq!(bytes.len(), ChunkHeader::size(PointerWidth::W32));

	let head = ChunkHeader::parse(&bytes, BE32, 0).expect("legacy header parses");
	assert_eq!(head.old, OldAddress::Width32(0x99AA_BBCC));
	assert_eq!(head.old.widen(), 0x99AA_BBCC);
	assert_eq!(head.sdna_nr, 7);
	assert_eq!(head.nr, 1);
}

#[test]
fn negative_length_is_invalid_length() {
	let mut bytes = Vec::new();
	bytes.extend_from_slice(b"DATA");
	bytes.extend_from_slice(&(-4_i32).to_le_bytes());
	bytes.extend_from_slice(&[0; 16]);

	let err = ChunkHeader::parse(&bytes, LE64, 40).expect_err("negative length");
	assert!(matches!(err, BlendError::InvalidLength { at: 40, len: -4 }));
	assert_eq!(err.status(), Status::InvalidLength);
}

#[test]
fn write_then_parse_keeps_fields_across_layouts() {
	let head = ChunkHeader {
		code: *b"ME\0\0",
		len: 96,
		old: OldAddress::Width64(0xDEAD_BEEF),
		sdna_nr: 12,
		nr: 3,
	};
	for layout in [LE64, BE32] {
		let mut out = Vec::new();
		head.write(&mut out, layout);
		assert_eq!(out.len(), ChunkHeader::size(layout.pointer_width));
		let back = ChunkHeader::parse(&out, layout, 0).expect("parses back");
		assert_eq!(back.old.widen(), 0xDEAD_BEEF);
		assert_eq!(back.old.width(), layout.pointer_width);
		assert_eq!((back.code, back.len, back.sdna_nr, back.nr), (head.code, head.len, head.sdna_nr, head.nr));
	}
}

#[test]
fn old_address_narrowing_truncates() {
	let wide = OldAddress::new(PointerWidth::W64, 0x1_0000_0010);
	assert_eq!(wide.narrow(), 0x10);
	assert_eq!(OldAddress::new(PointerWidth::W32, 0x1_0000_0010), OldAddress::Width32(0x10));
	assert!(OldAddress::Width32(0).is_null());
}
