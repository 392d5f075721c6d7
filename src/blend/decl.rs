/// Parsed DNA field declarator details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl<'a> {
	/// Identifier portion of the declarator.
	pub ident: &'a str,
	/// Pointer nesting depth (`*`, `**`, ...).
	pub ptr_depth: u8,
	/// Captured array extents, outermost first, at most `max_rank` entries.
	pub dims: Vec<usize>,
	/// Product of every array extent, including uncaptured ones.
	pub count: usize,
	/// Whether declarator looks like a function pointer.
	pub is_func_ptr: bool,
}

impl FieldDecl<'_> {
	/// Whether the declarator stores an address.
	pub fn is_pointer(&self) -> bool {
		self.ptr_depth > 0 || self.is_func_ptr
	}
}

/// Parse DNA declarator text into normalized pointer/array metadata.
pub fn parse_field_decl(raw: &str, max_rank: usize) -> FieldDecl<'_> {
	let trimmed = raw.trim();
	let mut decl = FieldDecl {
		ident: trimmed,
		ptr_depth: 0,
		dims: Vec::new(),
		count: 1,
		is_func_ptr: trimmed.contains(")("),
	};

	if let Some(start) = trimmed.find("(*") {
		let after = &trimmed[start + 2..];
		if let Some(close_idx) = after.find(')') {
			let inside = &after[..close_idx];
			let stars = inside.chars().take_while(|c| *c == '*').count();
			decl.ptr_depth = (stars as u8).saturating_add(1);
			let ident = inside.trim_start_matches('*').trim();
			if !ident.is_empty() {
				decl.ident = ident;
			}
			let tail = &after[close_idx + 1..];
			if !decl.is_func_ptr {
				read_dims(tail, max_rank, &mut decl);
			}
			return decl;
		}
	}

	let stars = trimmed.chars().take_while(|c| *c == '*').count();
	decl.ptr_depth = stars as u8;
	let tail = &trimmed[stars..];

	let ident_end = tail.find('[').unwrap_or(tail.len());
	let ident = tail[..ident_end].trim();
	if !ident.is_empty() {
		decl.ident = ident;
	}

	read_dims(&tail[ident_end..], max_rank, &mut decl);
	decl
}

fn read_dims(mut tail: &str, max_rank: usize, decl: &mut FieldDecl<'_>) {
	let mut total = 1_usize;
	while let Some(start) = tail.find('[') {
		let Some(end) = tail[start + 1..].find(']') else {
			break;
		};
		let end = start + 1 + end;
		let dim = tail[start + 1..end].trim().parse::<usize>().unwrap_or(1);
		if decl.dims.len() < max_rank {
			decl.dims.push(dim);
		}
		total = total.saturating_mul(dim);
		tail = &tail[end + 1..];
	}
	decl.count = total;
}
