/// Schema inspection command.
pub mod dna;
/// Header and chunk census command.
pub mod info;
/// Link report command.
pub mod link;
/// Relink-and-write command.
pub mod reflect;
pub(crate) mod util;
