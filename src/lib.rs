//! Read Blender `.blend` chunked files into the program's own struct layouts.

/// Chunked file reading, schema linking, pointer relinking, and writing.
pub mod blend;
