// Shared save archive plumbing: byte order codec, errors, slot files.

pub mod qcommon;
pub mod errors;
pub mod stream;
pub mod files;

pub use errors::{ArchiveError, ArchiveResult};
