//! File-backed storage primitives: mapped word arrays and temp file guards

mod mapped;
mod temp;

pub use mapped::LongArray;
pub use temp::{TempFile, temp_path};
pub(crate) use temp::remove_if_exists;
