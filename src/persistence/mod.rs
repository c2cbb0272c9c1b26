//! Persistence: on-disk index format and bulk vector loading.

/// Full-index save/load codec.
pub mod codec;
/// Fixed binary file header.
pub mod header;
/// Path sanitization.
pub mod path;
/// Headerless raw-vector file loader.
pub mod raw;

pub use codec::{decode_index, encode_index, load_index, save_index, ExpectedConfig};
pub use header::{FileHeader, FORMAT_VERSION, MAGIC};
pub use path::sanitize;
pub use raw::read_raw_vectors;
