//! Headerless raw-vector file loader.
//!
//! The file is a bare sequence of `N x D x 4` bytes of little-endian f32.
//! Keys are assigned `0..N-1` by the caller of this module; quantization
//! for i8 indices happens downstream when the vectors are written into
//! storage.

use crate::error::{IndexError, Result};

/// Parsed raw vector file: `count` vectors of `dimensions` f32 each,
/// stored flat.
pub struct RawVectors {
    /// Flat element buffer, vector-major.
    pub data: Vec<f32>,
    /// Number of vectors.
    pub count: usize,
    /// Elements per vector.
    pub dimensions: usize,
}

impl RawVectors {
    /// The `i`-th vector.
    ///
    /// # Panics
    ///
    /// Panics if `i >= count`.
    #[must_use]
    pub fn vector(&self, i: usize) -> &[f32] {
        let start = i * self.dimensions;
        &self.data[start..start + self.dimensions]
    }
}

/// Reads and validates a raw vector file.
///
/// # Errors
///
/// - [`IndexError::Io`] if the file cannot be read.
/// - [`IndexError::Format`] if the byte length is not a multiple of
///   `dimensions x 4`.
pub fn read_raw_vectors(path: &str, dimensions: u32) -> Result<RawVectors> {
    let bytes = std::fs::read(path)?;
    parse_raw_vectors(&bytes, dimensions)
}

/// Parses an in-memory raw vector image.
///
/// # Errors
///
/// [`IndexError::Format`] if the byte length is not a multiple of
/// `dimensions x 4`.
pub fn parse_raw_vectors(bytes: &[u8], dimensions: u32) -> Result<RawVectors> {
    let dims = dimensions as usize;
    let stride = dims * 4;
    if stride == 0 {
        return Err(IndexError::Format("zero-dimensional raw file".into()));
    }
    if bytes.len() % stride != 0 {
        return Err(IndexError::Format(format!(
            "raw file length {} is not a multiple of {stride} (dims {dims} x 4 bytes)",
            bytes.len()
        )));
    }

    let count = bytes.len() / stride;
    let mut data: Vec<f32> = Vec::with_capacity(count * dims);

    // fs::read hands back an alignment-1 buffer; take the cast fast path
    // when it happens to be 4-byte aligned, decode per element otherwise.
    if cfg!(target_endian = "little") {
        if let Ok(floats) = bytemuck::try_cast_slice::<u8, f32>(bytes) {
            data.extend_from_slice(floats);
        } else {
            for chunk in bytes.chunks_exact(4) {
                data.push(f32::from_le_bytes(chunk.try_into().expect("4 bytes")));
            }
        }
    } else {
        for chunk in bytes.chunks_exact(4) {
            data.push(f32::from_le_bytes(chunk.try_into().expect("4 bytes")));
        }
    }

    Ok(RawVectors {
        data,
        count,
        dimensions: dims,
    })
}
