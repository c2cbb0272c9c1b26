//! Fixed binary file header.
//!
//! # Layout (little-endian, 64 bytes)
//!
//! | offset | size | field            |
//! |--------|------|------------------|
//! | 0      | 8    | magic `"VECTRIDX"` |
//! | 8      | 2    | version (1)      |
//! | 10     | 2    | scalar_kind (0 = f32, 1 = i8) |
//! | 12     | 2    | metric_kind (0 = cos, 1 = l2sq, 2 = ip, 3 = hamming, 4 = jaccard) |
//! | 14     | 2    | reserved (0)     |
//! | 16     | 4    | dimensions       |
//! | 20     | 8    | size (live count) |
//! | 28     | 8    | capacity         |
//! | 36     | 4    | m                |
//! | 40     | 4    | ef_construction  |
//! | 44     | 4    | ef_search        |
//! | 48     | 4    | entry_key_lo (low 32 bits of entry key) |
//! | 52     | 4    | entry_top_layer  |
//! | 56     | 4    | scale_f32 (i8 scale; 0 for f32 indices) |
//! | 60     | 4    | crc32_header (over bytes 0..60) |
//!
//! The u64 fields sit at 4-byte offsets, so the header is encoded and
//! decoded field by field rather than cast from a `#[repr(C)]` struct
//! (which would insert padding).

use crate::error::{IndexError, Result};

/// Magic bytes identifying an index file.
pub const MAGIC: [u8; 8] = *b"VECTRIDX";

/// Current format version.
pub const FORMAT_VERSION: u16 = 1;

/// Header size in bytes.
pub const HEADER_LEN: usize = 64;

/// Decoded file header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileHeader {
    /// Format version.
    pub version: u16,
    /// Stored scalar representation code.
    pub scalar_kind: u16,
    /// Metric code.
    pub metric_kind: u16,
    /// Vector dimensionality.
    pub dimensions: u32,
    /// Live vector count.
    pub size: u64,
    /// Reserved slot capacity at save time.
    pub capacity: u64,
    /// HNSW `m` parameter.
    pub m: u32,
    /// Construction beam width.
    pub ef_construction: u32,
    /// Search beam width.
    pub ef_search: u32,
    /// Low 32 bits of the entry-point key (0 when empty).
    pub entry_key_lo: u32,
    /// Entry-point top layer (0 when empty).
    pub entry_top_layer: u32,
    /// i8 quantization scale; 0.0 for f32 indices.
    pub scale: f32,
}

impl FileHeader {
    /// Encodes the header, computing the trailing CRC.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..8].copy_from_slice(&MAGIC);
        buf[8..10].copy_from_slice(&self.version.to_le_bytes());
        buf[10..12].copy_from_slice(&self.scalar_kind.to_le_bytes());
        buf[12..14].copy_from_slice(&self.metric_kind.to_le_bytes());
        // bytes 14..16 reserved, zero
        buf[16..20].copy_from_slice(&self.dimensions.to_le_bytes());
        buf[20..28].copy_from_slice(&self.size.to_le_bytes());
        buf[28..36].copy_from_slice(&self.capacity.to_le_bytes());
        buf[36..40].copy_from_slice(&self.m.to_le_bytes());
        buf[40..44].copy_from_slice(&self.ef_construction.to_le_bytes());
        buf[44..48].copy_from_slice(&self.ef_search.to_le_bytes());
        buf[48..52].copy_from_slice(&self.entry_key_lo.to_le_bytes());
        buf[52..56].copy_from_slice(&self.entry_top_layer.to_le_bytes());
        buf[56..60].copy_from_slice(&self.scale.to_le_bytes());
        let crc = crc32fast::hash(&buf[0..60]);
        buf[60..64].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Decodes and validates a header.
    ///
    /// # Errors
    ///
    /// - [`IndexError::Format`] on short input, bad magic, or an
    ///   unsupported version.
    /// - [`IndexError::Corrupted`] on a header CRC mismatch.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(IndexError::Format(format!(
                "file too short for header: {} bytes",
                bytes.len()
            )));
        }

        let magic = &bytes[0..8];
        if magic != MAGIC {
            return Err(IndexError::Format(format!(
                "bad magic: expected {MAGIC:?}, got {magic:?}"
            )));
        }

        let stored_crc = u32::from_le_bytes(bytes[60..64].try_into().expect("4 bytes"));
        let actual_crc = crc32fast::hash(&bytes[0..60]);
        if stored_crc != actual_crc {
            return Err(IndexError::Corrupted(format!(
                "header crc mismatch: stored {stored_crc:#x}, computed {actual_crc:#x}"
            )));
        }

        let version = u16::from_le_bytes(bytes[8..10].try_into().expect("2 bytes"));
        if version != FORMAT_VERSION {
            return Err(IndexError::Format(format!(
                "unsupported format version {version} (expected {FORMAT_VERSION})"
            )));
        }

        Ok(Self {
            version,
            scalar_kind: u16::from_le_bytes(bytes[10..12].try_into().expect("2 bytes")),
            metric_kind: u16::from_le_bytes(bytes[12..14].try_into().expect("2 bytes")),
            dimensions: u32::from_le_bytes(bytes[16..20].try_into().expect("4 bytes")),
            size: u64::from_le_bytes(bytes[20..28].try_into().expect("8 bytes")),
            capacity: u64::from_le_bytes(bytes[28..36].try_into().expect("8 bytes")),
            m: u32::from_le_bytes(bytes[36..40].try_into().expect("4 bytes")),
            ef_construction: u32::from_le_bytes(bytes[40..44].try_into().expect("4 bytes")),
            ef_search: u32::from_le_bytes(bytes[44..48].try_into().expect("4 bytes")),
            entry_key_lo: u32::from_le_bytes(bytes[48..52].try_into().expect("4 bytes")),
            entry_top_layer: u32::from_le_bytes(bytes[52..56].try_into().expect("4 bytes")),
            scale: f32::from_le_bytes(bytes[56..60].try_into().expect("4 bytes")),
        })
    }
}
