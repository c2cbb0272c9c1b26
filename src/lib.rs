//! # vectridx
//!
//! Embeddable approximate nearest-neighbor vector index for on-device
//! search: an HNSW graph over a contiguous vector arena, with optional i8
//! scalar quantization, runtime-dispatched SIMD distance kernels, a
//! background worker for bulk ingestion, and a checksummed binary on-disk
//! format.
//!
//! The crate is a library only: no CLI, no environment variables, no
//! logging destinations beyond the `log` facade and an optional debug
//! callback injected at construction.
//!
//! ## Example
//!
//! ```rust
//! use vectridx::{IndexOptions, VectorIndex};
//!
//! let index = VectorIndex::create(4, IndexOptions::default()).unwrap();
//!
//! index.add(1, &[1.0, 0.0, 0.0, 0.0]).unwrap();
//! index.add(2, &[0.0, 1.0, 0.0, 0.0]).unwrap();
//! index.add(3, &[1.0, 1.0, 0.0, 0.0]).unwrap();
//!
//! let hits = index.search(&[1.0, 0.0, 0.0, 0.0], 2).unwrap();
//! assert_eq!(hits[0].key, 1);
//! assert!(hits[0].distance.abs() < 1e-6);
//! ```
//!
//! ## Persistence example
//!
//! ```rust,no_run
//! use vectridx::{IndexOptions, VectorIndex};
//!
//! let index = VectorIndex::create(128, IndexOptions::default()).unwrap();
//! index.save("/tmp/embeddings.idx").unwrap();
//!
//! let restored = VectorIndex::create(128, IndexOptions::default()).unwrap();
//! restored.load("/tmp/embeddings.idx").unwrap();
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

/// Unified error handling.
pub mod error;

/// HNSW graph implementation.
pub mod hnsw;

/// The index facade.
pub mod index;

/// Distance metrics.
pub mod metric;

/// Persistence and file formats.
pub mod persistence;

/// Scalar quantization support.
pub mod quantization;

/// SIMD capability detection and dispatch.
pub mod simd;

/// Vector storage.
pub mod storage;

pub use error::{IndexError, Result};
pub use hnsw::{HnswParams, SearchMatch};
pub use index::{
    AddReport, BatchReport, DebugCallback, IndexOptions, IndexingProgress, SearchOptions,
    VectorIndex,
};
pub use metric::MetricKind;
pub use quantization::{QuantizerConfig, ScalarQuantizer};
pub use simd::{capabilities, select_isa, Isa, SimdCapabilities};
pub use storage::{ScalarKind, VectorStore};

/// The crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the crate version string.
#[must_use]
pub fn version() -> &'static str {
    VERSION
}
