//! SIMD capability detection and runtime kernel selection.

/// Runtime capability detection.
pub mod detect;

pub use detect::{capabilities, select_isa, Isa, SimdCapabilities};
